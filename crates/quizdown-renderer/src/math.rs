//! LaTeX math rendering via pulldown-latex → MathML

use std::sync::LazyLock;

use async_trait::async_trait;
use pulldown_cmark_escape::escape_html;
use pulldown_latex::{
    Parser, Storage, config::DisplayMode, config::RenderConfig, mathml::push_mathml,
};
use regex::Regex;

use crate::config::MathDelimiters;
use crate::error::TypesetError;
use crate::protect::{ProtectedSpan, Protector, SpanContext, SpanKind, restore_with};
use crate::typeset::{ContentRoot, Typesetter};

/// Result of attempting to render LaTeX math
pub enum MathResult {
    /// Successfully rendered MathML
    Success(String),
    /// Rendering failed - contains fallback HTML with source and error message
    Error { html: String, message: String },
}

/// Render LaTeX math to MathML
///
/// # Arguments
/// * `latex` - The LaTeX source string (without delimiters like $ or $$)
/// * `display_mode` - If true, render as display math (block); if false, inline
pub fn render_math(latex: &str, display_mode: bool) -> MathResult {
    let storage = Storage::new();
    let parser = Parser::new(latex, &storage);
    let config = RenderConfig {
        display_mode: if display_mode {
            DisplayMode::Block
        } else {
            DisplayMode::Inline
        },
        ..Default::default()
    };

    let mut mathml = String::new();

    let events: Vec<_> = parser.collect();
    let errors: Vec<String> = events
        .iter()
        .filter_map(|e| e.as_ref().err().map(|err| err.to_string()))
        .collect();

    if errors.is_empty() {
        if let Err(e) = push_mathml(&mut mathml, events.into_iter(), config) {
            return MathResult::Error {
                html: format_error_html(latex, &e.to_string(), display_mode),
                message: e.to_string(),
            };
        }
        MathResult::Success(mathml)
    } else {
        let error_msg = errors.join("; ");
        MathResult::Error {
            html: format_error_html(latex, &error_msg, display_mode),
            message: error_msg,
        }
    }
}

fn format_error_html(latex: &str, error: &str, display_mode: bool) -> String {
    let mode_class = if display_mode {
        "math-display"
    } else {
        "math-inline"
    };
    let mut escaped_latex = String::new();
    let mut escaped_error = String::new();
    // These won't fail writing to String
    let _ = escape_html(&mut escaped_latex, latex);
    let _ = escape_html(&mut escaped_error, error);
    format!(
        r#"<span class="math math-error {mode_class}" title="{escaped_error}"><code>{escaped_latex}</code></span>"#
    )
}

/// Regions of rendered HTML whose text must not be typeset.
static CODE_REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<pre\b.*?</pre>|<code\b.*?</code>").unwrap());

/// Typesets the math in rendered HTML to MathML.
///
/// Math spans are found with the same scanner the renderer protects them
/// with. Chemistry has no MathML rendering and is marked up as source.
#[derive(Debug, Default)]
pub struct MathmlTypesetter {
    protector: Protector,
}

impl MathmlTypesetter {
    pub fn new(delimiters: MathDelimiters) -> Self {
        Self {
            protector: Protector::new(delimiters),
        }
    }

    pub fn typeset_html(&self, html: &str) -> String {
        let mut out = String::with_capacity(html.len());
        let mut last = 0;
        for code in CODE_REGION.find_iter(html) {
            out.push_str(&self.typeset_prose(&html[last..code.start()]));
            out.push_str(code.as_str());
            last = code.end();
        }
        out.push_str(&self.typeset_prose(&html[last..]));
        out
    }

    fn typeset_prose(&self, prose: &str) -> String {
        let protected = self.protector.protect(prose);
        if protected.spans.is_empty() {
            return prose.to_owned();
        }
        // spans nested in another span are rendered as part of it
        let outer: Vec<ProtectedSpan> = protected
            .spans
            .iter()
            .filter(|span| {
                !protected
                    .spans
                    .iter()
                    .any(|other| other.content.contains(span.id.as_str()))
            })
            .cloned()
            .collect();
        restore_with(&protected.text, &outer, |span, context| {
            let nested: Vec<ProtectedSpan> = protected
                .spans
                .iter()
                .filter(|inner| span.content.contains(inner.id.as_str()))
                .cloned()
                .collect();
            let source = if nested.is_empty() {
                span.content.clone()
            } else {
                restore_with(&span.content, &nested, |inner, _| inner.content.clone())
            };
            match context {
                // attribute text is already escaped and has no room for MathML
                SpanContext::Attribute => source,
                SpanContext::Text => render_span(span.kind, &source),
            }
        })
    }
}

#[async_trait]
impl Typesetter for MathmlTypesetter {
    async fn typeset(&self, root: &mut dyn ContentRoot) -> Result<(), TypesetError> {
        let output = self.typeset_html(root.inner_html());
        root.set_typeset_output(Some(output));
        Ok(())
    }
}

fn render_span(kind: SpanKind, source: &str) -> String {
    let (latex, display) = match kind {
        SpanKind::Chemistry => return format_chemistry_html(source),
        SpanKind::DisplayMath => (strip_delimiters(source, &["$$", r"\["], &["$$", r"\]"]), true),
        SpanKind::InlineMath => (strip_delimiters(source, &["$", r"\("], &["$", r"\)"]), false),
    };
    match render_math(&unescape_entities(latex), display) {
        MathResult::Success(mathml) => mathml,
        MathResult::Error { html, message } => {
            tracing::debug!(error = %message, "math did not typeset");
            html
        }
    }
}

fn format_chemistry_html(source: &str) -> String {
    let mut escaped = String::new();
    let _ = escape_html(&mut escaped, source);
    format!(r#"<span class="math math-chem"><code>{escaped}</code></span>"#)
}

fn strip_delimiters<'a>(source: &'a str, opens: &[&str], closes: &[&str]) -> &'a str {
    for (open, close) in opens.iter().zip(closes) {
        if let Some(inner) = source
            .strip_prefix(*open)
            .and_then(|rest| rest.strip_suffix(*close))
        {
            return inner;
        }
    }
    source
}

fn unescape_entities(latex: &str) -> String {
    if !latex.contains('&') {
        return latex.to_owned();
    }
    latex
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
