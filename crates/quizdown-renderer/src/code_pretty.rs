//! Syntax highlighting for fenced code blocks.
//!
//! Highlighters return HTML meant to sit inside a `<code>` element. Anything
//! the tokenizer does not cover is entity-escaped, and every failure path
//! falls back to [`escape_code`].

#[cfg(feature = "syntax-highlighting")]
use std::panic::{AssertUnwindSafe, catch_unwind};

#[cfg(feature = "syntax-highlighting")]
use syntect::{
    html::{ClassStyle, ClassedHTMLGenerator},
    parsing::{SyntaxReference, SyntaxSet},
    util::LinesWithEndings,
};

#[cfg(feature = "syntax-highlighting")]
use crate::RenderError;

/// Language name used when a block's language is missing or unknown.
pub const PLAINTEXT: &str = "plaintext";

pub trait Highlighter: Send + Sync {
    /// Highlight `code` as `language`. Never fails; unknown languages and
    /// tokenizer errors produce [`escape_code`] output.
    fn highlight(&self, code: &str, language: &str) -> String;

    fn has_language(&self, language: &str) -> bool;
}

/// `language` if the highlighter knows it, otherwise [`PLAINTEXT`].
pub fn resolve_language<'a>(highlighter: &dyn Highlighter, language: &'a str) -> &'a str {
    if !language.is_empty() && highlighter.has_language(language) {
        language
    } else {
        PLAINTEXT
    }
}

/// Escape `&`, `<`, `>`, `"` and `'` for use in HTML text or attributes.
pub fn escape_code(code: &str) -> String {
    let mut escaped = String::with_capacity(code.len() + code.len() / 8);
    for c in code.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Highlighter that knows no languages: everything comes out escaped.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainHighlighter;

impl Highlighter for PlainHighlighter {
    fn highlight(&self, code: &str, _language: &str) -> String {
        escape_code(code)
    }

    fn has_language(&self, _language: &str) -> bool {
        false
    }
}

/// Class-based highlighting over syntect's bundled grammars. Token spans carry
/// scope names as classes, so colours come from a stylesheet.
#[cfg(feature = "syntax-highlighting")]
pub struct SyntectHighlighter {
    syntax_set: SyntaxSet,
}

#[cfg(feature = "syntax-highlighting")]
impl SyntectHighlighter {
    pub fn new() -> Self {
        Self::with_syntax_set(SyntaxSet::load_defaults_newlines())
    }

    pub fn with_syntax_set(syntax_set: SyntaxSet) -> Self {
        Self { syntax_set }
    }

    fn find_syntax(&self, language: &str) -> Option<&SyntaxReference> {
        if language.is_empty() || language == PLAINTEXT {
            return None;
        }
        self.syntax_set.find_syntax_by_token(language)
    }

    fn try_highlight(&self, code: &str, syntax: &SyntaxReference) -> Result<String, RenderError> {
        let mut generator = ClassedHTMLGenerator::new_with_class_style(
            syntax,
            &self.syntax_set,
            ClassStyle::Spaced,
        );
        for line in LinesWithEndings::from(code) {
            generator
                .parse_html_for_line_which_includes_newline(line)
                .map_err(|e| RenderError::Highlight {
                    language: syntax.name.clone(),
                    message: e.to_string(),
                })?;
        }
        Ok(generator.finalize())
    }
}

#[cfg(feature = "syntax-highlighting")]
impl Default for SyntectHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "syntax-highlighting")]
impl std::fmt::Debug for SyntectHighlighter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntectHighlighter")
            .field("syntaxes", &self.syntax_set.syntaxes().len())
            .finish()
    }
}

#[cfg(feature = "syntax-highlighting")]
impl Highlighter for SyntectHighlighter {
    fn highlight(&self, code: &str, language: &str) -> String {
        let Some(syntax) = self.find_syntax(language) else {
            return escape_code(code);
        };
        // fancy-regex grammars can panic on pathological input
        match catch_unwind(AssertUnwindSafe(|| self.try_highlight(code, syntax))) {
            Ok(Ok(html)) => html,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "falling back to plain code");
                escape_code(code)
            }
            Err(_) => {
                tracing::warn!(language, "highlighter panicked, falling back to plain code");
                escape_code(code)
            }
        }
    }

    fn has_language(&self, language: &str) -> bool {
        self.find_syntax(language).is_some()
    }
}
