//! Math and chemistry protection.
//!
//! Markdown would mangle TeX (`_` turns into emphasis, `\(` loses its
//! backslash, `|` splits table cells), so every math or chemistry span is
//! swapped for an opaque placeholder before the markdown pass and swapped
//! back afterwards.
//!
//! Passes run in a fixed order, each over the output of the one before:
//!
//! 1. display math: `$$...$$`, `\[...\]`
//! 2. chemistry: `\ce{...}` with balanced braces
//! 3. inline math: `$...$`, `\(...\)`
//!
//! A span that opens or closes inside a code block or code span is left
//! alone. Code ranges come from the markdown parser and are recomputed before
//! each pass.

use pulldown_cmark_escape::escape_html;
use regex::Regex;
use smol_str::{SmolStr, format_smolstr};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::RenderError;
use crate::config::MathDelimiters;
use crate::utils::CodeRanges;

pub const PLACEHOLDER_PREFIX: &str = "QUIZDOWNMATH";
pub const PLACEHOLDER_SUFFIX: &str = "END";

/// Class of the span restored inline math is wrapped in.
pub const INLINE_MATH_WRAPPER_CLASS: &str = "math-inline-wrapper";

static DISPLAY_DOLLARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\$\$.*?\$\$").unwrap());
static DISPLAY_BRACKETS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\\\[.*?\\\]").unwrap());
static INLINE_PARENS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\\\(.*?\\\)").unwrap());

const CHEMISTRY_OPEN: &str = r"\ce{";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    DisplayMath,
    Chemistry,
    InlineMath,
}

/// Original delimited text standing behind a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedSpan {
    pub id: SmolStr,
    /// The span exactly as written, delimiters included.
    pub content: String,
    pub kind: SpanKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Protected {
    pub text: String,
    /// In the order the passes found them. Two spans may share content.
    pub spans: Vec<ProtectedSpan>,
}

/// Replaces math spans with placeholders. The counter behind the placeholder
/// ids only ever grows, so ids never repeat for the lifetime of a protector.
#[derive(Debug, Default)]
pub struct Protector {
    counter: AtomicU64,
    delimiters: MathDelimiters,
}

impl Protector {
    pub fn new(delimiters: MathDelimiters) -> Self {
        Self {
            counter: AtomicU64::new(0),
            delimiters,
        }
    }

    pub fn delimiters(&self) -> MathDelimiters {
        self.delimiters
    }

    pub fn protect(&self, text: &str) -> Protected {
        let mut spans = Vec::new();
        if text.is_empty() {
            return Protected::default();
        }

        let text = self.protect_display(text, &mut spans);
        let text = self.protect_chemistry(&text, &mut spans);
        let text = self.protect_inline(&text, &mut spans);

        Protected { text, spans }
    }

    fn next_id(&self) -> SmolStr {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format_smolstr!("{PLACEHOLDER_PREFIX}{n}{PLACEHOLDER_SUFFIX}")
    }

    fn record(&self, content: &str, kind: SpanKind, spans: &mut Vec<ProtectedSpan>) -> SmolStr {
        let id = self.next_id();
        spans.push(ProtectedSpan {
            id: id.clone(),
            content: content.to_owned(),
            kind,
        });
        id
    }

    fn replace_re(
        &self,
        re: &Regex,
        text: &str,
        kind: SpanKind,
        spans: &mut Vec<ProtectedSpan>,
    ) -> String {
        let code = CodeRanges::scan(text);
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut pos = 0;
        while let Some(m) = re.find_at(text, pos) {
            if code.cuts(&m.range()) {
                // delimiters are ASCII, so the next byte is a char boundary
                pos = m.start() + 1;
                continue;
            }
            out.push_str(&text[last..m.start()]);
            out.push_str(&self.record(m.as_str(), kind, spans));
            last = m.end();
            pos = m.end();
        }
        out.push_str(&text[last..]);
        out
    }

    fn protect_display(&self, text: &str, spans: &mut Vec<ProtectedSpan>) -> String {
        let mut text = text.to_owned();
        if self.delimiters.dollars {
            text = self.replace_re(&DISPLAY_DOLLARS_RE, &text, SpanKind::DisplayMath, spans);
        }
        if self.delimiters.brackets {
            text = self.replace_re(&DISPLAY_BRACKETS_RE, &text, SpanKind::DisplayMath, spans);
        }
        text
    }

    fn protect_chemistry(&self, text: &str, spans: &mut Vec<ProtectedSpan>) -> String {
        let code = CodeRanges::scan(text);
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut pos = 0;
        while let Some(found) = text[pos..].find(CHEMISTRY_OPEN) {
            let start = pos + found;
            let body = start + CHEMISTRY_OPEN.len();
            let end = balanced_close(&text[body..]).map(|close| body + close + 1);
            match end {
                Some(end) if !code.cuts(&(start..end)) => {
                    out.push_str(&text[last..start]);
                    out.push_str(&self.record(&text[start..end], SpanKind::Chemistry, spans));
                    last = end;
                    pos = end;
                }
                _ => pos = body,
            }
        }
        out.push_str(&text[last..]);
        out
    }

    fn protect_inline(&self, text: &str, spans: &mut Vec<ProtectedSpan>) -> String {
        let mut text = text.to_owned();
        if self.delimiters.dollars {
            text = self.protect_inline_dollars(&text, spans);
        }
        if self.delimiters.brackets {
            text = self.replace_re(&INLINE_PARENS_RE, &text, SpanKind::InlineMath, spans);
        }
        text
    }

    /// `$...$` where neither the opening `$` nor the character after it is
    /// another `$`. A backslash escapes the next character on the same line,
    /// and the first unescaped `$` closes the span.
    fn protect_inline_dollars(&self, text: &str, spans: &mut Vec<ProtectedSpan>) -> String {
        let code = CodeRanges::scan(text);
        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut i = 0;
        while i < bytes.len() {
            let opens = bytes[i] == b'$'
                && (i == 0 || bytes[i - 1] != b'$')
                && bytes.get(i + 1).is_some_and(|&b| b != b'$');
            if opens {
                if let Some(end) = inline_dollar_end(bytes, i + 1) {
                    if !code.cuts(&(i..end)) {
                        out.push_str(&text[last..i]);
                        out.push_str(&self.record(&text[i..end], SpanKind::InlineMath, spans));
                        last = end;
                        i = end;
                        continue;
                    }
                }
            }
            i += 1;
        }
        out.push_str(&text[last..]);
        out
    }
}

/// Byte offset of the `}` closing a brace group whose `{` was just consumed.
fn balanced_close(s: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, b) in s.bytes().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Byte offset just past the closing `$` of an inline span whose body starts
/// at `start`.
fn inline_dollar_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut j = start;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => match bytes.get(j + 1) {
                None | Some(b'\n') | Some(b'\r') => return None,
                Some(_) => j += 2,
            },
            b'$' => return (j > start).then_some(j + 1),
            _ => j += 1,
        }
    }
    None
}

/// Where a placeholder sits in the markdown output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanContext {
    /// Element content.
    Text,
    /// Inside a tag, e.g. an image `alt` or a link `title`.
    Attribute,
}

impl SpanContext {
    /// Context of byte `pos` in `html`. Text `<` is always escaped by the
    /// markdown pass, so an unclosed `<` before `pos` means an open tag.
    fn at(html: &str, pos: usize) -> Self {
        let before = &html[..pos];
        match (before.rfind('<'), before.rfind('>')) {
            (Some(lt), Some(gt)) if lt > gt => Self::Attribute,
            (Some(_), None) => Self::Attribute,
            _ => Self::Text,
        }
    }
}

/// Put protected spans back in place of their placeholders.
///
/// Spans are applied in list order, each replacing the first occurrence of its
/// id. A span whose id is only present inside another span's content (inline
/// math around a chemistry span, say) is retried once that span has been
/// restored. Ids that never turn up are skipped.
///
/// Spans in element content come back as written, inline math optionally
/// wrapped. Spans inside a tag come back entity-escaped and unwrapped.
pub fn restore(html: &str, spans: &[ProtectedSpan], wrap_inline: bool) -> String {
    restore_with(html, spans, |span, context| match (span.kind, context) {
        (_, SpanContext::Attribute) => {
            let mut escaped = String::with_capacity(span.content.len());
            // writing into a String cannot fail
            let _ = escape_html(&mut escaped, &span.content);
            escaped
        }
        (SpanKind::InlineMath, SpanContext::Text) if wrap_inline => format!(
            r#"<span class="{INLINE_MATH_WRAPPER_CLASS}">{}</span>"#,
            span.content
        ),
        _ => span.content.clone(),
    })
}

/// [`restore`] with a caller-supplied replacement for each span. Contexts are
/// taken from `html` before anything is replaced; a span nested in a span
/// restored inside a tag is inside that tag too.
pub fn restore_with(
    html: &str,
    spans: &[ProtectedSpan],
    mut replacement: impl FnMut(&ProtectedSpan, SpanContext) -> String,
) -> String {
    let mut contexts: Vec<SpanContext> = spans
        .iter()
        .map(|span| match html.find(span.id.as_str()) {
            Some(pos) => SpanContext::at(html, pos),
            None => SpanContext::Text,
        })
        .collect();
    let mut html = html.to_owned();
    let mut pending: Vec<usize> = (0..spans.len()).collect();

    loop {
        let before = pending.len();
        let mut missing = Vec::new();
        for i in pending {
            let span = &spans[i];
            let Some(pos) = html.find(span.id.as_str()) else {
                missing.push(i);
                continue;
            };
            let context = contexts[i];
            html.replace_range(pos..pos + span.id.len(), &replacement(span, context));
            if context == SpanContext::Attribute {
                for (j, other) in spans.iter().enumerate() {
                    if span.content.contains(other.id.as_str()) {
                        contexts[j] = SpanContext::Attribute;
                    }
                }
            }
        }
        pending = missing;
        if pending.is_empty() || pending.len() == before {
            break;
        }
    }

    for i in pending {
        let err = RenderError::PlaceholderMismatch {
            id: spans[i].id.to_string(),
        };
        tracing::debug!(error = %err, "skipping lost math span");
    }
    html
}
