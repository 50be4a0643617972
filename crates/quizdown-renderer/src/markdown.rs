//! Markdown to HTML for placeholder-safe text.

use std::ops::Range;
use std::sync::Arc;

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd};

use crate::base_html::push_html;
use crate::code_pretty::Highlighter;

/// Converts placeholder-safe text to HTML. Implementations must pass inline
/// and block HTML through and must leave placeholder tokens intact.
pub trait MarkdownEngine: Send + Sync {
    fn to_html(&self, safe_text: &str) -> String;
}

/// GFM-flavoured markdown on pulldown-cmark, with highlighted code blocks.
pub struct CmarkEngine {
    highlighter: Arc<dyn Highlighter>,
    options: Options,
    copy_button: bool,
}

impl CmarkEngine {
    pub fn new(highlighter: Arc<dyn Highlighter>) -> Self {
        Self {
            highlighter,
            options: Self::default_options(),
            copy_button: true,
        }
    }

    pub fn with_copy_button(mut self, copy_button: bool) -> Self {
        self.copy_button = copy_button;
        self
    }

    /// Tables, task lists and strikethrough. Math stays off: it is protected
    /// before the text gets here.
    pub fn default_options() -> Options {
        Options::ENABLE_TABLES | Options::ENABLE_GFM | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
    }
}

impl std::fmt::Debug for CmarkEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmarkEngine")
            .field("options", &self.options)
            .field("copy_button", &self.copy_button)
            .finish_non_exhaustive()
    }
}

impl MarkdownEngine for CmarkEngine {
    fn to_html(&self, safe_text: &str) -> String {
        let events: Vec<_> = Parser::new_ext(safe_text, self.options)
            .into_offset_iter()
            .collect();
        let events = literal_blank_emphasis(safe_text, events);
        let events = source_entities(safe_text, events);

        let mut html = String::with_capacity(safe_text.len() + safe_text.len() / 2);
        push_html(
            &mut html,
            events.into_iter(),
            self.highlighter.as_ref(),
            self.copy_button,
        );
        html
    }
}

/// Emphasis or strong runs with nothing but whitespace inside are written
/// back out as their source delimiters instead of empty tags.
fn literal_blank_emphasis<'a>(
    source: &'a str,
    events: Vec<(Event<'a>, Range<usize>)>,
) -> Vec<(Event<'a>, Range<usize>)> {
    let mut out = Vec::with_capacity(events.len());
    // index of a pending end event -> text to emit in its place
    let mut closers: Vec<(usize, CowStr<'a>)> = Vec::new();

    for (i, (event, range)) in events.iter().enumerate() {
        if let Some(pos) = closers.iter().position(|(at, _)| *at == i) {
            let (_, close) = closers.swap_remove(pos);
            out.push((Event::Text(close), range.clone()));
            continue;
        }
        let width = match event {
            Event::Start(Tag::Emphasis) => 1,
            Event::Start(Tag::Strong) => 2,
            _ => {
                out.push((event.clone(), range.clone()));
                continue;
            }
        };
        match matching_end(&events, i) {
            Some(end) if is_blank(&events[i + 1..end]) => {
                let (open, close) = delimiters(source, range, width);
                out.push((Event::Text(open), range.clone()));
                closers.push((end, close));
            }
            _ => out.push((event.clone(), range.clone())),
        }
    }
    out
}

/// Character references in prose are written out as typed instead of as the
/// decoded character. Image text ends up in an `alt` attribute and keeps the
/// decoded form.
fn source_entities<'a>(source: &'a str, events: Vec<(Event<'a>, Range<usize>)>) -> Vec<Event<'a>> {
    let mut image_depth = 0usize;
    events
        .into_iter()
        .map(|(event, range)| {
            match &event {
                Event::Start(Tag::Image { .. }) => image_depth += 1,
                Event::End(TagEnd::Image) => image_depth = image_depth.saturating_sub(1),
                Event::Text(text) if image_depth == 0 => {
                    if let Some(raw) = source.get(range).filter(|raw| is_entity(raw, text)) {
                        return Event::InlineHtml(CowStr::Borrowed(raw));
                    }
                }
                _ => {}
            }
            event
        })
        .collect()
}

fn is_entity(raw: &str, decoded: &str) -> bool {
    raw.len() > 2 && raw.starts_with('&') && raw.ends_with(';') && raw != decoded
}

fn matching_end(events: &[(Event<'_>, Range<usize>)], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (j, (event, _)) in events.iter().enumerate().skip(start + 1) {
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) if depth == 0 => return Some(j),
            Event::End(_) => depth -= 1,
            _ => {}
        }
    }
    None
}

fn is_blank(events: &[(Event<'_>, Range<usize>)]) -> bool {
    events.iter().all(|(event, _)| match event {
        Event::Text(text) => text.trim().is_empty(),
        Event::SoftBreak | Event::HardBreak => true,
        _ => false,
    })
}

fn delimiters<'a>(source: &'a str, range: &Range<usize>, width: usize) -> (CowStr<'a>, CowStr<'a>) {
    let fallback = if width == 2 { "**" } else { "*" };
    let open = source.get(range.start..range.start + width).unwrap_or(fallback);
    let close = range
        .end
        .checked_sub(width)
        .and_then(|start| source.get(start..range.end))
        .unwrap_or(fallback);
    (CowStr::Borrowed(open), CowStr::Borrowed(close))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code_pretty::PlainHighlighter;

    fn engine() -> CmarkEngine {
        CmarkEngine::new(Arc::new(PlainHighlighter))
    }

    #[test]
    fn paragraph() {
        assert_eq!(engine().to_html("Hello world"), "<p>Hello world</p>\n");
    }

    #[test]
    fn emphasis_and_strong() {
        assert_eq!(
            engine().to_html("*a* _b_ **c** ~~d~~"),
            "<p><em>a</em> <em>b</em> <strong>c</strong> <del>d</del></p>\n"
        );
    }

    #[test]
    fn blank_emphasis_keeps_its_delimiters() {
        let html = engine().to_html("x *&nbsp;* y");
        assert!(!html.contains("<em>"));
        assert_eq!(html, "<p>x *&nbsp;* y</p>\n");
    }

    #[test]
    fn lists() {
        assert_eq!(
            engine().to_html("- a\n- b\n\n3. c"),
            "<ul>\n<li>a</li>\n<li>b</li>\n</ul>\n<ol start=\"3\">\n<li>c</li>\n</ol>\n"
        );
    }

    #[test]
    fn placeholders_survive() {
        let html = engine().to_html("Area QUIZDOWNMATH0END and\nQUIZDOWNMATH1END");
        assert_eq!(html, "<p>Area QUIZDOWNMATH0END and<br />\nQUIZDOWNMATH1END</p>\n");
    }

    #[test]
    fn legacy_html_and_entities() {
        let html = engine().to_html("a<br>b &lt;c&gt;");
        assert_eq!(html, "<p>a<br>b &lt;c&gt;</p>\n");
    }

    #[test]
    fn entities_pass_through_as_written() {
        assert_eq!(
            engine().to_html("a&nbsp;b &copy; &#169; &amp;"),
            "<p>a&nbsp;b &copy; &#169; &amp;</p>\n"
        );
    }

    #[test]
    fn entities_in_image_text_stay_escaped() {
        assert_eq!(
            engine().to_html("![a &amp; b](x.png)"),
            "<p><img src=\"x.png\" alt=\"a &amp; b\" /></p>\n"
        );
    }

    #[test]
    fn code_is_not_reparsed() {
        let html = engine().to_html("```\n**not bold** <b>\n```");
        assert!(html.contains("**not bold** &lt;b&gt;"));
        assert!(!html.contains("<strong>"));
    }
}
