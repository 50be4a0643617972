//! Source scanning helpers shared by the protect and preprocess passes.

use std::ops::Range;

use pulldown_cmark::{Event, Parser, Tag};

use crate::markdown::CmarkEngine;

/// Byte ranges of a text that markdown renders as code: fenced and indented
/// blocks, and inline code spans. Taken from the parser itself, so a code span
/// never crosses a paragraph and stray backticks stay prose.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct CodeRanges(Vec<Range<usize>>);

impl CodeRanges {
    pub(crate) fn scan(text: &str) -> Self {
        let ranges = Parser::new_ext(text, CmarkEngine::default_options())
            .into_offset_iter()
            .filter_map(|(event, range)| match event {
                Event::Code(_) | Event::Start(Tag::CodeBlock(_)) => Some(range),
                _ => None,
            })
            .collect();
        Self(ranges)
    }

    pub(crate) fn contains(&self, pos: usize) -> bool {
        self.0.iter().any(|range| range.contains(&pos))
    }

    /// Whether a delimited span starting at `span.start` and ending at
    /// `span.end` opens or closes inside code. Code wholly inside the span
    /// does not count.
    pub(crate) fn cuts(&self, span: &Range<usize>) -> bool {
        span.is_empty() || self.contains(span.start) || self.contains(span.end - 1)
    }
}
