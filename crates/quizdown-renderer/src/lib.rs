//! Quizdown renderer
//!
//! Turns question-bank text (markdown with legacy inline HTML, fenced code, TeX
//! math and `\ce{}` chemistry) into HTML. Math is swapped out for placeholders
//! before the markdown pass and put back afterwards, code blocks are
//! highlighted, and finished output is memoized per input text.
//!
//! ```
//! use quizdown_renderer::{Renderer, RendererConfig};
//!
//! let renderer = Renderer::new(RendererConfig::default());
//! let html = renderer.render("Energy: $E=mc^2$ is **famous**.");
//! assert!(html.contains("$E=mc^2$"));
//! assert!(html.contains("<strong>famous</strong>"));
//! ```

pub mod base_html;
pub mod cache;
pub mod code_pretty;
pub mod config;
pub mod error;
pub mod markdown;
#[cfg(feature = "mathml")]
pub mod math;
pub mod preprocess;
pub mod protect;
pub mod renderer;
pub mod typeset;
mod utils;

pub use cache::{CacheStats, RenderCache};
pub use code_pretty::{Highlighter, PlainHighlighter, escape_code};
#[cfg(feature = "syntax-highlighting")]
pub use code_pretty::SyntectHighlighter;
pub use config::{MathDelimiters, RendererConfig};
pub use error::{RenderError, TypesetError};
pub use markdown::{CmarkEngine, MarkdownEngine};
#[cfg(feature = "mathml")]
pub use math::MathmlTypesetter;
pub use protect::{Protected, ProtectedSpan, Protector, SpanContext, SpanKind, restore};
pub use renderer::{Renderer, RendererBuilder};
pub use typeset::{ContentRoot, Fragment, TypesetOutcome, TypesetTrigger, Typesetter};
