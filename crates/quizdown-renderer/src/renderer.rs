use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::cache::{CacheStats, RenderCache};
use crate::code_pretty::Highlighter;
use crate::config::RendererConfig;
use crate::markdown::{CmarkEngine, MarkdownEngine};
use crate::preprocess::{escape_lone_asterisks, wrap_tables};
use crate::protect::{Protector, restore};
use crate::typeset::{ContentRoot, TypesetOutcome, TypesetTrigger, Typesetter};
use crate::RenderError;

/// Single entry point for turning question text into HTML.
///
/// Owns the placeholder counter and the render cache, so one renderer should
/// live for the whole session. All methods take `&self`; the renderer can be
/// shared across threads.
pub struct Renderer {
    config: RendererConfig,
    markdown: Option<Arc<dyn MarkdownEngine>>,
    protector: Protector,
    cache: Mutex<RenderCache>,
    typeset: TypesetTrigger,
}

impl Renderer {
    /// Renderer with the default engines for the enabled features.
    pub fn new(config: RendererConfig) -> Self {
        RendererBuilder::new().config(config).build()
    }

    pub fn builder() -> RendererBuilder {
        RendererBuilder::new()
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Render `text` to HTML. Never fails: a missing markdown engine returns
    /// the text unchanged, and every later stage falls back to less
    /// formatted output.
    #[tracing::instrument(skip_all, fields(len = text.len()))]
    pub fn render(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let Some(markdown) = self.markdown.as_ref() else {
            let err = RenderError::EngineUnavailable { engine: "markdown" };
            tracing::debug!(error = %err, "returning text unchanged");
            return text.to_owned();
        };

        if let Some(html) = self.lock_cache().get(text) {
            return html;
        }
        tracing::debug!("render cache miss");

        let protected = self.protector.protect(text);
        let safe_text = escape_lone_asterisks(&protected.text);
        let html = wrap_tables(&markdown.to_html(&safe_text));
        let html = restore(&html, &protected.spans, self.config.wrap_inline_math);

        self.lock_cache().put(text.to_owned(), html.clone());
        html
    }

    /// Render `text` into `root`, then typeset it.
    pub async fn render_and_typeset(
        &self,
        root: &mut dyn ContentRoot,
        text: &str,
    ) -> TypesetOutcome {
        root.set_inner_html(self.render(text));
        self.typeset(root).await
    }

    pub async fn typeset(&self, root: &mut dyn ContentRoot) -> TypesetOutcome {
        self.typeset.typeset(root).await
    }

    pub fn has_markdown(&self) -> bool {
        self.markdown.is_some()
    }

    pub fn has_typesetter(&self) -> bool {
        self.typeset.is_available()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.lock_cache().stats()
    }

    pub fn cache_len(&self) -> usize {
        self.lock_cache().len()
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    fn lock_cache(&self) -> MutexGuard<'_, RenderCache> {
        // the cache holds plain strings, so a panic elsewhere cannot leave it
        // half-updated
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(RendererConfig::default())
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("config", &self.config)
            .field("markdown", &self.markdown.is_some())
            .field("typeset", &self.typeset)
            .finish_non_exhaustive()
    }
}

enum Slot<T: ?Sized> {
    Default,
    Custom(Arc<T>),
    Disabled,
}

/// Builds a [`Renderer`] with injected engines. Anything not set uses the
/// default for the enabled features.
pub struct RendererBuilder {
    config: RendererConfig,
    markdown: Slot<dyn MarkdownEngine>,
    highlighter: Option<Arc<dyn Highlighter>>,
    typesetter: Slot<dyn Typesetter>,
}

impl RendererBuilder {
    pub fn new() -> Self {
        Self {
            config: RendererConfig::default(),
            markdown: Slot::Default,
            highlighter: None,
            typesetter: Slot::Default,
        }
    }

    pub fn config(mut self, config: RendererConfig) -> Self {
        self.config = config;
        self
    }

    pub fn markdown(mut self, engine: Arc<dyn MarkdownEngine>) -> Self {
        self.markdown = Slot::Custom(engine);
        self
    }

    /// Build without a markdown engine: `render` returns its input.
    pub fn without_markdown(mut self) -> Self {
        self.markdown = Slot::Disabled;
        self
    }

    /// Highlighter for the default markdown engine. Ignored when a custom
    /// engine is set.
    pub fn highlighter(mut self, highlighter: Arc<dyn Highlighter>) -> Self {
        self.highlighter = Some(highlighter);
        self
    }

    pub fn typesetter(mut self, typesetter: Arc<dyn Typesetter>) -> Self {
        self.typesetter = Slot::Custom(typesetter);
        self
    }

    pub fn without_typesetter(mut self) -> Self {
        self.typesetter = Slot::Disabled;
        self
    }

    pub fn build(self) -> Renderer {
        let Self {
            config,
            markdown,
            highlighter,
            typesetter,
        } = self;

        if let Err(err) = config.validate() {
            tracing::warn!(error = %err, "using default cache capacity");
        }

        let markdown = match markdown {
            Slot::Custom(engine) => Some(engine),
            Slot::Disabled => None,
            Slot::Default => {
                let highlighter = highlighter.unwrap_or_else(default_highlighter);
                let engine = CmarkEngine::new(highlighter).with_copy_button(config.copy_button);
                Some(Arc::new(engine) as Arc<dyn MarkdownEngine>)
            }
        };
        let typesetter = match typesetter {
            Slot::Custom(engine) => Some(engine),
            Slot::Disabled => None,
            Slot::Default => default_typesetter(&config),
        };

        Renderer {
            protector: Protector::new(config.delimiters),
            cache: Mutex::new(RenderCache::new(config.cache_capacity())),
            typeset: TypesetTrigger::new(typesetter),
            markdown,
            config,
        }
    }
}

impl Default for RendererBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "syntax-highlighting")]
fn default_highlighter() -> Arc<dyn Highlighter> {
    Arc::new(crate::code_pretty::SyntectHighlighter::new())
}

#[cfg(not(feature = "syntax-highlighting"))]
fn default_highlighter() -> Arc<dyn Highlighter> {
    Arc::new(crate::code_pretty::PlainHighlighter)
}

#[cfg(feature = "mathml")]
fn default_typesetter(config: &RendererConfig) -> Option<Arc<dyn Typesetter>> {
    Some(Arc::new(crate::math::MathmlTypesetter::new(config.delimiters)))
}

#[cfg(not(feature = "mathml"))]
fn default_typesetter(_config: &RendererConfig) -> Option<Arc<dyn Typesetter>> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code_pretty::PlainHighlighter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Wraps text in `<p>` and counts calls.
    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl MarkdownEngine for Counting {
        fn to_html(&self, safe_text: &str) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            format!("<p>{safe_text}</p>")
        }
    }

    fn plain_renderer() -> Renderer {
        Renderer::builder()
            .highlighter(Arc::new(PlainHighlighter))
            .without_typesetter()
            .build()
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert_eq!(plain_renderer().render(""), "");
    }

    #[test]
    fn missing_engine_returns_input() {
        let renderer = Renderer::builder().without_markdown().build();
        assert!(!renderer.has_markdown());
        assert_eq!(renderer.render("**a** $x$"), "**a** $x$");
        assert_eq!(renderer.cache_len(), 0);
    }

    #[test]
    fn repeated_input_hits_the_cache() {
        let engine = Arc::new(Counting::default());
        let renderer = Renderer::builder().markdown(engine.clone()).build();

        let first = renderer.render("a $x$ b");
        let second = renderer.render("a $x$ b");
        assert_eq!(first, second);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
        assert_eq!(renderer.cache_stats().hits, 1);

        renderer.render("other");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn injected_engine_sees_placeholders_only() {
        let engine = Arc::new(Counting::default());
        let renderer = Renderer::builder().markdown(engine).build();
        let html = renderer.render(r"$$a_1$$ and \ce{H2O}");
        assert_eq!(html, r"<p>$$a_1$$ and \ce{H2O}</p>");
    }

    #[test]
    fn cache_capacity_comes_from_config() {
        let config = RendererConfig {
            cache_capacity: 2,
            ..Default::default()
        };
        let renderer = Renderer::builder()
            .config(config)
            .markdown(Arc::new(Counting::default()))
            .build();
        for text in ["a", "b", "c"] {
            renderer.render(text);
        }
        assert_eq!(renderer.cache_len(), 2);
        assert_eq!(renderer.cache_stats().evictions, 1);
        renderer.clear_cache();
        assert_eq!(renderer.cache_len(), 0);
    }

    #[test]
    fn inline_wrapper_can_be_turned_off() {
        let config = RendererConfig {
            wrap_inline_math: false,
            ..Default::default()
        };
        let renderer = Renderer::builder()
            .config(config)
            .highlighter(Arc::new(PlainHighlighter))
            .build();
        assert_eq!(renderer.render("$x$"), "<p>$x$</p>\n");
    }

    #[tokio::test]
    async fn render_and_typeset_without_engine() {
        let renderer = plain_renderer();
        let mut root = crate::Fragment::new();
        let outcome = renderer.render_and_typeset(&mut root, "*hi*").await;
        assert_eq!(outcome, TypesetOutcome::Unavailable);
        assert_eq!(root.inner_html(), "<p><em>hi</em></p>\n");
    }
}
