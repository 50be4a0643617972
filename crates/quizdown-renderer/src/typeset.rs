//! Hand-off of rendered HTML to a math typesetting engine.
//!
//! Typesetting works on a [`ContentRoot`], the container whose contents were
//! set from a render. The engine is optional; without one the restored
//! delimiters are left in place for something else to pick up.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::TypesetError;

/// A container whose contents can be replaced and typeset.
pub trait ContentRoot: Send {
    /// Identity of the container on screen. Typeset requests on roots with
    /// the same key supersede each other; keyless roots never do.
    fn key(&self) -> Option<&str> {
        None
    }

    fn inner_html(&self) -> &str;

    /// Replace the contents. Anything previously typeset is discarded.
    fn set_inner_html(&mut self, html: String);

    fn typeset_output(&self) -> Option<&str>;

    fn set_typeset_output(&mut self, output: Option<String>);
}

/// In-memory [`ContentRoot`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Fragment {
    key: Option<String>,
    html: String,
    typeset: Option<String>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fragment standing for the container `key`, e.g. a question's text or
    /// one of its choices.
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::default()
        }
    }

    /// Typeset output if there is any, otherwise the plain contents.
    pub fn rendered(&self) -> &str {
        self.typeset.as_deref().unwrap_or(&self.html)
    }
}

impl ContentRoot for Fragment {
    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn inner_html(&self) -> &str {
        &self.html
    }

    fn set_inner_html(&mut self, html: String) {
        self.html = html;
        self.typeset = None;
    }

    fn typeset_output(&self) -> Option<&str> {
        self.typeset.as_deref()
    }

    fn set_typeset_output(&mut self, output: Option<String>) {
        self.typeset = output;
    }
}

#[async_trait]
pub trait Typesetter: Send + Sync {
    /// Typeset the math in `root`.
    async fn typeset(&self, root: &mut dyn ContentRoot) -> Result<(), TypesetError>;

    /// Drop whatever a previous `typeset` left on `root`.
    fn clear(&self, root: &mut dyn ContentRoot) {
        root.set_typeset_output(None);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypesetOutcome {
    Completed,
    /// No engine configured; the root is untouched.
    Unavailable,
    /// The engine failed; the root keeps its untypeset contents.
    Failed,
    /// A later request for the same root started before this one finished.
    Superseded,
}

/// Runs the typesetting engine over content roots, with stale-request
/// detection: each call on a keyed root takes a generation number for that
/// key, and a call that finishes after a newer one for the same key started
/// reports [`TypesetOutcome::Superseded`].
pub struct TypesetTrigger {
    engine: Option<Arc<dyn Typesetter>>,
    generations: Mutex<HashMap<String, u64>>,
}

impl TypesetTrigger {
    pub fn new(engine: Option<Arc<dyn Typesetter>>) -> Self {
        Self {
            engine,
            generations: Mutex::new(HashMap::new()),
        }
    }

    fn lock_generations(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.generations.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Never removed: a request still in flight must keep seeing a newer
    /// generation.
    fn begin(&self, key: &str) -> u64 {
        let mut generations = self.lock_generations();
        let generation = generations.entry(key.to_owned()).or_insert(0);
        *generation += 1;
        *generation
    }

    fn is_current(&self, key: &str, token: u64) -> bool {
        self.lock_generations().get(key) == Some(&token)
    }

    pub fn is_available(&self) -> bool {
        self.engine.is_some()
    }

    #[tracing::instrument(skip_all)]
    pub async fn typeset(&self, root: &mut dyn ContentRoot) -> TypesetOutcome {
        let Some(engine) = self.engine.as_ref() else {
            tracing::debug!("no typesetting engine, leaving delimiters in place");
            return TypesetOutcome::Unavailable;
        };
        let request = root.key().map(|key| {
            let key = key.to_owned();
            let token = self.begin(&key);
            (key, token)
        });

        engine.clear(root);
        let result = engine.typeset(root).await;

        let current = request
            .as_ref()
            .is_none_or(|(key, token)| self.is_current(key, *token));
        match result {
            Ok(()) if current => TypesetOutcome::Completed,
            Err(err) if current => {
                tracing::warn!(error = %err, "typesetting failed");
                TypesetOutcome::Failed
            }
            Ok(()) => TypesetOutcome::Superseded,
            Err(err) => {
                tracing::debug!(error = %err, "stale typesetting request failed");
                TypesetOutcome::Superseded
            }
        }
    }
}

impl Default for TypesetTrigger {
    fn default() -> Self {
        Self::new(None)
    }
}

impl std::fmt::Debug for TypesetTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypesetTrigger")
            .field("available", &self.engine.is_some())
            .field("keys", &self.lock_generations().len())
            .finish()
    }
}
