use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;
use std::{env, fs};

use crate::RenderError;

/// Default number of rendered texts kept by the render cache.
pub const DEFAULT_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(300) {
    Some(capacity) => capacity,
    None => unreachable!(),
};

/// Which math delimiter conventions are recognised.
///
/// Dollar delimiters are `$...$` and `$$...$$`; bracket delimiters are
/// `\(...\)` and `\[...\]`. When both are on, the dollar form is scanned
/// first within each pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MathDelimiters {
    pub dollars: bool,
    pub brackets: bool,
}

impl Default for MathDelimiters {
    fn default() -> Self {
        Self {
            dollars: true,
            brackets: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Maximum number of entries in the render cache. Must be non-zero.
    pub cache_capacity: usize,
    /// Emit a copy-to-clipboard button in code block headers.
    pub copy_button: bool,
    /// Wrap restored inline math in a horizontally scrollable span.
    pub wrap_inline_math: bool,
    pub delimiters: MathDelimiters,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY.get(),
            copy_button: true,
            wrap_inline_math: true,
            delimiters: MathDelimiters::default(),
        }
    }
}

impl RendererConfig {
    /// Read a TOML config file. `$NAME` references to environment variables
    /// are substituted before parsing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let mut config_string = fs::read_to_string(path).map_err(|e| {
            RenderError::Config(format!("error reading {}: {}", path.display(), e))
        })?;
        for (k, v) in env::vars() {
            config_string = config_string.replace(&format!("${}", k), &v);
        }
        Self::from_toml_str(&config_string)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, RenderError> {
        let config: Self = toml::from_str(s)
            .map_err(|e| RenderError::Config(format!("error parsing config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if self.cache_capacity == 0 {
            return Err(RenderError::Config(
                "cache_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Cache capacity as a `NonZeroUsize`, falling back to the default for an
    /// unvalidated zero.
    pub fn cache_capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.cache_capacity).unwrap_or(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        let config = RendererConfig::from_toml_str("").unwrap();
        assert_eq!(config, RendererConfig::default());
        assert_eq!(config.cache_capacity().get(), 300);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = RendererConfig::from_toml_str(
            "cache_capacity = 12\n\n[delimiters]\nbrackets = false\n",
        )
        .unwrap();
        assert_eq!(config.cache_capacity, 12);
        assert!(config.copy_button);
        assert!(config.delimiters.dollars);
        assert!(!config.delimiters.brackets);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = RendererConfig::from_toml_str("cache_capacity = 0").unwrap_err();
        assert!(matches!(err, RenderError::Config(_)));
    }

    #[test]
    fn load_substitutes_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("renderer.toml");
        // SAFETY: the variable name is unique to this test.
        unsafe { env::set_var("QUIZDOWN_TEST_CACHE_CAPACITY", "42") };
        fs::write(
            &path,
            "cache_capacity = $QUIZDOWN_TEST_CACHE_CAPACITY\ncopy_button = false\n",
        )
        .unwrap();
        let config = RendererConfig::load(&path).unwrap();
        assert_eq!(config.cache_capacity, 42);
        assert!(!config.copy_button);

        let missing = RendererConfig::load(dir.path().join("nope.toml"));
        assert!(missing.is_err());
    }
}
