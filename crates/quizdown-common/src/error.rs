//! Error types shared across quizdown crates

use miette::Diagnostic;
use std::path::PathBuf;

/// Main error type for quizdown operations outside the render pipeline
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum QuizError {
    /// IO error
    #[error(transparent)]
    #[diagnostic(code(quizdown::io))]
    Io(#[from] std::io::Error),

    /// A question bank or subject list could not be read
    #[error("failed to read {}", path.display())]
    #[diagnostic(code(quizdown::bank::read))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A question bank or subject list is not valid JSON for its shape
    #[error("invalid JSON in {}", path.display())]
    #[diagnostic(
        code(quizdown::bank::json),
        help("question banks hold a `questions` array, either at the top level or inside a one-element array")
    )]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    #[diagnostic(code(quizdown::config))]
    Config(String),
}
