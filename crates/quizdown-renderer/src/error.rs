//! Error types for the render pipeline.
//!
//! None of these escape [`crate::Renderer::render`]; each stage degrades to a
//! less formatted result and reports what happened through `tracing`.

use miette::Diagnostic;

#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum RenderError {
    /// An optional engine was not supplied
    #[error("{engine} engine is not available")]
    #[diagnostic(
        code(quizdown::render::engine_unavailable),
        help("output falls back to unformatted text")
    )]
    EngineUnavailable { engine: &'static str },

    /// The tokenizer rejected a code block
    #[error("highlighting `{language}` failed: {message}")]
    #[diagnostic(code(quizdown::render::highlight))]
    Highlight { language: String, message: String },

    /// A protected span's placeholder did not survive the markdown pass
    #[error("placeholder {id} was not found in the rendered output")]
    #[diagnostic(code(quizdown::render::placeholder))]
    PlaceholderMismatch { id: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Typeset(#[from] TypesetError),

    /// Invalid renderer configuration
    #[error("invalid renderer configuration: {0}")]
    #[diagnostic(code(quizdown::render::config))]
    Config(String),
}

#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum TypesetError {
    /// The typesetting engine rejected the subtree
    #[error("typesetting engine failed: {0}")]
    #[diagnostic(code(quizdown::typeset::engine))]
    Engine(String),
}
