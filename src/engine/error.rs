//! Engine error types

use thiserror::Error;

/// Errors from a rendering backend
#[derive(Debug, Error)]
pub enum EngineError {
    /// Script evaluation failed or the returned promise rejected
    #[error("Script error: {0}")]
    Script(String),

    /// The engine answered with a value of the wrong shape
    #[error("Unexpected result from {call}: {detail}")]
    UnexpectedResult { call: &'static str, detail: String },

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Native PDF view failure
    #[error("PDF error: {0}")]
    Pdf(String),

    /// Navigation target the backend cannot resolve
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// The backend has no document loaded
    #[error("No document loaded")]
    NotLoaded,
}

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, EngineError>;
