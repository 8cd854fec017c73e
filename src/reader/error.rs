//! Reader error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReaderError {
    /// The engine handshake has not completed
    #[error("Reader engine is not ready")]
    NotReady,

    /// The initial render failed; the session is unusable
    #[error("Failed to open book: {0}")]
    LoadFailed(String),
}
