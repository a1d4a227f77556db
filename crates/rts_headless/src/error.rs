//! Error types for the headless arena.

use thiserror::Error;

use rts_ai::error::AiError;

/// Result type alias using [`HeadlessError`].
pub type Result<T> = std::result::Result<T, HeadlessError>;

/// Everything that can stop a headless run.
#[derive(Debug, Error)]
pub enum HeadlessError {
    /// The engine rejected its configuration or strategy data.
    #[error(transparent)]
    Ai(#[from] AiError),

    /// Failed to read or write a file.
    #[error("Failed to access '{path}': {source}")]
    Io {
        /// Path involved.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Results could not be encoded or decoded as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Profiles could not be written as RON.
    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),

    /// The match setup cannot be run.
    #[error("Invalid match setup: {0}")]
    InvalidSetup(String),
}

impl HeadlessError {
    /// Wrap an IO error with the path it concerns.
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
