//! Error types for Tessera.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Matrix configuration errors (fatal, before any cell runs)
    #[error("Invalid matrix configuration: {0}")]
    Configuration(String),

    #[error("Include entry {index} is missing required attribute `{attribute}`")]
    IncompleteInclude { index: usize, attribute: &'static str },

    // Per-cell errors (fatal to that cell only)
    #[error("Install action `{action}` failed with exit code {exit_code}")]
    Install { action: String, exit_code: i32 },

    #[error("No test command declared for os `{os}`")]
    NoTestCommand { os: String },

    // Aggregation errors (fatal to the aggregation step only)
    #[error("Coverage merge failed: {0}")]
    Merge(String),

    #[error("Coverage service notification failed: {0}")]
    Notify(String),

    // Infrastructure errors
    #[error("Cache store error: {0}")]
    CacheStore(String),

    #[error("Event bus error: {0}")]
    EventBus(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
