use thiserror::Error;

/// Errors surfaced by storage drivers.
///
/// Cache misses are never errors. Driver failures propagate to the caller
/// without retry; the cache layer neither swallows nor degrades them.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A selector query failed inside the driver.
    #[error("storage query failed for `{selector}`: {message}")]
    Query { selector: String, message: String },
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl StorageError {
    pub fn query(selector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            selector: selector.into(),
            message: message.into(),
        }
    }

    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}
