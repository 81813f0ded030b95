//! Source error types.

use thiserror::Error;

/// Failures raised by data-source implementations.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Backend failure while fetching or batching.
    #[error("source '{source_name}' failed: {message}")]
    Backend {
        source_name: String,
        message: String,
    },

    /// An identity of the wrong type reached a source. Unreachable
    /// through the typed program builders; indicates a bug in the
    /// erasure layer.
    #[error("source '{source_name}' received an identity of the wrong type")]
    IdentityType { source_name: String },

    /// Any other failure raised by a source implementation.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SourceError {
    /// Creates a backend failure for the named source.
    pub fn backend(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        SourceError::Backend {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;
