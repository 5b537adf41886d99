//! Error types for loadstone-core.

use crate::identity::ConsistencyViolation;
use crate::source::SourceError;
use crate::store::StoreError;

/// Alias for Results returning [`LoadError`].
pub type Result<T> = std::result::Result<T, LoadError>;

/// Top-level error type for a batch load.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// A document could not be fetched or parsed. Local to one document;
    /// siblings keep loading.
    #[error("could not load {location}")]
    Retrieval {
        location: String,
        #[source]
        source: SourceError,
    },

    /// The store rejected the mutation or the transport failed. Local to one
    /// document and safe to retry: no placeholder was resolved.
    #[error("could not submit {location}")]
    Submission {
        location: String,
        #[source]
        source: StoreError,
    },

    /// The store assigned two different identities to the same URL. Fatal:
    /// continuing would duplicate nodes.
    #[error(transparent)]
    Consistency(#[from] ConsistencyViolation),
}

impl LoadError {
    /// Whether this error must abort the whole run rather than one document.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LoadError::Consistency(_))
    }
}
