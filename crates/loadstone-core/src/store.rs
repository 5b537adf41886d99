//! The graph-store seam.
//!
//! The core never talks to a store directly; it goes through [`GraphStore`].
//! The HTTP client in `loadstone-store` is the real implementation, tests
//! use in-memory fakes.

use std::collections::HashMap;

use serde_json::Value;

/// Errors surfaced by a [`GraphStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The request never completed (connection, timeout, encoding).
    #[error("transport failure")]
    Transport(#[source] anyhow::Error),

    /// The store answered and said no.
    #[error("store rejected request: {0}")]
    Rejected(String),
}

/// Outcome of one commit-now mutation.
#[derive(Debug, Clone, Default)]
pub struct MutationResponse {
    /// Blank-uid name (without the `_:` prefix) → permanent uid, for every
    /// blank the store newly assigned in this mutation.
    pub uids: HashMap<String, String>,
    /// Whether the store committed the transaction.
    pub committed: bool,
}

/// A mutate/query/alter endpoint.
pub trait GraphStore: Send + Sync {
    /// Submit one serialized document as a commit-now mutation.
    fn mutate(&self, set_json: &[u8]) -> Result<MutationResponse, StoreError>;

    /// Read-only query, used by introspection tooling.
    fn query(&self, query: &str) -> Result<Value, StoreError>;

    /// Apply a schema operation.
    fn alter(&self, schema: &str) -> Result<(), StoreError>;
}
