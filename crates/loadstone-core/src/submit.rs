//! Mutation submission and identity feedback.

use serde_json::Value;
use tracing::debug;

use crate::error::{LoadError, Result};
use crate::identity::IdentityCache;
use crate::store::{GraphStore, StoreError};

/// Submit one preprocessed document as a single commit-now mutation and feed
/// the returned blank→permanent uid assignments back into `cache`.
///
/// Nothing in the cache changes unless the whole submission succeeded, so a
/// failed document can be retried and will reuse the same blank uids.
/// Returns how many uids the store newly assigned.
pub fn submit<S: GraphStore + ?Sized>(
    store: &S,
    cache: &IdentityCache,
    doc: &Value,
    location: &str,
) -> Result<usize> {
    let payload = serde_json::to_vec(doc).map_err(|e| LoadError::Submission {
        location: location.to_string(),
        source: StoreError::Transport(e.into()),
    })?;
    debug!(location, bytes = payload.len(), "sending mutation");

    let res = store.mutate(&payload).map_err(|source| LoadError::Submission {
        location: location.to_string(),
        source,
    })?;
    if !res.committed {
        return Err(LoadError::Submission {
            location: location.to_string(),
            source: StoreError::Rejected("mutation was not committed".to_string()),
        });
    }

    for (blank, uid) in &res.uids {
        debug!(%blank, %uid, "uid assigned");
        // The store reports blanks without their `_:` prefix.
        cache.resolve(&format!("_:{blank}"), uid)?;
    }
    Ok(res.uids.len())
}
