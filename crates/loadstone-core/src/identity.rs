//! URL → node-identity cache.
//!
//! Documents are loaded one at a time but may reference entities that have
//! not been loaded yet. [`IdentityCache::get`] therefore always answers
//! synchronously: with the permanent uid when the store has already assigned
//! one, otherwise with a blank uid (`_:N`) that stands in until a mutation
//! response maps it to a permanent uid — the same way a linker resolves
//! forward declarations.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

/// The store assigned two different permanent uids to the same URL.
///
/// This means either a store bug or an already-corrupted graph; callers must
/// stop the run rather than keep writing duplicate nodes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("uid already assigned for {url}: was {existing}, got {incoming}")]
pub struct ConsistencyViolation {
    pub url: String,
    pub existing: String,
    pub incoming: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Identity {
    /// Permanent uid confirmed by the store.
    Resolved(String),
    /// Blank uid handed out while the permanent one is unknown.
    Pending(String),
}

#[derive(Debug, Default)]
struct Inner {
    /// URL → identity. A URL is either pending or resolved, never both.
    ids: HashMap<String, Identity>,
    /// Blank uid → owning URL. Anonymous blanks never appear here. Entries
    /// outlive resolution so a conflicting second assignment is detectable.
    owners: HashMap<String, String>,
    next_blank: u64,
}

impl Inner {
    fn mint(&mut self) -> String {
        self.next_blank += 1;
        format!("_:{}", self.next_blank)
    }
}

/// Thread-safe map from URL to node identity, owned by one load run.
///
/// The cache is the single source of truth for "does this URL already have
/// an identity"; documents only ever hold copies of what it returned.
#[derive(Debug, Default)]
pub struct IdentityCache {
    inner: Mutex<Inner>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity for `url`: the permanent uid if the store has confirmed one,
    /// the previously issued blank uid if not, or a freshly minted blank.
    /// Repeated calls return the same identifier until resolution, and the
    /// permanent uid ever after.
    pub fn get(&self, url: &str) -> String {
        let mut inner = self.inner.lock();

        if let Some(identity) = inner.ids.get(url) {
            return match identity {
                Identity::Resolved(uid) => {
                    debug!(url, %uid, "uid from cache");
                    uid.clone()
                }
                Identity::Pending(blank) => {
                    debug!(url, %blank, "blank uid from cache");
                    blank.clone()
                }
            };
        }

        let blank = inner.mint();
        inner
            .ids
            .insert(url.to_string(), Identity::Pending(blank.clone()));
        inner.owners.insert(blank.clone(), url.to_string());
        debug!(url, %blank, "new blank uid");
        blank
    }

    /// A blank uid not associated with any URL, for sub-objects that carry
    /// none. Each call returns a distinct identifier; resolving one is a
    /// no-op.
    pub fn new_anonymous(&self) -> String {
        self.inner.lock().mint()
    }

    /// Record the permanent uid the store assigned for `blank`.
    ///
    /// A blank that owns no URL (anonymous) is a no-op, as is re-resolving a
    /// URL to the uid it already has. Resolving a URL to a second, different
    /// uid is a [`ConsistencyViolation`].
    pub fn resolve(&self, blank: &str, uid: &str) -> Result<(), ConsistencyViolation> {
        let mut inner = self.inner.lock();

        let Some(url) = inner.owners.get(blank).cloned() else {
            debug!(blank, uid, "anonymous blank resolved");
            return Ok(());
        };

        if let Some(Identity::Resolved(existing)) = inner.ids.get(&url) {
            if existing == uid {
                return Ok(());
            }
            return Err(ConsistencyViolation {
                existing: existing.clone(),
                incoming: uid.to_string(),
                url,
            });
        }

        debug!(%url, uid, "uid resolved");
        inner.ids.insert(url, Identity::Resolved(uid.to_string()));
        Ok(())
    }
}
