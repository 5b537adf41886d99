//! Recursive document preprocessing.
//!
//! Walks a parsed document and gives every object a node identity before
//! submission: objects that carry a `url` resolve through the
//! [`IdentityCache`], the rest get anonymous blank uids. Fields with no
//! workable schema mapping yet are stripped along the way.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::warn;

use crate::identity::IdentityCache;

/// Field the preprocessor assigns node identities into.
pub const UID_FIELD: &str = "uid";

/// Field linking a document object back to its source entity.
pub const URL_FIELD: &str = "url";

/// What the preprocessor drops before identity assignment.
#[derive(Debug, Clone)]
pub struct PreprocessPolicy {
    /// Fields removed from every object. The default set holds `names`,
    /// whose nested-translation shape has no schema mapping yet.
    pub skip_fields: BTreeSet<String>,
}

impl Default for PreprocessPolicy {
    fn default() -> Self {
        Self {
            skip_fields: BTreeSet::from(["names".to_string()]),
        }
    }
}

impl PreprocessPolicy {
    /// Add a field to the exclusion set.
    pub fn skip_field(mut self, field: impl Into<String>) -> Self {
        self.skip_fields.insert(field.into());
        self
    }
}

/// Recursively assign uids and strip excluded fields, in place.
///
/// Scalars pass through untouched. `path` locates the value within the
/// document for diagnostics only.
pub fn preprocess(value: &mut Value, cache: &IdentityCache, policy: &PreprocessPolicy, path: &str) {
    match value {
        Value::Object(obj) => {
            for field in &policy.skip_fields {
                obj.remove(field);
            }

            let url = match obj.get(URL_FIELD) {
                Some(Value::String(url)) => Some(url.clone()),
                Some(other) => {
                    warn!(path, kind = ?other, "url field is not a string; treating as absent");
                    None
                }
                None => None,
            };
            if let Some(url) = url {
                let uid = cache.get(&url);
                obj.insert(UID_FIELD.to_string(), Value::String(uid));
            }
            if !obj.contains_key(UID_FIELD) {
                obj.insert(
                    UID_FIELD.to_string(),
                    Value::String(cache.new_anonymous()),
                );
            }

            for (key, nested) in obj.iter_mut() {
                preprocess(nested, cache, policy, &format!("{path}/{key}"));
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                preprocess(item, cache, policy, &format!("{path}[{i}]"));
            }
        }
        // Scalars carry no identity.
        Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null => {}
    }
}
