//! Batch loading: the entry point the CLI drives.
//!
//! One batch run walks every entity-type container under a root location and
//! replays each document as its own commit-now mutation. Documents inside a
//! type are fanned out across a worker pool; the shared [`IdentityCache`]
//! keeps concurrent references to the same URL on one node.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{LoadError, Result};
use crate::identity::IdentityCache;
use crate::preprocess::{preprocess, PreprocessPolicy, URL_FIELD};
use crate::source::{DocumentSource, SourceError};
use crate::store::GraphStore;
use crate::submit::submit;

/// Predicate naming the entity type of a node, as the store expects it.
pub const TYPE_FIELD: &str = "dgraph.type";

/// Baseline schema the loader depends on: exact-match lookups on `url` drive
/// identity resolution, term search on `name` is for consumers.
pub const BASE_SCHEMA: &str = "\
url: string @index(exact) .
name: string @index(term) .
";

/// Observer for load progress. `document_done` is called from worker
/// threads; implementations must tolerate concurrent calls.
pub trait ProgressSink: Send + Sync {
    fn begin_type(&self, typename: &str, total: usize);
    fn document_done(&self, typename: &str);
}

/// Default sink: no output.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn begin_type(&self, _typename: &str, _total: usize) {}
    fn document_done(&self, _typename: &str) {}
}

/// Knobs for one batch load.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Prefix prepended to archive-relative locations to reconstruct the
    /// URLs documents reference each other by.
    pub url_prefix: String,
    /// Preprocessing policy (excluded fields).
    pub policy: PreprocessPolicy,
    /// Apply [`BASE_SCHEMA`] before loading.
    pub bootstrap_schema: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            url_prefix: "/api/v2".to_string(),
            policy: PreprocessPolicy::default(),
            bootstrap_schema: true,
        }
    }
}

/// Per-entity-type load counts.
#[derive(Debug, Clone)]
pub struct TypeReport {
    pub typename: String,
    pub loaded: usize,
    pub failed: usize,
}

/// Summary of one batch run.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub failed: usize,
    pub types: Vec<TypeReport>,
    /// One entry per failed document, each carrying its location.
    pub errors: Vec<LoadError>,
}

/// Drives fetch → preprocess → submit over every document under a root
/// location, one entity type at a time.
pub struct BatchLoader<'a, S, D> {
    store: &'a S,
    source: &'a D,
    cache: IdentityCache,
    config: LoaderConfig,
}

impl<'a, S: GraphStore, D: DocumentSource> BatchLoader<'a, S, D> {
    pub fn new(store: &'a S, source: &'a D, config: LoaderConfig) -> Self {
        Self {
            store,
            source,
            cache: IdentityCache::new(),
            config,
        }
    }

    /// The identity cache owned by this run.
    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    /// Load every entity type under `root`.
    ///
    /// Per-document failures are collected in the report without aborting
    /// sibling documents; a consistency violation aborts immediately.
    pub fn load_batch(&self, root: &str, progress: &dyn ProgressSink) -> Result<LoadReport> {
        if self.config.bootstrap_schema {
            self.bootstrap_schema()?;
        }

        let mut report = LoadReport::default();
        let entries = self
            .source
            .list(root)
            .map_err(|source| LoadError::Retrieval {
                location: root.to_string(),
                source,
            })?;

        for entry in entries {
            if !entry.is_container {
                continue;
            }
            let type_root = join_location(root, &entry.name);
            let type_report =
                self.load_type(&entry.name, &type_root, progress, &mut report.errors)?;
            report.loaded += type_report.loaded;
            report.failed += type_report.failed;
            report.types.push(type_report);
        }

        info!(loaded = report.loaded, failed = report.failed, "batch complete");
        Ok(report)
    }

    /// Apply the baseline schema.
    pub fn bootstrap_schema(&self) -> Result<()> {
        self.store
            .alter(BASE_SCHEMA)
            .map_err(|source| LoadError::Submission {
                location: "schema alter".to_string(),
                source,
            })
    }

    fn load_type(
        &self,
        typename: &str,
        type_root: &str,
        progress: &dyn ProgressSink,
        errors: &mut Vec<LoadError>,
    ) -> Result<TypeReport> {
        let docs: Vec<String> = self
            .source
            .list(type_root)
            .map_err(|source| LoadError::Retrieval {
                location: type_root.to_string(),
                source,
            })?
            .into_iter()
            .filter(|entry| entry.is_container)
            .map(|entry| entry.name)
            .collect();

        progress.begin_type(typename, docs.len());

        let loaded = AtomicUsize::new(0);
        let failures: Mutex<Vec<LoadError>> = Mutex::new(Vec::new());

        docs.par_iter().try_for_each(|name| {
            let location = join_location(type_root, name);
            let outcome = self.load_document(typename, &location);
            progress.document_done(typename);
            match outcome {
                Ok(()) => {
                    loaded.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                }
                Err(err) if err.is_fatal() => Err(err),
                Err(err) => {
                    warn!(%err, "document failed");
                    failures.lock().push(err);
                    Ok(())
                }
            }
        })?;

        let mut failures = failures.into_inner();
        let report = TypeReport {
            typename: typename.to_string(),
            loaded: loaded.into_inner(),
            failed: failures.len(),
        };
        errors.append(&mut failures);
        Ok(report)
    }

    fn load_document(&self, typename: &str, location: &str) -> Result<()> {
        let mut doc = self
            .source
            .fetch(location)
            .map_err(|source| LoadError::Retrieval {
                location: location.to_string(),
                source,
            })?;

        // Top-level objects don't carry their own URL; derive it from where
        // the document sits in the hierarchy so the root resolves through
        // the cache instead of going anonymous.
        let Value::Object(obj) = &mut doc else {
            return Err(LoadError::Retrieval {
                location: location.to_string(),
                source: SourceError::Malformed {
                    location: location.to_string(),
                    reason: "document root is not a JSON object".to_string(),
                },
            });
        };
        let url = format!("{}/{}/", self.config.url_prefix, location);
        obj.insert(URL_FIELD.to_string(), Value::String(url));
        obj.insert(
            TYPE_FIELD.to_string(),
            Value::String(typename.to_string()),
        );

        preprocess(&mut doc, &self.cache, &self.config.policy, location);
        submit(self.store, &self.cache, &doc, location)?;
        Ok(())
    }
}

fn join_location(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}
