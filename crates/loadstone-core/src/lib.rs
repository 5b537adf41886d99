//! Loadstone core: URL→node-identity resolution and batch loading.
//!
//! Converts a tree of independently-fetched JSON documents into idempotent
//! commit-now mutations against a graph store that identifies nodes by
//! opaque uids rather than URLs. The hard part is resolving URL references
//! under forward references: a document may point at an entity that hasn't
//! been loaded yet, or is being loaded concurrently. Blank uids (`_:N`)
//! stand in until the store assigns permanent ones, and every reference to
//! one URL converges on exactly one node.
//!
//! - [`identity::IdentityCache`]: the URL→identity map, single source of
//!   truth, safe to share across workers
//! - [`preprocess`]: recursive identity assignment and field filtering over
//!   parsed documents
//! - [`submit`]: one document, one mutation, feeding assigned uids back
//! - [`batch::BatchLoader`]: the `load_batch` entry point the CLI drives
//!
//! Transport ([`store::GraphStore`]) and retrieval
//! ([`source::DocumentSource`]) are trait seams; the HTTP client lives in
//! `loadstone-store`.

pub mod batch;
pub mod error;
pub mod identity;
pub mod preprocess;
pub mod source;
pub mod store;
pub mod submit;

pub use batch::{BatchLoader, LoadReport, LoaderConfig, NoProgress, ProgressSink, TypeReport};
pub use batch::{BASE_SCHEMA, TYPE_FIELD};
pub use error::{LoadError, Result};
pub use identity::{ConsistencyViolation, IdentityCache};
pub use preprocess::{preprocess, PreprocessPolicy, UID_FIELD, URL_FIELD};
pub use source::{DocumentSource, Entry, FsArchive, SourceError};
pub use store::{GraphStore, MutationResponse, StoreError};
pub use submit::submit;
