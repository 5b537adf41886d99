//! Integration tests for the complete loading pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - FsArchive → BatchLoader → GraphStore
//! - forward-reference resolution across documents
//!
//! Run with: cargo test --test integration_tests

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use serde_json::{json, Value};
use tempfile::tempdir;

use loadstone_core::{
    BatchLoader, FsArchive, GraphStore, LoaderConfig, MutationResponse, NoProgress, StoreError,
};

// ============================================================================
// A store fake with real uid-assignment semantics
// ============================================================================

/// Assigns a fresh uid to every blank in every mutation, independently per
/// request, exactly as separate commit-now transactions would. Keeps the
/// full blank→uid assignment history so tests can check which node every
/// reference finally landed on.
#[derive(Default)]
struct RecordingStore {
    mutations: Mutex<Vec<Value>>,
    assigned: Mutex<HashMap<String, String>>,
    next_uid: Mutex<u64>,
}

impl RecordingStore {
    fn blanks(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::Object(obj) => {
                if let Some(Value::String(uid)) = obj.get("uid") {
                    if let Some(name) = uid.strip_prefix("_:") {
                        if !out.iter().any(|b| b == name) {
                            out.push(name.to_string());
                        }
                    }
                }
                for nested in obj.values() {
                    Self::blanks(nested, out);
                }
            }
            Value::Array(items) => {
                for item in items {
                    Self::blanks(item, out);
                }
            }
            _ => {}
        }
    }

    /// The permanent uid a mutation's `uid` value denotes: itself if already
    /// permanent, else whatever this store assigned for the blank.
    fn normalize(&self, uid: &str) -> String {
        match self.assigned.lock().unwrap().get(uid) {
            Some(permanent) => permanent.clone(),
            None => uid.to_string(),
        }
    }
}

impl GraphStore for RecordingStore {
    fn mutate(&self, set_json: &[u8]) -> Result<MutationResponse, StoreError> {
        let doc: Value =
            serde_json::from_slice(set_json).map_err(|e| StoreError::Transport(e.into()))?;
        let mut blanks = Vec::new();
        Self::blanks(&doc, &mut blanks);

        let mut next = self.next_uid.lock().unwrap();
        let mut uids = HashMap::new();
        for blank in blanks {
            *next += 1;
            let uid = format!("{:#x}", *next);
            self.assigned
                .lock()
                .unwrap()
                .insert(format!("_:{blank}"), uid.clone());
            uids.insert(blank, uid);
        }
        self.mutations.lock().unwrap().push(doc);
        Ok(MutationResponse {
            uids,
            committed: true,
        })
    }

    fn query(&self, _query: &str) -> Result<Value, StoreError> {
        Ok(json!({}))
    }

    fn alter(&self, _schema: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

fn write_doc(root: &Path, location: &str, doc: &Value) {
    let dir = root.join(location);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("index.json"), serde_json::to_vec(doc).unwrap()).unwrap();
}

fn collect_url_uids(value: &Value, out: &mut HashMap<String, HashSet<String>>) {
    match value {
        Value::Object(obj) => {
            if let (Some(Value::String(url)), Some(Value::String(uid))) =
                (obj.get("url"), obj.get("uid"))
            {
                out.entry(url.clone()).or_default().insert(uid.clone());
            }
            for nested in obj.values() {
                collect_url_uids(nested, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_url_uids(item, out);
            }
        }
        _ => {}
    }
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn test_archive_load_resolves_every_cross_reference_to_one_node() {
    let archive = tempdir().unwrap();

    // A small archive with the reference patterns the loader must survive:
    // backward references, forward references, shared references, and
    // anonymous sub-objects.
    write_doc(
        archive.path(),
        "pokemon/1",
        &json!({
            "name": "bulbasaur",
            "types": [
                {"slot": 1, "type": {"name": "grass", "url": "/api/v2/type/12/"}},
                {"slot": 2, "type": {"name": "poison", "url": "/api/v2/type/4/"}}
            ],
            "names": [{"language": "fr", "name": "Bulbizarre"}]
        }),
    );
    write_doc(
        archive.path(),
        "pokemon/4",
        &json!({
            "name": "charmander",
            "types": [
                {"slot": 1, "type": {"name": "fire", "url": "/api/v2/type/10/"}}
            ]
        }),
    );
    write_doc(
        archive.path(),
        "type/10",
        &json!({
            "name": "fire",
            "damage_relations": {
                "double_damage_to": [{"name": "grass", "url": "/api/v2/type/12/"}]
            }
        }),
    );
    write_doc(archive.path(), "type/12", &json!({"name": "grass"}));
    write_doc(archive.path(), "type/4", &json!({"name": "poison"}));

    let store = RecordingStore::default();
    let source = FsArchive::new(archive.path());
    let loader = BatchLoader::new(&store, &source, LoaderConfig::default());

    let report = loader.load_batch("", &NoProgress).unwrap();
    assert_eq!(report.loaded, 5);
    assert_eq!(report.failed, 0);

    // Every URL the batch mentioned ended up permanently resolved.
    for url in [
        "/api/v2/pokemon/1/",
        "/api/v2/pokemon/4/",
        "/api/v2/type/4/",
        "/api/v2/type/10/",
        "/api/v2/type/12/",
    ] {
        let uid = loader.cache().get(url);
        assert!(uid.starts_with("0x"), "{url} still has placeholder {uid}");
    }

    // One node per URL: every uid that reached the store for a given URL —
    // placeholder or permanent — denotes the same node once placeholders
    // are mapped through the store's own assignments.
    let mut identities: HashMap<String, HashSet<String>> = HashMap::new();
    for doc in store.mutations.lock().unwrap().iter() {
        collect_url_uids(doc, &mut identities);
    }
    for (url, uids) in identities {
        let nodes: HashSet<String> = uids.iter().map(|uid| store.normalize(uid)).collect();
        assert_eq!(nodes.len(), 1, "{url} was split across nodes: {nodes:?}");
        assert_eq!(nodes.iter().next().unwrap(), &loader.cache().get(&url));
    }

    // The stripped field never reached the store.
    for doc in store.mutations.lock().unwrap().iter() {
        assert!(doc.get("names").is_none());
    }
}

#[test]
fn test_forward_reference_scenario() {
    let archive = tempdir().unwrap();
    write_doc(
        archive.path(),
        "pokemon/1",
        &json!({"name": "bulbasaur", "kind": {"url": "/api/v2/type/5/"}}),
    );
    write_doc(archive.path(), "type/5", &json!({"name": "rock"}));

    let store = RecordingStore::default();
    let source = FsArchive::new(archive.path());
    let loader = BatchLoader::new(&store, &source, LoaderConfig::default());

    loader.load_batch("", &NoProgress).unwrap();

    // Submitting pokemon/1 introduced a placeholder for /api/v2/type/5/;
    // the store's response resolved it, and the later direct load of
    // type/5 reused it rather than creating a second node.
    let resolved = loader.cache().get("/api/v2/type/5/");
    assert!(resolved.starts_with("0x"));

    let mutations = store.mutations.lock().unwrap();
    let type_doc = mutations
        .iter()
        .find(|doc| doc["url"] == "/api/v2/type/5/")
        .unwrap();
    assert_eq!(type_doc["uid"].as_str().unwrap(), resolved);
}
