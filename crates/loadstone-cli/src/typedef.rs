//! `loadstone typedef` — infer type definitions from loaded data.
//!
//! The store's schema lists predicates but not which types use them; the
//! data does. For each node type this probes every known predicate and
//! prints the fields that actually occur, in the store's type-definition
//! syntax.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use loadstone_core::GraphStore;
use loadstone_store::DgraphClient;

pub fn run(store_url: &str) -> Result<()> {
    let store = DgraphClient::new(store_url)
        .with_context(|| format!("could not connect to store at {store_url}"))?;

    let predicates = fetch_predicates(&store)?;
    info!(count = predicates.len(), "loaded predicates");

    let types = fetch_types(&store)?;
    info!(count = types.len(), "loaded types");

    for typename in &types {
        print_typedef(&store, typename, &predicates)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
struct Predicate {
    predicate: String,
    #[serde(rename = "type")]
    value_type: String,
    #[serde(default)]
    list: bool,
}

impl Predicate {
    fn typedef(&self) -> String {
        if self.list {
            format!("[{}]", self.value_type)
        } else {
            self.value_type.clone()
        }
    }
}

fn fetch_predicates(store: &DgraphClient) -> Result<BTreeMap<String, Predicate>> {
    let data = store.query("schema{}").context("could not fetch schema")?;

    #[derive(Deserialize)]
    struct SchemaResult {
        #[serde(default)]
        schema: Vec<Predicate>,
    }
    let parsed: SchemaResult =
        serde_json::from_value(data).context("could not parse schema")?;

    Ok(parsed
        .schema
        .into_iter()
        .filter(|p| !p.predicate.starts_with("dgraph."))
        .map(|p| (p.predicate.clone(), p))
        .collect())
}

fn fetch_types(store: &DgraphClient) -> Result<Vec<String>> {
    let data = store
        .query("{ types(func: has(dgraph.type)) @groupby(dgraph.type) {} }")
        .context("could not fetch types")?;

    #[derive(Deserialize)]
    struct Group {
        #[serde(rename = "dgraph.type")]
        typename: String,
    }
    #[derive(Deserialize)]
    struct Groups {
        #[serde(rename = "@groupby", default)]
        groupby: Vec<Group>,
    }
    #[derive(Deserialize)]
    struct TypesResult {
        #[serde(default)]
        types: Vec<Groups>,
    }
    let parsed: TypesResult =
        serde_json::from_value(data).context("could not parse types")?;

    let mut names: Vec<String> = parsed
        .types
        .into_iter()
        .flat_map(|t| t.groupby)
        .map(|g| g.typename)
        .collect();
    names.sort();
    Ok(names)
}

fn print_typedef(
    store: &DgraphClient,
    typename: &str,
    predicates: &BTreeMap<String, Predicate>,
) -> Result<()> {
    let selections: Vec<String> = predicates
        .values()
        .map(|p| {
            if p.value_type == "uid" {
                // uid predicates only appear in results when a child
                // selection is requested.
                format!("{}{{uid}}", p.predicate)
            } else {
                p.predicate.clone()
            }
        })
        .collect();
    let query = format!(
        "{{ values(func: type({typename})) {{ {} }} }}",
        selections.join("\n")
    );
    let data = store
        .query(&query)
        .with_context(|| format!("could not fetch values of type {typename}"))?;

    #[derive(Deserialize)]
    struct ValuesResult {
        #[serde(default)]
        values: Vec<serde_json::Map<String, Value>>,
    }
    let parsed: ValuesResult =
        serde_json::from_value(data).context("could not parse values")?;

    let mut fields = BTreeSet::new();
    for value in &parsed.values {
        for field in value.keys() {
            fields.insert(field.clone());
        }
    }

    println!("type {typename} {{");
    for field in &fields {
        let def = predicates
            .get(field)
            .map(Predicate::typedef)
            .unwrap_or_default();
        println!("\t{field}: {def}");
    }
    println!("}}\n");
    Ok(())
}
