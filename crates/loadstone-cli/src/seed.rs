//! `loadstone seed` — create url/name stub nodes from a live API.
//!
//! Walks the API's root endpoint (a `kind → list URL` map), pulls each full
//! listing, and upserts one `{url, name, type}` node per entry. Stubs give
//! a later archive load something to link against, and conditional upserts
//! keep re-runs from duplicating nodes.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use loadstone_core::{GraphStore, BASE_SCHEMA};
use loadstone_store::DgraphClient;

#[derive(Args, Debug, Clone)]
pub struct SeedArgs {
    /// Live API base URL whose root endpoint lists the entity kinds.
    #[arg(long, default_value = "https://pokeapi.co/api/v2/")]
    api: String,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 20)]
    timeout_secs: u64,
}

pub fn run(store_url: &str, args: &SeedArgs) -> Result<()> {
    let store = DgraphClient::new(store_url)
        .with_context(|| format!("could not connect to store at {store_url}"))?;
    store.alter(BASE_SCHEMA).context("could not set schema")?;

    let http = Client::builder()
        .user_agent(concat!("loadstone/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()
        .context("could not build HTTP client")?;

    let kinds: BTreeMap<String, String> = get_json(&http, &args.api)?;
    for (kind, list_url) in kinds {
        #[derive(Deserialize)]
        struct Counted {
            count: u64,
        }
        let Counted { count } = get_json(&http, &list_url)?;
        println!("{} {}", kind.green().bold(), count);

        #[derive(Deserialize)]
        struct Page {
            #[serde(default)]
            results: Vec<Stub>,
        }
        let page: Page = get_json(&http, &format!("{list_url}?limit={count}"))?;

        for stub in &page.results {
            upsert_stub(&store, &kind, stub)
                .with_context(|| format!("could not seed {}", stub.url))?;
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct Stub {
    name: String,
    url: String,
}

fn get_json<T: DeserializeOwned>(http: &Client, url: &str) -> Result<T> {
    info!(url, "fetching");
    let res = http
        .get(url)
        .send()
        .with_context(|| format!("could not fetch {url}"))?;
    if !res.status().is_success() {
        bail!("{url} returned status {}", res.status());
    }
    res.json()
        .with_context(|| format!("could not decode payload from {url}"))
}

fn upsert_stub(store: &DgraphClient, kind: &str, stub: &Stub) -> Result<()> {
    #[derive(Serialize)]
    struct Node<'a> {
        url: &'a str,
        name: &'a str,
        #[serde(rename = "dgraph.type")]
        typename: &'a str,
    }
    let set = serde_json::to_vec(&Node {
        url: &stub.url,
        name: &stub.name,
        typename: kind,
    })?;
    let query = format!(
        "{{ v as var(func: eq(url, {})) }}",
        serde_json::to_string(&stub.url)?
    );
    store.upsert(&query, "@if(eq(len(v), 0))", &set)?;
    Ok(())
}
