//! Dgraph HTTP client.
//!
//! Speaks the store's HTTP API: `/alter` for schema, `/query` for DQL reads,
//! `/mutate?commitNow=true` for mutations. Every mutation commits on its
//! own; there is no multi-request transaction coordination here.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;
use tracing::debug;
use url::Url;

use loadstone_core::{GraphStore, MutationResponse, StoreError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("loadstone/", env!("CARGO_PKG_VERSION"));

/// Blocking client for one Dgraph HTTP endpoint.
pub struct DgraphClient {
    base: Url,
    http: Client,
}

impl DgraphClient {
    /// Connect to the store at `base` (e.g. `http://localhost:8080`).
    pub fn new(base: &str) -> Result<Self, StoreError> {
        let mut base = Url::parse(base).map_err(|e| StoreError::Transport(e.into()))?;
        // Url::join treats a prefix without a trailing slash as a file.
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Transport(e.into()))?;
        Ok(Self { base, http })
    }

    /// Conditional upsert: apply `set_json` only where `cond` holds for the
    /// variables bound in `query`. Used to make re-seeding idempotent.
    pub fn upsert(
        &self,
        query: &str,
        cond: &str,
        set_json: &[u8],
    ) -> Result<MutationResponse, StoreError> {
        let set = raw_document(set_json)?;
        self.do_mutate(&MutateBody {
            query: Some(query),
            cond: Some(cond),
            set: [set],
        })
    }

    fn do_mutate(&self, body: &MutateBody) -> Result<MutationResponse, StoreError> {
        let url = self.endpoint("mutate?commitNow=true")?;
        let payload = serde_json::to_vec(body).map_err(|e| StoreError::Transport(e.into()))?;
        debug!(bytes = payload.len(), "sending mutation");

        let res = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .map_err(|e| StoreError::Transport(e.into()))?;
        let data: MutateData = read_envelope(res)?;

        Ok(MutationResponse {
            committed: data.code == "Success",
            uids: data.uids,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        self.base
            .join(path)
            .map_err(|e| StoreError::Transport(e.into()))
    }
}

impl GraphStore for DgraphClient {
    fn mutate(&self, set_json: &[u8]) -> Result<MutationResponse, StoreError> {
        let set = raw_document(set_json)?;
        self.do_mutate(&MutateBody {
            query: None,
            cond: None,
            set: [set],
        })
    }

    fn query(&self, query: &str) -> Result<Value, StoreError> {
        let url = self.endpoint("query")?;
        let res = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/dql")
            .body(query.to_string())
            .send()
            .map_err(|e| StoreError::Transport(e.into()))?;
        read_envelope(res)
    }

    fn alter(&self, schema: &str) -> Result<(), StoreError> {
        let url = self.endpoint("alter")?;
        let res = self
            .http
            .post(url)
            .body(schema.to_string())
            .send()
            .map_err(|e| StoreError::Transport(e.into()))?;
        let _: Value = read_envelope(res)?;
        Ok(())
    }
}

/// Wire shape of a `/mutate` request. The document arrives pre-serialized
/// from the submitter and is spliced in without a decode/encode round trip.
#[derive(Serialize)]
struct MutateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cond: Option<&'a str>,
    set: [&'a RawValue; 1],
}

#[derive(Deserialize, Debug)]
struct MutateData {
    #[serde(default)]
    code: String,
    #[serde(default)]
    uids: HashMap<String, String>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

fn raw_document(set_json: &[u8]) -> Result<&RawValue, StoreError> {
    serde_json::from_slice(set_json).map_err(|e| StoreError::Transport(e.into()))
}

fn read_envelope<T: DeserializeOwned>(
    res: reqwest::blocking::Response,
) -> Result<T, StoreError> {
    let status = res.status();
    let body = res.bytes().map_err(|e| StoreError::Transport(e.into()))?;
    parse_envelope(status.is_success(), status.as_u16(), &body)
}

/// Dgraph reports failures inside the JSON envelope, usually with HTTP 200;
/// surface those messages, and fall back to the status line when the body
/// isn't an envelope at all.
fn parse_envelope<T: DeserializeOwned>(
    status_ok: bool,
    status: u16,
    body: &[u8],
) -> Result<T, StoreError> {
    match serde_json::from_slice::<Envelope<T>>(body) {
        Ok(envelope) => {
            if !envelope.errors.is_empty() {
                let messages: Vec<String> = envelope
                    .errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect();
                return Err(StoreError::Rejected(messages.join("; ")));
            }
            envelope
                .data
                .ok_or_else(|| StoreError::Rejected(format!("empty response (HTTP {status})")))
        }
        Err(_) if !status_ok => Err(StoreError::Rejected(format!("HTTP {status}"))),
        Err(e) => Err(StoreError::Transport(e.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutate_body_wire_shape() {
        let doc = br#"{"uid":"_:1","name":"bulbasaur"}"#;
        let set = raw_document(doc).unwrap();
        let body = MutateBody {
            query: None,
            cond: None,
            set: [set],
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"set":[{"uid":"_:1","name":"bulbasaur"}]}"#
        );
    }

    #[test]
    fn test_upsert_body_includes_query_and_cond() {
        let doc = br#"{"url":"/api/v2/pokemon/1/"}"#;
        let set = raw_document(doc).unwrap();
        let body = MutateBody {
            query: Some("{ v as var(func: eq(url, \"/api/v2/pokemon/1/\")) }"),
            cond: Some("@if(eq(len(v), 0))"),
            set: [set],
        };
        let encoded: Value = serde_json::from_str(&serde_json::to_string(&body).unwrap()).unwrap();
        assert!(encoded.get("query").is_some());
        assert!(encoded.get("cond").is_some());
        assert!(encoded.get("set").unwrap().is_array());
    }

    #[test]
    fn test_parse_mutate_envelope() {
        let body = br#"{"data":{"code":"Success","message":"Done","uids":{"1":"0x3f"}}}"#;
        let data: MutateData = parse_envelope(true, 200, body).unwrap();
        assert_eq!(data.code, "Success");
        assert_eq!(data.uids.get("1").map(String::as_str), Some("0x3f"));
    }

    #[test]
    fn test_parse_envelope_surfaces_store_errors() {
        let body = br#"{"errors":[{"message":"schema mismatch"},{"message":"bad predicate"}]}"#;
        let err = parse_envelope::<MutateData>(true, 200, body).unwrap_err();
        match err {
            StoreError::Rejected(msg) => {
                assert!(msg.contains("schema mismatch"));
                assert!(msg.contains("bad predicate"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_envelope_non_json_failure_status() {
        let err = parse_envelope::<MutateData>(false, 502, b"Bad Gateway").unwrap_err();
        assert!(matches!(err, StoreError::Rejected(msg) if msg.contains("502")));
    }

    #[test]
    fn test_parse_envelope_empty_data() {
        let err = parse_envelope::<MutateData>(true, 200, b"{}").unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
    }
}
