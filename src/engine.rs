//! Vector engine seam: collection provisioning, idempotent document
//! upserts, and nearest-neighbour search.
//!
//! [`HttpVectorEngine`] speaks a Typesense-style HTTP API;
//! [`MemoryVectorIndex`] is an in-process implementation with the same
//! semantics, used by tests and embedded runs.

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::embed::EMBEDDING_DIMENSIONS;
use crate::types::IndexedDocument;

pub const DEFAULT_SEARCH_K: usize = 5;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("collection {0} does not exist")]
    CollectionNotFound(String),

    #[error("vector engine request timed out")]
    Timeout,

    #[error("vector engine error ({status}): {message}")]
    Engine { status: u16, message: String },

    #[error("vector engine transport failure: {0}")]
    Transport(reqwest::Error),

    #[error("vector engine response malformed: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EngineError::Timeout
        } else {
            EngineError::Transport(err)
        }
    }
}

/// One search result.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub source: String,
}

/// Storage boundary for indexed documents.
///
/// `upsert` must be idempotent: writing the same document id twice leaves
/// a single copy. Writing into a collection that was never provisioned
/// surfaces [`EngineError::CollectionNotFound`] so callers can
/// distinguish it from other failures.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Creates the collection if it does not exist. Racing creations are
    /// fine; "already exists" counts as success.
    async fn ensure_collection(&self, name: &str) -> Result<(), EngineError>;

    async fn upsert(&self, collection: &str, document: &IndexedDocument) -> Result<(), EngineError>;

    /// Nearest-neighbour search, optionally restricted to documents from
    /// one source URL.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        source: Option<&str>,
    ) -> Result<Vec<SearchHit>, EngineError>;
}

// ── Typesense-style HTTP engine ─────────────────────────────────────────

const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";

#[derive(Serialize)]
struct StoredDocument<'a> {
    id: &'a str,
    text: &'a str,
    embedding: &'a [f32],
    source: &'a str,
}

#[derive(Deserialize)]
struct MultiSearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    document: SearchHit,
}

/// HTTP client for a Typesense-compatible vector engine.
#[derive(Debug, Clone)]
pub struct HttpVectorEngine {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl HttpVectorEngine {
    pub fn new(client: Client, base_url: Url, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, EngineError> {
        self.base_url
            .join(path)
            .map_err(|err| EngineError::Protocol(format!("bad endpoint {path}: {err}")))
    }

    async fn engine_error(response: reqwest::Response) -> EngineError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        EngineError::Engine { status, message }
    }
}

#[async_trait]
impl VectorIndex for HttpVectorEngine {
    async fn ensure_collection(&self, name: &str) -> Result<(), EngineError> {
        let probe = self.endpoint(&format!("collections/{name}"))?;
        let response = self
            .client
            .get(probe)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }
        if response.status().as_u16() != 404 {
            return Err(Self::engine_error(response).await);
        }

        info!(collection = name, "collection missing, provisioning");
        let schema = json!({
            "name": name,
            "fields": [
                { "name": "id", "type": "string" },
                { "name": "text", "type": "string" },
                { "name": "embedding", "type": "float[]", "num_dim": EMBEDDING_DIMENSIONS },
                { "name": "source", "type": "string", "facet": true },
            ],
        });
        let create = self
            .client
            .post(self.endpoint("collections")?)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&schema)
            .send()
            .await?;

        if create.status().is_success() {
            return Ok(());
        }
        // Another writer may have provisioned it between probe and create.
        let status = create.status().as_u16();
        let message = create.text().await.unwrap_or_default();
        if status == 409 || message.contains("already exists") {
            debug!(collection = name, "collection created concurrently");
            return Ok(());
        }
        Err(EngineError::Engine { status, message })
    }

    async fn upsert(&self, collection: &str, document: &IndexedDocument) -> Result<(), EngineError> {
        let mut endpoint = self.endpoint(&format!("collections/{collection}/documents"))?;
        endpoint.set_query(Some("action=upsert"));

        let body = StoredDocument {
            id: &document.id,
            text: &document.text,
            embedding: &document.embedding,
            source: document.source.as_str(),
        };
        let response = self
            .client
            .post(endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }
        if response.status().as_u16() == 404 {
            return Err(EngineError::CollectionNotFound(collection.to_string()));
        }
        Err(Self::engine_error(response).await)
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        source: Option<&str>,
    ) -> Result<Vec<SearchHit>, EngineError> {
        let rendered: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
        let mut query = json!({
            "collection": collection,
            "q": "*",
            "vector_query": format!("embedding:([{}], k:{k})", rendered.join(",")),
        });
        if let Some(source) = source {
            query["filter_by"] = json!(format!("source:={source}"));
        }

        let response = self
            .client
            .post(self.endpoint("multi_search")?)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&json!({ "searches": [query] }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::engine_error(response).await);
        }
        let parsed: MultiSearchResponse = response.json().await?;
        let result = parsed
            .results
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::Protocol("multi_search returned no result".into()))?;
        Ok(result.hits.into_iter().map(|hit| hit.document).collect())
    }
}

// ── In-memory engine ────────────────────────────────────────────────────

type Collection = FxHashMap<String, IndexedDocument>;

/// In-process [`VectorIndex`] with brute-force cosine search.
#[derive(Debug, Default)]
pub struct MemoryVectorIndex {
    collections: RwLock<FxHashMap<String, Collection>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, Collection::len)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn ensure_collection(&self, name: &str) -> Result<(), EngineError> {
        self.collections.write().entry(name.to_string()).or_default();
        Ok(())
    }

    async fn upsert(&self, collection: &str, document: &IndexedDocument) -> Result<(), EngineError> {
        let mut collections = self.collections.write();
        let Some(entries) = collections.get_mut(collection) else {
            return Err(EngineError::CollectionNotFound(collection.to_string()));
        };
        entries.insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        source: Option<&str>,
    ) -> Result<Vec<SearchHit>, EngineError> {
        let collections = self.collections.read();
        let Some(entries) = collections.get(collection) else {
            return Err(EngineError::CollectionNotFound(collection.to_string()));
        };

        let mut scored: Vec<(f32, SearchHit)> = entries
            .values()
            .filter(|doc| source.is_none_or(|wanted| doc.source.as_str() == wanted))
            .map(|doc| {
                let hit = SearchHit {
                    id: doc.id.clone(),
                    text: doc.text.clone(),
                    source: doc.source.as_str().to_string(),
                };
                (cosine(vector, &doc.embedding), hit)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored.into_iter().map(|(_, hit)| hit).collect())
    }
}
