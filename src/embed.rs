//! Embedding generation seam.
//!
//! [`EmbeddingProvider`] abstracts over the embedding backend;
//! [`OpenAiEmbedder`] talks to an OpenAI-compatible `/embeddings`
//! endpoint, while [`MockEmbeddingProvider`] produces deterministic
//! vectors for tests and offline runs.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

/// Dimensionality every provider in this pipeline must produce; the
/// vector engine's collection schema is fixed to it.
pub const EMBEDDING_DIMENSIONS: usize = 1536;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("embedding request timed out")]
    Timeout,

    #[error("embedding transport failure: {0}")]
    Transport(reqwest::Error),

    #[error("embedding response malformed: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for EmbedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EmbedError::Timeout
        } else {
            EmbedError::Transport(err)
        }
    }
}

/// Produces one embedding vector per input text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Vector length this provider emits. Must equal
    /// [`EMBEDDING_DIMENSIONS`] for the pipeline's collections.
    fn dimensions(&self) -> usize {
        EMBEDDING_DIMENSIONS
    }
}

// ── OpenAI-compatible HTTP provider ─────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible embeddings endpoint
/// (`POST {base}/embeddings`).
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    base_url: Url,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(client: Client, base_url: Url, api_key: String, model: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let endpoint = self
            .base_url
            .join("embeddings")
            .map_err(|err| EmbedError::Protocol(format!("bad embeddings endpoint: {err}")))?;

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbedError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: EmbeddingResponse = response.json().await?;
        let entry = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Protocol("response carried no embedding".into()))?;

        if entry.embedding.len() != EMBEDDING_DIMENSIONS {
            return Err(EmbedError::Protocol(format!(
                "expected {EMBEDDING_DIMENSIONS} dimensions, got {}",
                entry.embedding.len()
            )));
        }
        Ok(entry.embedding)
    }
}

// ── Deterministic mock provider ─────────────────────────────────────────

/// Deterministic embedding provider for tests and offline pipelines.
///
/// Vectors are derived from a SHA-256 digest of the input, so equal texts
/// always embed identically and similar-but-different texts do not.
#[derive(Debug, Clone, Default)]
pub struct MockEmbeddingProvider;

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let digest: [u8; 32] = Sha256::digest(text.as_bytes()).into();
        let mut vector = Vec::with_capacity(EMBEDDING_DIMENSIONS);
        for i in 0..EMBEDDING_DIMENSIONS {
            let byte = digest[i % digest.len()];
            let salt = (i / digest.len()) as u8;
            vector.push(f32::from(byte.wrapping_add(salt)) / 255.0 - 0.5);
        }
        Ok(vector)
    }
}
