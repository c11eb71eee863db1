//! Core data model shared across the ingestion pipeline, plus the top-level
//! error taxonomy.
//!
//! Everything here is plain data: the mutable run-scoped state (dedup set,
//! counters) lives in the orchestrator and is owned by a single job
//! execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;
use uuid::Uuid;

use crate::embed::EmbedError;
use crate::engine::EngineError;
use crate::extract::ExtractError;

// ── Pages and chunks ───────────────────────────────────────────────────

/// A page as produced by an acquisition strategy, before normalization.
///
/// Ephemeral: produced by acquisition, consumed once by normalization.
#[derive(Debug, Clone)]
pub struct Page {
    /// Where the content came from.
    pub source: Url,
    /// Raw markdown/text as returned by the extraction service or cache.
    pub raw: String,
}

impl Page {
    pub fn new(source: Url, raw: impl Into<String>) -> Self {
        Self {
            source,
            raw: raw.into(),
        }
    }
}

/// A page after normalization, carrying the content hash used for
/// within-run duplicate suppression.
#[derive(Debug, Clone)]
pub struct NormalizedPage {
    pub source: Url,
    pub text: String,
    /// SHA-256 of `text`. Equal hashes within one run mean the page is
    /// skipped entirely.
    pub content_hash: [u8; 32],
}

impl NormalizedPage {
    /// Normalizes nothing itself; callers pass already-normalized text.
    pub fn new(source: Url, text: String) -> Self {
        let content_hash = Sha256::digest(text.as_bytes()).into();
        Self {
            source,
            text,
            content_hash,
        }
    }
}

/// One bounded, overlapping segment of a normalized page.
///
/// `sequence` is the zero-based position within the page; chunks of one page
/// are always submitted for embedding/indexing in sequence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub source: Url,
    pub text: String,
    pub sequence: usize,
}

// ── Indexed documents ──────────────────────────────────────────────────

/// Document shape stored in the vector engine's per-application collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedDocument {
    /// Deterministic function of `(source, text)`; see [`document_id`].
    pub id: String,
    pub source: Url,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Computes the deterministic document id for a `(source, text)` pair.
///
/// Re-ingesting identical content produces the same id, so indexing is an
/// upsert rather than a duplicate insert, including across concurrent jobs
/// on the same collection. A NUL separator keeps distinct pairs from
/// colliding through concatenation.
pub fn document_id(source: &Url, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    hex_digest(hasher.finalize().into())
}

/// Lowercase hex rendering of a 32-byte digest.
pub(crate) fn hex_digest(bytes: [u8; 32]) -> String {
    let mut out = String::with_capacity(64);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(out, "{b:02x}");
    }
    out
}

// ── Jobs ───────────────────────────────────────────────────────────────

/// Lifecycle of one ingestion job. Terminal states are `Succeeded` and
/// `Failed`; only the owning worker moves a job past `Queued`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// An inbound ingestion request: which site, into which application's
/// collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub url: Url,
    pub app_name: String,
}

/// One enqueued unit of ingestion work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionJob {
    pub job_id: Uuid,
    pub url: Url,
    pub app_name: String,
    pub enqueued_at: DateTime<Utc>,
}

impl IngestionJob {
    pub fn new(request: IngestRequest) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            url: request.url,
            app_name: request.app_name,
            enqueued_at: Utc::now(),
        }
    }
}

// ── Results ────────────────────────────────────────────────────────────

/// Aggregated outcome of one ingestion run.
///
/// Produced exactly once per job. A run with `chunks_failed > 0` is surfaced
/// as [`IngestError::PartialFailure`] rather than as a report, so a report
/// always describes a clean success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    pub chunks_indexed: usize,
    pub chunks_failed: usize,
    pub pages_processed: usize,
    pub message: String,
}

// ── Error taxonomy ─────────────────────────────────────────────────────

/// Top-level errors for the ingestion pipeline.
///
/// Component-local failures (one sitemap fetch, one chunk embed) are
/// absorbed and counted where they happen; only the conditions below
/// propagate as a job failure.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Missing or invalid startup configuration. Fatal before any job runs.
    #[error("configuration error: {0}")]
    Config(String),

    /// Every acquisition strategy was tried and none produced content.
    #[error("all acquisition strategies exhausted for {url}")]
    AcquisitionExhausted { url: Url },

    /// Acquisition succeeded but yielded zero usable pages.
    #[error("no content acquired from {url}")]
    NoContent { url: Url },

    /// Some chunks indexed and some failed; both counts are reported, never
    /// silently downgraded to success.
    #[error(
        "partial ingestion failure for {url}: {indexed} chunks indexed, {failed} failed across {pages} pages"
    )]
    PartialFailure {
        indexed: usize,
        failed: usize,
        pages: usize,
        url: Url,
    },

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The queue side is gone (shutdown while enqueueing).
    #[error("job queue closed")]
    QueueClosed,
}
