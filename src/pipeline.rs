//! Embedding and indexing pipeline: chunks in, `{processed, failed}`
//! counts out.
//!
//! Per-chunk failures are absorbed and counted rather than propagated, so
//! one bad embedding never aborts the rest of a page. The caller decides
//! pass/partial-fail semantics from the counts.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::embed::EmbeddingProvider;
use crate::engine::{EngineError, SearchHit, VectorIndex, DEFAULT_SEARCH_K};
use crate::types::{document_id, Chunk, IndexedDocument, IngestError};

/// Aggregate result of indexing one batch of chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexOutcome {
    pub processed: usize,
    pub failed: usize,
}

impl IndexOutcome {
    pub fn merge(&mut self, other: IndexOutcome) {
        self.processed += other.processed;
        self.failed += other.failed;
    }
}

/// Embeds chunks and upserts them into the per-application collection.
pub struct IndexingPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl IndexingPipeline {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Indexes `chunks` into `collection`, provisioning the collection
    /// first.
    ///
    /// Document ids are a deterministic function of (source, text), so
    /// re-indexing identical content upserts instead of duplicating.
    /// Returns `Err` only when the collection cannot be provisioned at
    /// all; every per-chunk failure is counted in the outcome instead.
    pub async fn index_chunks(
        &self,
        collection: &str,
        chunks: &[Chunk],
    ) -> Result<IndexOutcome, EngineError> {
        self.index.ensure_collection(collection).await?;

        let mut outcome = IndexOutcome::default();
        for chunk in chunks {
            match self.index_one(collection, chunk).await {
                Ok(()) => outcome.processed += 1,
                Err(err) => {
                    warn!(
                        collection,
                        source = %chunk.source,
                        sequence = chunk.sequence,
                        error = %err,
                        "chunk indexing failed"
                    );
                    outcome.failed += 1;
                }
            }
        }
        debug!(
            collection,
            processed = outcome.processed,
            failed = outcome.failed,
            "chunk batch indexed"
        );
        Ok(outcome)
    }

    async fn index_one(&self, collection: &str, chunk: &Chunk) -> Result<(), IngestError> {
        let embedding = self.embedder.embed(&chunk.text).await?;
        let document = IndexedDocument {
            id: document_id(&chunk.source, &chunk.text),
            source: chunk.source.clone(),
            text: chunk.text.clone(),
            embedding,
        };

        match self.index.upsert(collection, &document).await {
            Ok(()) => Ok(()),
            // The collection can disappear between provisioning and the
            // write (engine restart, concurrent drop). Re-provision and
            // retry once.
            Err(EngineError::CollectionNotFound(_)) => {
                self.index.ensure_collection(collection).await?;
                self.index.upsert(collection, &document).await?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Embeds `query` and searches the collection, optionally restricted
    /// to one source URL.
    pub async fn search(
        &self,
        collection: &str,
        query: &str,
        source: Option<&str>,
    ) -> Result<Vec<SearchHit>, EngineError> {
        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|err| EngineError::Protocol(format!("query embedding failed: {err}")))?;
        self.index
            .search(collection, &vector, DEFAULT_SEARCH_K, source)
            .await
    }
}
