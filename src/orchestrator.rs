//! Per-job ingestion orchestration.
//!
//! Runs one job end-to-end through the phases
//! `Acquiring → Processing → Aggregating → Done`, folding pages through
//! normalize → dedup → chunk and handing the chunk batch to the indexing
//! pipeline. Hard failure only when acquisition produces nothing;
//! per-chunk indexing failures surface as a partial-failure error with
//! exact counts.

use tracing::{debug, info};

use crate::acquire::Acquirer;
use crate::chunk::Chunker;
use crate::dedup::DedupTracker;
use crate::normalize::normalize;
use crate::pipeline::IndexingPipeline;
use crate::types::{IngestError, IngestionJob, IngestionReport, NormalizedPage, Page};

/// Mutable state owned by exactly one job execution. Never shared across
/// jobs.
struct RunContext {
    dedup: DedupTracker,
    pages_processed: usize,
    chunks: Vec<crate::types::Chunk>,
}

impl RunContext {
    fn new() -> Self {
        Self {
            dedup: DedupTracker::new(),
            pages_processed: 0,
            chunks: Vec::new(),
        }
    }

    /// Normalizes, dedups, and chunks one page. Duplicate and empty pages
    /// contribute nothing and are not counted as processed.
    fn absorb_page(&mut self, chunker: &Chunker, page: Page) {
        let text = normalize(&page.raw);
        if text.is_empty() {
            debug!(source = %page.source, "page empty after normalization, skipping");
            return;
        }
        let normalized = NormalizedPage::new(page.source, text);
        if !self.dedup.insert(normalized.content_hash) {
            debug!(source = %normalized.source, "duplicate page content, skipping");
            return;
        }
        self.chunks
            .extend(chunker.split(&normalized.source, &normalized.text));
        self.pages_processed += 1;
    }
}

/// Coordinates acquisition, processing, and indexing for one job.
pub struct IngestionOrchestrator {
    acquirer: Acquirer,
    chunker: Chunker,
    pipeline: IndexingPipeline,
}

impl IngestionOrchestrator {
    pub fn new(acquirer: Acquirer, chunker: Chunker, pipeline: IndexingPipeline) -> Self {
        Self {
            acquirer,
            chunker,
            pipeline,
        }
    }

    pub async fn run(&self, job: &IngestionJob) -> Result<IngestionReport, IngestError> {
        info!(job_id = %job.job_id, url = %job.url, app = %job.app_name, phase = "acquiring", "ingestion started");
        let pages = self.acquirer.acquire(&job.url, &job.app_name).await?;

        info!(job_id = %job.job_id, pages = pages.len(), phase = "processing", "pages acquired");
        let mut context = RunContext::new();
        for page in pages {
            context.absorb_page(&self.chunker, page);
        }

        if context.pages_processed == 0 || context.chunks.is_empty() {
            return Err(IngestError::NoContent {
                url: job.url.clone(),
            });
        }

        info!(
            job_id = %job.job_id,
            chunks = context.chunks.len(),
            pages = context.pages_processed,
            phase = "aggregating",
            "indexing chunk batch"
        );
        let outcome = self
            .pipeline
            .index_chunks(&job.app_name, &context.chunks)
            .await?;

        if outcome.failed > 0 {
            return Err(IngestError::PartialFailure {
                indexed: outcome.processed,
                failed: outcome.failed,
                pages: context.pages_processed,
                url: job.url.clone(),
            });
        }

        let message = format!(
            "indexed {} chunks from {} pages for {}",
            outcome.processed, context.pages_processed, job.url
        );
        info!(job_id = %job.job_id, phase = "done", %message, "ingestion succeeded");
        Ok(IngestionReport {
            chunks_indexed: outcome.processed,
            chunks_failed: 0,
            pages_processed: context.pages_processed,
            message,
        })
    }
}
