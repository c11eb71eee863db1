//! Web-site content ingestion for per-application knowledge bases.
//!
//! ```text
//! IngestRequest ──► queue::JobQueue ──► orchestrator::IngestionOrchestrator
//!                                                │
//!             acquire::{local cache → guided extraction → recursive crawl}
//!                       (guided runs discovery::SitemapDiscoverer)
//!                                                │
//!       normalize ──► dedup ──► chunk ──► pipeline::IndexingPipeline
//!                                                │
//!                         embed::EmbeddingProvider + engine::VectorIndex
//! ```
//!
//! Pages are acquired by the first strategy that yields content,
//! normalized and deduplicated per run, chunked with fixed overlap, and
//! upserted under deterministic ids so re-ingestion never duplicates.

pub mod acquire;
pub mod chunk;
pub mod config;
pub mod dedup;
pub mod discovery;
pub mod embed;
pub mod engine;
pub mod extract;
pub mod normalize;
pub mod orchestrator;
pub mod pipeline;
pub mod queue;
pub mod telemetry;
pub mod types;

pub use acquire::{Acquirer, AcquisitionStrategy};
pub use chunk::{Chunker, ChunkerConfig};
pub use config::IngestionConfig;
pub use orchestrator::IngestionOrchestrator;
pub use pipeline::{IndexOutcome, IndexingPipeline};
pub use queue::{EnqueueAck, JobQueue, JobRecord};
pub use types::{IngestError, IngestRequest, IngestionJob, IngestionReport, JobStatus};

use std::sync::Arc;

use crate::acquire::{GuidedExtractionStrategy, LocalCacheStrategy, RecursiveCrawlStrategy};
use crate::discovery::{DiscoveryConfig, SitemapDiscoverer};
use crate::embed::OpenAiEmbedder;
use crate::engine::HttpVectorEngine;
use crate::extract::{ContentExtractor, HttpExtractor};

/// Wires the full service from configuration: HTTP clients, the
/// strategy chain, the indexing pipeline, and the worker pool.
pub fn start_service(config: IngestionConfig) -> Result<JobQueue, IngestError> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("sitesmith/", env!("CARGO_PKG_VERSION")))
        .timeout(config.request_timeout)
        .build()?;

    let extractor: Arc<dyn ContentExtractor> = Arc::new(HttpExtractor::new(
        client.clone(),
        config.extractor_endpoint.clone(),
        config.extractor_api_key.clone(),
    ));

    let mut strategies: Vec<Box<dyn AcquisitionStrategy>> = Vec::new();
    if let Some(snapshot_dir) = &config.snapshot_dir {
        strategies.push(Box::new(LocalCacheStrategy::new(snapshot_dir.clone())));
    }
    if config.guided_extraction {
        let discoverer = SitemapDiscoverer::new(
            client.clone(),
            DiscoveryConfig {
                max_urls: config.max_sitemap_urls,
                fetch_timeout: config.sitemap_fetch_timeout,
            },
        );
        strategies.push(Box::new(GuidedExtractionStrategy::new(
            discoverer,
            Arc::clone(&extractor),
            config.guidance_prompt.clone(),
        )));
    }
    strategies.push(Box::new(RecursiveCrawlStrategy::new(
        Arc::clone(&extractor),
        config.crawl_limits,
    )));

    let embedder = Arc::new(OpenAiEmbedder::new(
        client.clone(),
        config.embedding_endpoint.clone(),
        config.embedding_api_key.clone(),
        config.embedding_model.clone(),
    ));
    let engine = Arc::new(HttpVectorEngine::new(
        client,
        config.engine_endpoint.clone(),
        config.engine_api_key.clone(),
    ));

    let orchestrator = IngestionOrchestrator::new(
        Acquirer::new(strategies),
        Chunker::default(),
        IndexingPipeline::new(embedder, engine),
    );
    Ok(JobQueue::start(
        Arc::new(orchestrator),
        config.workers,
        config.job_retention,
    ))
}
