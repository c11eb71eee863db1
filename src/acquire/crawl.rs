//! Whole-site recursive crawl, the last acquisition fallback.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use url::Url;

use super::{Acquisition, AcquisitionStrategy};
use crate::extract::{ContentExtractor, CrawlLimits};
use crate::types::Page;

/// Breadth crawl from the seed with fixed page and depth limits.
pub struct RecursiveCrawlStrategy {
    extractor: Arc<dyn ContentExtractor>,
    limits: CrawlLimits,
}

impl RecursiveCrawlStrategy {
    pub fn new(extractor: Arc<dyn ContentExtractor>, limits: CrawlLimits) -> Self {
        Self { extractor, limits }
    }
}

#[async_trait]
impl AcquisitionStrategy for RecursiveCrawlStrategy {
    fn name(&self) -> &'static str {
        "recursive-crawl"
    }

    async fn acquire(&self, url: &Url, _app_name: &str) -> Acquisition {
        info!(
            seed = %url,
            max_pages = self.limits.max_pages,
            max_depth = self.limits.max_depth,
            "starting recursive crawl"
        );
        match self.extractor.crawl(url, self.limits).await {
            Ok(extracted) if extracted.is_empty() => Acquisition::Empty,
            Ok(extracted) => Acquisition::Pages(
                extracted
                    .into_iter()
                    .map(|page| Page::new(page.source, page.markdown))
                    .collect(),
            ),
            Err(err) => Acquisition::Failed(err.to_string()),
        }
    }
}
