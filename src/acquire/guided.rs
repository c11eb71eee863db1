//! Guided extraction: sitemap fan-out with per-URL model-guided scraping.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use url::Url;

use super::{Acquisition, AcquisitionStrategy};
use crate::discovery::SitemapDiscoverer;
use crate::extract::ContentExtractor;
use crate::types::Page;

/// Runs sitemap discovery on the seed, then extracts each discovered URL
/// individually with an optional guidance prompt.
///
/// A per-URL extraction failure is logged and skipped; the batch as a
/// whole only fails when nothing was extracted at all. When discovery
/// finds no sitemap the strategy falls back to extracting the single
/// seed URL.
pub struct GuidedExtractionStrategy {
    discoverer: SitemapDiscoverer,
    extractor: Arc<dyn ContentExtractor>,
    guidance: Option<String>,
}

impl GuidedExtractionStrategy {
    pub fn new(
        discoverer: SitemapDiscoverer,
        extractor: Arc<dyn ContentExtractor>,
        guidance: Option<String>,
    ) -> Self {
        Self {
            discoverer,
            extractor,
            guidance,
        }
    }

    async fn extract_batch(&self, urls: &[Url]) -> Vec<Page> {
        let mut pages = Vec::new();
        for url in urls {
            match self
                .extractor
                .extract_single(url, self.guidance.as_deref())
                .await
            {
                Ok(Some(extracted)) => {
                    pages.push(Page::new(extracted.source, extracted.markdown));
                }
                Ok(None) => {
                    debug!(%url, "guided extraction returned no content, skipping");
                }
                Err(err) => {
                    warn!(%url, error = %err, "guided extraction failed, skipping");
                }
            }
        }
        pages
    }
}

#[async_trait]
impl AcquisitionStrategy for GuidedExtractionStrategy {
    fn name(&self) -> &'static str {
        "guided-extraction"
    }

    async fn acquire(&self, url: &Url, _app_name: &str) -> Acquisition {
        let urls = match self.discoverer.discover(url).await {
            Some(urls) => {
                info!(count = urls.len(), seed = %url, "extracting discovered URLs");
                urls
            }
            None => {
                debug!(seed = %url, "no sitemap, extracting seed URL only");
                vec![url.clone()]
            }
        };

        let pages = self.extract_batch(&urls).await;
        if pages.is_empty() {
            Acquisition::Empty
        } else {
            Acquisition::Pages(pages)
        }
    }
}
