//! Acquisition strategies: the ordered fallback chain that turns one
//! ingestion request into a set of raw pages.
//!
//! Each strategy reports a tri-state [`Acquisition`] so the chain can
//! distinguish "found pages" from "found nothing, try the next strategy"
//! from "failed, try the next strategy". Exactly one strategy supplies
//! the page set for a run; pages from two strategies are never merged.

mod crawl;
mod guided;
mod local;

pub use crawl::RecursiveCrawlStrategy;
pub use guided::GuidedExtractionStrategy;
pub use local::LocalCacheStrategy;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use url::Url;

use crate::types::{IngestError, Page};

/// Outcome of one acquisition attempt.
#[derive(Debug)]
pub enum Acquisition {
    /// At least one page with content.
    Pages(Vec<Page>),
    /// The strategy ran cleanly but produced no usable content.
    Empty,
    /// The strategy failed; the chain moves on.
    Failed(String),
}

/// One way of obtaining pages for an ingestion request.
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn acquire(&self, url: &Url, app_name: &str) -> Acquisition;
}

/// Runs strategies in priority order until one yields pages.
pub struct Acquirer {
    strategies: Vec<Box<dyn AcquisitionStrategy>>,
}

impl Acquirer {
    pub fn new(strategies: Vec<Box<dyn AcquisitionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Returns the first non-empty page set, or
    /// [`IngestError::AcquisitionExhausted`] when every strategy came up
    /// empty or failed.
    pub async fn acquire(&self, url: &Url, app_name: &str) -> Result<Vec<Page>, IngestError> {
        for strategy in &self.strategies {
            match strategy.acquire(url, app_name).await {
                Acquisition::Pages(pages) if !pages.is_empty() => {
                    info!(
                        strategy = strategy.name(),
                        pages = pages.len(),
                        %url,
                        "acquisition succeeded"
                    );
                    return Ok(pages);
                }
                Acquisition::Pages(_) | Acquisition::Empty => {
                    debug!(strategy = strategy.name(), %url, "no content, trying next strategy");
                }
                Acquisition::Failed(reason) => {
                    warn!(
                        strategy = strategy.name(),
                        %url,
                        reason,
                        "strategy failed, trying next"
                    );
                }
            }
        }
        Err(IngestError::AcquisitionExhausted { url: url.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Acquisition);

    #[async_trait]
    impl AcquisitionStrategy for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn acquire(&self, _url: &Url, _app_name: &str) -> Acquisition {
            match &self.0 {
                Acquisition::Pages(pages) => Acquisition::Pages(pages.clone()),
                Acquisition::Empty => Acquisition::Empty,
                Acquisition::Failed(reason) => Acquisition::Failed(reason.clone()),
            }
        }
    }

    fn page(url: &str) -> Page {
        Page {
            source: Url::parse(url).unwrap(),
            raw: "# content".into(),
        }
    }

    #[tokio::test]
    async fn falls_through_empty_and_failed_to_first_pages() {
        let acquirer = Acquirer::new(vec![
            Box::new(Fixed(Acquisition::Empty)),
            Box::new(Fixed(Acquisition::Failed("boom".into()))),
            Box::new(Fixed(Acquisition::Pages(vec![page("https://a.com/")]))),
        ]);
        let url = Url::parse("https://a.com/").unwrap();
        let pages = acquirer.acquire(&url, "app").await.unwrap();
        assert_eq!(pages.len(), 1);
    }

    #[tokio::test]
    async fn exhausted_chain_is_an_error() {
        let acquirer = Acquirer::new(vec![
            Box::new(Fixed(Acquisition::Empty)),
            Box::new(Fixed(Acquisition::Failed("boom".into()))),
        ]);
        let url = Url::parse("https://a.com/").unwrap();
        let err = acquirer.acquire(&url, "app").await.unwrap_err();
        assert!(matches!(err, IngestError::AcquisitionExhausted { .. }));
    }

    #[tokio::test]
    async fn empty_page_vec_counts_as_no_content() {
        let acquirer = Acquirer::new(vec![Box::new(Fixed(Acquisition::Pages(vec![])))]);
        let url = Url::parse("https://a.com/").unwrap();
        assert!(acquirer.acquire(&url, "app").await.is_err());
    }
}
