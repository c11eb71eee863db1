//! Content extraction seam: turns URLs into markdown via an external
//! extraction service.
//!
//! The [`ContentExtractor`] trait is the boundary the acquisition
//! strategies talk to; [`HttpExtractor`] is the production implementation
//! against a scrape/crawl HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// One extracted page: markdown content plus the URL it came from.
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    pub source: Url,
    pub markdown: String,
}

/// Bounds applied to a recursive crawl.
#[derive(Debug, Clone, Copy)]
pub struct CrawlLimits {
    pub max_pages: usize,
    pub max_depth: usize,
}

impl Default for CrawlLimits {
    fn default() -> Self {
        Self {
            max_pages: 100,
            max_depth: 3,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("extraction service rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("extraction timed out for {url}")]
    Timeout { url: String },

    #[error("extraction transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("extraction protocol violation: {0}")]
    Protocol(String),
}

/// Boundary to the extraction service.
///
/// Implementations distinguish "the page has no content" (`Ok(None)` /
/// empty vec) from "the service failed" (`Err`); the acquisition layer
/// treats the two differently.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Extracts a single page as markdown. `guidance` is an optional hint
    /// passed through to the service (for example a content-selection
    /// prompt). Returns `Ok(None)` when the page yields no content.
    async fn extract_single(
        &self,
        url: &Url,
        guidance: Option<&str>,
    ) -> Result<Option<ExtractedPage>, ExtractError>;

    /// Recursively crawls from `seed`, returning every page extracted
    /// within the limits. An empty vec means the crawl succeeded but
    /// found nothing.
    async fn crawl(&self, seed: &Url, limits: CrawlLimits) -> Result<Vec<ExtractedPage>, ExtractError>;
}

// ── HTTP implementation ─────────────────────────────────────────────────

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<&'a str>,
}

#[derive(Serialize)]
struct CrawlRequest<'a> {
    url: &'a str,
    limit: usize,
    #[serde(rename = "maxDepth")]
    max_depth: usize,
    #[serde(rename = "scrapeOptions")]
    scrape_options: ScrapeOptions<'a>,
}

#[derive(Serialize)]
struct ScrapeOptions<'a> {
    formats: &'a [&'a str],
}

#[derive(Deserialize)]
struct ScrapeResponse {
    data: Option<PageData>,
}

#[derive(Deserialize)]
struct CrawlStarted {
    id: String,
}

#[derive(Deserialize)]
struct CrawlStatus {
    status: String,
    #[serde(default)]
    data: Vec<PageData>,
}

#[derive(Deserialize)]
struct PageData {
    #[serde(default)]
    markdown: String,
    #[serde(default)]
    metadata: PageMetadata,
}

#[derive(Deserialize, Default)]
struct PageMetadata {
    #[serde(rename = "sourceURL")]
    source_url: Option<String>,
}

/// Extraction client against a scrape/crawl HTTP service.
///
/// Single-page extraction is one POST; recursive crawls start an
/// asynchronous job and poll it until completion or [`HttpExtractor`]'s
/// crawl deadline elapses.
#[derive(Debug, Clone)]
pub struct HttpExtractor {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    poll_interval: Duration,
    crawl_deadline: Duration,
}

impl HttpExtractor {
    pub fn new(client: Client, base_url: Url, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url,
            api_key,
            poll_interval: Duration::from_secs(2),
            crawl_deadline: Duration::from_secs(600),
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_crawl_deadline(mut self, deadline: Duration) -> Self {
        self.crawl_deadline = deadline;
        self
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ExtractError> {
        self.base_url
            .join(path)
            .map_err(|err| ExtractError::Protocol(format!("bad endpoint {path}: {err}")))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ExtractError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ExtractError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ContentExtractor for HttpExtractor {
    async fn extract_single(
        &self,
        url: &Url,
        guidance: Option<&str>,
    ) -> Result<Option<ExtractedPage>, ExtractError> {
        let endpoint = self.endpoint("v1/scrape")?;
        let body = ScrapeRequest {
            url: url.as_str(),
            formats: &["markdown"],
            prompt: guidance,
        };

        let response = self
            .authorize(self.client.post(endpoint))
            .json(&body)
            .send()
            .await?;
        let parsed: ScrapeResponse = Self::check(response).await?.json().await?;

        let Some(data) = parsed.data else {
            return Ok(None);
        };
        if data.markdown.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(ExtractedPage {
            source: url.clone(),
            markdown: data.markdown,
        }))
    }

    async fn crawl(&self, seed: &Url, limits: CrawlLimits) -> Result<Vec<ExtractedPage>, ExtractError> {
        let endpoint = self.endpoint("v1/crawl")?;
        let body = CrawlRequest {
            url: seed.as_str(),
            limit: limits.max_pages,
            max_depth: limits.max_depth,
            scrape_options: ScrapeOptions {
                formats: &["markdown"],
            },
        };

        let response = self
            .authorize(self.client.post(endpoint))
            .json(&body)
            .send()
            .await?;
        let started: CrawlStarted = Self::check(response).await?.json().await?;
        debug!(job = %started.id, seed = %seed, "crawl started");

        let status_endpoint = self.endpoint(&format!("v1/crawl/{}", started.id))?;
        let deadline = tokio::time::Instant::now() + self.crawl_deadline;

        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(ExtractError::Timeout {
                    url: seed.as_str().to_string(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .authorize(self.client.get(status_endpoint.clone()))
                .send()
                .await?;
            let status: CrawlStatus = Self::check(response).await?.json().await?;

            match status.status.as_str() {
                "completed" => {
                    let pages = status
                        .data
                        .into_iter()
                        .filter(|page| !page.markdown.trim().is_empty())
                        .map(|page| {
                            let source = page
                                .metadata
                                .source_url
                                .as_deref()
                                .and_then(|raw| Url::parse(raw).ok())
                                .unwrap_or_else(|| seed.clone());
                            ExtractedPage {
                                source,
                                markdown: page.markdown,
                            }
                        })
                        .collect();
                    return Ok(pages);
                }
                "failed" | "cancelled" => {
                    return Err(ExtractError::Protocol(format!(
                        "crawl job {} ended with status {}",
                        started.id, status.status
                    )));
                }
                other => {
                    debug!(job = %started.id, status = other, "crawl in progress");
                }
            }
        }
    }
}
