//! Environment-driven configuration.
//!
//! Missing required values are configuration errors and fatal at
//! startup, never per-request. A `.env` file is honored when present.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::extract::CrawlLimits;
use crate::types::IngestError;

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// OpenAI-compatible embeddings endpoint base.
    pub embedding_endpoint: Url,
    pub embedding_api_key: String,
    pub embedding_model: String,

    /// Typesense-compatible vector engine base.
    pub engine_endpoint: Url,
    pub engine_api_key: String,

    /// Scrape/crawl extraction service base.
    pub extractor_endpoint: Url,
    pub extractor_api_key: Option<String>,

    /// Enables the guided-extraction fallback (sitemap fan-out with
    /// per-URL extraction).
    pub guided_extraction: bool,
    pub guidance_prompt: Option<String>,

    /// Root of local page snapshots; set only in non-production runs.
    pub snapshot_dir: Option<PathBuf>,

    pub max_sitemap_urls: usize,
    pub sitemap_fetch_timeout: Duration,
    pub crawl_limits: CrawlLimits,

    /// Per-request timeout applied to every outbound HTTP call, so one
    /// unresponsive upstream cannot stall a worker indefinitely.
    pub request_timeout: Duration,

    pub workers: usize,
    pub job_retention: usize,
}

fn required(key: &str) -> Result<String, IngestError> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| IngestError::Config(format!("{key} is required")))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn required_url(key: &str) -> Result<Url, IngestError> {
    let raw = required(key)?;
    let mut url = Url::parse(&raw)
        .map_err(|err| IngestError::Config(format!("{key} is not a valid URL: {err}")))?;
    // `Url::join` treats a base without a trailing slash as a file and
    // drops its last path segment, so `https://host/v1` would post to
    // `/embeddings` instead of `/v1/embeddings`.
    if !url.path().ends_with('/') {
        url.set_path(&format!("{}/", url.path()));
    }
    Ok(url)
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, IngestError> {
    match optional(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| IngestError::Config(format!("{key} has an invalid value: {raw}"))),
    }
}

impl IngestionConfig {
    /// Loads configuration from the environment, reading `.env` first.
    pub fn from_env() -> Result<Self, IngestError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            embedding_endpoint: required_url("EMBEDDING_BASE_URL")?,
            embedding_api_key: required("EMBEDDING_API_KEY")?,
            embedding_model: optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            engine_endpoint: required_url("VECTOR_ENGINE_URL")?,
            engine_api_key: required("VECTOR_ENGINE_API_KEY")?,
            extractor_endpoint: required_url("EXTRACTOR_BASE_URL")?,
            extractor_api_key: optional("EXTRACTOR_API_KEY"),
            guided_extraction: parsed_or("GUIDED_EXTRACTION", false)?,
            guidance_prompt: optional("EXTRACTION_GUIDANCE"),
            snapshot_dir: optional("SNAPSHOT_DIR").map(PathBuf::from),
            max_sitemap_urls: parsed_or("MAX_SITEMAP_URLS", 50)?,
            sitemap_fetch_timeout: Duration::from_secs(parsed_or(
                "SITEMAP_FETCH_TIMEOUT_SECS",
                10,
            )?),
            crawl_limits: CrawlLimits {
                max_pages: parsed_or("CRAWL_MAX_PAGES", 100)?,
                max_depth: parsed_or("CRAWL_MAX_DEPTH", 3)?,
            },
            request_timeout: Duration::from_secs(parsed_or("REQUEST_TIMEOUT_SECS", 30)?),
            workers: parsed_or("INGEST_WORKERS", 2)?,
            job_retention: parsed_or("JOB_RETENTION", 100)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; keep them to pure helpers here.

    #[test]
    fn parsed_or_rejects_garbage() {
        unsafe { std::env::set_var("SITESMITH_TEST_BAD_USIZE", "not-a-number") };
        let err = parsed_or::<usize>("SITESMITH_TEST_BAD_USIZE", 3).unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));
        unsafe { std::env::remove_var("SITESMITH_TEST_BAD_USIZE") };
    }

    #[test]
    fn base_urls_gain_a_trailing_slash() {
        unsafe { std::env::set_var("SITESMITH_TEST_BASE_URL", "https://host.example/v1") };
        let url = required_url("SITESMITH_TEST_BASE_URL").unwrap();
        assert_eq!(url.as_str(), "https://host.example/v1/");
        // joining now keeps the /v1 prefix
        assert_eq!(
            url.join("embeddings").unwrap().as_str(),
            "https://host.example/v1/embeddings"
        );
        unsafe { std::env::remove_var("SITESMITH_TEST_BASE_URL") };
    }

    #[test]
    fn blank_values_count_as_missing() {
        unsafe { std::env::set_var("SITESMITH_TEST_BLANK", "   ") };
        assert!(optional("SITESMITH_TEST_BLANK").is_none());
        assert!(required("SITESMITH_TEST_BLANK").is_err());
        unsafe { std::env::remove_var("SITESMITH_TEST_BLANK") };
    }
}
