//! Extraction service client against a mock server.

use std::time::Duration;

use httpmock::MockServer;
use sitesmith::extract::{ContentExtractor, CrawlLimits, HttpExtractor};
use url::Url;

fn extractor(server: &MockServer) -> HttpExtractor {
    HttpExtractor::new(
        reqwest::Client::new(),
        Url::parse(&server.base_url()).unwrap().join("/").unwrap(),
        Some("scrape-key".to_string()),
    )
    .with_poll_interval(Duration::from_millis(5))
    .with_crawl_deadline(Duration::from_secs(5))
}

#[tokio::test]
async fn scrape_returns_markdown_page() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("POST")
                .path("/v1/scrape")
                .header("authorization", "Bearer scrape-key")
                .body_contains("\"formats\":[\"markdown\"]");
            then.status(200)
                .json_body(serde_json::json!({ "data": { "markdown": "# Hello" } }));
        })
        .await;

    let url = Url::parse("https://example.com/page").unwrap();
    let page = extractor(&server)
        .extract_single(&url, Some("only the article body"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(page.markdown, "# Hello");
    assert_eq!(page.source, url);
}

#[tokio::test]
async fn blank_markdown_is_no_content_not_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("POST").path("/v1/scrape");
            then.status(200)
                .json_body(serde_json::json!({ "data": { "markdown": "   \n" } }));
        })
        .await;

    let url = Url::parse("https://example.com/empty").unwrap();
    let page = extractor(&server).extract_single(&url, None).await.unwrap();
    assert!(page.is_none());
}

#[tokio::test]
async fn crawl_polls_until_completed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("POST")
                .path("/v1/crawl")
                .body_contains("\"limit\":100")
                .body_contains("\"maxDepth\":3");
            then.status(200).json_body(serde_json::json!({ "id": "crawl-1" }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/v1/crawl/crawl-1");
            then.status(200).json_body(serde_json::json!({
                "status": "completed",
                "data": [
                    {
                        "markdown": "# Page A",
                        "metadata": { "sourceURL": "https://example.com/a" }
                    },
                    { "markdown": "   ", "metadata": {} }
                ]
            }));
        })
        .await;

    let seed = Url::parse("https://example.com/").unwrap();
    let pages = extractor(&server)
        .crawl(&seed, CrawlLimits::default())
        .await
        .unwrap();
    // blank-markdown entries are dropped
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].source.as_str(), "https://example.com/a");
}

#[tokio::test]
async fn failed_crawl_job_is_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("POST").path("/v1/crawl");
            then.status(200).json_body(serde_json::json!({ "id": "crawl-2" }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/v1/crawl/crawl-2");
            then.status(200)
                .json_body(serde_json::json!({ "status": "failed", "data": [] }));
        })
        .await;

    let seed = Url::parse("https://example.com/").unwrap();
    assert!(extractor(&server).crawl(&seed, CrawlLimits::default()).await.is_err());
}
