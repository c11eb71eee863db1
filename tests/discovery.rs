//! Sitemap discovery against a mock HTTP server.

use std::time::Duration;

use httpmock::MockServer;
use sitesmith::discovery::{DiscoveryConfig, SitemapDiscoverer};
use url::Url;

fn discoverer(max_urls: usize) -> SitemapDiscoverer {
    SitemapDiscoverer::new(
        reqwest::Client::new(),
        DiscoveryConfig {
            max_urls,
            fetch_timeout: Duration::from_secs(2),
        },
    )
}

fn seed(server: &MockServer) -> Url {
    Url::parse(&server.url("/docs/start")).unwrap()
}

#[tokio::test]
async fn robots_directive_points_at_sitemap() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/robots.txt");
            then.status(200)
                .header("content-type", "text/plain")
                .body(format!("User-agent: *\nSITEMAP: {}\n", server.url("/deep/map.xml")));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/deep/map.xml");
            then.status(200).header("content-type", "application/xml").body(
                "<urlset>\
                 <url><loc>https://site.test/a</loc></url>\
                 <url><loc>https://site.test/b</loc></url>\
                 </urlset>",
            );
        })
        .await;

    let urls = discoverer(50).discover(&seed(&server)).await.unwrap();
    assert_eq!(urls.len(), 2);
    assert_eq!(urls[0].as_str(), "https://site.test/a");
}

#[tokio::test]
async fn nested_index_is_traversed_and_deduplicated() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/sitemap.xml");
            then.status(200).header("content-type", "application/xml").body(format!(
                "<sitemapindex>\
                 <sitemap><loc>{0}</loc></sitemap>\
                 <sitemap><loc>{1}</loc></sitemap>\
                 </sitemapindex>",
                server.url("/maps/one.xml"),
                server.url("/maps/two.xml"),
            ));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/maps/one.xml");
            then.status(200).header("content-type", "application/xml").body(
                "<urlset>\
                 <url><loc>https://site.test/page</loc></url>\
                 <url><loc>https://site.test/other</loc></url>\
                 </urlset>",
            );
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/maps/two.xml");
            then.status(200).header("content-type", "application/xml").body(
                "<urlset><url><loc>https://site.test/page</loc></url></urlset>",
            );
        })
        .await;

    let urls = discoverer(50).discover(&seed(&server)).await.unwrap();
    // first-seen order, exact-string dedup across sitemap documents
    let rendered: Vec<&str> = urls.iter().map(Url::as_str).collect();
    assert_eq!(rendered, vec!["https://site.test/page", "https://site.test/other"]);
}

#[tokio::test]
async fn self_referencing_index_terminates_with_no_urls() {
    let server = MockServer::start_async().await;
    let self_url = server.url("/sitemap.xml");
    server
        .mock_async(move |when, then| {
            when.method("GET").path("/sitemap.xml");
            then.status(200)
                .header("content-type", "application/xml")
                .body(format!("<sitemapindex><sitemap><loc>{self_url}</loc></sitemap></sitemapindex>"));
        })
        .await;

    // visited set + document cap stop the cycle; zero leaves is None
    assert!(discoverer(50).discover(&seed(&server)).await.is_none());
}

#[tokio::test]
async fn leaf_urls_truncate_to_configured_cap() {
    let server = MockServer::start_async().await;
    let body: String = (0..10)
        .map(|i| format!("<url><loc>https://site.test/p{i}</loc></url>"))
        .collect();
    server
        .mock_async(move |when, then| {
            when.method("GET").path("/sitemap.xml");
            then.status(200)
                .header("content-type", "application/xml")
                .body(format!("<urlset>{body}</urlset>"));
        })
        .await;

    let urls = discoverer(3).discover(&seed(&server)).await.unwrap();
    assert_eq!(urls.len(), 3);
    assert_eq!(urls[0].as_str(), "https://site.test/p0");
}

#[tokio::test]
async fn unreachable_site_is_a_clean_absence() {
    let server = MockServer::start_async().await;
    // no mocks: every fetch 404s
    assert!(discoverer(50).discover(&seed(&server)).await.is_none());
}
