//! Sitemap discovery: resolves a seed URL into a bounded, deduplicated list
//! of same-site page URLs via robots.txt and nested sitemap traversal.
//!
//! Discovery is entirely fail-soft: a missing robots.txt, an unreachable
//! sitemap, or malformed XML never fails the caller. Finding nothing is a
//! normal outcome ([`SitemapDiscoverer::discover`] returns `None`) that
//! tells the acquisition layer to fall back to single-page or
//! recursive-crawl acquisition.

use std::collections::VecDeque;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use rustc_hash::FxHashSet;
use tracing::{debug, warn};
use url::Url;

/// Hard cap on sitemap documents fetched during one discovery, bounding
/// cost and terminating cycles (for example a sitemap index referencing
/// itself).
const MAX_SITEMAP_DOCS: usize = 16;

/// Well-known sitemap locations probed in addition to robots.txt
/// directives.
const WELL_KNOWN_SITEMAPS: [&str; 3] = ["sitemap.xml", "sitemap_index.xml", "sitemap-index.xml"];

static LOC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<loc>\s*([^<]+?)\s*</loc>").unwrap());

/// Configuration for sitemap discovery.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Maximum page URLs returned; discovery truncates beyond this.
    pub max_urls: usize,
    /// Per-fetch timeout for robots.txt and sitemap documents.
    pub fetch_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_urls: 50,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// Breadth-first sitemap traverser.
#[derive(Debug, Clone)]
pub struct SitemapDiscoverer {
    client: Client,
    config: DiscoveryConfig,
}

impl SitemapDiscoverer {
    pub fn new(client: Client, config: DiscoveryConfig) -> Self {
        Self { client, config }
    }

    /// Discovers page URLs for the site containing `seed`.
    ///
    /// Returns `None` when zero leaf URLs were found after traversal; this
    /// is not an error.
    pub async fn discover(&self, seed: &Url) -> Option<Vec<Url>> {
        let root = site_root(seed)?;

        let mut queue: VecDeque<Url> = VecDeque::new();
        for path in WELL_KNOWN_SITEMAPS {
            if let Ok(candidate) = root.join(path) {
                queue.push_back(candidate);
            }
        }
        for directive in self.robots_sitemaps(&root).await {
            queue.push_back(directive);
        }

        let mut visited: FxHashSet<String> = FxHashSet::default();
        let mut leaves: Vec<Url> = Vec::new();
        let mut seen_leaves: FxHashSet<String> = FxHashSet::default();
        let mut fetched = 0usize;

        while let Some(candidate) = queue.pop_front() {
            if fetched >= MAX_SITEMAP_DOCS {
                debug!(cap = MAX_SITEMAP_DOCS, "sitemap document cap reached");
                break;
            }
            if !visited.insert(candidate.as_str().to_string()) {
                continue;
            }
            fetched += 1;

            let Some(body) = self.fetch_document(&candidate).await else {
                continue;
            };

            let locations = parse_locations(&body);
            if locations.is_empty() {
                continue;
            }

            if is_sitemap_index(&locations) {
                for loc in &locations {
                    if is_xml_location(loc) {
                        if let Some(resolved) = resolve(&candidate, loc) {
                            queue.push_back(resolved);
                        }
                    }
                }
                continue;
            }

            for loc in &locations {
                if is_xml_location(loc) {
                    continue;
                }
                let Some(resolved) = resolve(&candidate, loc) else {
                    continue;
                };
                if seen_leaves.insert(resolved.as_str().to_string()) {
                    leaves.push(resolved);
                }
            }
        }

        leaves.truncate(self.config.max_urls);
        if leaves.is_empty() {
            None
        } else {
            debug!(urls = leaves.len(), sitemaps = fetched, "sitemap discovery complete");
            Some(leaves)
        }
    }

    /// Parses `Sitemap:` directives (case-insensitive) out of robots.txt.
    async fn robots_sitemaps(&self, root: &Url) -> Vec<Url> {
        let Ok(robots_url) = root.join("robots.txt") else {
            return Vec::new();
        };
        let Some(body) = self.fetch_document(&robots_url).await else {
            return Vec::new();
        };

        body.lines()
            .filter_map(|line| {
                let (key, value) = line.split_once(':')?;
                if !key.trim().eq_ignore_ascii_case("sitemap") {
                    return None;
                }
                resolve(root, value.trim())
            })
            .collect()
    }

    /// Fetches one robots/sitemap document, treating any failure (timeout,
    /// non-2xx status, or a content type that is neither text nor XML) as
    /// an absent document.
    async fn fetch_document(&self, url: &Url) -> Option<String> {
        let response = match self
            .client
            .get(url.clone())
            .timeout(self.config.fetch_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                debug!(%url, error = %err, "sitemap fetch failed, skipping");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(%url, status = %response.status(), "sitemap fetch non-2xx, skipping");
            return None;
        }
        if !is_texty_content_type(&response) {
            debug!(%url, "sitemap fetch returned non-text content, skipping");
            return None;
        }

        match response.text().await {
            Ok(body) => Some(body),
            Err(err) => {
                warn!(%url, error = %err, "sitemap body read failed, skipping");
                None
            }
        }
    }
}

/// Scheme + host with the path reset to `/`; `None` for URLs that cannot be
/// a site base (e.g. `mailto:`).
fn site_root(url: &Url) -> Option<Url> {
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let mut root = url.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    Some(root)
}

fn parse_locations(body: &str) -> Vec<String> {
    LOC_RE
        .captures_iter(body)
        .map(|caps| caps[1].trim().to_string())
        .collect()
}

/// Heuristic: a document whose `<loc>` entries are mostly (≥ 50 %) `.xml`
/// references is a sitemap index, not a page list.
fn is_sitemap_index(locations: &[String]) -> bool {
    let xml = locations.iter().filter(|loc| is_xml_location(loc)).count();
    xml * 2 >= locations.len()
}

fn is_xml_location(loc: &str) -> bool {
    loc.to_ascii_lowercase().ends_with(".xml")
}

fn resolve(base: &Url, loc: &str) -> Option<Url> {
    Url::parse(loc).or_else(|_| base.join(loc)).ok()
}

fn is_texty_content_type(response: &reqwest::Response) -> bool {
    match response.headers().get(reqwest::header::CONTENT_TYPE) {
        None => true,
        Some(value) => {
            let value = value.to_str().unwrap_or("");
            value.contains("text") || value.contains("xml")
        }
    }
}
