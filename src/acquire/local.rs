//! Local snapshot acquisition for non-production runs.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use super::{Acquisition, AcquisitionStrategy};
use crate::types::Page;

/// Reads pre-fetched page snapshots from `{root}/{app_name}/` instead of
/// touching the network.
///
/// Every regular file in the application's snapshot directory becomes one
/// page whose source is a synthetic `cache://` URL, so downstream dedup
/// and document ids stay stable across runs. A missing directory is
/// normal and falls through to the next strategy.
pub struct LocalCacheStrategy {
    snapshot_root: PathBuf,
}

impl LocalCacheStrategy {
    pub fn new(snapshot_root: PathBuf) -> Self {
        Self { snapshot_root }
    }
}

#[async_trait]
impl AcquisitionStrategy for LocalCacheStrategy {
    fn name(&self) -> &'static str {
        "local-cache"
    }

    async fn acquire(&self, _url: &Url, app_name: &str) -> Acquisition {
        let dir = self.snapshot_root.join(app_name);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "no snapshot directory");
                return Acquisition::Empty;
            }
            Err(err) => return Acquisition::Failed(format!("snapshot dir unreadable: {err}")),
        };

        let mut names: Vec<String> = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let is_file = entry
                        .file_type()
                        .await
                        .map(|kind| kind.is_file())
                        .unwrap_or(false);
                    if is_file {
                        names.push(entry.file_name().to_string_lossy().into_owned());
                    }
                }
                Ok(None) => break,
                Err(err) => return Acquisition::Failed(format!("snapshot listing failed: {err}")),
            }
        }
        // Deterministic page order regardless of directory iteration order.
        names.sort();

        let mut pages = Vec::with_capacity(names.len());
        for name in names {
            let path = dir.join(&name);
            let raw = match tokio::fs::read_to_string(&path).await {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "snapshot unreadable, skipping");
                    continue;
                }
            };
            if raw.trim().is_empty() {
                continue;
            }
            let Ok(source) = Url::parse(&format!("cache:///{app_name}/{name}")) else {
                warn!(file = name, "snapshot name does not form a URL, skipping");
                continue;
            };
            pages.push(Page::new(source, raw));
        }

        if pages.is_empty() {
            Acquisition::Empty
        } else {
            Acquisition::Pages(pages)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_directory_is_empty_not_failed() {
        let root = tempfile::tempdir().unwrap();
        let strategy = LocalCacheStrategy::new(root.path().join("nope"));
        let url = Url::parse("https://example.com/").unwrap();
        assert!(matches!(strategy.acquire(&url, "app").await, Acquisition::Empty));
    }

    #[tokio::test]
    async fn reads_snapshots_in_name_order_with_cache_sources() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("docs-app");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("b.md"), "second page").unwrap();
        std::fs::write(dir.join("a.md"), "first page").unwrap();
        std::fs::write(dir.join("empty.md"), "   \n").unwrap();

        let strategy = LocalCacheStrategy::new(root.path().to_path_buf());
        let url = Url::parse("https://example.com/").unwrap();
        let Acquisition::Pages(pages) = strategy.acquire(&url, "docs-app").await else {
            panic!("expected pages");
        };
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].source.as_str(), "cache:///docs-app/a.md");
        assert_eq!(pages[0].raw, "first page");
        assert_eq!(pages[1].source.as_str(), "cache:///docs-app/b.md");
    }
}
