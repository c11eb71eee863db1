//! Run-scoped duplicate-page suppression keyed by content hash.

use rustc_hash::FxHashSet;

/// Tracks which normalized-page hashes have been seen within one ingestion
/// run.
///
/// Suppresses only exact duplicates, and only inside a single run; a
/// duplicate page contributes zero chunks and is not counted as processed.
/// Cross-run duplicate suppression is handled by deterministic document ids
/// at indexing time instead.
#[derive(Debug, Default)]
pub struct DedupTracker {
    seen: FxHashSet<[u8; 32]>,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `hash` and returns `true` if it was new; `false` means the
    /// page should be skipped entirely.
    pub fn insert(&mut self, hash: [u8; 32]) -> bool {
        self.seen.insert(hash)
    }

    /// Number of distinct pages recorded so far.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    fn hash(text: &str) -> [u8; 32] {
        Sha256::digest(text.as_bytes()).into()
    }

    #[test]
    fn first_insert_is_new_second_is_not() {
        let mut tracker = DedupTracker::new();
        assert!(tracker.insert(hash("same page")));
        assert!(!tracker.insert(hash("same page")));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn distinct_content_is_not_suppressed() {
        let mut tracker = DedupTracker::new();
        assert!(tracker.insert(hash("page one")));
        assert!(tracker.insert(hash("page two")));
        assert_eq!(tracker.len(), 2);
    }
}
