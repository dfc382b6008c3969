// src/seen.rs
// Durable record of listing ids already notified, partitioned per keyword.
// A pair is in the registry iff a notification for it has been attempted
// successfully at least once.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::error::StateError;
use crate::keywords::Keyword;
use crate::state::StateFile;

#[derive(Debug, Clone)]
pub struct SeenRegistry {
    state: Arc<StateFile>,
}

impl SeenRegistry {
    pub fn new(state: Arc<StateFile>) -> Self {
        Self { state }
    }

    pub fn has(&self, keyword: &Keyword, listing_id: &str) -> bool {
        let key = keyword.folded();
        self.state.read(|doc| {
            doc.seen
                .get(&key)
                .is_some_and(|ids| ids.contains_key(listing_id))
        })
    }

    /// Record a notified pair, write-through to the state file.
    ///
    /// Idempotent: recording an already-present pair keeps the original
    /// timestamp and is never an error. Called strictly AFTER the notify
    /// succeeded, so a crash in the window between the send and this write
    /// re-notifies the listing once on the next run — a bounded duplicate,
    /// preferred over silently dropping it.
    pub fn record(
        &self,
        keyword: &Keyword,
        listing_id: &str,
        notified_at: DateTime<Utc>,
    ) -> Result<(), StateError> {
        let key = keyword.folded();
        self.state.update(|doc| {
            doc.seen
                .entry(key)
                .or_default()
                .entry(listing_id.to_string())
                .or_insert(notified_at);
        })
    }

    /// Drop entries whose `notified_at` is older than `horizon` relative to
    /// `now`, and empty keyword partitions with them. Returns how many
    /// entries were removed. A listing whose entry was pruned is treated as
    /// new again if it resurfaces.
    pub fn prune(&self, horizon: Duration, now: DateTime<Utc>) -> Result<usize, StateError> {
        self.state.update(|doc| {
            let mut removed = 0usize;
            for ids in doc.seen.values_mut() {
                let before = ids.len();
                ids.retain(|_, ts| now - *ts <= horizon);
                removed += before - ids.len();
            }
            doc.seen.retain(|_, ids| !ids.is_empty());
            removed
        })
    }

    /// Total number of retained entries, across all keywords.
    pub fn len(&self) -> usize {
        self.state
            .read(|doc| doc.seen.values().map(|ids| ids.len()).sum())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (tempfile::TempDir, SeenRegistry) {
        let tmp = tempfile::tempdir().unwrap();
        let state = Arc::new(StateFile::open(tmp.path().join("state.json")).unwrap());
        (tmp, SeenRegistry::new(state))
    }

    #[test]
    fn record_is_idempotent_and_keeps_first_timestamp() {
        let (_tmp, seen) = registry();
        let kw = Keyword::new("Vintage Camera").unwrap();
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(60);

        seen.record(&kw, "itm-1", t0).unwrap();
        seen.record(&kw, "itm-1", t1).unwrap();

        assert!(seen.has(&kw, "itm-1"));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn lookup_is_case_insensitive_on_keyword() {
        let (_tmp, seen) = registry();
        let kw = Keyword::new("Vintage Camera").unwrap();
        seen.record(&kw, "itm-1", Utc::now()).unwrap();

        let same = Keyword::new("vintage camera").unwrap();
        assert!(seen.has(&same, "itm-1"));
        assert!(!seen.has(&same, "itm-2"));
    }

    #[test]
    fn prune_removes_only_entries_past_horizon() {
        let (_tmp, seen) = registry();
        let kw = Keyword::new("Grafikkarte").unwrap();
        let now = Utc::now();

        seen.record(&kw, "old", now - Duration::days(40)).unwrap();
        seen.record(&kw, "fresh", now - Duration::days(2)).unwrap();

        let removed = seen.prune(Duration::days(30), now).unwrap();
        assert_eq!(removed, 1);
        assert!(!seen.has(&kw, "old"));
        assert!(seen.has(&kw, "fresh"));
    }

    #[test]
    fn prune_drops_emptied_keyword_partitions() {
        let (_tmp, seen) = registry();
        let kw = Keyword::new("Grafikkarte").unwrap();
        let now = Utc::now();
        seen.record(&kw, "old", now - Duration::days(40)).unwrap();

        seen.prune(Duration::days(30), now).unwrap();
        assert!(seen.is_empty());
    }
}
