// src/source.rs
// The boundary to the external marketplace source. The engine never scrapes
// or parses the site itself; it consumes structured listing records through
// the `ListingSource` contract.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::keywords::Keyword;

/// One item as the external source reported it. Immutable once produced.
/// The optional fields mirror what a marketplace result card carries; the
/// notification formatter renders the ones that are present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    pub listing_id: String,
    pub keyword: Keyword,
    pub title: String,
    pub price: String,
    pub url: String,
    pub first_seen_at: DateTime<Utc>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub best_offer: bool,
    #[serde(default)]
    pub shipping: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub seller: Option<String>,
    #[serde(default)]
    pub feedback_count: Option<u32>,
    #[serde(default)]
    pub feedback_percent: Option<f32>,
}

impl ListingRecord {
    pub fn new(
        listing_id: impl Into<String>,
        keyword: Keyword,
        title: impl Into<String>,
        price: impl Into<String>,
        url: impl Into<String>,
        first_seen_at: DateTime<Utc>,
    ) -> Self {
        Self {
            listing_id: listing_id.into(),
            keyword,
            title: title.into(),
            price: price.into(),
            url: url.into(),
            first_seen_at,
            condition: None,
            best_offer: false,
            shipping: None,
            location: None,
            seller: None,
            feedback_count: None,
            feedback_percent: None,
        }
    }
}

/// Contract the engine requires from the marketplace source: the current
/// listings visible for one keyword, or a transient failure.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch(&self, keyword: &Keyword) -> Result<Vec<ListingRecord>, SourceError>;
    fn name(&self) -> &str;
}

/// Source that reads listing records from a JSON file (an array of
/// `ListingRecord`) and serves the ones matching the requested keyword.
///
/// This is the file the external scraper process keeps rewriting; the engine
/// treats the file itself as the external collaborator. Any read or parse
/// problem is a transient `SourceError` for this cycle, not engine state
/// corruption.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ListingSource for JsonFileSource {
    async fn fetch(&self, keyword: &Keyword) -> Result<Vec<ListingRecord>, SourceError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SourceError::Unavailable(format!("read {}: {e}", self.path.display()))
        })?;
        let records: Vec<ListingRecord> = serde_json::from_str(&content).map_err(|e| {
            SourceError::Unavailable(format!("parse {}: {e}", self.path.display()))
        })?;
        let key = keyword.folded();
        Ok(records
            .into_iter()
            .filter(|r| r.keyword.folded() == key)
            .collect())
    }

    fn name(&self) -> &str {
        "json-file"
    }
}

// --- Test helper ---

/// Scripted in-memory source: listings are programmed per keyword, and any
/// keyword can be flipped into a failing state.
#[derive(Default)]
pub struct StaticSource {
    listings: Mutex<HashMap<String, Vec<ListingRecord>>>,
    failing: Mutex<HashSet<String>>,
    fetches: AtomicUsize,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_listings(&self, keyword: &Keyword, records: Vec<ListingRecord>) {
        self.listings
            .lock()
            .unwrap()
            .insert(keyword.folded(), records);
    }

    pub fn fail_keyword(&self, keyword: &Keyword) {
        self.failing.lock().unwrap().insert(keyword.folded());
    }

    pub fn clear_failure(&self, keyword: &Keyword) {
        self.failing.lock().unwrap().remove(&keyword.folded());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ListingSource for StaticSource {
    async fn fetch(&self, keyword: &Keyword) -> Result<Vec<ListingRecord>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&keyword.folded()) {
            return Err(SourceError::Unavailable(format!(
                "scripted failure for '{keyword}'"
            )));
        }
        Ok(self
            .listings
            .lock()
            .unwrap()
            .get(&keyword.folded())
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn json_file_source_filters_by_keyword() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("listings.json");

        let cam = Keyword::new("Vintage Camera").unwrap();
        let gpu = Keyword::new("Grafikkarte").unwrap();
        let now = Utc::now();
        let records = vec![
            ListingRecord::new("itm-1", cam.clone(), "Leica M3", "EUR 1.200,00", "https://example.test/itm/1", now),
            ListingRecord::new("itm-2", gpu.clone(), "RTX 4080", "EUR 900,00", "https://example.test/itm/2", now),
        ];
        std::fs::write(&path, serde_json::to_vec(&records).unwrap()).unwrap();

        let source = JsonFileSource::new(&path);
        let got = source.fetch(&cam).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].listing_id, "itm-1");
    }

    #[tokio::test]
    async fn json_file_source_missing_file_is_transient() {
        let tmp = tempfile::tempdir().unwrap();
        let source = JsonFileSource::new(tmp.path().join("absent.json"));
        let kw = Keyword::new("Vintage Camera").unwrap();
        assert!(source.fetch(&kw).await.is_err());
    }
}
