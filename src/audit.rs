// src/audit.rs
// Optional append-only trail of notified listings, one JSON object per line.
// The dashboard reads it for history display; the engine itself never reads
// it back. Best-effort: a failed append is logged and never fails the cycle.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::source::ListingRecord;

#[derive(Debug, Serialize)]
struct AuditLine<'a> {
    ts: DateTime<Utc>,
    keyword: &'a str,
    listing_id: &'a str,
    title: &'a str,
    price: &'a str,
    url: &'a str,
}

#[derive(Debug, Clone)]
pub struct AuditTrail {
    path: PathBuf,
}

impl AuditTrail {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn append(&self, record: &ListingRecord, ts: DateTime<Utc>) {
        let line = AuditLine {
            ts,
            keyword: record.keyword.as_str(),
            listing_id: &record.listing_id,
            title: &record.title,
            price: &record.price,
            url: &record.url,
        };
        if let Err(e) = self.append_line(&line) {
            tracing::warn!(error = %e, path = %self.path.display(), "audit append failed");
        }
    }

    fn append_line(&self, line: &AuditLine<'_>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let json = serde_json::to_string(line)?;
        writeln!(file, "{json}")?;
        Ok(())
    }
}
