// src/notify/mod.rs
// The boundary to the external notification sink. The engine requires an
// at-least-once delivery attempt and an honest outcome; the transport that
// actually posts the message lives outside this crate.

pub mod format;

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::NotifyError;
use crate::source::ListingRecord;

/// Where a notification goes. Comes from configuration, never hard-coded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotifyTarget {
    pub chat_id: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, target: &NotifyTarget, record: &ListingRecord)
        -> Result<(), NotifyError>;
}

/// Notifier that renders the message body and emits it as a structured log
/// event. Stands in wherever no real transport is wired (dry runs, local
/// operation against the dashboard).
#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        target: &NotifyTarget,
        record: &ListingRecord,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            target: "notify",
            chat_id = %target.chat_id,
            keyword = %record.keyword,
            listing_id = %record.listing_id,
            message = %format::format_listing(record),
            "new listing"
        );
        Ok(())
    }
}

// --- Test helper ---

/// Records every send; individual listing ids can be scripted to fail.
#[derive(Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<ListingRecord>>,
    fail_ids: Mutex<HashSet<String>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_listing(&self, listing_id: &str) {
        self.fail_ids.lock().unwrap().insert(listing_id.to_string());
    }

    pub fn clear_failures(&self) {
        self.fail_ids.lock().unwrap().clear();
    }

    pub fn sent(&self) -> Vec<ListingRecord> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn sends_for(&self, listing_id: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.listing_id == listing_id)
            .count()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send(
        &self,
        _target: &NotifyTarget,
        record: &ListingRecord,
    ) -> Result<(), NotifyError> {
        if self.fail_ids.lock().unwrap().contains(&record.listing_id) {
            return Err(NotifyError::Unavailable(format!(
                "scripted failure for '{}'",
                record.listing_id
            )));
        }
        self.sent.lock().unwrap().push(record.clone());
        Ok(())
    }
}
