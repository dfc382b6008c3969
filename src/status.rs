// src/status.rs
// Process-wide "what happened in the last cycle" snapshot for external
// observers (the dashboard). No history is kept here; the audit trail is the
// append-only side channel.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one poll cycle. Overwritten each cycle, not a log.
///
/// External readers derive three distinct conditions from this plus file age:
/// "no new listings" (clean status, zero count), "cycle failed" (`last_error`
/// set or error counts non-zero) and "engine not running" (stale
/// `finished_at`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleStatus {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub keywords_processed: usize,
    pub new_listings_found: usize,
    pub source_errors: usize,
    pub notify_errors: usize,
    /// Last error observed during the cycle (last one wins when several
    /// keywords fail). `None` after a cycle that completed cleanly.
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
pub struct StatusPublisher {
    current: Mutex<Option<CycleStatus>>,
}

impl StatusPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current snapshot.
    pub fn publish(&self, status: CycleStatus) {
        let mut cur = self.current.lock().expect("status mutex poisoned");
        *cur = Some(status);
    }

    pub fn current(&self) -> Option<CycleStatus> {
        self.current
            .lock()
            .expect("status mutex poisoned")
            .clone()
    }
}
