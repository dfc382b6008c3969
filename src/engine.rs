// src/engine.rs
// One poll cycle: snapshot keywords, fetch listings per keyword (bounded
// fan-out), diff against the seen registry, notify exactly the new items,
// commit registry + status. Per-keyword and per-record failures are isolated;
// persistence failures abort the cycle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::audit::AuditTrail;
use crate::config::WatcherConfig;
use crate::keywords::{Keyword, KeywordStore};
use crate::notify::{Notifier, NotifyTarget};
use crate::seen::SeenRegistry;
use crate::source::{ListingRecord, ListingSource};
use crate::state::StateFile;
use crate::status::{CycleStatus, StatusPublisher};

/// One-time metrics registration (so series show up on whatever exporter the
/// embedding process installs).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("watch_cycles_total", "Completed poll cycles.");
        describe_counter!(
            "watch_new_listings_total",
            "Listings notified for the first time."
        );
        describe_counter!(
            "watch_source_errors_total",
            "Per-keyword source fetch failures."
        );
        describe_counter!(
            "watch_notify_errors_total",
            "Per-record notification failures."
        );
        describe_gauge!(
            "watch_last_cycle_ts",
            "Unix ts when the last cycle finished."
        );
    });
}

#[derive(Clone, Copy, Debug)]
pub struct EngineCfg {
    pub max_concurrent_fetches: usize,
    pub notify_pacing_ms: u64,
    pub retention_horizon_days: i64,
    pub prune_every_cycles: u64,
}

impl Default for EngineCfg {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 4,
            notify_pacing_ms: 0,
            retention_horizon_days: 30,
            prune_every_cycles: 10,
        }
    }
}

impl From<&WatcherConfig> for EngineCfg {
    fn from(cfg: &WatcherConfig) -> Self {
        Self {
            max_concurrent_fetches: cfg.max_concurrent_fetches,
            notify_pacing_ms: cfg.notify_pacing_ms,
            retention_horizon_days: cfg.retention_horizon_days,
            prune_every_cycles: cfg.prune_every_cycles,
        }
    }
}

pub struct PollCycleEngine {
    keywords: Arc<KeywordStore>,
    source: Arc<dyn ListingSource>,
    notifier: Arc<dyn Notifier>,
    state: Arc<StateFile>,
    seen: SeenRegistry,
    status: Arc<StatusPublisher>,
    target: NotifyTarget,
    audit: Option<AuditTrail>,
    cfg: EngineCfg,
    cycles_run: AtomicU64,
}

impl PollCycleEngine {
    pub fn new(
        keywords: Arc<KeywordStore>,
        source: Arc<dyn ListingSource>,
        notifier: Arc<dyn Notifier>,
        state: Arc<StateFile>,
        status: Arc<StatusPublisher>,
        target: NotifyTarget,
        cfg: EngineCfg,
    ) -> Self {
        let seen = SeenRegistry::new(Arc::clone(&state));
        Self {
            keywords,
            source,
            notifier,
            state,
            seen,
            status,
            target,
            audit: None,
            cfg,
            cycles_run: AtomicU64::new(0),
        }
    }

    pub fn with_audit(mut self, audit: AuditTrail) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn seen(&self) -> &SeenRegistry {
        &self.seen
    }

    /// Convenience wrapper for callers without a stop channel.
    pub async fn run_cycle(&self) -> CycleStatus {
        let (_tx, rx) = watch::channel(false);
        self.run_cycle_until(&rx).await
    }

    /// Run one full cycle. The stop signal is honored between keyword
    /// iterations only, never between a send and its registry commit.
    pub async fn run_cycle_until(&self, stop: &watch::Receiver<bool>) -> CycleStatus {
        ensure_metrics_described();
        let started_at = Utc::now();
        let keywords = self.keywords.list();

        let mut source_errors = 0usize;
        let mut notify_errors = 0usize;
        let mut new_listings_found = 0usize;
        let mut keywords_processed = 0usize;
        let mut last_error: Option<String> = None;

        // Fetch phase: keywords are independent, so fan out with a bounded
        // pool. Results slot back into snapshot order, keeping dispatch
        // deterministic.
        let semaphore = Arc::new(Semaphore::new(self.cfg.max_concurrent_fetches.max(1)));
        let mut join_set = JoinSet::new();
        for (idx, kw) in keywords.iter().enumerate() {
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            let kw = kw.clone();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let fetched = source.fetch(&kw).await;
                (idx, kw, fetched)
            });
        }

        let mut fetched: Vec<Option<(Keyword, Vec<ListingRecord>)>> = Vec::new();
        fetched.resize_with(keywords.len(), || None);
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, kw, Ok(records))) => {
                    tracing::debug!(keyword = %kw, count = records.len(), "fetched listings");
                    fetched[idx] = Some((kw, records));
                }
                Ok((_, kw, Err(e))) => {
                    source_errors += 1;
                    counter!("watch_source_errors_total").increment(1);
                    tracing::warn!(keyword = %kw, error = %e, "source unavailable, keyword skipped this cycle");
                    last_error = Some(format!("{kw}: {e}"));
                }
                Err(e) => {
                    source_errors += 1;
                    counter!("watch_source_errors_total").increment(1);
                    tracing::warn!(error = %e, "fetch task failed");
                    last_error = Some(format!("fetch task failed: {e}"));
                }
            }
        }

        // Dispatch phase: single writer, snapshot order. A new item is
        // notified first and recorded only after the send succeeded, so a
        // failed send stays unseen and retries next cycle.
        let pacing = StdDuration::from_millis(self.cfg.notify_pacing_ms);
        'dispatch: for slot in fetched {
            let Some((kw, records)) = slot else { continue };
            if *stop.borrow() {
                tracing::info!("stop signal observed, halting cycle before next keyword");
                break;
            }
            for record in records {
                if self.seen.has(&kw, &record.listing_id) {
                    continue;
                }
                match self.notifier.send(&self.target, &record).await {
                    Ok(()) => {
                        let notified_at = Utc::now();
                        if let Err(e) = self.seen.record(&kw, &record.listing_id, notified_at) {
                            tracing::error!(
                                keyword = %kw,
                                listing_id = %record.listing_id,
                                error = %e,
                                "seen registry write failed, aborting cycle"
                            );
                            last_error = Some(e.to_string());
                            break 'dispatch;
                        }
                        new_listings_found += 1;
                        counter!("watch_new_listings_total").increment(1);
                        if let Some(audit) = &self.audit {
                            audit.append(&record, notified_at);
                        }
                        if !pacing.is_zero() {
                            tokio::time::sleep(pacing).await;
                        }
                    }
                    Err(e) => {
                        notify_errors += 1;
                        counter!("watch_notify_errors_total").increment(1);
                        tracing::warn!(
                            keyword = %kw,
                            listing_id = %record.listing_id,
                            error = %e,
                            "notify failed, record stays unseen for retry next cycle"
                        );
                        last_error = Some(e.to_string());
                    }
                }
            }
            keywords_processed += 1;
        }

        // Commit: publish the snapshot and persist it alongside the seen map
        // so the dashboard reads both from one document.
        let finished_at = Utc::now();
        let status = CycleStatus {
            started_at,
            finished_at,
            keywords_processed,
            new_listings_found,
            source_errors,
            notify_errors,
            last_error,
        };
        self.status.publish(status.clone());
        if let Err(e) = self.state.update(|doc| doc.last_cycle = Some(status.clone())) {
            tracing::warn!(error = %e, "persisting cycle status failed");
        }
        counter!("watch_cycles_total").increment(1);
        gauge!("watch_last_cycle_ts").set(finished_at.timestamp() as f64);

        // Amortized retention pruning.
        let cycle_no = self.cycles_run.fetch_add(1, Ordering::Relaxed) + 1;
        if self.cfg.prune_every_cycles > 0 && cycle_no % self.cfg.prune_every_cycles == 0 {
            let horizon = chrono::Duration::days(self.cfg.retention_horizon_days.max(0));
            match self.seen.prune(horizon, finished_at) {
                Ok(0) => {}
                Ok(n) => tracing::info!(removed = n, "pruned seen entries past retention horizon"),
                Err(e) => tracing::warn!(error = %e, "prune failed"),
            }
        }

        status
    }
}
