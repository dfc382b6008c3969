// src/scheduler.rs
// Periodic driver for the engine. Cycles run strictly one at a time: the
// loop awaits each cycle before asking the ticker again, and ticks that fire
// while a cycle is in flight are skipped, never queued.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::engine::PollCycleEngine;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub poll_interval_secs: u64,
}

pub struct Scheduler {
    engine: Arc<PollCycleEngine>,
    cfg: SchedulerCfg,
}

impl Scheduler {
    pub fn new(engine: Arc<PollCycleEngine>, cfg: SchedulerCfg) -> Self {
        Self { engine, cfg }
    }

    /// Drive cycles until the stop channel flips to `true`. The stop signal
    /// is also forwarded into the running cycle, which honors it between
    /// keyword iterations.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        let period = Duration::from_secs(self.cfg.poll_interval_secs.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if *stop.borrow() {
                        tracing::info!("scheduler stopping");
                        break;
                    }
                    let status = self.engine.run_cycle_until(&stop).await;
                    counter!("watch_scheduler_ticks_total").increment(1);
                    tracing::info!(
                        target: "watch",
                        keywords = status.keywords_processed,
                        new = status.new_listings_found,
                        source_errors = status.source_errors,
                        notify_errors = status.notify_errors,
                        "cycle finished"
                    );
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        tracing::info!("scheduler stopping");
                        break;
                    }
                }
            }
        }
    }
}
