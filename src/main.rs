//! Listing watcher — binary entrypoint.
//! Wires the file-backed stores, the JSON-file listing source and the log
//! notifier, then hands control to the scheduler until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use listing_watcher::audit::AuditTrail;
use listing_watcher::config::WatcherConfig;
use listing_watcher::engine::{EngineCfg, PollCycleEngine};
use listing_watcher::keywords::KeywordStore;
use listing_watcher::notify::{LogNotifier, NotifyTarget};
use listing_watcher::scheduler::{Scheduler, SchedulerCfg};
use listing_watcher::source::JsonFileSource;
use listing_watcher::state::StateFile;
use listing_watcher::status::StatusPublisher;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("listing_watcher=info,watch=info,notify=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = WatcherConfig::load().context("load watcher config")?;
    if cfg.chat_id.is_empty() {
        tracing::warn!("chat_id is empty; notifications have no delivery target configured");
    }

    let state = Arc::new(StateFile::open(&cfg.state_path).context("open state file")?);
    let keywords = Arc::new(KeywordStore::open(&cfg.keywords_path).context("open keyword store")?);
    let status = Arc::new(StatusPublisher::new());
    let source = Arc::new(JsonFileSource::new(&cfg.source_path));
    let notifier = Arc::new(LogNotifier::new());
    let target = NotifyTarget {
        chat_id: cfg.chat_id.clone(),
    };

    let mut engine = PollCycleEngine::new(
        keywords,
        source,
        notifier,
        state,
        status,
        target,
        EngineCfg::from(&cfg),
    );
    if let Some(audit_path) = &cfg.audit_path {
        engine = engine.with_audit(AuditTrail::new(audit_path));
    }
    let engine = Arc::new(engine);

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, letting the current keyword finish");
            let _ = stop_tx.send(true);
        }
    });

    tracing::info!(
        interval_secs = cfg.poll_interval_secs,
        keywords_path = %cfg.keywords_path.display(),
        state_path = %cfg.state_path.display(),
        "starting watcher loop"
    );
    Scheduler::new(
        engine,
        SchedulerCfg {
            poll_interval_secs: cfg.poll_interval_secs,
        },
    )
    .run(stop_rx)
    .await;

    Ok(())
}
