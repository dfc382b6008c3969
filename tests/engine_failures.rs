// tests/engine_failures.rs
// Failure isolation: a bad keyword or a failing send never aborts the cycle,
// and a stop signal halts between keywords only.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use listing_watcher::engine::{EngineCfg, PollCycleEngine};
use listing_watcher::error::NotifyError;
use listing_watcher::keywords::{Keyword, KeywordStore};
use listing_watcher::notify::{MemoryNotifier, Notifier, NotifyTarget};
use listing_watcher::source::{ListingRecord, ListingSource, StaticSource};
use listing_watcher::state::StateFile;
use listing_watcher::status::StatusPublisher;
use tokio::sync::watch;

fn listing(id: &str, kw: &Keyword) -> ListingRecord {
    ListingRecord::new(
        id,
        kw.clone(),
        format!("Listing {id}"),
        "EUR 50,00",
        format!("https://example.test/itm/{id}"),
        Utc::now(),
    )
}

fn build_with(
    dir: &Path,
    notifier: Arc<dyn Notifier>,
) -> (Arc<KeywordStore>, Arc<StaticSource>, Arc<StateFile>, Arc<StatusPublisher>, PollCycleEngine)
{
    let keywords = Arc::new(KeywordStore::open(dir.join("keywords.txt")).unwrap());
    let source = Arc::new(StaticSource::new());
    let state = Arc::new(StateFile::open(dir.join("state.json")).unwrap());
    let status = Arc::new(StatusPublisher::new());
    let engine = PollCycleEngine::new(
        Arc::clone(&keywords),
        Arc::clone(&source) as Arc<dyn ListingSource>,
        notifier,
        Arc::clone(&state),
        Arc::clone(&status),
        NotifyTarget {
            chat_id: "-987654321".into(),
        },
        EngineCfg::default(),
    );
    (keywords, source, state, status, engine)
}

#[tokio::test]
async fn one_failing_keyword_does_not_abort_the_cycle() {
    let tmp = tempfile::tempdir().unwrap();
    let notifier = Arc::new(MemoryNotifier::new());
    let (keywords, source, _state, status, engine) =
        build_with(tmp.path(), Arc::clone(&notifier) as Arc<dyn Notifier>);

    keywords.add("playstation 5").unwrap();
    keywords.add("grafikkarte").unwrap();
    let ps5 = Keyword::new("playstation 5").unwrap();
    let gpu = Keyword::new("grafikkarte").unwrap();

    source.fail_keyword(&ps5);
    source.set_listings(&gpu, vec![listing("itm-g", &gpu)]);

    let s = engine.run_cycle().await;
    assert_eq!(s.source_errors, 1);
    assert_eq!(s.keywords_processed, 1);
    assert_eq!(s.new_listings_found, 1);
    assert!(s.last_error.as_deref().unwrap().contains("playstation 5"));
    assert_eq!(notifier.sends_for("itm-g"), 1);

    // The status still committed despite the partial failure.
    assert_eq!(status.current().unwrap(), s);

    // Recovery on a later cycle clears the error.
    source.clear_failure(&ps5);
    let s2 = engine.run_cycle().await;
    assert_eq!(s2.source_errors, 0);
    assert!(s2.last_error.is_none());
    assert_eq!(s2.keywords_processed, 2);
}

#[tokio::test]
async fn failed_send_stays_unseen_and_retries_next_cycle() {
    let tmp = tempfile::tempdir().unwrap();
    let notifier = Arc::new(MemoryNotifier::new());
    let (keywords, source, state, _status, engine) =
        build_with(tmp.path(), Arc::clone(&notifier) as Arc<dyn Notifier>);

    keywords.add("vintage camera").unwrap();
    let kw = Keyword::new("vintage camera").unwrap();
    source.set_listings(&kw, vec![listing("itm-x", &kw)]);

    notifier.fail_listing("itm-x");
    let s1 = engine.run_cycle().await;
    assert_eq!(s1.notify_errors, 1);
    assert_eq!(s1.new_listings_found, 0);
    assert!(!engine.seen().has(&kw, "itm-x"));

    let before_retry = Utc::now();
    notifier.clear_failures();
    let s2 = engine.run_cycle().await;
    assert_eq!(s2.notify_errors, 0);
    assert_eq!(s2.new_listings_found, 1);
    assert!(engine.seen().has(&kw, "itm-x"));
    assert_eq!(notifier.sends_for("itm-x"), 1);

    // The recorded timestamp belongs to the successful (later) attempt.
    let ts = state.read(|doc| doc.seen["vintage camera"]["itm-x"]);
    assert!(ts >= before_retry);
}

/// Delivers through an inner recorder, then flips the stop flag, so the
/// cycle observes the signal after the first keyword's dispatch.
struct StopAfterSend {
    tx: watch::Sender<bool>,
    inner: MemoryNotifier,
}

#[async_trait]
impl Notifier for StopAfterSend {
    async fn send(
        &self,
        target: &NotifyTarget,
        record: &ListingRecord,
    ) -> Result<(), NotifyError> {
        let res = self.inner.send(target, record).await;
        let _ = self.tx.send(true);
        res
    }
}

#[tokio::test]
async fn stop_signal_halts_between_keywords_not_mid_commit() {
    let tmp = tempfile::tempdir().unwrap();
    let (stop_tx, stop_rx) = watch::channel(false);
    let notifier = Arc::new(StopAfterSend {
        tx: stop_tx,
        inner: MemoryNotifier::new(),
    });
    let (keywords, source, _state, status, engine) =
        build_with(tmp.path(), Arc::clone(&notifier) as Arc<dyn Notifier>);

    keywords.add("playstation 5").unwrap();
    keywords.add("grafikkarte").unwrap();
    let ps5 = Keyword::new("playstation 5").unwrap();
    let gpu = Keyword::new("grafikkarte").unwrap();
    source.set_listings(&ps5, vec![listing("itm-p", &ps5)]);
    source.set_listings(&gpu, vec![listing("itm-g", &gpu)]);

    let s = engine.run_cycle_until(&stop_rx).await;

    // First keyword finished its send+record sequence; the second was never
    // dispatched; the cycle still committed a status.
    assert_eq!(s.new_listings_found, 1);
    assert_eq!(s.keywords_processed, 1);
    assert!(engine.seen().has(&ps5, "itm-p"));
    assert!(!engine.seen().has(&gpu, "itm-g"));
    assert_eq!(notifier.inner.sent_count(), 1);
    assert!(status.current().is_some());
}
