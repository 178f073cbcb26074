// src/poller/poller.rs
use super::state::{FetchState, FetchTrigger, Snapshot};
use crate::config::PollerConfig;
use crate::health::{ErrorDetail, HealthResponse, HealthSource};
use crate::metrics::MetricsCollector;
use chrono::Utc;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Keeps a health snapshot current for as long as someone is watching.
///
/// The poller itself is only a factory: every call to [`HealthPoller::activate`]
/// gets its own state, its own timer and its own sequence counter. Nothing is
/// shared between activations.
#[derive(Clone)]
pub struct HealthPoller {
    source: Arc<dyn HealthSource>,
    stale_time: Duration,
    refetch_interval: Duration,
    metrics: Option<Arc<MetricsCollector>>,
}

impl HealthPoller {
    pub fn new(source: Arc<dyn HealthSource>, config: &PollerConfig) -> Self {
        Self {
            source,
            stale_time: config.stale_time(),
            // tokio intervals panic on a zero period
            refetch_interval: config.refetch_interval().max(Duration::from_millis(1)),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Start polling. Must be called from within a tokio runtime.
    ///
    /// The first fetch is issued before this returns, so the activation is
    /// already `Loading`. Dropping the returned handle deactivates it.
    pub fn activate(&self) -> Activation {
        let (tx, rx) = watch::channel(Snapshot::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let shared = Arc::new(Shared {
            source: self.source.clone(),
            stale_time: self.stale_time,
            refetch_interval: self.refetch_interval,
            metrics: self.metrics.clone(),
            ledger: Mutex::new(Ledger::default()),
            tx,
        });

        if let Some(metrics) = &self.metrics {
            metrics.poller_activated();
        }

        info!(
            "Health poller activated (stale after {:?}, refetch every {:?})",
            self.stale_time, self.refetch_interval
        );

        shared.begin_fetch(FetchTrigger::Activation);
        tokio::spawn(drive(shared.clone(), shutdown_rx));

        Activation {
            shared,
            rx,
            shutdown_tx,
        }
    }
}

/// A live subscription to the poller. Deactivates on drop.
pub struct Activation {
    shared: Arc<Shared>,
    rx: watch::Receiver<Snapshot>,
    shutdown_tx: watch::Sender<bool>,
}

impl Activation {
    pub fn snapshot(&self) -> Snapshot {
        self.rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.rx.clone()
    }

    /// Wait for the next published snapshot.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Signal a re-render. Fetches only if nothing is in flight and the last
    /// success is older than the stale time. Returns whether a fetch started.
    pub fn touch(&self) -> bool {
        let mut ledger = self.shared.lock();
        if !ledger.live || ledger.has_pending_newer() || self.shared.is_fresh(&ledger) {
            return false;
        }
        self.shared
            .begin_fetch_locked(&mut ledger, FetchTrigger::Touch)
            .is_some()
    }

    /// Fetch now regardless of freshness. Returns the new sequence number.
    pub fn refresh(&self) -> Option<u64> {
        self.shared.begin_fetch(FetchTrigger::Manual)
    }

    pub fn is_active(&self) -> bool {
        self.shared.lock().live
    }

    /// Stop polling. Same as dropping the handle: the state is frozen and
    /// pending fetches are aborted.
    pub fn deactivate(self) {
        drop(self);
    }
}

impl Drop for Activation {
    fn drop(&mut self) {
        if self.shared.shutdown() {
            info!("Health poller deactivated");
        }
        let _ = self.shutdown_tx.send(true);
    }
}

struct Shared {
    source: Arc<dyn HealthSource>,
    stale_time: Duration,
    refetch_interval: Duration,
    metrics: Option<Arc<MetricsCollector>>,
    ledger: Mutex<Ledger>,
    tx: watch::Sender<Snapshot>,
}

struct Ledger {
    live: bool,
    issued: u64,
    applied: u64,
    pending: HashMap<u64, AbortHandle>,
    last_success: Option<Instant>,
    snapshot: Snapshot,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            live: true,
            issued: 0,
            applied: 0,
            pending: HashMap::new(),
            last_success: None,
            snapshot: Snapshot::default(),
        }
    }
}

impl Ledger {
    fn has_pending_newer(&self) -> bool {
        self.pending.keys().any(|&seq| seq > self.applied)
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_fresh(&self, ledger: &Ledger) -> bool {
        ledger.snapshot.is_success()
            && ledger
                .last_success
                .map_or(false, |at| at.elapsed() < self.stale_time)
    }

    fn publish(&self, ledger: &Ledger) {
        self.tx.send_replace(ledger.snapshot.clone());
    }

    fn begin_fetch(self: &Arc<Self>, trigger: FetchTrigger) -> Option<u64> {
        let mut ledger = self.lock();
        self.begin_fetch_locked(&mut ledger, trigger)
    }

    fn begin_fetch_locked(self: &Arc<Self>, ledger: &mut Ledger, trigger: FetchTrigger) -> Option<u64> {
        if !ledger.live {
            return None;
        }

        ledger.issued += 1;
        let seq = ledger.issued;

        // Only the newest request stays in flight.
        for (old, handle) in ledger.pending.drain() {
            handle.abort();
            debug!(seq = old, superseded_by = seq, "Health fetch cancelled");
            self.record_discarded("superseded");
        }

        if ledger.snapshot.state == FetchState::Idle {
            ledger.snapshot.state = FetchState::Loading;
        }
        ledger.snapshot.is_fetching = true;
        self.publish(ledger);

        let shared = Arc::clone(self);
        let task = tokio::spawn(async move {
            let started = Instant::now();
            let (result, outcome) = match AssertUnwindSafe(shared.source.fetch_health())
                .catch_unwind()
                .await
            {
                Ok(Ok(response)) => (Ok(response), "success"),
                Ok(Err(e)) => (Err(ErrorDetail::from(&e)), e.kind()),
                Err(_) => (Err(ErrorDetail::fallback()), "panic"),
            };
            shared.complete(seq, trigger, result, outcome, started.elapsed());
        });
        ledger.pending.insert(seq, task.abort_handle());

        debug!(seq, trigger = trigger.as_str(), "Health fetch started");
        Some(seq)
    }

    fn complete(
        &self,
        seq: u64,
        trigger: FetchTrigger,
        result: Result<HealthResponse, ErrorDetail>,
        outcome: &'static str,
        elapsed: Duration,
    ) {
        let mut ledger = self.lock();
        ledger.pending.remove(&seq);

        if !ledger.live {
            debug!(seq, "Dropping health result after deactivation");
            self.record_discarded("deactivated");
            return;
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_fetch(trigger.as_str(), outcome, elapsed);
        }

        if seq <= ledger.applied {
            debug!(seq, applied = ledger.applied, "Discarding out-of-order health result");
            self.record_discarded("stale");
            return;
        }

        ledger.applied = seq;
        ledger.snapshot.state = match result {
            Ok(response) => {
                ledger.last_success = Some(Instant::now());
                debug!(seq, ?elapsed, "Health fetch succeeded");
                FetchState::Success(response)
            }
            Err(detail) => {
                warn!(seq, trigger = trigger.as_str(), "Health fetch failed: {}", detail);
                FetchState::Error(detail)
            }
        };
        ledger.snapshot.generation = seq;
        ledger.snapshot.updated_at = Some(Utc::now());
        ledger.snapshot.is_fetching = ledger.has_pending_newer();
        self.publish(&ledger);
    }

    /// Flip the activation token and abort in-flight fetches. Returns false
    /// if already shut down.
    fn shutdown(&self) -> bool {
        let mut ledger = self.lock();
        if !ledger.live {
            return false;
        }
        ledger.live = false;
        for (_, handle) in ledger.pending.drain() {
            handle.abort();
        }

        if let Some(metrics) = &self.metrics {
            metrics.poller_deactivated();
        }
        true
    }

    fn record_discarded(&self, reason: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_discarded(reason);
        }
    }
}

async fn drive(shared: Arc<Shared>, mut shutdown_rx: watch::Receiver<bool>) {
    let period = shared.refetch_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if shared.begin_fetch(FetchTrigger::Interval).is_none() {
                    break;
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    debug!("Health poller timer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{FetchError, FALLBACK_ERROR_MESSAGE};
    use crate::metrics::MetricsRegistry;
    use crate::view::HealthView;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;
    use tokio::time::sleep;

    type Reply = Result<HealthResponse, FetchError>;

    enum Script {
        Ready(Reply),
        Deferred(oneshot::Receiver<Reply>),
        Never,
        Panic,
    }

    /// Plays back scripted replies in order, then answers healthy forever.
    struct ScriptedSource {
        calls: AtomicUsize,
        script: Mutex<VecDeque<Script>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script: Mutex::new(script.into()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HealthSource for ScriptedSource {
        async fn fetch_health(&self) -> Result<HealthResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                None => Ok(HealthResponse::new("ok", "healthy")),
                Some(Script::Ready(reply)) => reply,
                Some(Script::Deferred(rx)) => rx
                    .await
                    .unwrap_or_else(|_| Err(FetchError::Transport("reply dropped".into()))),
                Some(Script::Never) => std::future::pending().await,
                Some(Script::Panic) => panic!("source exploded"),
            }
        }
    }

    fn poller(source: Arc<ScriptedSource>) -> HealthPoller {
        HealthPoller::new(source, &PollerConfig::default())
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_is_loading_while_fetch_hangs() {
        let source = ScriptedSource::new(vec![Script::Never]);
        let activation = poller(source.clone()).activate();

        assert_eq!(activation.snapshot().state, FetchState::Loading);

        sleep(Duration::from_secs(1)).await;
        let snapshot = activation.snapshot();
        assert_eq!(snapshot.state, FetchState::Loading);
        assert!(snapshot.is_fetching);
        assert_eq!(HealthView::from_state(&snapshot.state), HealthView::Loading);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_is_published() {
        let source = ScriptedSource::new(vec![]);
        let mut activation = poller(source).activate();

        let first = activation.changed().await.unwrap();
        assert_eq!(first.state, FetchState::Loading);

        let second = activation.changed().await.unwrap();
        assert_eq!(
            second.state,
            FetchState::Success(HealthResponse::new("ok", "healthy"))
        );
        assert_eq!(second.generation, 1);
        assert!(!second.is_fetching);
        assert!(second.updated_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_becomes_error_state() {
        let source = ScriptedSource::new(vec![Script::Ready(Err(FetchError::Transport(
            "connection refused".into(),
        )))]);
        let activation = poller(source).activate();
        settle().await;

        let snapshot = activation.snapshot();
        assert!(snapshot.is_error());
        assert_eq!(snapshot.error().unwrap().message, "connection refused");

        let rendered = HealthView::from_state(&snapshot.state).to_string();
        assert!(rendered.contains("Error: connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_fetch_inside_freshness_window() {
        let source = ScriptedSource::new(vec![]);
        let activation = poller(source.clone()).activate();
        settle().await;

        for _ in 0..4 {
            sleep(Duration::from_secs(1)).await;
            assert!(!activation.touch());
        }
        assert_eq!(source.calls(), 1);

        // t = 9.9s: past the freshness window but nobody touched.
        sleep(Duration::from_millis(5_900)).await;
        settle().await;
        assert_eq!(source.calls(), 1);

        // t = 10.1s: the refresh interval fired.
        sleep(Duration::from_millis(200)).await;
        settle().await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_after_window_revalidates_in_background() {
        let (tx, rx) = oneshot::channel();
        let source = ScriptedSource::new(vec![
            Script::Ready(Ok(HealthResponse::new("ok", "first"))),
            Script::Deferred(rx),
        ]);
        let activation = poller(source.clone()).activate();
        settle().await;

        sleep(Duration::from_secs(6)).await;
        assert!(activation.touch());

        let during = activation.snapshot();
        assert!(during.is_fetching);
        assert_eq!(
            during.data().and_then(|d| d.message.as_deref()),
            Some("first")
        );

        tx.send(Ok(HealthResponse::new("ok", "second"))).unwrap();
        settle().await;

        let after = activation.snapshot();
        assert!(!after.is_fetching);
        assert_eq!(after.data().and_then(|d| d.message.as_deref()), Some("second"));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_does_not_duplicate_in_flight_fetch() {
        let source = ScriptedSource::new(vec![Script::Never]);
        let activation = poller(source.clone()).activate();

        assert!(!activation.touch());
        assert!(!activation.touch());
        settle().await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_are_not_fatal() {
        let source = ScriptedSource::new(vec![
            Script::Ready(Ok(HealthResponse::new("ok", "healthy"))),
            Script::Ready(Err(FetchError::Http { status: 503 })),
        ]);
        let activation = poller(source).activate();
        settle().await;
        assert!(activation.snapshot().is_success());

        sleep(Duration::from_millis(10_100)).await;
        settle().await;
        let failed = activation.snapshot();
        assert_eq!(failed.error().unwrap().message, "HTTP error! status: 503");
        assert_eq!(failed.generation, 2);

        sleep(Duration::from_secs(10)).await;
        settle().await;
        let recovered = activation.snapshot();
        assert!(recovered.is_success());
        assert_eq!(recovered.generation, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deactivation_freezes_state() {
        let (tx, rx) = oneshot::channel();
        let source = ScriptedSource::new(vec![Script::Deferred(rx)]);
        let activation = poller(source.clone()).activate();
        settle().await;

        let mut watcher = activation.subscribe();
        watcher.borrow_and_update();
        activation.deactivate();

        let _ = tx.send(Ok(HealthResponse::new("ok", "too late")));
        sleep(Duration::from_secs(30)).await;
        settle().await;

        assert!(!matches!(watcher.has_changed(), Ok(true)));
        assert_eq!(watcher.borrow().state, FetchState::Loading);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_fetch_cancels_superseded_one() {
        let (old_tx, old_rx) = oneshot::channel();
        let (new_tx, new_rx) = oneshot::channel();
        let source = ScriptedSource::new(vec![
            Script::Ready(Ok(HealthResponse::new("ok", "initial"))),
            Script::Deferred(old_rx),
            Script::Deferred(new_rx),
        ]);
        let registry = MetricsRegistry::new().unwrap();
        let activation = poller(source.clone())
            .with_metrics(registry.collector())
            .activate();
        settle().await;

        assert_eq!(activation.refresh(), Some(2));
        settle().await;
        assert_eq!(activation.refresh(), Some(3));
        settle().await;
        assert_eq!(source.calls(), 3);

        // The cancelled request dropped its receiver.
        assert!(old_tx.send(Ok(HealthResponse::new("ok", "older"))).is_err());

        let during = activation.snapshot();
        assert_eq!(during.generation, 1);
        assert!(during.is_fetching);
        assert_eq!(during.data().and_then(|d| d.message.as_deref()), Some("initial"));

        new_tx.send(Ok(HealthResponse::new("ok", "newer"))).unwrap();
        settle().await;
        let snapshot = activation.snapshot();
        assert_eq!(snapshot.generation, 3);
        assert!(!snapshot.is_fetching);
        assert_eq!(snapshot.data().and_then(|d| d.message.as_deref()), Some("newer"));

        let metrics = registry.collector();
        assert_eq!(
            metrics.results_discarded_total.with_label_values(&["superseded"]).get(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_backend_keeps_one_fetch_in_flight() {
        let source = ScriptedSource::new((0..20).map(|_| Script::Never).collect());
        let activation = poller(source.clone()).activate();
        settle().await;

        // Ten interval ticks against a backend that never answers.
        sleep(Duration::from_millis(100_100)).await;
        settle().await;

        assert_eq!(source.calls(), 11);
        assert_eq!(activation.shared.lock().pending.len(), 1);

        let snapshot = activation.snapshot();
        assert_eq!(snapshot.state, FetchState::Loading);
        assert!(snapshot.is_fetching);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_source_uses_fallback_message() {
        let source = ScriptedSource::new(vec![Script::Panic]);
        let activation = poller(source).activate();
        settle().await;

        let snapshot = activation.snapshot();
        assert_eq!(snapshot.error().unwrap().message, FALLBACK_ERROR_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_activation_starts_fresh() {
        let source = ScriptedSource::new(vec![]);
        let poller = poller(source.clone());

        let first = poller.activate();
        settle().await;
        assert!(first.snapshot().is_success());
        drop(first);

        let second = poller.activate();
        assert_eq!(second.snapshot().state, FetchState::Loading);
        assert_eq!(second.snapshot().generation, 0);
        settle().await;
        assert_eq!(source.calls(), 2);
        assert!(second.is_active());
    }
}
