// ── Session controller ──
//
// Owns the reader handle and the session state machine. Every transition
// runs under one async mutex, so start/stop/destroy requests from the host
// are serialized and at most one scan loop exists per controller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tokio::sync::{Mutex, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::CoreError;
use crate::hardware::{ReaderDriver, ReaderError, ReaderHandle};
use crate::model::{Notice, SessionState};
use crate::observer::SessionObserver;
use crate::reporter::{TagUplink, UplinkReporter};
use crate::scan_loop::{LoopExit, ReaderLease, ScanLoop};
use crate::store::TagPresenceCache;

// ── Host lifecycle ───────────────────────────────────────────────

/// Lifecycle callbacks from the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum HostEvent {
    /// Foregrounded: start scanning.
    Resume,
    /// Backgrounded: stop scanning, keep the cache.
    Pause,
    /// Torn down: stop, release, refuse further starts.
    Destroy,
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The scan loop exited within the grace period.
    Stopped,
    /// The grace period elapsed first; the handle was released anyway.
    TimedOut,
    /// Nothing was running.
    NotRunning,
}

// ── SessionController ────────────────────────────────────────────

/// Drives one handheld's scan session.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Transitions:
///
/// ```text
/// Idle | Failed ── start ──▶ AcquiringHardware ──▶ Scanning ── stop ──▶ Stopping ──▶ Idle
///                                  │    └──▶ Failed           └── reader fault ──▶ Failed
///                                  └──▶ Unsupported (until recheck_support)
/// ```
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: SessionConfig,
    driver: Arc<dyn ReaderDriver>,
    cache: Arc<TagPresenceCache>,
    reporter: UplinkReporter,
    observer: Arc<dyn SessionObserver>,
    state: watch::Sender<SessionState>,
    slot: Mutex<SessionSlot>,
    generation: AtomicU64,
    /// Parent of every session's cancel token; cancelled on destroy.
    shutdown: CancellationToken,
}

struct SessionSlot {
    active: Option<ActiveSession>,
    device_model: String,
}

/// The running scan loop and the handle it reads from.
struct ActiveSession {
    generation: u64,
    handle: Arc<dyn ReaderHandle>,
    cancel: CancellationToken,
    lease: Arc<ReaderLease>,
    /// Fires when the loop returns, whatever the reason.
    exited: oneshot::Receiver<()>,
}

impl SessionController {
    /// Build a controller on the current tokio runtime.
    ///
    /// Fails outside a runtime context.
    pub fn new(
        config: SessionConfig,
        driver: Arc<dyn ReaderDriver>,
        uplink: Arc<dyn TagUplink>,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self, CoreError> {
        let runtime = Handle::try_current()
            .map_err(|e| CoreError::Internal(format!("no tokio runtime: {e}")))?;
        let reporter = UplinkReporter::new(
            uplink,
            config.report_context.clone(),
            config.max_in_flight_reports,
            runtime,
        );
        let (state, _) = watch::channel(SessionState::Idle);
        let device_model = config.device_model.clone();

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                driver,
                cache: Arc::new(TagPresenceCache::new()),
                reporter,
                observer,
                state,
                slot: Mutex::new(SessionSlot {
                    active: None,
                    device_model,
                }),
                generation: AtomicU64::new(0),
                shutdown: CancellationToken::new(),
            }),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Subscribe to state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn cache(&self) -> &Arc<TagPresenceCache> {
        &self.inner.cache
    }

    pub fn reporter(&self) -> &UplinkReporter {
        &self.inner.reporter
    }

    /// Route a host lifecycle callback.
    pub async fn on_host_event(&self, event: HostEvent) -> Result<(), CoreError> {
        debug!(%event, "host event");
        match event {
            HostEvent::Resume => self.start().await,
            HostEvent::Pause => {
                self.stop().await;
                Ok(())
            }
            HostEvent::Destroy => {
                self.destroy().await;
                Ok(())
            }
        }
    }

    /// Check support, acquire and configure the reader, clear the cache,
    /// and start the scan loop.
    ///
    /// A no-op while already scanning. Errors leave the controller in
    /// `Unsupported` or `Failed`, and raise a notice.
    pub async fn start(&self) -> Result<(), CoreError> {
        let inner = &self.inner;
        let mut slot = inner.slot.lock().await;

        if inner.shutdown.is_cancelled() {
            return Err(CoreError::Destroyed);
        }
        match inner.current_state() {
            state if state.holds_reader() => {
                debug!(%state, "start ignored, reader already held");
                return Ok(());
            }
            SessionState::Unsupported => {
                return Err(CoreError::UnsupportedDevice {
                    model: slot.device_model.clone(),
                });
            }
            _ => {}
        }

        inner.set_state(SessionState::AcquiringHardware);

        if !inner.driver.is_supported(&slot.device_model) {
            let model = slot.device_model.clone();
            warn!(model = %model, "device model not supported");
            inner.set_state(SessionState::Unsupported);
            inner.observer.on_notice(&Notice::UnsupportedDevice {
                model: model.clone(),
            });
            return Err(CoreError::UnsupportedDevice { model });
        }

        let driver = Arc::clone(&inner.driver);
        let tx_power = inner.config.tx_power;
        let acquired = tokio::task::spawn_blocking(move || acquire_reader(driver.as_ref(), tx_power))
            .await
            .map_err(|e| CoreError::Internal(format!("reader acquisition task failed: {e}")))
            .and_then(|result| result);

        let (handle, power) = match acquired {
            Ok(ready) => ready,
            Err(e) => {
                warn!(error = %e, "reader initialization failed");
                inner.set_state(SessionState::Failed);
                inner.observer.on_notice(&Notice::ReaderFailed {
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };

        inner.cache.clear();

        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = inner.shutdown.child_token();
        let lease = Arc::new(ReaderLease::default());
        let (exited_tx, exited_rx) = oneshot::channel();
        let scan = ScanLoop {
            handle: Arc::clone(&handle),
            cache: Arc::clone(&inner.cache),
            policy: inner.config.policy,
            reporter: inner.reporter.clone(),
            observer: Arc::clone(&inner.observer),
            poll_interval: inner.config.poll_interval,
            cancel: cancel.clone(),
            lease: Arc::clone(&lease),
        };
        let task = tokio::task::spawn_blocking(move || scan.run());
        tokio::spawn(supervise_scan_loop(
            Arc::downgrade(inner),
            LoopWatch {
                generation,
                handle: Arc::clone(&handle),
                lease: Arc::clone(&lease),
            },
            task,
            exited_tx,
        ));

        slot.active = Some(ActiveSession {
            generation,
            handle,
            cancel,
            lease,
            exited: exited_rx,
        });
        inner.set_state(SessionState::Scanning);
        info!(model = %slot.device_model, power, generation, "scanning started");
        inner.observer.on_session_start();
        inner.observer.on_notice(&Notice::ReaderReady { power });
        Ok(())
    }

    /// Signal the scan loop, wait up to the stop grace for it to exit, then
    /// release the reader. A no-op when nothing is running.
    pub async fn stop(&self) -> StopOutcome {
        let mut slot = self.inner.slot.lock().await;
        self.inner.stop_locked(&mut slot).await
    }

    /// Stop, release, and refuse every later start.
    pub async fn destroy(&self) {
        let mut slot = self.inner.slot.lock().await;
        self.inner.shutdown.cancel();
        self.inner.stop_locked(&mut slot).await;
        info!("session controller destroyed");
    }

    /// Re-run the capability check on the next start, optionally for a
    /// different model. Only leaves `Unsupported`; other states are untouched.
    pub async fn recheck_support(&self, model: Option<String>) -> SessionState {
        let mut slot = self.inner.slot.lock().await;
        if let Some(model) = model {
            slot.device_model = model;
        }
        if self.inner.current_state() == SessionState::Unsupported {
            self.inner.set_state(SessionState::Idle);
        }
        self.inner.current_state()
    }
}

impl ControllerInner {
    fn current_state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: SessionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(from = %prev, to = %next, "session state");
        }
    }

    async fn stop_locked(&self, slot: &mut SessionSlot) -> StopOutcome {
        let Some(active) = slot.active.take() else {
            debug!(state = %self.current_state(), "stop ignored, no active session");
            return StopOutcome::NotRunning;
        };

        self.set_state(SessionState::Stopping);
        active.cancel.cancel();

        let grace = self.config.stop_grace;
        let outcome = if tokio::time::timeout(grace, active.exited).await.is_ok() {
            StopOutcome::Stopped
        } else {
            let detached = active.lease.detach();
            warn!(
                grace_ms = grace.as_millis(),
                detached,
                "scan loop did not exit within grace period, releasing reader anyway"
            );
            StopOutcome::TimedOut
        };

        release_reader(&active.lease, active.handle).await;
        self.set_state(SessionState::Idle);
        self.observer.on_session_stop();
        info!(?outcome, generation = active.generation, "scanning stopped");
        outcome
    }
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// ── Reader plumbing ──────────────────────────────────────────────

/// Acquire, configure, and start the reader. Blocking.
///
/// A handle that fails configuration is released before returning.
fn acquire_reader(
    driver: &dyn ReaderDriver,
    tx_power: Option<u8>,
) -> Result<(Arc<dyn ReaderHandle>, u8), CoreError> {
    let handle = driver.acquire().map_err(|e| CoreError::acquisition(&e))?;

    let max = handle.max_power();
    let power = tx_power.map_or(max, |p| p.min(max));

    let prepared = handle
        .configure(power)
        .map_err(|e| CoreError::configuration(&e))
        .and_then(|()| match handle.start_continuous_read() {
            Ok(true) => Ok(()),
            Ok(false) => Err(CoreError::ReadRefused),
            Err(e) => Err(CoreError::configuration(&e)),
        });

    match prepared {
        Ok(()) => Ok((handle, power)),
        Err(e) => {
            if let Err(release_err) = handle.release() {
                warn!(error = %release_err, "failed to release partially initialized reader");
            }
            Err(e)
        }
    }
}

/// Release the session's handle unless someone already has.
async fn release_reader(lease: &ReaderLease, handle: Arc<dyn ReaderHandle>) {
    if !lease.claim_release() {
        debug!("reader already released");
        return;
    }
    match tokio::task::spawn_blocking(move || handle.release()).await {
        Ok(Ok(())) => debug!("reader released"),
        Ok(Err(e)) => warn!(error = %e, "reader release failed"),
        Err(e) => warn!(error = %e, "reader release task failed"),
    }
}

/// What the supervisor keeps of a session so it can release the reader
/// after the controller is gone.
struct LoopWatch {
    generation: u64,
    handle: Arc<dyn ReaderHandle>,
    lease: Arc<ReaderLease>,
}

/// Waits for one scan loop to return. On a reader fault, moves the session
/// to `Failed` unless it has already been stopped or replaced. If the
/// controller was dropped meanwhile, releases the reader itself.
async fn supervise_scan_loop(
    inner: Weak<ControllerInner>,
    session: LoopWatch,
    task: JoinHandle<LoopExit>,
    exited: oneshot::Sender<()>,
) {
    let exit = task.await.unwrap_or_else(|e| {
        LoopExit::Faulted(ReaderError::Fatal(format!("scan loop task failed: {e}")))
    });
    // Signal before locking: a concurrent stop holds the lock while waiting.
    let _ = exited.send(());

    let Some(inner) = inner.upgrade() else {
        debug!(generation = session.generation, "controller dropped, releasing orphaned reader");
        release_reader(&session.lease, session.handle).await;
        return;
    };
    let LoopExit::Faulted(err) = exit else {
        return;
    };

    let mut slot = inner.slot.lock().await;
    let Some(active) = slot.active.take_if(|a| a.generation == session.generation) else {
        debug!(generation = session.generation, "faulted scan loop already detached");
        return;
    };

    release_reader(&active.lease, active.handle).await;
    inner.set_state(SessionState::Failed);
    inner.observer.on_session_stop();
    inner.observer.on_notice(&Notice::ScanAborted {
        reason: err.to_string(),
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize};
    use std::time::Duration;

    use chrono::Utc;
    use futures_util::future::{self, BoxFuture};
    use tagscan_api::TagReading;

    use super::*;
    use crate::model::{Epc, TagPresence, TagSighting};

    // ── Fakes ────────────────────────────────────────────────────────

    #[derive(Default)]
    struct FakeHandle {
        releases: AtomicUsize,
        stops: AtomicUsize,
        power: AtomicU8,
        emit: AtomicBool,
        fail_configure: AtomicBool,
        refuse_start: AtomicBool,
        fault: AtomicBool,
        /// Block the next `poll_next` past any grace period, then return a
        /// sighting from it.
        stall: AtomicBool,
    }

    impl ReaderHandle for FakeHandle {
        fn max_power(&self) -> u8 {
            27
        }
        fn configure(&self, power: u8) -> Result<(), ReaderError> {
            if self.fail_configure.load(Ordering::SeqCst) {
                return Err(ReaderError::Fatal("power rejected".into()));
            }
            self.power.store(power, Ordering::SeqCst);
            Ok(())
        }
        fn start_continuous_read(&self) -> Result<bool, ReaderError> {
            Ok(!self.refuse_start.load(Ordering::SeqCst))
        }
        fn poll_next(&self) -> Result<Option<TagSighting>, ReaderError> {
            if self.stall.swap(false, Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(300));
                return Ok(Some(TagSighting::new("E2801170BBBB", -40, Utc::now())));
            }
            if self.fault.load(Ordering::SeqCst) {
                return Err(ReaderError::Fatal("antenna disconnected".into()));
            }
            if self.emit.load(Ordering::SeqCst) {
                return Ok(Some(TagSighting::new("E2801170AAAA", -48, Utc::now())));
            }
            Ok(None)
        }
        fn stop_continuous_read(&self) -> Result<(), ReaderError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn release(&self) -> Result<(), ReaderError> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeDriver {
        supported: AtomicBool,
        acquires: AtomicUsize,
        fail_acquires: AtomicUsize,
        handle: Arc<FakeHandle>,
    }

    impl FakeDriver {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                supported: AtomicBool::new(true),
                acquires: AtomicUsize::new(0),
                fail_acquires: AtomicUsize::new(0),
                handle: Arc::new(FakeHandle::default()),
            })
        }
    }

    impl ReaderDriver for FakeDriver {
        fn is_supported(&self, _model: &str) -> bool {
            self.supported.load(Ordering::SeqCst)
        }
        fn acquire(&self) -> Result<Arc<dyn ReaderHandle>, ReaderError> {
            self.acquires.fetch_add(1, Ordering::SeqCst);
            let pending = self.fail_acquires.load(Ordering::SeqCst);
            if pending > 0 {
                self.fail_acquires.store(pending - 1, Ordering::SeqCst);
                return Err(ReaderError::Unavailable("reader busy".into()));
            }
            Ok(Arc::clone(&self.handle) as Arc<dyn ReaderHandle>)
        }
    }

    struct OkUplink;

    impl TagUplink for OkUplink {
        fn send_reading(
            &self,
            _reading: TagReading,
        ) -> BoxFuture<'static, Result<String, tagscan_api::Error>> {
            Box::pin(future::ready(Ok("saved".to_owned())))
        }
    }

    struct DownUplink;

    impl TagUplink for DownUplink {
        fn send_reading(
            &self,
            _reading: TagReading,
        ) -> BoxFuture<'static, Result<String, tagscan_api::Error>> {
            Box::pin(future::ready(Err(tagscan_api::Error::Status {
                status: 503,
                message: "backend down".into(),
            })))
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        starts: AtomicUsize,
        stops: AtomicUsize,
        notices: StdMutex<Vec<Notice>>,
    }

    impl RecordingObserver {
        fn notices(&self) -> Vec<Notice> {
            self.notices.lock().unwrap().clone()
        }
    }

    impl SessionObserver for RecordingObserver {
        fn on_session_start(&self) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_session_stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
        fn on_notice(&self, notice: &Notice) {
            self.notices.lock().unwrap().push(notice.clone());
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn test_config() -> SessionConfig {
        SessionConfig {
            poll_interval: Duration::from_millis(2),
            stop_grace: Duration::from_millis(500),
            ..SessionConfig::default()
        }
    }

    fn controller_with(
        config: SessionConfig,
        driver: &Arc<FakeDriver>,
        uplink: Arc<dyn TagUplink>,
    ) -> (SessionController, Arc<RecordingObserver>) {
        let observer = Arc::new(RecordingObserver::default());
        let ctrl = SessionController::new(
            config,
            Arc::clone(driver) as Arc<dyn ReaderDriver>,
            uplink,
            Arc::clone(&observer) as Arc<dyn SessionObserver>,
        )
        .unwrap();
        (ctrl, observer)
    }

    fn controller(driver: &Arc<FakeDriver>) -> (SessionController, Arc<RecordingObserver>) {
        controller_with(test_config(), driver, Arc::new(OkUplink))
    }

    async fn eventually(what: &str, cond: impl Fn() -> bool) {
        for _ in 0..400 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {what}");
    }

    fn tag() -> Epc {
        Epc::parse("E2801170AAAA").unwrap()
    }

    // ── Capability check ─────────────────────────────────────────────

    #[tokio::test(flavor = "multi_thread")]
    async fn unsupported_model_never_acquires() {
        let driver = FakeDriver::new();
        driver.supported.store(false, Ordering::SeqCst);
        let (ctrl, observer) = controller(&driver);

        let err = ctrl.start().await.unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedDevice { ref model } if model == "C72E"));
        assert_eq!(ctrl.state(), SessionState::Unsupported);
        assert_eq!(driver.acquires.load(Ordering::SeqCst), 0);
        assert_eq!(
            observer.notices(),
            vec![Notice::UnsupportedDevice {
                model: "C72E".into()
            }]
        );

        // Sticky: even once the driver would accept it.
        driver.supported.store(true, Ordering::SeqCst);
        assert!(ctrl.start().await.is_err());
        assert_eq!(driver.acquires.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn recheck_support_allows_retry() {
        let driver = FakeDriver::new();
        driver.supported.store(false, Ordering::SeqCst);
        let (ctrl, _observer) = controller(&driver);
        assert!(ctrl.start().await.is_err());

        driver.supported.store(true, Ordering::SeqCst);
        let state = ctrl.recheck_support(Some("C72E-Pro".into())).await;
        assert_eq!(state, SessionState::Idle);

        ctrl.start().await.unwrap();
        assert_eq!(ctrl.state(), SessionState::Scanning);
        ctrl.destroy().await;
    }

    // ── Start / stop ─────────────────────────────────────────────────

    #[tokio::test(flavor = "multi_thread")]
    async fn start_configures_max_power_and_scans() {
        let driver = FakeDriver::new();
        let (ctrl, observer) = controller(&driver);

        ctrl.start().await.unwrap();
        assert_eq!(ctrl.state(), SessionState::Scanning);
        assert_eq!(driver.handle.power.load(Ordering::SeqCst), 27);
        assert_eq!(observer.starts.load(Ordering::SeqCst), 1);
        assert_eq!(observer.notices(), vec![Notice::ReaderReady { power: 27 }]);

        ctrl.destroy().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn configured_power_is_clamped_to_maximum() {
        let driver = FakeDriver::new();
        let config = SessionConfig {
            tx_power: Some(40),
            ..test_config()
        };
        let (ctrl, _observer) = controller_with(config, &driver, Arc::new(OkUplink));

        ctrl.start().await.unwrap();
        assert_eq!(driver.handle.power.load(Ordering::SeqCst), 27);
        ctrl.destroy().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_returns_to_idle_and_releases_once() {
        let driver = FakeDriver::new();
        let (ctrl, observer) = controller(&driver);
        ctrl.start().await.unwrap();

        let began = std::time::Instant::now();
        assert_eq!(ctrl.stop().await, StopOutcome::Stopped);
        assert!(began.elapsed() < ctrl.config().stop_grace);

        assert_eq!(ctrl.state(), SessionState::Idle);
        assert_eq!(driver.handle.releases.load(Ordering::SeqCst), 1);
        assert_eq!(driver.handle.stops.load(Ordering::SeqCst), 1);
        assert_eq!(observer.stops.load(Ordering::SeqCst), 1);

        // A second stop does nothing.
        assert_eq!(ctrl.stop().await, StopOutcome::NotRunning);
        assert_eq!(driver.handle.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_while_idle_is_noop() {
        let driver = FakeDriver::new();
        let (ctrl, observer) = controller(&driver);

        assert_eq!(ctrl.stop().await, StopOutcome::NotRunning);
        assert_eq!(ctrl.state(), SessionState::Idle);
        assert_eq!(observer.stops.load(Ordering::SeqCst), 0);
        assert_eq!(driver.handle.releases.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reentrant_start_is_noop() {
        let driver = FakeDriver::new();
        let (ctrl, observer) = controller(&driver);

        ctrl.start().await.unwrap();
        ctrl.start().await.unwrap();
        assert_eq!(driver.acquires.load(Ordering::SeqCst), 1);
        assert_eq!(observer.starts.load(Ordering::SeqCst), 1);

        ctrl.destroy().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn restart_clears_cache() {
        let driver = FakeDriver::new();
        let (ctrl, _observer) = controller(&driver);

        driver.handle.emit.store(true, Ordering::SeqCst);
        ctrl.start().await.unwrap();
        let cache = Arc::clone(ctrl.cache());
        eventually("first sighting", || !cache.is_empty()).await;
        ctrl.stop().await;

        // Stopping keeps what was seen.
        assert_eq!(cache.len(), 1);

        driver.handle.emit.store(false, Ordering::SeqCst);
        ctrl.start().await.unwrap();
        assert!(cache.is_empty());
        ctrl.destroy().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_tolerates_unresponsive_loop() {
        let driver = FakeDriver::new();
        let config = SessionConfig {
            stop_grace: Duration::from_millis(30),
            ..test_config()
        };
        let (ctrl, _observer) = controller_with(config, &driver, Arc::new(OkUplink));

        driver.handle.stall.store(true, Ordering::SeqCst);
        ctrl.start().await.unwrap();
        // Let the loop enter a stalled poll.
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(ctrl.stop().await, StopOutcome::TimedOut);
        assert_eq!(ctrl.state(), SessionState::Idle);
        assert_eq!(driver.handle.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn timed_out_loop_never_touches_next_session() {
        let driver = FakeDriver::new();
        let config = SessionConfig {
            stop_grace: Duration::from_millis(30),
            ..test_config()
        };
        let (ctrl, observer) = controller_with(config, &driver, Arc::new(OkUplink));

        driver.handle.stall.store(true, Ordering::SeqCst);
        ctrl.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ctrl.stop().await, StopOutcome::TimedOut);

        // The stalled poll of the first loop wakes while the second session
        // is already running and hands back a sighting.
        ctrl.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(ctrl.cache().is_empty());
        assert!(
            !observer
                .notices()
                .iter()
                .any(|n| matches!(n, Notice::NewTag { .. }))
        );
        assert_eq!(ctrl.reporter().stats().dispatched, 0);
        // The detached loop skipped its own stop; only the live one stops.
        assert_eq!(driver.handle.stops.load(Ordering::SeqCst), 0);
        assert_eq!(ctrl.state(), SessionState::Scanning);

        ctrl.destroy().await;
        assert_eq!(driver.handle.stops.load(Ordering::SeqCst), 1);
        assert_eq!(driver.handle.releases.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropping_scanning_controller_releases_reader() {
        let driver = FakeDriver::new();
        let (ctrl, observer) = controller(&driver);
        ctrl.start().await.unwrap();
        let twin = ctrl.clone();

        drop(ctrl);
        tokio::time::sleep(Duration::from_millis(50)).await;
        // A surviving clone keeps the session alive.
        assert_eq!(driver.handle.releases.load(Ordering::SeqCst), 0);
        assert_eq!(twin.state(), SessionState::Scanning);

        drop(twin);
        eventually("release after drop", || {
            driver.handle.releases.load(Ordering::SeqCst) == 1
        })
        .await;
        eventually("loop stop after drop", || {
            driver.handle.stops.load(Ordering::SeqCst) == 1
        })
        .await;

        // Exactly once, and without the controller's stop hook.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(driver.handle.releases.load(Ordering::SeqCst), 1);
        assert_eq!(observer.stops.load(Ordering::SeqCst), 0);
    }

    // ── Failures ─────────────────────────────────────────────────────

    #[tokio::test(flavor = "multi_thread")]
    async fn acquisition_failure_is_retryable() {
        let driver = FakeDriver::new();
        driver.fail_acquires.store(1, Ordering::SeqCst);
        let (ctrl, observer) = controller(&driver);

        let err = ctrl.start().await.unwrap_err();
        assert!(matches!(err, CoreError::AcquisitionFailed { .. }));
        assert!(err.is_retryable());
        assert_eq!(ctrl.state(), SessionState::Failed);
        assert!(matches!(
            observer.notices().first(),
            Some(Notice::ReaderFailed { reason }) if reason.contains("reader busy")
        ));

        ctrl.start().await.unwrap();
        assert_eq!(ctrl.state(), SessionState::Scanning);
        ctrl.destroy().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn configuration_failure_releases_partial_handle() {
        let driver = FakeDriver::new();
        driver.handle.fail_configure.store(true, Ordering::SeqCst);
        let (ctrl, _observer) = controller(&driver);

        let err = ctrl.start().await.unwrap_err();
        assert!(matches!(err, CoreError::ConfigurationFailed { .. }));
        assert_eq!(ctrl.state(), SessionState::Failed);
        assert_eq!(driver.handle.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn refused_read_start_fails_session() {
        let driver = FakeDriver::new();
        driver.handle.refuse_start.store(true, Ordering::SeqCst);
        let (ctrl, _observer) = controller(&driver);

        assert!(matches!(
            ctrl.start().await.unwrap_err(),
            CoreError::ReadRefused
        ));
        assert_eq!(ctrl.state(), SessionState::Failed);
        assert_eq!(driver.handle.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reader_fault_moves_to_failed_and_releases() {
        let driver = FakeDriver::new();
        let (ctrl, observer) = controller(&driver);
        ctrl.start().await.unwrap();

        let mut states = ctrl.subscribe_state();
        driver.handle.fault.store(true, Ordering::SeqCst);
        tokio::time::timeout(
            Duration::from_secs(2),
            states.wait_for(|s| *s == SessionState::Failed),
        )
        .await
        .unwrap()
        .unwrap();

        eventually("release after fault", || {
            driver.handle.releases.load(Ordering::SeqCst) == 1
        })
        .await;
        eventually("stop hook after fault", || {
            observer.stops.load(Ordering::SeqCst) == 1
        })
        .await;
        assert!(
            observer
                .notices()
                .iter()
                .any(|n| matches!(n, Notice::ScanAborted { .. }))
        );

        // A new start recovers from Failed.
        driver.handle.fault.store(false, Ordering::SeqCst);
        ctrl.start().await.unwrap();
        assert_eq!(ctrl.state(), SessionState::Scanning);
        ctrl.destroy().await;
        assert_eq!(driver.handle.releases.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reporting_failure_leaves_session_untouched() {
        let driver = FakeDriver::new();
        let (ctrl, _observer) = controller_with(test_config(), &driver, Arc::new(DownUplink));

        driver.handle.emit.store(true, Ordering::SeqCst);
        ctrl.start().await.unwrap();
        let reporter = ctrl.reporter().clone();
        eventually("failed report", || reporter.stats().failed >= 1).await;

        assert_eq!(ctrl.state(), SessionState::Scanning);
        let presence: TagPresence = ctrl.cache().get(&tag()).unwrap();
        assert!(presence.count >= 1);

        ctrl.destroy().await;
    }

    // ── Host events ──────────────────────────────────────────────────

    #[tokio::test(flavor = "multi_thread")]
    async fn host_events_drive_lifecycle() {
        let driver = FakeDriver::new();
        let (ctrl, _observer) = controller(&driver);

        ctrl.on_host_event(HostEvent::Resume).await.unwrap();
        assert_eq!(ctrl.state(), SessionState::Scanning);

        ctrl.on_host_event(HostEvent::Pause).await.unwrap();
        assert_eq!(ctrl.state(), SessionState::Idle);

        ctrl.on_host_event(HostEvent::Resume).await.unwrap();
        ctrl.on_host_event(HostEvent::Destroy).await.unwrap();
        assert_eq!(ctrl.state(), SessionState::Idle);
        assert_eq!(driver.handle.releases.load(Ordering::SeqCst), 2);

        let err = ctrl.on_host_event(HostEvent::Resume).await.unwrap_err();
        assert!(matches!(err, CoreError::Destroyed));
        assert_eq!(driver.acquires.load(Ordering::SeqCst), 2);
    }
}
