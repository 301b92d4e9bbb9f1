// SPDX-License-Identifier: GPL-3.0-only

//! Scanner session controller
//!
//! The controller is the only owner of the camera. Both backends live in a
//! single slot behind an async mutex, and every transition holds that mutex
//! for its whole stop → gate → start sequence, so two pipelines are never
//! live at the same time.
//!
//! ```text
//! intent ──► advance guard ──► lock slot ──► stop previous
//!                                              │
//!             ┌────────────────────────────────┘
//!             ▼
//!       permission ──► license (if required) ──► subscribe ──► start
//!             │               │                                  │
//!             └─ token stale? ┴──────── discard, stop again ◄────┘
//! ```
//!
//! Decode events are tagged with the generation of the transition that
//! attached the listener and funnelled through one pump task. Events from
//! an older generation are dropped.

mod guard;
mod state;

pub use guard::{SessionToken, StaleGuard};
pub use state::{SessionMode, SessionSnapshot, SessionState, Transition};

use crate::backends::{BackendKind, DecodeResult, ResultSink, ScannerBackend, Subscription};
use crate::constants::PERMISSION_DENIED_MESSAGE;
use crate::errors::{ScanError, ScanResult};
use crate::license::LicenseActivator;
use crate::permissions::{PermissionGate, PermissionStatus};
use futures::Stream;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Capacity of the surfaced-result broadcast
const RESULT_CHANNEL_CAPACITY: usize = 32;

/// Decode result tagged with the session that produced it
#[derive(Debug)]
struct DecodeEvent {
    generation: u64,
    backend: BackendKind,
    result: DecodeResult,
}

/// The native camera resource: registered backends plus what is live
struct CameraSlot {
    backends: HashMap<BackendKind, Box<dyn ScannerBackend>>,
    active: Option<BackendKind>,
    subscription: Option<Subscription>,
}

impl CameraSlot {
    /// Stop the live backend and detach its listener
    async fn teardown(&mut self) {
        if let Some(kind) = self.active.take() {
            if let Some(backend) = self.backends.get_mut(&kind) {
                backend.stop().await;
            }
        }
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }

    /// Backends currently reporting an acquired camera
    fn live(&self) -> Vec<BackendKind> {
        self.backends
            .values()
            .filter(|backend| backend.is_active())
            .map(|backend| backend.kind())
            .collect()
    }
}

struct Inner {
    id: Uuid,
    mode: SessionMode,
    gate: PermissionGate,
    licenses: Arc<LicenseActivator>,
    guard: StaleGuard,
    camera: tokio::sync::Mutex<CameraSlot>,
    /// Starts entered but not yet finished
    starting: AtomicUsize,
    view: watch::Sender<SessionSnapshot>,
    results: broadcast::Sender<DecodeResult>,
    events: Mutex<Option<mpsc::UnboundedSender<DecodeEvent>>>,
}

/// Orchestrates permission, license and backend lifecycle for one screen
pub struct SessionController {
    inner: Arc<Inner>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl SessionController {
    /// Create a controller over `backends`, one per [`BackendKind`]
    ///
    /// Nothing is started until [`mount`](Self::mount).
    pub fn new(
        mode: SessionMode,
        selected: BackendKind,
        gate: PermissionGate,
        licenses: Arc<LicenseActivator>,
        backends: Vec<Box<dyn ScannerBackend>>,
    ) -> Self {
        let id = Uuid::new_v4();
        let backends: HashMap<BackendKind, Box<dyn ScannerBackend>> = backends
            .into_iter()
            .map(|backend| (backend.kind(), backend))
            .collect();
        info!(session = %id, %mode, %selected, backends = backends.len(), "Creating scanner session");

        let (view, _) = watch::channel(SessionSnapshot::new(mode, selected));
        let (results, _) = broadcast::channel(RESULT_CHANNEL_CAPACITY);

        let inner = Inner {
            id,
            mode,
            gate,
            licenses,
            guard: StaleGuard::new(),
            camera: tokio::sync::Mutex::new(CameraSlot {
                backends,
                active: None,
                subscription: None,
            }),
            starting: AtomicUsize::new(0),
            view,
            results,
            events: Mutex::new(None),
        };

        Self {
            inner: Arc::new(inner),
            pump: Mutex::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn mode(&self) -> SessionMode {
        self.inner.mode
    }

    /// Current view state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.view.borrow().clone()
    }

    /// Receiver notified on every view state change
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.view.subscribe()
    }

    /// Stream of every surfaced decode text
    pub fn results(&self) -> impl Stream<Item = String> + Send + 'static {
        let mut rx = self.inner.results.subscribe();
        async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(result) => yield result.text,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Result stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    /// Backends currently holding the camera
    pub async fn live_backends(&self) -> Vec<BackendKind> {
        self.inner.camera.lock().await.live()
    }

    /// Enter the screen: resolve permission and, in continuous mode, start
    /// the selected backend
    ///
    /// Permission denial is not an error here; it shows up as the blocking
    /// message in the snapshot. Calling mount twice is a no-op.
    pub async fn mount(&self) -> ScanResult<PermissionStatus> {
        if self.inner.guard.is_mounted() {
            debug!(session = %self.inner.id, "Already mounted");
            return match self.snapshot().permission {
                Some(status) => Ok(status),
                None => Ok(self.inner.gate.check_and_request().await),
            };
        }

        self.inner.guard.mount();
        self.spawn_pump();
        info!(session = %self.inner.id, mode = %self.inner.mode, "Mounting scanner session");

        let status = self.inner.gate.check_and_request().await;
        if !self.inner.guard.is_mounted() {
            debug!(session = %self.inner.id, "Unmounted during permission check");
            return Ok(status);
        }
        self.inner.record_permission(status);
        self.inner.publish(|s| s.mounted = true);

        if self.inner.mode == SessionMode::Continuous && status.is_ready() {
            let selected = self.snapshot().selected;
            self.inner.run_start(selected).await?;
        }
        Ok(status)
    }

    /// Leave the screen: stop everything, whatever state the session is in
    pub async fn unmount(&self) {
        if !self.inner.guard.is_mounted() {
            return;
        }
        info!(session = %self.inner.id, "Unmounting scanner session");
        self.inner.guard.unmount();

        {
            let mut slot = self.inner.camera.lock().await;
            slot.teardown().await;
        }

        if let Ok(mut events) = self.inner.events.lock() {
            events.take();
        }
        if let Some(pump) = self.pump.lock().ok().and_then(|mut p| p.take()) {
            pump.abort();
        }

        self.inner.publish(|s| {
            s.mounted = false;
            s.state = SessionState::Idle;
            s.active = None;
        });
    }

    /// Begin scanning with the selected backend
    ///
    /// From `Result` this clears the shown result first. While already
    /// scanning it does nothing.
    pub async fn start(&self) -> ScanResult<Transition> {
        self.inner.ensure_mounted()?;

        let snapshot = self.snapshot();
        if snapshot.state.is_scanning() {
            debug!(session = %self.inner.id, "Start ignored; already scanning");
            return Ok(Transition::Applied);
        }
        if snapshot.state == SessionState::Result {
            self.reset();
        }
        self.inner.run_start(snapshot.selected).await
    }

    /// Stop scanning and return to `Idle`; safe in any state
    pub async fn cancel(&self) -> Transition {
        let token = self.inner.guard.advance();
        let mut slot = self.inner.camera.lock().await;
        if !token.is_current() {
            return Transition::Superseded;
        }
        info!(session = %self.inner.id, "Cancelling scan");
        slot.teardown().await;

        self.inner.publish(|s| {
            if s.state.is_scanning() {
                s.state = SessionState::Idle;
            }
            s.active = None;
        });
        Transition::Applied
    }

    /// Clear the shown result; `Result` returns to `Idle`
    pub fn reset(&self) {
        self.inner.publish(|s| {
            s.result = None;
            if s.state == SessionState::Result {
                s.state = SessionState::Idle;
            }
        });
    }

    /// Change the selected backend
    ///
    /// A live session is torn down and restarted on the new backend. In
    /// continuous mode the shown result is cleared.
    pub async fn select_backend(&self, kind: BackendKind) -> ScanResult<Transition> {
        let snapshot = self.snapshot();
        let pending = snapshot.state.is_scanning() || self.inner.is_starting();
        if snapshot.selected == kind && (pending || !snapshot.mounted) {
            return Ok(Transition::Applied);
        }

        info!(session = %self.inner.id, from = %snapshot.selected, to = %kind, "Selecting backend");
        let continuous = self.inner.mode == SessionMode::Continuous;
        let restart = snapshot.mounted && (continuous || pending);

        // Supersede pending work before the result is cleared
        let token = restart.then(|| self.inner.guard.advance());
        self.inner.publish(|s| {
            s.selected = kind;
            if continuous {
                s.result = None;
            }
        });

        match token {
            Some(token) => self.inner.transition(kind, token).await,
            None => Ok(Transition::Applied),
        }
    }

    fn spawn_pump(&self) {
        let (tx, mut rx) = mpsc::unbounded_channel::<DecodeEvent>();
        if let Ok(mut events) = self.inner.events.lock() {
            *events = Some(tx);
        }

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                inner.on_decode(event).await;
            }
            debug!(session = %inner.id, "Decode pump finished");
        });

        if let Ok(mut pump) = self.pump.lock() {
            if let Some(previous) = pump.replace(handle) {
                previous.abort();
            }
        }
    }
}

impl Inner {
    fn publish(&self, update: impl FnOnce(&mut SessionSnapshot)) {
        self.view.send_modify(update);
    }

    fn ensure_mounted(&self) -> ScanResult<()> {
        if self.guard.is_mounted() {
            Ok(())
        } else {
            Err(ScanError::NotMounted)
        }
    }

    fn permission_ready(&self) -> bool {
        self.view
            .borrow()
            .permission
            .is_some_and(|status| status.is_ready())
    }

    fn record_permission(&self, status: PermissionStatus) {
        self.publish(|s| {
            s.permission = Some(status);
            s.blocking_message = if status.is_ready() {
                None
            } else {
                Some(PERMISSION_DENIED_MESSAGE.to_string())
            };
        });
    }

    fn is_starting(&self) -> bool {
        self.starting.load(Ordering::Acquire) > 0
    }

    /// Stop whatever is live and start `kind` under a fresh token
    async fn run_start(&self, kind: BackendKind) -> ScanResult<Transition> {
        let token = self.guard.advance();
        self.transition(kind, token).await
    }

    async fn transition(&self, kind: BackendKind, token: SessionToken) -> ScanResult<Transition> {
        let _starting = StartingGuard::enter(&self.starting);
        let mut slot = self.camera.lock().await;
        if !token.is_current() {
            debug!(session = %self.id, backend = %kind, "Start superseded before it began");
            return Ok(Transition::Superseded);
        }
        slot.teardown().await;

        match self.launch(&mut slot, kind, &token).await {
            Ok(Transition::Applied) => {
                info!(session = %self.id, backend = %kind, "Scanning");
                self.publish(|s| {
                    s.state = SessionState::Scanning { backend: kind };
                    s.active = Some(kind);
                    s.last_error = None;
                });
                Ok(Transition::Applied)
            }
            Ok(Transition::Superseded) => {
                debug!(session = %self.id, backend = %kind, "Discarding stale start");
                slot.teardown().await;
                Ok(Transition::Superseded)
            }
            Err(e) => {
                warn!(session = %self.id, backend = %kind, error = %e, "Failed to start backend");
                slot.teardown().await;
                if token.is_current() {
                    let message = e.to_string();
                    self.publish(|s| {
                        s.state = SessionState::Idle;
                        s.active = None;
                        s.last_error = Some(message);
                    });
                }
                Err(e)
            }
        }
    }

    /// Permission → license → subscribe → start, checking the token after
    /// every suspension point
    async fn launch(
        &self,
        slot: &mut CameraSlot,
        kind: BackendKind,
        token: &SessionToken,
    ) -> ScanResult<Transition> {
        // Denial is only re-evaluated by a fresh mount
        if self.view.borrow().is_blocked() {
            return Err(ScanError::PermissionDenied);
        }
        let ready = match self.mode {
            SessionMode::Continuous => {
                let status = self.gate.check_and_request().await;
                if !token.is_current() {
                    return Ok(Transition::Superseded);
                }
                self.record_permission(status);
                status.is_ready()
            }
            // validated once at mount
            SessionMode::Explicit => self.permission_ready(),
        };
        if !ready {
            return Err(ScanError::PermissionDenied);
        }

        let sink = self.sink(kind, token)?;
        let backend = slot
            .backends
            .get_mut(&kind)
            .ok_or(ScanError::Unavailable(kind))?;

        if backend.requires_license() {
            self.licenses.ensure_activated().await?;
            if !token.is_current() {
                return Ok(Transition::Superseded);
            }
        }

        if let Some(subscription) = backend.subscribe(sink) {
            slot.subscription = Some(subscription);
        }
        slot.active = Some(kind);
        backend.start().await?;

        if token.is_current() {
            Ok(Transition::Applied)
        } else {
            Ok(Transition::Superseded)
        }
    }

    fn sink(&self, backend: BackendKind, token: &SessionToken) -> ScanResult<ResultSink> {
        let tx = self
            .events
            .lock()
            .ok()
            .and_then(|events| events.clone())
            .ok_or(ScanError::NotMounted)?;
        let generation = token.generation();

        Ok(Arc::new(move |result: DecodeResult| {
            // The pump is gone once unmounted; nothing to deliver to
            let _ = tx.send(DecodeEvent {
                generation,
                backend,
                result,
            });
        }))
    }

    async fn on_decode(&self, event: DecodeEvent) {
        if !event.result.is_displayable() {
            return;
        }
        let current = self.guard.current();
        if event.generation != current.generation() || !current.is_current() {
            debug!(
                session = %self.id,
                backend = %event.backend,
                generation = event.generation,
                "Discarding decode from superseded session"
            );
            return;
        }

        match self.mode {
            SessionMode::Continuous => {
                if self.surface(event.result, None, &current) {
                    info!(session = %self.id, backend = %event.backend, "Decoded");
                }
            }
            SessionMode::Explicit => {
                // First success ends the session; later events become stale
                let token = self.guard.advance();
                let mut slot = self.camera.lock().await;
                if !token.is_current() {
                    return;
                }
                slot.teardown().await;
                if self.surface(event.result, Some(SessionState::Result), &token) {
                    info!(session = %self.id, backend = %event.backend, "Decoded; session complete");
                }
            }
        }
    }

    /// Publish `result` unless `token` went stale; returns whether it was shown
    fn surface(
        &self,
        result: DecodeResult,
        state: Option<SessionState>,
        token: &SessionToken,
    ) -> bool {
        let text = result.text.clone();
        // Checked under the view lock so a concurrent switch cannot be overwritten
        let surfaced = self.view.send_if_modified(|s| {
            if !token.is_current() {
                return false;
            }
            s.result = Some(text);
            if let Some(state) = state {
                s.state = state;
                s.active = None;
            }
            true
        });
        if surfaced {
            // No subscribers is fine
            let _ = self.results.send(result);
        }
        surfaced
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.get_mut().ok().and_then(|p| p.take()) {
            pump.abort();
        }
        if !self.inner.guard.is_mounted() {
            return;
        }

        warn!(session = %self.inner.id, "Scanner session dropped while mounted; releasing camera");
        self.inner.guard.unmount();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                handle.spawn(async move {
                    inner.camera.lock().await.teardown().await;
                    debug!(session = %inner.id, "Released camera of dropped session");
                });
            }
            Err(_) => {
                warn!(session = %self.inner.id, "No runtime to release the camera on");
            }
        }
    }
}

/// Counts a start as in flight until dropped
struct StartingGuard<'a>(&'a AtomicUsize);

impl<'a> StartingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for StartingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("id", &self.inner.id)
            .field("mode", &self.inner.mode)
            .field("snapshot", &*self.inner.view.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::sdk::{SdkBarcodeResult, SdkStatus};
    use crate::backends::simulated::{CallLog, SimulatedPermissions, SimulatedSdk, SimulatedStream};
    use crate::backends::{SdkBackend, StreamBackend};
    use crate::license::LicenseContext;
    use crate::permissions::Platform;
    use futures::StreamExt;
    use std::time::Duration;

    struct Rig {
        controller: SessionController,
        sdk: Arc<SimulatedSdk>,
        stream: Arc<SimulatedStream>,
        log: CallLog,
    }

    fn rig(mode: SessionMode, selected: BackendKind, key: Option<&str>) -> Rig {
        let log = CallLog::default();
        let sdk = Arc::new(SimulatedSdk::new("a", log.clone()));
        let stream = Arc::new(SimulatedStream::new("b", log.clone()));
        let perms = Arc::new(SimulatedPermissions::granting());
        let gate = PermissionGate::new(Platform::Android, perms.clone(), perms);
        let licenses = Arc::new(LicenseActivator::new(
            LicenseContext::new("acme", key.map(str::to_string)),
            sdk.clone(),
        ));
        let controller = SessionController::new(
            mode,
            selected,
            gate,
            licenses,
            vec![
                Box::new(SdkBackend::new(sdk.clone())),
                Box::new(StreamBackend::new(stream.clone())),
            ],
        );
        Rig {
            controller,
            sdk,
            stream,
            log,
        }
    }

    async fn wait_for(
        controller: &SessionController,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        let mut rx = controller.watch();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate))
            .await
            .expect("timed out waiting for snapshot")
            .expect("controller dropped")
            .clone()
    }

    #[tokio::test]
    async fn test_intents_before_mount() {
        let rig = rig(SessionMode::Explicit, BackendKind::EngineA, Some("KEY"));
        assert_eq!(rig.controller.start().await, Err(ScanError::NotMounted));
        assert_eq!(rig.controller.cancel().await, Transition::Superseded);
        assert!(rig.log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_explicit_first_result_wins() {
        let rig = rig(SessionMode::Explicit, BackendKind::EngineA, Some("KEY"));
        rig.controller.mount().await.unwrap();
        assert_eq!(rig.controller.start().await, Ok(Transition::Applied));

        rig.sdk.emit(vec![SdkBarcodeResult::success("ABC123")]);
        rig.sdk.emit(vec![SdkBarcodeResult::success("LATER")]);

        let snapshot = wait_for(&rig.controller, |s| s.state == SessionState::Result).await;
        assert_eq!(snapshot.result.as_deref(), Some("ABC123"));
        assert_eq!(snapshot.active, None);
        assert!(!rig.sdk.is_camera_open());
        assert_eq!(rig.sdk.listener_count(), 0);

        rig.controller.reset();
        let snapshot = rig.controller.snapshot();
        assert_eq!(snapshot.state, SessionState::Idle);
        assert_eq!(snapshot.result, None);
    }

    #[tokio::test]
    async fn test_failure_status_changes_nothing() {
        let rig = rig(SessionMode::Continuous, BackendKind::EngineA, Some("KEY"));
        rig.controller.mount().await.unwrap();

        rig.sdk.emit(vec![SdkBarcodeResult::with_status(SdkStatus::Timeout)]);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let snapshot = rig.controller.snapshot();
        assert_eq!(snapshot.result, None);
        assert_eq!(
            snapshot.state,
            SessionState::Scanning {
                backend: BackendKind::EngineA
            }
        );
        rig.controller.unmount().await;
    }

    #[tokio::test]
    async fn test_cancel_returns_to_idle() {
        let rig = rig(SessionMode::Explicit, BackendKind::EngineB, None);
        rig.controller.mount().await.unwrap();
        rig.controller.start().await.unwrap();
        assert!(rig.stream.is_mounted());

        assert_eq!(rig.controller.cancel().await, Transition::Applied);
        assert!(!rig.stream.is_mounted());
        assert_eq!(rig.controller.snapshot().state, SessionState::Idle);

        // Cancelling again is harmless
        assert_eq!(rig.controller.cancel().await, Transition::Applied);
        assert_eq!(rig.log.count("b.unmount"), 1);
    }

    #[tokio::test]
    async fn test_engine_b_needs_no_license() {
        let rig = rig(SessionMode::Explicit, BackendKind::EngineB, None);
        rig.controller.mount().await.unwrap();
        assert_eq!(rig.controller.start().await, Ok(Transition::Applied));
        assert_eq!(rig.sdk.activation_calls(), 0);
        rig.controller.unmount().await;
    }

    #[tokio::test]
    async fn test_cancel_during_start_supersedes_it() {
        let rig = rig(SessionMode::Explicit, BackendKind::EngineA, Some("KEY"));
        rig.controller.mount().await.unwrap();
        rig.sdk.set_delay(Duration::from_millis(30));

        let (start, cancel) = tokio::join!(rig.controller.start(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            rig.controller.cancel().await
        });

        assert_eq!(start, Ok(Transition::Superseded));
        assert_eq!(cancel, Transition::Applied);
        assert_eq!(rig.controller.snapshot().state, SessionState::Idle);
        assert_eq!(rig.log.count("a.start_camera"), 0);
        assert_eq!(rig.log.peak_cameras(), 0);
    }

    #[tokio::test]
    async fn test_select_during_start_restarts_on_new_backend() {
        let rig = rig(SessionMode::Explicit, BackendKind::EngineA, Some("KEY"));
        rig.controller.mount().await.unwrap();
        rig.sdk.set_delay(Duration::from_millis(20));

        let (start, select) = tokio::join!(rig.controller.start(), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            rig.controller.select_backend(BackendKind::EngineB).await
        });

        assert_eq!(start, Ok(Transition::Superseded));
        assert_eq!(select, Ok(Transition::Applied));
        let snapshot = rig.controller.snapshot();
        assert_eq!(snapshot.selected, BackendKind::EngineB);
        assert_eq!(
            snapshot.state,
            SessionState::Scanning {
                backend: BackendKind::EngineB
            }
        );
        assert_eq!(snapshot.active, Some(BackendKind::EngineB));
        assert_eq!(rig.log.count("b.mount"), 1);
        assert!(!rig.sdk.is_camera_open());
        assert!(rig.log.peak_cameras() <= 1);
        rig.controller.unmount().await;
    }

    #[tokio::test]
    async fn test_select_while_idle_only_changes_selection() {
        let rig = rig(SessionMode::Explicit, BackendKind::EngineA, Some("KEY"));
        rig.controller.mount().await.unwrap();

        assert_eq!(
            rig.controller.select_backend(BackendKind::EngineB).await,
            Ok(Transition::Applied)
        );
        let snapshot = rig.controller.snapshot();
        assert_eq!(snapshot.selected, BackendKind::EngineB);
        assert_eq!(snapshot.state, SessionState::Idle);
        assert!(rig.log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_stale_decode_is_not_surfaced() {
        let rig = rig(SessionMode::Continuous, BackendKind::EngineB, None);
        rig.controller.mount().await.unwrap();
        let mut results = Box::pin(rig.controller.results());

        let token = rig.controller.inner.guard.current();
        rig.controller.inner.guard.advance();
        let surfaced = rig
            .controller
            .inner
            .surface(DecodeResult::success("LATE"), None, &token);

        assert!(!surfaced);
        assert_eq!(rig.controller.snapshot().result, None);

        let current = rig.controller.inner.guard.current();
        assert!(
            rig.controller
                .inner
                .surface(DecodeResult::success("FRESH"), None, &current)
        );
        let next = tokio::time::timeout(Duration::from_secs(1), results.next()).await;
        assert_eq!(next.unwrap().as_deref(), Some("FRESH"));
        rig.controller.unmount().await;
    }

    #[tokio::test]
    async fn test_drop_while_mounted_releases_camera() {
        let Rig {
            controller,
            sdk,
            log,
            ..
        } = rig(SessionMode::Continuous, BackendKind::EngineA, Some("KEY"));
        controller.mount().await.unwrap();
        assert_eq!(log.live_cameras(), 1);

        drop(controller);
        for _ in 0..100 {
            if log.live_cameras() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        assert_eq!(log.live_cameras(), 0);
        assert!(!sdk.is_camera_open());
        assert_eq!(sdk.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_unmount_tears_down_and_drops_late_events() {
        let rig = rig(SessionMode::Continuous, BackendKind::EngineB, None);
        rig.controller.mount().await.unwrap();
        assert!(rig.stream.is_mounted());

        rig.controller.unmount().await;
        assert!(!rig.stream.is_mounted());
        let snapshot = rig.controller.snapshot();
        assert!(!snapshot.mounted);
        assert_eq!(snapshot.state, SessionState::Idle);
        assert_eq!(rig.controller.live_backends().await, vec![]);

        // Unmounting twice is a no-op
        rig.controller.unmount().await;
        assert_eq!(rig.log.count("b.unmount"), 1);
    }
}
