// SPDX-License-Identifier: GPL-3.0-only

//! In-process stand-ins for the external engines
//!
//! Every collaborator call is appended to a shared [`CallLog`] as
//! `"<engine>.<call>"`, so call order across both engines can be asserted.
//! The log also tracks how many cameras are live at once.

use super::sdk::{
    BatchListener, CodeCallback, DeviceStream, LicenseService, ListenerId, ScannedCode,
    ScannerSdk, SdkBarcodeResult, SdkError, SdkResult, StreamConfig,
};
use crate::permissions::{FrameworkPermission, PermissionGrant, PlatformPermission};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct LogState {
    entries: Vec<String>,
    live_cameras: u32,
    peak_cameras: u32,
}

/// Ordered record of simulated engine calls
#[derive(Clone, Default)]
pub struct CallLog {
    state: Arc<Mutex<LogState>>,
}

impl CallLog {
    pub fn record(&self, entry: impl Into<String>) {
        self.state.lock().unwrap().entries.push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.state.lock().unwrap().entries.clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter(|e| *e == entry)
            .count()
    }

    /// Index of the first occurrence of `entry`
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.state.lock().unwrap().entries.iter().position(|e| e == entry)
    }

    /// Index of the last occurrence of `entry`
    pub fn last_position(&self, entry: &str) -> Option<usize> {
        self.state.lock().unwrap().entries.iter().rposition(|e| e == entry)
    }

    /// Cameras currently held across all engines sharing this log
    pub fn live_cameras(&self) -> u32 {
        self.state.lock().unwrap().live_cameras
    }

    /// Highest number of simultaneously held cameras ever observed
    pub fn peak_cameras(&self) -> u32 {
        self.state.lock().unwrap().peak_cameras
    }

    fn acquire_camera(&self) {
        let mut state = self.state.lock().unwrap();
        state.live_cameras += 1;
        state.peak_cameras = state.peak_cameras.max(state.live_cameras);
    }

    fn release_camera(&self) {
        let mut state = self.state.lock().unwrap();
        state.live_cameras = state.live_cameras.saturating_sub(1);
    }
}

impl std::fmt::Debug for CallLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries()).finish()
    }
}

/// Failure injection and latency shared by the simulated engines
struct Faults {
    failing: Mutex<HashSet<String>>,
    delay: Mutex<Duration>,
}

impl Faults {
    fn new() -> Self {
        Self {
            failing: Mutex::new(HashSet::new()),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn check(&self, call: &str) -> SdkResult<()> {
        if self.failing.lock().unwrap().contains(call) {
            Err(SdkError(format!("simulated {} failure", call)))
        } else {
            Ok(())
        }
    }
}

/// Simulated SDK-driven engine, also acting as its license endpoint
pub struct SimulatedSdk {
    name: String,
    log: CallLog,
    faults: Faults,
    camera_open: AtomicBool,
    listeners: Mutex<BTreeMap<ListenerId, BatchListener>>,
    next_listener: AtomicU64,
    activation_calls: AtomicU32,
    activation_failures: AtomicU32,
}

impl SimulatedSdk {
    pub fn new(name: impl Into<String>, log: CallLog) -> Self {
        Self {
            name: name.into(),
            log,
            faults: Faults::new(),
            camera_open: AtomicBool::new(false),
            listeners: Mutex::new(BTreeMap::new()),
            next_listener: AtomicU64::new(1),
            activation_calls: AtomicU32::new(0),
            activation_failures: AtomicU32::new(0),
        }
    }

    /// Make every subsequent `call` fail (e.g. `"start_preview"`)
    pub fn fail_on(&self, call: &str) {
        self.faults.failing.lock().unwrap().insert(call.to_string());
    }

    pub fn clear_failures(&self) {
        self.faults.failing.lock().unwrap().clear();
    }

    /// Latency added to every async call
    pub fn set_delay(&self, delay: Duration) {
        *self.faults.delay.lock().unwrap() = delay;
    }

    /// Fail the next `count` activation attempts
    pub fn fail_activations(&self, count: u32) {
        self.activation_failures.store(count, Ordering::SeqCst);
    }

    pub fn activation_calls(&self) -> u32 {
        self.activation_calls.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    pub fn is_camera_open(&self) -> bool {
        self.camera_open.load(Ordering::SeqCst)
    }

    /// Deliver a decode batch to every registered listener
    pub fn emit(&self, batch: Vec<SdkBarcodeResult>) {
        let listeners: Vec<BatchListener> =
            self.listeners.lock().unwrap().values().cloned().collect();
        for listener in listeners {
            listener(&batch);
        }
    }

    async fn call(&self, call: &str) -> SdkResult<()> {
        self.faults.pause().await;
        self.log.record(format!("{}.{}", self.name, call));
        self.faults.check(call)
    }
}

#[async_trait]
impl ScannerSdk for SimulatedSdk {
    async fn start_camera(&self) -> SdkResult<()> {
        self.call("start_camera").await?;
        if !self.camera_open.swap(true, Ordering::SeqCst) {
            self.log.acquire_camera();
        }
        Ok(())
    }

    async fn stop_camera(&self) -> SdkResult<()> {
        let result = self.call("stop_camera").await;
        if result.is_ok() && self.camera_open.swap(false, Ordering::SeqCst) {
            self.log.release_camera();
        }
        result
    }

    async fn start_preview(&self) -> SdkResult<()> {
        self.call("start_preview").await
    }

    async fn stop_preview(&self) -> SdkResult<()> {
        self.call("stop_preview").await
    }

    async fn set_capture_enabled(&self, enabled: bool) -> SdkResult<()> {
        self.call(if enabled { "capture_on" } else { "capture_off" })
            .await
    }

    async fn set_decoding_enabled(&self, enabled: bool) -> SdkResult<()> {
        self.call(if enabled { "decoding_on" } else { "decoding_off" })
            .await
    }

    fn add_listener(&self, listener: BatchListener) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().unwrap().insert(id, listener);
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.lock().unwrap().remove(&id);
    }
}

#[async_trait]
impl LicenseService for SimulatedSdk {
    async fn activate(&self, _customer_id: &str, _license_key: &str) -> SdkResult<()> {
        self.activation_calls.fetch_add(1, Ordering::SeqCst);
        self.call("activate").await?;

        let remaining = self.activation_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.activation_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SdkError::from("license server rejected activation"));
        }
        Ok(())
    }
}

/// Simulated device-stream engine
pub struct SimulatedStream {
    name: String,
    log: CallLog,
    faults: Faults,
    mounted: Mutex<Option<(StreamConfig, CodeCallback)>>,
}

impl SimulatedStream {
    pub fn new(name: impl Into<String>, log: CallLog) -> Self {
        Self {
            name: name.into(),
            log,
            faults: Faults::new(),
            mounted: Mutex::new(None),
        }
    }

    /// Make every subsequent `call` fail (`"mount"` or `"unmount"`)
    pub fn fail_on(&self, call: &str) {
        self.faults.failing.lock().unwrap().insert(call.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.faults.delay.lock().unwrap() = delay;
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.lock().unwrap().is_some()
    }

    pub fn mounted_config(&self) -> Option<StreamConfig> {
        self.mounted
            .lock()
            .unwrap()
            .as_ref()
            .map(|(config, _)| config.clone())
    }

    /// Deliver recognized codes while mounted
    ///
    /// Codes of symbologies outside the mounted config are not recognized.
    pub fn emit(&self, codes: Vec<ScannedCode>) {
        let mounted = self
            .mounted
            .lock()
            .unwrap()
            .as_ref()
            .map(|(config, callback)| (config.clone(), Arc::clone(callback)));
        let Some((config, callback)) = mounted else {
            return;
        };

        let recognized: Vec<ScannedCode> = codes
            .into_iter()
            .filter(|code| config.symbologies.contains(&code.symbology))
            .collect();
        callback(&recognized);
    }

    async fn call(&self, call: &str) -> SdkResult<()> {
        self.faults.pause().await;
        self.log.record(format!("{}.{}", self.name, call));
        self.faults.check(call)
    }
}

#[async_trait]
impl DeviceStream for SimulatedStream {
    async fn mount(&self, config: StreamConfig, on_codes: CodeCallback) -> SdkResult<()> {
        self.call("mount").await?;
        let previous = self.mounted.lock().unwrap().replace((config, on_codes));
        if previous.is_none() {
            self.log.acquire_camera();
        }
        Ok(())
    }

    async fn unmount(&self) -> SdkResult<()> {
        let result = self.call("unmount").await;
        if result.is_ok() && self.mounted.lock().unwrap().take().is_some() {
            self.log.release_camera();
        }
        result
    }
}

/// Simulated permission primitives answering every request with a fixed decision
pub struct SimulatedPermissions {
    platform_decision: bool,
    framework_decision: bool,
    platform_granted: AtomicBool,
    framework_granted: AtomicBool,
    platform_requests: AtomicU32,
    framework_requests: AtomicU32,
}

impl SimulatedPermissions {
    /// Nothing granted yet; requests resolve to the given decisions
    pub fn new(platform_decision: bool, framework_decision: bool) -> Self {
        Self {
            platform_decision,
            framework_decision,
            platform_granted: AtomicBool::new(false),
            framework_granted: AtomicBool::new(false),
            platform_requests: AtomicU32::new(0),
            framework_requests: AtomicU32::new(0),
        }
    }

    /// Grants everything when asked
    pub fn granting() -> Self {
        Self::new(true, true)
    }

    /// Denies everything when asked
    pub fn denying() -> Self {
        Self::new(false, false)
    }

    pub fn platform_requests(&self) -> u32 {
        self.platform_requests.load(Ordering::SeqCst)
    }

    pub fn framework_requests(&self) -> u32 {
        self.framework_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformPermission for SimulatedPermissions {
    async fn check(&self) -> PermissionGrant {
        grant(self.platform_granted.load(Ordering::SeqCst))
    }

    async fn request(&self) -> PermissionGrant {
        self.platform_requests.fetch_add(1, Ordering::SeqCst);
        self.platform_granted
            .store(self.platform_decision, Ordering::SeqCst);
        grant(self.platform_decision)
    }
}

#[async_trait]
impl FrameworkPermission for SimulatedPermissions {
    async fn status(&self) -> bool {
        self.framework_granted.load(Ordering::SeqCst)
    }

    async fn request(&self) -> bool {
        self.framework_requests.fetch_add(1, Ordering::SeqCst);
        self.framework_granted
            .store(self.framework_decision, Ordering::SeqCst);
        self.framework_decision
    }
}

fn grant(granted: bool) -> PermissionGrant {
    if granted {
        PermissionGrant::Granted
    } else {
        PermissionGrant::Denied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_camera_accounting_across_engines() {
        let log = CallLog::default();
        let sdk = SimulatedSdk::new("a", log.clone());
        let stream = SimulatedStream::new("b", log.clone());

        sdk.start_camera().await.unwrap();
        stream
            .mount(
                StreamConfig {
                    symbologies: vec![],
                },
                Arc::new(|_: &[ScannedCode]| {}),
            )
            .await
            .unwrap();
        assert_eq!(log.live_cameras(), 2);

        sdk.stop_camera().await.unwrap();
        stream.unmount().await.unwrap();
        assert_eq!(log.live_cameras(), 0);
        assert_eq!(log.peak_cameras(), 2);
    }

    #[tokio::test]
    async fn test_failed_call_is_still_logged() {
        let log = CallLog::default();
        let sdk = SimulatedSdk::new("a", log.clone());
        sdk.fail_on("start_camera");

        assert!(sdk.start_camera().await.is_err());
        assert!(!sdk.is_camera_open());
        assert_eq!(log.entries(), vec!["a.start_camera"]);
    }
}
