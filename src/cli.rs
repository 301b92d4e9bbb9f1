// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for driving a scanner session
//!
//! Both engines are simulated in-process, so the commands exercise the real
//! controller without camera hardware:
//! - Running a single explicit scan
//! - Running a continuous session that switches backends
//! - Printing the resolved configuration

use scan_session::backends::sdk::{ScannedCode, SdkBarcodeResult};
use scan_session::backends::simulated::{
    CallLog, SimulatedPermissions, SimulatedSdk, SimulatedStream,
};
use scan_session::backends::{SdkBackend, StreamBackend};
use scan_session::{
    BackendKind, LicenseActivator, PermissionGate, ScanError, ScannerConfig, SessionController,
    SessionMode, SessionSnapshot, SessionState,
};
use std::sync::Arc;
use std::time::Duration;

/// How long to wait for a decode to show up
const RESULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Options for [`scan_once`]
pub struct ScanOptions {
    pub backend: BackendKind,
    pub payload: String,
    pub deny_permission: bool,
    pub fail_activation: bool,
}

/// Controller wired to simulated engines
struct Harness {
    controller: SessionController,
    sdk: Arc<SimulatedSdk>,
    stream: Arc<SimulatedStream>,
    log: CallLog,
}

impl Harness {
    fn new(
        config: &ScannerConfig,
        mode: SessionMode,
        selected: BackendKind,
        deny_permission: bool,
    ) -> Self {
        let log = CallLog::default();
        let sdk = Arc::new(SimulatedSdk::new("engine-a", log.clone()));
        let stream = Arc::new(SimulatedStream::new("engine-b", log.clone()));
        let permissions = Arc::new(if deny_permission {
            SimulatedPermissions::denying()
        } else {
            SimulatedPermissions::granting()
        });

        let gate = PermissionGate::new(config.platform, permissions.clone(), permissions);
        let licenses = Arc::new(LicenseActivator::from_config(config, sdk.clone()));
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

        Self {
            controller,
            sdk,
            stream,
            log,
        }
    }

    /// Have the live engine decode `payload`
    fn decode(&self, backend: BackendKind, payload: &str) {
        match backend {
            BackendKind::EngineA => self.sdk.emit(vec![SdkBarcodeResult::success(payload)]),
            BackendKind::EngineB => self.stream.emit(vec![ScannedCode::qr(payload)]),
        }
    }

    async fn wait_until(
        &self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot, Box<dyn std::error::Error>> {
        let mut rx = self.controller.watch();
        let snapshot = tokio::time::timeout(RESULT_TIMEOUT, rx.wait_for(predicate))
            .await
            .map_err(|_| "timed out waiting for the session")??
            .clone();
        Ok(snapshot)
    }

    fn print_calls(&self) {
        println!();
        println!("Engine calls:");
        for entry in self.log.entries() {
            println!("  {}", entry);
        }
        println!("Peak simultaneous cameras: {}", self.log.peak_cameras());
    }
}

/// Run a single explicit-lifecycle scan
pub async fn scan_once(
    config: &ScannerConfig,
    options: ScanOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let harness = Harness::new(
        config,
        SessionMode::Explicit,
        options.backend,
        options.deny_permission,
    );
    if options.fail_activation {
        harness.sdk.fail_activations(1);
    }

    harness.controller.mount().await?;
    if let Some(message) = harness.controller.snapshot().blocking_message {
        println!("{}", message);
        harness.controller.unmount().await;
        return Ok(());
    }

    println!("Scanning with {}...", options.backend);
    let started = match harness.controller.start().await {
        Err(e) if e.is_retryable() => {
            println!("Start failed: {}", e);
            println!("Retrying...");
            harness.controller.start().await
        }
        other => other,
    };
    if let Err(e) = started {
        println!("Start failed: {}", e);
        if e == ScanError::License(scan_session::LicenseError::MissingCredential) {
            println!(
                "Set {} to scan with {}",
                scan_session::constants::LICENSE_KEY_ENV,
                BackendKind::EngineA
            );
        }
        harness.controller.unmount().await;
        harness.print_calls();
        return Ok(());
    }

    harness.decode(options.backend, &options.payload);
    let snapshot = harness
        .wait_until(|s| s.state == SessionState::Result)
        .await?;
    println!("Result: {}", snapshot.result.unwrap_or_default());

    harness.controller.unmount().await;
    harness.print_calls();
    Ok(())
}

/// Run a continuous session, switching through `sequence`
pub async fn live(
    config: &ScannerConfig,
    sequence: &[BackendKind],
    decodes: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(&first) = sequence.first() else {
        return Err("backend sequence is empty".into());
    };

    let harness = Harness::new(config, SessionMode::Continuous, first, false);
    if let Err(e) = harness.controller.mount().await {
        println!("Failed to start {}: {}", first, e);
    }

    for (index, &backend) in sequence.iter().enumerate() {
        if index > 0 {
            println!("Switching to {}...", backend);
            if let Err(e) = harness.controller.select_backend(backend).await {
                println!("Failed to start {}: {}", backend, e);
                continue;
            }
        }
        if harness.controller.snapshot().active != Some(backend) {
            continue;
        }

        for n in 0..decodes {
            let payload = format!("{}-{}", backend, n + 1);
            harness.decode(backend, &payload);
            let expected = payload.clone();
            let snapshot = harness
                .wait_until(move |s| s.result.as_deref() == Some(expected.as_str()))
                .await?;
            println!(
                "[{}] {}",
                backend,
                snapshot.result.unwrap_or_default()
            );
        }
    }

    harness.controller.unmount().await;
    harness.print_calls();
    Ok(())
}

/// Print the resolved configuration as JSON, license key masked
pub fn print_config(config: &ScannerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = ScannerConfig::default_path() {
        println!("Config file: {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(&config.redacted())?);
    Ok(())
}
