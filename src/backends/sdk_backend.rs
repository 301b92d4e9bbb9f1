// SPDX-License-Identifier: GPL-3.0-only

//! SDK-driven scanning engine (EngineA)
//!
//! Start acquires the native pipeline in a fixed order and stop releases it
//! in exactly the reverse order:
//!
//! ```text
//! start:  camera → preview → capture → decoding
//! stop:   decoding → capture → preview → camera
//! ```

use super::sdk::{BatchListener, ScannerSdk, SdkBarcodeResult, SdkResult, SdkStatus};
use super::subscription::Subscription;
use super::types::*;
use super::ScannerBackend;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, trace, warn};

/// Adapter over [`ScannerSdk`]
pub struct SdkBackend {
    sdk: Arc<dyn ScannerSdk>,
    /// `start` was entered since the last `stop`
    engaged: bool,
    /// every start step completed
    running: bool,
    listener_attached: Arc<AtomicBool>,
}

impl SdkBackend {
    pub fn new(sdk: Arc<dyn ScannerSdk>) -> Self {
        Self {
            sdk,
            engaged: false,
            running: false,
            listener_attached: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl ScannerBackend for SdkBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::EngineA
    }

    fn requires_license(&self) -> bool {
        true
    }

    async fn start(&mut self) -> BackendResult<()> {
        info!(backend = %self.kind(), "Starting SDK pipeline");
        self.engaged = true;

        start_step("camera", self.sdk.start_camera().await)?;
        start_step("preview", self.sdk.start_preview().await)?;
        start_step("capture", self.sdk.set_capture_enabled(true).await)?;
        start_step("decoding", self.sdk.set_decoding_enabled(true).await)?;

        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) {
        if !self.engaged {
            debug!(backend = %self.kind(), "Stop requested on idle SDK pipeline");
            return;
        }
        info!(backend = %self.kind(), "Stopping SDK pipeline");

        // Every step runs even if an earlier one failed or start never reached it
        absorb("decoding", self.sdk.set_decoding_enabled(false).await);
        absorb("capture", self.sdk.set_capture_enabled(false).await);
        absorb("preview", self.sdk.stop_preview().await);
        absorb("camera", self.sdk.stop_camera().await);

        self.engaged = false;
        self.running = false;
    }

    fn subscribe(&mut self, sink: ResultSink) -> Option<Subscription> {
        if self.is_listener_attached() {
            debug!(backend = %self.kind(), "Listener already attached");
            return None;
        }

        let listener: BatchListener = Arc::new(move |batch: &[SdkBarcodeResult]| {
            if let Some(result) = promote_first(batch) {
                sink(result);
            }
        });
        let id = self.sdk.add_listener(listener);
        debug!(backend = %self.kind(), listener = id, "Attached decode listener");

        let sdk = Arc::clone(&self.sdk);
        Some(Subscription::new(
            Arc::clone(&self.listener_attached),
            move || sdk.remove_listener(id),
        ))
    }

    fn is_listener_attached(&self) -> bool {
        self.listener_attached.load(Ordering::Acquire)
    }

    fn is_active(&self) -> bool {
        self.running
    }
}

/// Only the first element of a batch is inspected
fn promote_first(batch: &[SdkBarcodeResult]) -> Option<DecodeResult> {
    match batch.first() {
        Some(first) if first.status == SdkStatus::Success => {
            Some(DecodeResult::success(first.barcode_data.clone()))
        }
        Some(first) => {
            trace!(status = ?first.status, "Ignoring unsuccessful decode batch");
            None
        }
        None => None,
    }
}

fn start_step(step: &'static str, result: SdkResult<()>) -> BackendResult<()> {
    result.map_err(|e| BackendError::StartFailed {
        step,
        message: e.to_string(),
    })
}

fn absorb(step: &'static str, result: SdkResult<()>) {
    if let Err(e) = result {
        let err = BackendError::Teardown {
            step,
            message: e.to_string(),
        };
        warn!(error = %err, "Ignoring SDK teardown failure");
    }
}
