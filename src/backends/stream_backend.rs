// SPDX-License-Identifier: MPL-2.0

//! Device-stream scanning engine (EngineB)
//!
//! Recognition is active for as long as the video stream is mounted, so
//! `start`/`stop` map onto mount/unmount. The decode callback is handed to
//! the stream at mount time and forwards into whatever listener is attached.

use super::sdk::{CodeCallback, DeviceStream, ScannedCode, StreamConfig};
use super::subscription::Subscription;
use super::types::*;
use super::ScannerBackend;
use crate::constants::STREAM_SYMBOLOGIES;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, trace, warn};

type ListenerSlot = Arc<Mutex<Option<ResultSink>>>;

/// Adapter over [`DeviceStream`]
pub struct StreamBackend {
    stream: Arc<dyn DeviceStream>,
    symbologies: Vec<Symbology>,
    /// mount was attempted since the last `stop`
    engaged: bool,
    mounted: bool,
    listener: ListenerSlot,
    listener_attached: Arc<AtomicBool>,
}

impl StreamBackend {
    pub fn new(stream: Arc<dyn DeviceStream>) -> Self {
        Self {
            stream,
            symbologies: STREAM_SYMBOLOGIES.to_vec(),
            engaged: false,
            mounted: false,
            listener: Arc::new(Mutex::new(None)),
            listener_attached: Arc::new(AtomicBool::new(false)),
        }
    }

    fn callback(&self) -> CodeCallback {
        let slot = Arc::clone(&self.listener);
        Arc::new(move |codes: &[ScannedCode]| {
            let Some(text) = first_code(codes) else {
                trace!("Ignoring empty code batch");
                return;
            };
            // Clone out of the lock so the sink never runs under it
            let sink = slot.lock().ok().and_then(|guard| guard.clone());
            if let Some(sink) = sink {
                sink(DecodeResult::success(text));
            }
        })
    }
}

#[async_trait]
impl ScannerBackend for StreamBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::EngineB
    }

    fn requires_license(&self) -> bool {
        false
    }

    async fn start(&mut self) -> BackendResult<()> {
        info!(backend = %self.kind(), symbologies = ?self.symbologies, "Mounting device stream");
        self.engaged = true;

        let config = StreamConfig {
            symbologies: self.symbologies.clone(),
        };
        self.stream
            .mount(config, self.callback())
            .await
            .map_err(|e| BackendError::StartFailed {
                step: "mount",
                message: e.to_string(),
            })?;

        self.mounted = true;
        Ok(())
    }

    async fn stop(&mut self) {
        if !self.engaged {
            debug!(backend = %self.kind(), "Stop requested on unmounted stream");
            return;
        }
        info!(backend = %self.kind(), "Unmounting device stream");

        if let Err(e) = self.stream.unmount().await {
            let err = BackendError::Teardown {
                step: "unmount",
                message: e.to_string(),
            };
            warn!(error = %err, "Ignoring stream teardown failure");
        }

        self.engaged = false;
        self.mounted = false;
    }

    fn subscribe(&mut self, sink: ResultSink) -> Option<Subscription> {
        if self.is_listener_attached() {
            debug!(backend = %self.kind(), "Listener already attached");
            return None;
        }

        if let Ok(mut slot) = self.listener.lock() {
            *slot = Some(sink);
        }

        let slot = Arc::clone(&self.listener);
        Some(Subscription::new(
            Arc::clone(&self.listener_attached),
            move || {
                if let Ok(mut slot) = slot.lock() {
                    slot.take();
                }
            },
        ))
    }

    fn is_listener_attached(&self) -> bool {
        self.listener_attached.load(Ordering::Acquire)
    }

    fn is_active(&self) -> bool {
        self.mounted
    }
}

/// First code of the batch, if it carries a non-empty value
fn first_code(codes: &[ScannedCode]) -> Option<String> {
    codes
        .first()
        .and_then(|code| code.value.as_deref())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::simulated::{CallLog, SimulatedStream};

    fn backend() -> (StreamBackend, Arc<SimulatedStream>, CallLog) {
        let log = CallLog::default();
        let stream = Arc::new(SimulatedStream::new("b", log.clone()));
        (StreamBackend::new(stream.clone()), stream, log)
    }

    fn collector() -> (ResultSink, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink: ResultSink = Arc::new(move |r: DecodeResult| {
            seen_clone.lock().unwrap().push(r.text);
        });
        (sink, seen)
    }

    #[tokio::test]
    async fn test_mount_uses_qr_only() {
        let (mut backend, stream, _log) = backend();
        backend.start().await.unwrap();
        assert!(backend.is_active());
        assert_eq!(
            stream.mounted_config(),
            Some(StreamConfig {
                symbologies: vec![Symbology::Qr]
            })
        );
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (mut backend, _stream, log) = backend();
        backend.stop().await;
        backend.start().await.unwrap();
        backend.stop().await;
        backend.stop().await;
        assert_eq!(log.entries(), vec!["b.mount", "b.unmount"]);
    }

    #[tokio::test]
    async fn test_failed_mount_is_stoppable() {
        let (mut backend, stream, log) = backend();
        stream.fail_on("mount");

        assert!(backend.start().await.is_err());
        assert!(!backend.is_active());
        backend.stop().await;
        assert_eq!(log.count("b.unmount"), 1);
    }

    #[tokio::test]
    async fn test_first_code_is_forwarded_and_empty_ignored() {
        let (mut backend, stream, _log) = backend();
        let (sink, seen) = collector();
        let _sub = backend.subscribe(sink).unwrap();
        backend.start().await.unwrap();

        stream.emit(vec![ScannedCode {
            symbology: Symbology::Qr,
            value: Some(String::new()),
        }]);
        stream.emit(vec![]);
        stream.emit(vec![ScannedCode::qr("first"), ScannedCode::qr("second")]);

        assert_eq!(*seen.lock().unwrap(), vec!["first".to_string()]);
    }

    #[tokio::test]
    async fn test_detached_listener_receives_nothing() {
        let (mut backend, stream, _log) = backend();
        let (sink, seen) = collector();
        let sub = backend.subscribe(sink).unwrap();
        backend.start().await.unwrap();

        sub.cancel();
        assert!(!backend.is_listener_attached());
        stream.emit(vec![ScannedCode::qr("late")]);
        assert!(seen.lock().unwrap().is_empty());
    }
}
