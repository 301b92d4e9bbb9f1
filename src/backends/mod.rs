// SPDX-License-Identifier: MPL-2.0

//! Scanner backend abstraction
//!
//! Both scanning engines are exposed through one trait so the session
//! controller never branches on which engine it drives.
//!
//! ```text
//! ┌─────────────────────┐
//! │  SessionController  │  ← Exclusivity, gating, stale guards
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ ScannerBackend Trait│  ← start / stop / subscribe
//! └──────────┬──────────┘
//!            │
//!      ┌─────┴───────┐
//!      ▼             ▼
//!  SdkBackend   StreamBackend
//!      │             │
//!      ▼             ▼
//!  ScannerSdk   DeviceStream   ← external engines
//! ```
//!
//! # Modules
//!
//! - [`sdk`]: contracts of the external engines
//! - [`sdk_backend`]: SDK-driven engine (EngineA)
//! - [`stream_backend`]: device-stream engine (EngineB)
//! - [`simulated`]: in-process engines for the CLI and tests

pub mod sdk;
pub mod sdk_backend;
pub mod simulated;
pub mod stream_backend;
pub mod subscription;
pub mod types;

pub use sdk_backend::SdkBackend;
pub use stream_backend::StreamBackend;
pub use subscription::Subscription;
pub use types::*;

use async_trait::async_trait;

/// Uniform lifecycle contract over a scanning engine
///
/// Implementations must make [`stop`](ScannerBackend::stop) safe in every
/// state: before any start, after a partial start, and when repeated.
#[async_trait]
pub trait ScannerBackend: Send + Sync {
    /// Which engine this is
    fn kind(&self) -> BackendKind;

    /// Whether a license must be activated before [`start`](ScannerBackend::start)
    fn requires_license(&self) -> bool;

    /// Acquire the camera and begin decoding
    ///
    /// On error the backend may be partially started; callers must still
    /// call [`stop`](ScannerBackend::stop).
    async fn start(&mut self) -> BackendResult<()>;

    /// Release everything acquired by `start`
    ///
    /// Never fails. Errors from the engine are logged and discarded.
    async fn stop(&mut self);

    /// Attach the decode listener
    ///
    /// Returns `None` without side effects if a listener is already attached.
    fn subscribe(&mut self, sink: ResultSink) -> Option<Subscription>;

    /// Whether a decode listener is currently attached
    fn is_listener_attached(&self) -> bool;

    /// Whether the engine currently holds the camera
    fn is_active(&self) -> bool;
}

impl std::fmt::Debug for dyn ScannerBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerBackend")
            .field("kind", &self.kind())
            .field("active", &self.is_active())
            .field("listener_attached", &self.is_listener_attached())
            .finish()
    }
}
