// SPDX-License-Identifier: MPL-2.0

//! Scanner session core
//!
//! This library owns the lifecycle of a QR/barcode scanning screen that can
//! run on one of two interchangeable engines. It gates camera startup behind
//! permission and license checks, keeps the two engines mutually exclusive,
//! and guarantees every native resource is released on cancel, switch and
//! unmount.
//!
//! # Architecture
//!
//! - [`session`]: the controller state machine and its stale guard
//! - [`backends`]: the `ScannerBackend` trait and both engine adapters
//! - [`permissions`]: camera permission gate
//! - [`license`]: one-time license activation
//! - [`config`]: configuration loading
//!
//! # Example
//!
//! ```ignore
//! let controller = SessionController::new(mode, BackendKind::EngineA, gate, licenses, backends);
//! controller.mount().await?;
//! controller.start().await?;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod license;
pub mod permissions;
pub mod session;

// Re-export commonly used types
pub use backends::{BackendKind, DecodeResult, ScannerBackend};
pub use config::ScannerConfig;
pub use errors::{LicenseError, ScanError, ScanResult};
pub use license::{LicenseActivator, LicenseContext};
pub use permissions::{PermissionGate, PermissionStatus, Platform};
pub use session::{SessionController, SessionMode, SessionSnapshot, SessionState, Transition};
