// SPDX-License-Identifier: MPL-2.0

//! Contracts of the external scanning engines
//!
//! The session never talks to native code directly. Each engine is reached
//! through one of these traits; production builds bind them to the vendor
//! SDKs, tests and the CLI bind them to [`super::simulated`].

use super::types::Symbology;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by an engine call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct SdkError(pub String);

impl From<&str> for SdkError {
    fn from(msg: &str) -> Self {
        SdkError(msg.to_string())
    }
}

pub type SdkResult<T> = Result<T, SdkError>;

/// Status enumeration carried by SDK decode results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SdkStatus {
    Success,
    NoCode,
    Timeout,
    Error,
}

/// One element of an SDK decode batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkBarcodeResult {
    pub status: SdkStatus,
    pub barcode_data: String,
}

impl SdkBarcodeResult {
    pub fn success(data: impl Into<String>) -> Self {
        Self {
            status: SdkStatus::Success,
            barcode_data: data.into(),
        }
    }

    pub fn with_status(status: SdkStatus) -> Self {
        Self {
            status,
            barcode_data: String::new(),
        }
    }
}

/// Identifier of a listener registered with the SDK
pub type ListenerId = u64;

/// Callback invoked by the SDK with each decode batch
pub type BatchListener = Arc<dyn Fn(&[SdkBarcodeResult]) + Send + Sync>;

/// Camera and decoder lifecycle of the SDK-driven engine
#[async_trait]
pub trait ScannerSdk: Send + Sync {
    async fn start_camera(&self) -> SdkResult<()>;
    async fn stop_camera(&self) -> SdkResult<()>;

    async fn start_preview(&self) -> SdkResult<()>;
    async fn stop_preview(&self) -> SdkResult<()>;

    async fn set_capture_enabled(&self, enabled: bool) -> SdkResult<()>;
    async fn set_decoding_enabled(&self, enabled: bool) -> SdkResult<()>;

    /// Register a decode batch listener
    fn add_listener(&self, listener: BatchListener) -> ListenerId;

    /// Remove a listener; unknown ids are ignored
    fn remove_listener(&self, id: ListenerId);
}

/// License activation endpoint of the SDK-driven engine
#[async_trait]
pub trait LicenseService: Send + Sync {
    async fn activate(&self, customer_id: &str, license_key: &str) -> SdkResult<()>;
}

/// A code recognized by the device-stream engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedCode {
    pub symbology: Symbology,
    pub value: Option<String>,
}

impl ScannedCode {
    pub fn qr(value: impl Into<String>) -> Self {
        Self {
            symbology: Symbology::Qr,
            value: Some(value.into()),
        }
    }
}

/// Callback invoked by the device stream per recognized batch
pub type CodeCallback = Arc<dyn Fn(&[ScannedCode]) + Send + Sync>;

/// Recognition settings passed when mounting the device stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub symbologies: Vec<Symbology>,
}

/// Declarative video stream of the device-stream engine
///
/// Mounting the stream is what activates recognition; there is no separate
/// decoder switch.
#[async_trait]
pub trait DeviceStream: Send + Sync {
    async fn mount(&self, config: StreamConfig, on_codes: CodeCallback) -> SdkResult<()>;
    async fn unmount(&self) -> SdkResult<()>;
}
