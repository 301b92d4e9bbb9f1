// SPDX-License-Identifier: MPL-2.0

//! Error types for the scanner session
//!
//! Only start-path failures surface to callers. Teardown failures are
//! absorbed inside the adapters (see [`crate::backends::BackendError::Teardown`])
//! and stale completions are reported as
//! [`Transition::Superseded`](crate::session::Transition::Superseded), not as errors.
//!
//! ```text
//! ScanError
//! ├── PermissionDenied      blocks every backend start until the next mount
//! ├── License
//! │   ├── MissingCredential configuration defect, never retried implicitly
//! │   └── Activation        recoverable, retried on the next start
//! ├── Backend               adapter start failure (adapter already stopped)
//! ├── Unavailable           no adapter registered for the selected kind
//! └── NotMounted            intent issued outside a mounted session
//! ```

use crate::backends::{BackendError, BackendKind};
use thiserror::Error;

/// Result type alias using ScanError
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors a session intent can fail with
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanError {
    /// Camera permission was not granted on entry
    #[error("Camera permission not granted")]
    PermissionDenied,

    /// License gate refused the start
    #[error(transparent)]
    License(#[from] LicenseError),

    /// The backend failed to start
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// No backend of this kind was registered with the controller
    #[error("Backend {0} is not available")]
    Unavailable(BackendKind),

    /// The controller is not mounted
    #[error("Scanner session is not mounted")]
    NotMounted,
}

/// License activation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LicenseError {
    /// No license key was configured
    #[error("License key is not configured")]
    MissingCredential,

    /// The activation call itself failed; retryable
    #[error("License activation failed: {0}")]
    Activation(String),
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`crate::config::ScannerConfig`]
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ScanError {
    /// Whether retrying the same intent later can succeed without user action
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScanError::License(LicenseError::Activation(_)) | ScanError::Backend(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_is_not_retryable() {
        let err = ScanError::from(LicenseError::MissingCredential);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "License key is not configured");
    }

    #[test]
    fn test_activation_error_is_retryable() {
        let err = ScanError::from(LicenseError::Activation("timeout".into()));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_permission_denied_is_terminal() {
        assert!(!ScanError::PermissionDenied.is_retryable());
    }
}
