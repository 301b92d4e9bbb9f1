// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for scanner backends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Scanner backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// SDK-driven continuous decoder (licensed)
    #[default]
    EngineA,
    /// Declarative device-stream decoder
    EngineB,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::EngineA => write!(f, "engine-a"),
            BackendKind::EngineB => write!(f, "engine-b"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "engine-a" | "a" | "sdk" => Ok(BackendKind::EngineA),
            "engine-b" | "b" | "stream" => Ok(BackendKind::EngineB),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

/// Code symbologies known to the engines
///
/// Only enumerated; recognition is configured per engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Symbology {
    Qr,
    Ean13,
    Ean8,
    Code128,
    DataMatrix,
    Pdf417,
}

impl std::fmt::Display for Symbology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Symbology::Qr => "QR",
            Symbology::Ean13 => "EAN-13",
            Symbology::Ean8 => "EAN-8",
            Symbology::Code128 => "Code 128",
            Symbology::DataMatrix => "Data Matrix",
            Symbology::Pdf417 => "PDF417",
        };
        f.write_str(name)
    }
}

/// Outcome reported by an engine for a decode attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeStatus {
    Success,
    Failure,
}

/// A decode event as seen by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeResult {
    pub text: String,
    pub status: DecodeStatus,
    pub timestamp: DateTime<Utc>,
}

impl DecodeResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: DecodeStatus::Success,
            timestamp: Utc::now(),
        }
    }

    pub fn failure() -> Self {
        Self {
            text: String::new(),
            status: DecodeStatus::Failure,
            timestamp: Utc::now(),
        }
    }

    /// Whether the result should be shown to the user
    pub fn is_displayable(&self) -> bool {
        self.status == DecodeStatus::Success && !self.text.is_empty()
    }
}

/// Listener a backend forwards decode results to
pub type ResultSink = Arc<dyn Fn(DecodeResult) + Send + Sync>;

/// Adapter-level errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// A lifecycle step failed while starting
    #[error("{step} failed: {message}")]
    StartFailed { step: &'static str, message: String },

    /// A lifecycle step failed while stopping; only ever logged
    #[error("Teardown of {step} failed: {message}")]
    Teardown { step: &'static str, message: String },
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("engine-a".parse::<BackendKind>(), Ok(BackendKind::EngineA));
        assert_eq!("B".parse::<BackendKind>(), Ok(BackendKind::EngineB));
        assert!("engine-c".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_displayable_requires_success_and_text() {
        assert!(DecodeResult::success("ABC123").is_displayable());
        assert!(!DecodeResult::success("").is_displayable());
        assert!(!DecodeResult::failure().is_displayable());
    }
}
