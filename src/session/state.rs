// SPDX-License-Identifier: GPL-3.0-only

//! Session state as seen by the view

use crate::backends::BackendKind;
use crate::permissions::PermissionStatus;
use serde::{Deserialize, Serialize};

/// How the controller drives the backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    /// Idle → Scanning → Result, one result per session
    #[default]
    Explicit,
    /// Selected backend always running while mounted
    Continuous,
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionMode::Explicit => write!(f, "explicit"),
            SessionMode::Continuous => write!(f, "continuous"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Scanning {
        backend: BackendKind,
    },
    /// A result was captured and the session torn down
    Result,
}

impl SessionState {
    pub fn is_scanning(&self) -> bool {
        matches!(self, SessionState::Scanning { .. })
    }
}

/// Whether a transition took effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// A newer transition or an unmount overtook this one; nothing was applied
    Superseded,
}

/// Everything the view renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub mode: SessionMode,
    pub state: SessionState,
    pub selected: BackendKind,
    pub active: Option<BackendKind>,
    /// Last surfaced decode text
    pub result: Option<String>,
    pub permission: Option<PermissionStatus>,
    /// Static blocking message, set while permission is missing
    pub blocking_message: Option<String>,
    /// Error of the last failed start, cleared by the next successful one
    pub last_error: Option<String>,
    pub mounted: bool,
}

impl SessionSnapshot {
    pub fn new(mode: SessionMode, selected: BackendKind) -> Self {
        Self {
            mode,
            state: SessionState::Idle,
            selected,
            active: None,
            result: None,
            permission: None,
            blocking_message: None,
            last_error: None,
            mounted: false,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.blocking_message.is_some()
    }
}
