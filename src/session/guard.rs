// SPDX-License-Identifier: GPL-3.0-only

//! Stale-completion guard
//!
//! Every transition takes a [`SessionToken`] before its first await. Any
//! later transition or an unmount advances the guard, after which the older
//! token reports itself as stale and its completion must be discarded.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug, Default)]
struct GuardState {
    generation: AtomicU64,
    mounted: AtomicBool,
}

/// Source of session tokens
#[derive(Debug, Clone, Default)]
pub struct StaleGuard {
    state: Arc<GuardState>,
}

impl StaleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark mounted and start a fresh generation
    pub fn mount(&self) -> SessionToken {
        self.state.mounted.store(true, Ordering::Release);
        self.advance()
    }

    /// Mark unmounted; every outstanding token becomes stale
    pub fn unmount(&self) {
        self.state.mounted.store(false, Ordering::Release);
        self.state.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn is_mounted(&self) -> bool {
        self.state.mounted.load(Ordering::Acquire)
    }

    /// Supersede all outstanding tokens and issue a new one
    pub fn advance(&self) -> SessionToken {
        let generation = self.state.generation.fetch_add(1, Ordering::AcqRel) + 1;
        SessionToken {
            generation,
            state: Arc::clone(&self.state),
        }
    }

    /// Token for the current generation without superseding it
    pub fn current(&self) -> SessionToken {
        SessionToken {
            generation: self.state.generation.load(Ordering::Acquire),
            state: Arc::clone(&self.state),
        }
    }
}

/// Snapshot of the guard taken when a transition began
#[derive(Debug, Clone)]
pub struct SessionToken {
    generation: u64,
    state: Arc<GuardState>,
}

impl SessionToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Still mounted and not superseded
    pub fn is_current(&self) -> bool {
        self.state.mounted.load(Ordering::Acquire)
            && self.state.generation.load(Ordering::Acquire) == self.generation
    }
}
