// SPDX-License-Identifier: GPL-3.0-only

//! Decode listener subscription handle

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use uuid::Uuid;

type Detach = Box<dyn FnOnce() + Send>;

/// Handle to a live decode listener
///
/// Detaches the listener from its backend when cancelled or dropped, so a
/// listener can never outlive the session that owns the handle.
pub struct Subscription {
    id: Uuid,
    attached: Arc<AtomicBool>,
    detach: Option<Detach>,
}

impl Subscription {
    /// Create a subscription bound to `attached`, which the backend also holds
    /// to answer `is_listener_attached`
    pub fn new(attached: Arc<AtomicBool>, detach: impl FnOnce() + Send + 'static) -> Self {
        attached.store(true, Ordering::Release);
        Self {
            id: Uuid::new_v4(),
            attached,
            detach: Some(Box::new(detach)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Detach the listener now
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(detach) = self.detach.take() {
            debug!(subscription = %self.id, "Detaching decode listener");
            detach();
            self.attached.store(false, Ordering::Release);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("attached", &self.is_attached())
            .finish()
    }
}
