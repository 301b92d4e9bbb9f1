// SPDX-License-Identifier: GPL-3.0-only

//! Camera permission gate
//!
//! Readiness is the conjunction of two signals: the platform's runtime
//! camera consent (only meaningful where the platform asks for it) and the
//! framework-level camera permission used by the device-stream engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Host platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    /// Requires explicit runtime consent
    Android,
    Ios,
    #[default]
    Other,
}

impl Platform {
    pub fn requires_runtime_consent(self) -> bool {
        matches!(self, Platform::Android)
    }
}

/// Two-valued answer from the platform permission primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionGrant {
    Granted,
    Denied,
}

impl PermissionGrant {
    pub fn is_granted(self) -> bool {
        self == PermissionGrant::Granted
    }
}

/// Platform runtime-permission primitive
#[async_trait]
pub trait PlatformPermission: Send + Sync {
    async fn check(&self) -> PermissionGrant;
    async fn request(&self) -> PermissionGrant;
}

/// Framework camera-permission primitive
#[async_trait]
pub trait FrameworkPermission: Send + Sync {
    async fn status(&self) -> bool;
    async fn request(&self) -> bool;
}

/// Resolved permission signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionStatus {
    pub platform_granted: bool,
    pub framework_granted: bool,
}

impl PermissionStatus {
    pub fn granted() -> Self {
        Self {
            platform_granted: true,
            framework_granted: true,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.platform_granted && self.framework_granted
    }
}

/// Resolves camera readiness for the current platform
#[derive(Clone)]
pub struct PermissionGate {
    platform: Platform,
    platform_permission: Arc<dyn PlatformPermission>,
    framework_permission: Arc<dyn FrameworkPermission>,
}

impl PermissionGate {
    pub fn new(
        platform: Platform,
        platform_permission: Arc<dyn PlatformPermission>,
        framework_permission: Arc<dyn FrameworkPermission>,
    ) -> Self {
        Self {
            platform,
            platform_permission,
            framework_permission,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Query both signals, requesting whichever is not yet granted
    ///
    /// Safe to call repeatedly; nothing is requested once granted.
    pub async fn check_and_request(&self) -> PermissionStatus {
        let platform_granted = self.resolve_platform().await;
        let framework_granted = self.resolve_framework().await;

        let status = PermissionStatus {
            platform_granted,
            framework_granted,
        };
        if status.is_ready() {
            debug!(platform = ?self.platform, "Camera permission ready");
        } else {
            warn!(platform = ?self.platform, ?status, "Camera permission not granted");
        }
        status
    }

    async fn resolve_platform(&self) -> bool {
        if !self.platform.requires_runtime_consent() {
            return true;
        }
        if self.platform_permission.check().await.is_granted() {
            return true;
        }
        info!("Requesting platform camera permission");
        self.platform_permission.request().await.is_granted()
    }

    async fn resolve_framework(&self) -> bool {
        if self.framework_permission.status().await {
            return true;
        }
        info!("Requesting framework camera permission");
        self.framework_permission.request().await
    }
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate")
            .field("platform", &self.platform)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::simulated::SimulatedPermissions;

    fn gate(platform: Platform, perms: &Arc<SimulatedPermissions>) -> PermissionGate {
        PermissionGate::new(platform, perms.clone(), perms.clone())
    }

    #[tokio::test]
    async fn test_android_requests_once_per_call() {
        let perms = Arc::new(SimulatedPermissions::new(true, true));
        let gate = gate(Platform::Android, &perms);

        let status = gate.check_and_request().await;
        assert!(status.is_ready());
        assert_eq!(perms.platform_requests(), 1);

        // Already granted: nothing is requested again
        assert!(gate.check_and_request().await.is_ready());
        assert_eq!(perms.platform_requests(), 1);
    }

    #[tokio::test]
    async fn test_android_denial_maps_to_platform_signal() {
        let perms = Arc::new(SimulatedPermissions::new(false, true));
        let gate = gate(Platform::Android, &perms);

        let status = gate.check_and_request().await;
        assert!(!status.platform_granted);
        assert!(status.framework_granted);
        assert!(!status.is_ready());

        gate.check_and_request().await;
        assert_eq!(perms.platform_requests(), 2);
    }

    #[tokio::test]
    async fn test_other_platforms_skip_platform_primitive() {
        let perms = Arc::new(SimulatedPermissions::new(false, true));
        let gate = gate(Platform::Ios, &perms);

        let status = gate.check_and_request().await;
        assert!(status.platform_granted);
        assert!(status.is_ready());
        assert_eq!(perms.platform_requests(), 0);
    }

    #[tokio::test]
    async fn test_framework_denial_blocks_readiness() {
        let perms = Arc::new(SimulatedPermissions::new(true, false));
        let gate = gate(Platform::Other, &perms);

        let status = gate.check_and_request().await;
        assert!(!status.framework_granted);
        assert!(!status.is_ready());
        assert_eq!(perms.framework_requests(), 1);
    }
}
