// SPDX-License-Identifier: GPL-3.0-only

//! One-time license activation
//!
//! The activator is process scoped: create it once, share it by `Arc` with
//! every controller. The `activated` flag only ever moves from false to true,
//! and only after the service confirms the activation.

use crate::backends::sdk::LicenseService;
use crate::config::ScannerConfig;
use crate::errors::LicenseError;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Credentials and activation state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseContext {
    pub customer_id: String,
    pub license_key: Option<String>,
    pub activated: bool,
}

impl LicenseContext {
    pub fn new(customer_id: impl Into<String>, license_key: Option<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            license_key,
            activated: false,
        }
    }

    fn key(&self) -> Option<&str> {
        self.license_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// Init-once gate in front of [`LicenseService::activate`]
pub struct LicenseActivator {
    context: Mutex<LicenseContext>,
    service: Arc<dyn LicenseService>,
}

impl LicenseActivator {
    pub fn new(context: LicenseContext, service: Arc<dyn LicenseService>) -> Self {
        Self {
            context: Mutex::new(context),
            service,
        }
    }

    pub fn from_config(config: &ScannerConfig, service: Arc<dyn LicenseService>) -> Self {
        Self::new(
            LicenseContext::new(config.customer_id.clone(), config.license_key.clone()),
            service,
        )
    }

    /// Activate the license unless it already is
    ///
    /// Callers are serialized, so concurrent first calls still reach the
    /// service only once.
    pub async fn ensure_activated(&self) -> Result<(), LicenseError> {
        let mut context = self.context.lock().await;
        if context.activated {
            return Ok(());
        }

        let Some(key) = context.key() else {
            error!("License key missing; refusing to activate");
            return Err(LicenseError::MissingCredential);
        };

        info!(customer_id = %context.customer_id, "Activating license");
        match self.service.activate(&context.customer_id, key).await {
            Ok(()) => {
                context.activated = true;
                info!("License activated");
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "License activation will be retried on next start");
                Err(LicenseError::Activation(e.to_string()))
            }
        }
    }

    pub async fn is_activated(&self) -> bool {
        self.context.lock().await.activated
    }
}

impl std::fmt::Debug for LicenseActivator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseActivator").finish_non_exhaustive()
    }
}
