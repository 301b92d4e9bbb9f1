// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::BackendKind;
use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, CUSTOMER_ID_ENV, DEFAULT_CUSTOMER_ID, LICENSE_KEY_ENV,
    mask_secret,
};
use crate::errors::ConfigError;
use crate::permissions::Platform;
use crate::session::SessionMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Scanner configuration, read once at startup
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// License customer identifier
    pub customer_id: String,
    /// License key; required by the SDK-driven engine only
    pub license_key: Option<String>,
    /// Host platform, decides whether runtime consent is requested
    pub platform: Platform,
    /// Explicit lifecycle or continuous live-switch
    pub mode: SessionMode,
    /// Backend selected when the screen mounts
    pub default_backend: BackendKind,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            customer_id: DEFAULT_CUSTOMER_ID.to_string(),
            license_key: None,
            platform: Platform::default(),
            mode: SessionMode::default(),
            default_backend: BackendKind::default(),
        }
    }
}

impl ScannerConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default file (if present) and apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Parse a JSON config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let shown = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: shown.clone(),
            source,
        })?;
        let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: shown.clone(),
            source,
        })?;
        info!(path = %shown, "Loaded scanner config");
        Ok(config)
    }

    /// Override credentials from environment-style variables
    ///
    /// Blank values count as absent.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_blank = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(customer_id) = non_blank(CUSTOMER_ID_ENV) {
            debug!(var = CUSTOMER_ID_ENV, "Customer id overridden from environment");
            self.customer_id = customer_id;
        }
        if let Some(key) = non_blank(LICENSE_KEY_ENV) {
            debug!(var = LICENSE_KEY_ENV, "License key overridden from environment");
            self.license_key = Some(key);
        }
    }

    /// Copy safe to print or log
    pub fn redacted(&self) -> Self {
        Self {
            license_key: self.license_key.as_deref().map(mask_secret),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_has_customer_but_no_key() {
        let config = ScannerConfig::default();
        assert_eq!(config.customer_id, DEFAULT_CUSTOMER_ID);
        assert!(config.license_key.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> =
            HashMap::from([(CUSTOMER_ID_ENV, "acme"), (LICENSE_KEY_ENV, "SECRET-KEY")]);
        let mut config = ScannerConfig::default();
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.customer_id, "acme");
        assert_eq!(config.license_key.as_deref(), Some("SECRET-KEY"));
    }

    #[test]
    fn test_blank_env_is_ignored() {
        let mut config = ScannerConfig::default();
        config.apply_env(|_| Some("  ".to_string()));
        assert_eq!(config.customer_id, DEFAULT_CUSTOMER_ID);
        assert!(config.license_key.is_none());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ScannerConfig =
            serde_json::from_str(r#"{ "license_key": "K-123456", "default_backend": "engine-b" }"#)
                .unwrap();
        assert_eq!(config.customer_id, DEFAULT_CUSTOMER_ID);
        assert_eq!(config.default_backend, BackendKind::EngineB);
        assert_eq!(config.redacted().license_key.as_deref(), Some("****3456"));
    }
}
