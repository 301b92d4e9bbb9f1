// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration loading

use scan_session::constants::{DEFAULT_CUSTOMER_ID, LICENSE_KEY_ENV};
use scan_session::errors::ConfigError;
use scan_session::{BackendKind, Platform, ScannerConfig, SessionMode};
use std::path::PathBuf;

fn temp_config(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("scan-session-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("config.json");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_config_default() {
    let config = ScannerConfig::default();

    assert_eq!(config.customer_id, DEFAULT_CUSTOMER_ID);
    assert!(
        config.license_key.is_none(),
        "License key must come from configuration, never a default"
    );
    assert_eq!(config.mode, SessionMode::Explicit);
}

#[test]
fn test_config_from_file() {
    let path = temp_config(
        "full",
        r#"{
            "customer_id": "acme",
            "license_key": "AAAA-BBBB",
            "platform": "android",
            "mode": "continuous",
            "default_backend": "engine-b"
        }"#,
    );

    let config = ScannerConfig::from_file(&path).unwrap();
    assert_eq!(config.customer_id, "acme");
    assert_eq!(config.license_key.as_deref(), Some("AAAA-BBBB"));
    assert_eq!(config.platform, Platform::Android);
    assert_eq!(config.mode, SessionMode::Continuous);
    assert_eq!(config.default_backend, BackendKind::EngineB);
}

#[test]
fn test_config_env_overrides_file() {
    let path = temp_config("env", r#"{ "license_key": "FROM-FILE" }"#);
    let mut config = ScannerConfig::from_file(&path).unwrap();

    config.apply_env(|name| (name == LICENSE_KEY_ENV).then(|| "FROM-ENV".to_string()));
    assert_eq!(config.license_key.as_deref(), Some("FROM-ENV"));
    assert_eq!(config.customer_id, DEFAULT_CUSTOMER_ID);
}

#[test]
fn test_config_invalid_json() {
    let path = temp_config("invalid", "{ not json");
    let err = ScannerConfig::from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn test_config_missing_file() {
    let err = ScannerConfig::from_file(&PathBuf::from("/nonexistent/scan-session.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_redacted_config_hides_key() {
    let config = ScannerConfig {
        license_key: Some("SUPER-SECRET-1234".to_string()),
        ..ScannerConfig::default()
    };
    let json = serde_json::to_string(&config.redacted()).unwrap();
    assert!(!json.contains("SUPER-SECRET"));
    assert!(json.contains("1234"));
}
