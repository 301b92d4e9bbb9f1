// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use crate::backends::Symbology;

/// Environment variable holding the license customer identifier
pub const CUSTOMER_ID_ENV: &str = "SCAN_CUSTOMER_ID";

/// Environment variable holding the license key
pub const LICENSE_KEY_ENV: &str = "SCAN_LICENSE_KEY";

/// Customer identifier used when none is configured
pub const DEFAULT_CUSTOMER_ID: &str = "demo-customer";

/// Directory name under the user config dir
pub const CONFIG_DIR_NAME: &str = "scan-session";

/// Config file name inside [`CONFIG_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Blocking message shown while camera permission is missing
pub const PERMISSION_DENIED_MESSAGE: &str = "Camera permission not granted";

/// Symbologies the device-stream engine is configured to recognize
pub const STREAM_SYMBOLOGIES: &[Symbology] = &[Symbology::Qr];

/// Mask a secret for display, keeping only the last four characters
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("ABCDEFGH"), "****EFGH");
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret(""), "");
    }

    #[test]
    fn test_stream_symbologies_are_qr_only() {
        assert_eq!(STREAM_SYMBOLOGIES, &[Symbology::Qr]);
    }
}
