// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/hygrolink

//! Trusted assets - broker location and device identity

use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;

use crate::error::ReportingError;

fn default_broker_port() -> u16 {
    1883
}

fn default_topic_prefix() -> String {
    "devices".to_string()
}

/// Connection details handed out when the device was registered
#[derive(Debug, Clone, Deserialize)]
pub struct TrustedAssets {
    /// Endpoint id assigned to this device
    pub endpoint_id: String,

    pub broker_host: String,

    #[serde(default = "default_broker_port")]
    pub broker_port: u16,

    /// Defaults to the endpoint id
    pub username: Option<String>,

    #[serde(default)]
    pub use_tls: bool,

    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
}

impl TrustedAssets {
    /// Load trusted assets from a TOML file
    pub fn load(path: &Path) -> Result<Self, ReportingError> {
        let content = std::fs::read_to_string(path).map_err(|source| ReportingError::AssetsRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ReportingError::AssetsParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.endpoint_id)
    }

    /// `host:port` of the broker
    pub fn broker(&self) -> String {
        format!("{}:{}", self.broker_host, self.broker_port)
    }

    /// Root topic for everything this device publishes
    pub fn device_topic(&self) -> String {
        format!("{}/{}", self.topic_prefix.trim_end_matches('/'), self.endpoint_id)
    }
}

/// Trusted assets unlocked with their password
pub struct Credentials {
    pub assets: TrustedAssets,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(assets: TrustedAssets, password: SecretString) -> Self {
        Self { assets, password }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_defaults() {
        let assets: TrustedAssets = toml::from_str(
            r#"
            endpoint_id = "0-AEBA"
            broker_host = "iot.example.com"
            "#,
        )
        .unwrap();

        assert_eq!(assets.broker_port, 1883);
        assert!(!assets.use_tls);
        assert_eq!(assets.username(), "0-AEBA");
        assert_eq!(assets.broker(), "iot.example.com:1883");
        assert_eq!(assets.device_topic(), "devices/0-AEBA");
    }

    #[test]
    fn test_parse_full() {
        let assets: TrustedAssets = toml::from_str(
            r#"
            endpoint_id = "0-AEBA"
            broker_host = "iot.example.com"
            broker_port = 8883
            username = "sensor"
            use_tls = true
            topic_prefix = "acme/"
            "#,
        )
        .unwrap();

        assert_eq!(assets.username(), "sensor");
        assert!(assets.use_tls);
        assert_eq!(assets.device_topic(), "acme/0-AEBA");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = TrustedAssets::load(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ReportingError::AssetsRead { .. })));
    }
}
