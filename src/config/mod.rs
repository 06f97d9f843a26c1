// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/hygrolink

//! Configuration module

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::ConfigurationError;
use crate::sensors::DEFAULT_THRESHOLD;

/// Device model the humidity sensor implements
pub const HUMIDITY_SENSOR_MODEL_URN: &str = "urn:com:oracle:iot:device:humidity_sensor";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Log level
    pub log_level: String,

    /// Device model configuration
    pub device: DeviceConfig,

    /// Polling loop configuration
    pub polling: PollingConfig,

    /// Sensor configuration
    pub sensor: SensorConfig,

    /// MQTT transport configuration
    pub mqtt: MqttConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "hygrolink".to_string(),
            log_level: "info".to_string(),
            device: DeviceConfig::default(),
            polling: PollingConfig::default(),
            sensor: SensorConfig::default(),
            mqtt: MqttConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigurationError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigurationError> {
        let content = toml::to_string_pretty(self)?;

        // Create parent directories
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigurationError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        std::fs::write(path, content).map_err(|source| ConfigurationError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigurationError> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Reject settings the polling loop cannot run with
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.polling.interval_ms == 0 {
            return Err(ConfigurationError::ZeroDuration { field: "polling.interval_ms" });
        }
        if self.polling.tick_ms == 0 {
            return Err(ConfigurationError::ZeroDuration { field: "polling.tick_ms" });
        }
        if self.mqtt.connect_timeout_secs == 0 {
            return Err(ConfigurationError::ZeroDuration { field: "mqtt.connect_timeout_secs" });
        }
        Ok(())
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("hygrolink"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// Device model naming
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// URN of the device model
    pub model_urn: String,

    /// Attribute the reading is reported under
    pub humidity_attribute: String,

    /// Writable threshold attribute
    pub max_threshold_attribute: String,

    /// Alert raised when the reading exceeds the threshold
    pub alert_name: String,

    /// Appended to the endpoint id to form the sensor hardware id
    pub hardware_suffix: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            model_urn: HUMIDITY_SENSOR_MODEL_URN.to_string(),
            humidity_attribute: "humidity".to_string(),
            max_threshold_attribute: "maxThreshold".to_string(),
            alert_name: format!("{}:too_humid", HUMIDITY_SENSOR_MODEL_URN),
            hardware_suffix: "_Sample_HS".to_string(),
        }
    }
}

/// Polling loop timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Time between readings in milliseconds
    pub interval_ms: u64,

    /// Granularity of cancellation checks while waiting
    pub tick_ms: u64,

    /// Stop after this many readings; runs until cancelled when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u64>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            tick_ms: 100,
            max_iterations: None,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Sensor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Starting alert threshold, clamped to [60, 100]
    pub initial_threshold: i32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            initial_threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// MQTT client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub keep_alive_secs: u64,

    /// How long to wait for the broker to acknowledge the connection
    pub connect_timeout_secs: u64,

    /// Request channel capacity of the client
    pub channel_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            keep_alive_secs: 30,
            connect_timeout_secs: 10,
            channel_capacity: 100,
        }
    }
}
