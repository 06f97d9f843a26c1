// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/hygrolink

//! hygrolink - simulated humidity sensor for device-management services
//!
//! A simulated hygrometer is polled on a fixed interval. Every reading is
//! committed to a reporting sink, and one alert is raised each time the
//! reading climbs above the sensor's threshold.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  read()   ┌──────────────┐  commit / raise_alert  ┌───────────────┐
//! │ HumiditySensor│ ───────→ │ PollingLoop  │ ─────────────────────→ │ ReportingSink │
//! └──────────────┘           └──────────────┘                        └───────────────┘
//!        ↑                          ↑                                        │
//!        │ set_threshold            │ CancellationToken                      │
//!        └──────────────────────────┼──────── settings/maxThreshold ─────────┘
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod sensors;
pub mod reporting;
pub mod polling;

// Re-exports for convenience
pub use config::Config;
pub use error::{ConfigurationError, ReportingError};
pub use sensors::{HumiditySensor, Sensor, DeviceMetadata};
pub use reporting::{ReportingSink, ReportingSinkExt, MqttSink, LogSink, TrustedAssets};
pub use polling::{run_session, PollingLoop, RunOutcome};

/// hygrolink version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// hygrolink name
pub const NAME: &str = "hygrolink";
