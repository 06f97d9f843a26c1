// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/hygrolink

//! Error types

use std::path::PathBuf;
use thiserror::Error;

/// Invalid or unreadable application configuration
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to read configuration file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write configuration file {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize configuration")]
    Serialize(#[from] toml::ser::Error),

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
}

/// Failure at the reporting sink boundary. Never retried.
#[derive(Debug, Error)]
pub enum ReportingError {
    #[error("failed to read trusted assets {path:?}")]
    AssetsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid trusted assets {path:?}")]
    AssetsParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("timed out after {secs}s connecting to {broker}")]
    ConnectTimeout { broker: String, secs: u64 },

    #[error("connection to {broker} rejected: {reason}")]
    Rejected { broker: String, reason: String },

    #[error("connection to {broker} failed")]
    Connection {
        broker: String,
        #[source]
        source: rumqttc::ConnectionError,
    },

    #[error("request to the reporting client failed")]
    Client(#[from] rumqttc::ClientError),

    #[error("transport failure: {message}")]
    Transport { message: String },

    #[error("failed to encode payload")]
    Encode(#[from] serde_json::Error),

    #[error("reporting sink is closed")]
    Closed,
}
