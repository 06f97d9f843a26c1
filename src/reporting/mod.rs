//! Reporting module - delivery of readings and alerts to the device service

mod assets;
mod offline;
mod mqtt;

pub use assets::{Credentials, TrustedAssets};
pub use offline::LogSink;
pub use mqtt::{MqttSink, parse_threshold_payload};

use std::collections::BTreeMap;
use std::sync::Arc;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ReportingError;
use crate::sensors::DeviceMetadata;

/// Invoked when the service writes a new threshold for the device
pub type ThresholdHandler = Arc<dyn Fn(i32) + Send + Sync>;

/// Attribute values committed together
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSet(BTreeMap<String, i32>);

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: i32) {
        self.0.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<i32> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Connection to the remote device-management service
#[async_trait]
pub trait ReportingSink: Send + Sync {
    /// Publish device meta-data for the given device model
    async fn announce(&self, model_urn: &str, metadata: &DeviceMetadata) -> Result<(), ReportingError>;

    /// Commit a buffered attribute update
    async fn commit(&self, attributes: AttributeSet) -> Result<(), ReportingError>;

    /// Raise an alert carrying one attribute value
    async fn raise_alert(&self, alert_name: &str, attribute: &str, value: i32) -> Result<(), ReportingError>;

    /// Release the connection. Idempotent.
    async fn close(&self);
}

/// Pending update, sent by [`UpdateHandle::commit`]
pub struct UpdateHandle<'a, S: ReportingSink + ?Sized> {
    sink: &'a S,
    attributes: AttributeSet,
}

impl<'a, S: ReportingSink + ?Sized> UpdateHandle<'a, S> {
    pub fn set(mut self, name: &str, value: i32) -> Self {
        self.attributes.insert(name, value);
        self
    }

    pub async fn commit(self) -> Result<(), ReportingError> {
        self.sink.commit(self.attributes).await
    }
}

/// Builder entry point available on every sink, including trait objects
pub trait ReportingSinkExt: ReportingSink {
    fn begin_update(&self) -> UpdateHandle<'_, Self> {
        UpdateHandle {
            sink: self,
            attributes: AttributeSet::new(),
        }
    }
}

impl<S: ReportingSink + ?Sized> ReportingSinkExt for S {}
