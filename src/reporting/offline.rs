// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/hygrolink

//! Offline sink that only logs what would be sent

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::{AttributeSet, ReportingSink};
use crate::error::ReportingError;
use crate::sensors::DeviceMetadata;

/// Reporting sink for runs without a broker
pub struct LogSink {
    endpoint_id: String,
    commits: AtomicU64,
    alerts: AtomicU64,
    last_commit: Mutex<Option<AttributeSet>>,
    closed: AtomicBool,
}

impl LogSink {
    pub fn new(endpoint_id: &str) -> Self {
        Self {
            endpoint_id: endpoint_id.to_string(),
            commits: AtomicU64::new(0),
            alerts: AtomicU64::new(0),
            last_commit: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    pub fn alert_count(&self) -> u64 {
        self.alerts.load(Ordering::Relaxed)
    }

    pub fn last_commit(&self) -> Option<AttributeSet> {
        self.last_commit.lock().clone()
    }

    fn ensure_open(&self) -> Result<(), ReportingError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ReportingError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl ReportingSink for LogSink {
    async fn announce(&self, model_urn: &str, metadata: &DeviceMetadata) -> Result<(), ReportingError> {
        self.ensure_open()?;
        info!(
            endpoint = %self.endpoint_id,
            model = %model_urn,
            serial = %metadata.serial_number,
            "Device metadata: {} {}", metadata.manufacturer, metadata.model_number
        );
        Ok(())
    }

    async fn commit(&self, attributes: AttributeSet) -> Result<(), ReportingError> {
        self.ensure_open()?;
        for (name, value) in attributes.iter() {
            debug!(endpoint = %self.endpoint_id, "Offline commit \"{}\"={}", name, value);
        }
        self.commits.fetch_add(1, Ordering::Relaxed);
        *self.last_commit.lock() = Some(attributes);
        Ok(())
    }

    async fn raise_alert(&self, alert_name: &str, attribute: &str, value: i32) -> Result<(), ReportingError> {
        self.ensure_open()?;
        debug!(endpoint = %self.endpoint_id, alert = %alert_name, "Offline alert \"{}\"={}", attribute, value);
        self.alerts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!(
                endpoint = %self.endpoint_id,
                commits = self.commit_count(),
                alerts = self.alert_count(),
                "Offline sink closed"
            );
        }
    }
}
