// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/hygrolink

//! Sensor traits and common types

use serde::{Deserialize, Serialize};

/// Identity published as device meta-data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    pub manufacturer: String,
    pub model_number: String,
    pub serial_number: String,
    pub hardware_id: String,
}

/// Trait for all polled sensors
///
/// Methods take `&self`; implementations guard their mutable state so the
/// threshold can be changed from another task while the polling loop reads.
pub trait Sensor: Send + Sync {
    /// Get sensor unique identifier
    fn id(&self) -> &str;

    /// Device meta-data derived from the sensor identity
    fn metadata(&self) -> DeviceMetadata;

    /// Take one reading
    fn read(&self) -> i32;

    /// Current alert threshold
    fn threshold(&self) -> i32;

    /// Update the alert threshold
    fn set_threshold(&self, value: i32);
}
