// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/hygrolink

//! Simulated hygrometer
//!
//! Readings fluctuate around a fixed set point following a sine wave, one
//! 15 degree step per read, so the sequence repeats every 24 reads.

use parking_lot::Mutex;

use super::{DeviceMetadata, Sensor};

/// Humidity the simulation fluctuates around (% RH)
pub const SET_POINT: i32 = 75;

/// Upper bound of the simulated range (% RH)
pub const VALUE_MAX: i32 = 100;

/// Maximum deviation from the set point
pub const AMPLITUDE: i32 = VALUE_MAX - SET_POINT;

/// Phase advance per read, in degrees
pub const PHASE_STEP_DEGREES: f64 = 15.0;

pub const THRESHOLD_MIN: i32 = 60;
pub const THRESHOLD_MAX: i32 = 100;
pub const DEFAULT_THRESHOLD: i32 = 80;

const MANUFACTURER: &str = "Sample";

/// Simulated humidity sensor with a writable maximum threshold
pub struct HumiditySensor {
    hardware_id: String,
    phase: Mutex<f64>,
    max_threshold: Mutex<i32>,
}

impl HumiditySensor {
    pub fn new(hardware_id: &str) -> Self {
        Self::with_threshold(hardware_id, DEFAULT_THRESHOLD)
    }

    /// Create a sensor with a starting threshold, clamped like [`set_max_threshold`](Self::set_max_threshold)
    pub fn with_threshold(hardware_id: &str, threshold: i32) -> Self {
        Self {
            hardware_id: hardware_id.to_string(),
            phase: Mutex::new(0.0),
            max_threshold: Mutex::new(clamp_threshold(threshold)),
        }
    }

    /// Current humidity in [50, 100]. Advances the phase.
    pub fn humidity(&self) -> i32 {
        let mut phase = self.phase.lock();
        let delta = AMPLITUDE as f64 * phase.to_radians().sin();
        // Kept in [0, 360) so long runs don't lose precision
        *phase = (*phase + PHASE_STEP_DEGREES) % 360.0;
        (SET_POINT as f64 + delta).round() as i32
    }

    /// Set the alert threshold; out of range values are clamped to [60, 100]
    pub fn set_max_threshold(&self, threshold: i32) {
        *self.max_threshold.lock() = clamp_threshold(threshold);
    }

    pub fn max_threshold(&self) -> i32 {
        *self.max_threshold.lock()
    }

    pub fn manufacturer(&self) -> &str {
        MANUFACTURER
    }

    pub fn model_number(&self) -> String {
        format!("MN-{}", self.hardware_id)
    }

    pub fn serial_number(&self) -> String {
        format!("SN-{}", self.hardware_id)
    }

    pub fn hardware_id(&self) -> &str {
        &self.hardware_id
    }
}

fn clamp_threshold(threshold: i32) -> i32 {
    threshold.clamp(THRESHOLD_MIN, THRESHOLD_MAX)
}

impl Sensor for HumiditySensor {
    fn id(&self) -> &str { &self.hardware_id }

    fn metadata(&self) -> DeviceMetadata {
        DeviceMetadata {
            manufacturer: self.manufacturer().to_string(),
            model_number: self.model_number(),
            serial_number: self.serial_number(),
            hardware_id: self.hardware_id.clone(),
        }
    }

    fn read(&self) -> i32 { self.humidity() }
    fn threshold(&self) -> i32 { self.max_threshold() }
    fn set_threshold(&self, value: i32) { self.set_max_threshold(value) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_readings_stay_in_range() {
        let sensor = HumiditySensor::new("hs");
        for _ in 0..240 {
            let value = sensor.humidity();
            assert!((SET_POINT - AMPLITUDE..=SET_POINT + AMPLITUDE).contains(&value), "{value}");
        }
    }

    #[test]
    fn test_readings_repeat_every_24() {
        let sensor = HumiditySensor::new("hs");
        let first: Vec<i32> = (0..24).map(|_| sensor.humidity()).collect();
        let second: Vec<i32> = (0..24).map(|_| sensor.humidity()).collect();
        assert_eq!(first, second);

        assert_eq!(first[0], 75);
        assert_eq!(first[1], 81);
        assert_eq!(first[6], 100);
        assert_eq!(first[12], 75);
        assert_eq!(first[18], 50);
    }

    #[test]
    fn test_threshold_clamping() {
        let sensor = HumiditySensor::new("hs");
        assert_eq!(sensor.max_threshold(), DEFAULT_THRESHOLD);

        sensor.set_max_threshold(50);
        assert_eq!(sensor.max_threshold(), 60);
        sensor.set_max_threshold(150);
        assert_eq!(sensor.max_threshold(), 100);
        sensor.set_max_threshold(75);
        assert_eq!(sensor.max_threshold(), 75);

        for v in [i32::MIN, -1, 0, 59, 60, 61, 99, 100, 101, i32::MAX] {
            sensor.set_threshold(v);
            assert_eq!(sensor.threshold(), v.min(100).max(60));
        }

        assert_eq!(HumiditySensor::with_threshold("hs", 10).threshold(), 60);
    }

    #[test]
    fn test_metadata() {
        let sensor = HumiditySensor::new("dev-1_Sample_HS");
        let meta = sensor.metadata();
        assert_eq!(meta.manufacturer, "Sample");
        assert_eq!(meta.model_number, "MN-dev-1_Sample_HS");
        assert_eq!(meta.serial_number, "SN-dev-1_Sample_HS");
        assert_eq!(meta.hardware_id, "dev-1_Sample_HS");
        assert_eq!(sensor.id(), "dev-1_Sample_HS");
    }

    #[test]
    fn test_concurrent_reads_consume_one_period() {
        let reference: Vec<i32> = {
            let sensor = HumiditySensor::new("ref");
            let mut v: Vec<i32> = (0..24).map(|_| sensor.humidity()).collect();
            v.sort_unstable();
            v
        };

        let sensor = Arc::new(HumiditySensor::new("hs"));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sensor = sensor.clone();
                std::thread::spawn(move || (0..6).map(|_| sensor.humidity()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen: Vec<i32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        seen.sort_unstable();

        assert_eq!(seen, reference);
    }
}
