// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/hygrolink

//! Alert latch

/// Allows one alert per excursion above the threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertLatch {
    alerted: bool,
}

impl AlertLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one reading; returns `true` when an alert must be raised.
    ///
    /// A reading equal to the threshold is not an excursion and re-arms the latch.
    pub fn observe(&mut self, reading: i32, threshold: i32) -> bool {
        if reading > threshold {
            if self.alerted {
                return false;
            }
            self.alerted = true;
            true
        } else {
            self.alerted = false;
            false
        }
    }

    pub fn is_alerted(&self) -> bool {
        self.alerted
    }
}
