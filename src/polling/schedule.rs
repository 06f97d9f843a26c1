// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/hygrolink

//! Tick schedule for interruptible waits

use std::time::Duration;

/// A polling interval split into short ticks
///
/// The remainder of `interval / tick` is spread evenly over the ticks, so
/// `ticks * tick_len` stays within one millisecond per tick of `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSchedule {
    ticks: u64,
    tick_len: Duration,
}

impl TickSchedule {
    pub fn new(interval: Duration, tick: Duration) -> Self {
        let interval_ms = interval.as_millis() as u64;
        let tick_ms = (tick.as_millis() as u64).max(1);

        if tick_ms > interval_ms {
            return Self {
                ticks: 1,
                tick_len: Duration::from_millis(interval_ms),
            };
        }

        let ticks = interval_ms / tick_ms;
        let tick_len = tick_ms + (interval_ms - ticks * tick_ms) / ticks;
        Self {
            ticks,
            tick_len: Duration::from_millis(tick_len),
        }
    }

    /// Number of ticks per interval
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Length of one tick
    pub fn tick_len(&self) -> Duration {
        self.tick_len
    }

    pub fn total(&self) -> Duration {
        let tick_ms = self.tick_len.as_millis() as u64;
        Duration::from_millis(tick_ms.saturating_mul(self.ticks))
    }
}
