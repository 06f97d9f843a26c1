// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/hygrolink

//! Polling loop - reads the sensor, reports, and raises threshold alerts

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{AlertLatch, TickSchedule};
use crate::config::{DeviceConfig, PollingConfig};
use crate::error::ReportingError;
use crate::reporting::{ReportingSink, ReportingSinkExt};
use crate::sensors::Sensor;

/// How a polling run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Cancellation was observed
    Cancelled { iterations: u64 },
    /// The configured iteration limit was reached
    Completed { iterations: u64 },
}

impl RunOutcome {
    pub fn iterations(&self) -> u64 {
        match *self {
            RunOutcome::Cancelled { iterations } | RunOutcome::Completed { iterations } => iterations,
        }
    }
}

/// Result of a single read/report/alert step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iteration {
    pub reading: i32,
    pub threshold: i32,
    pub alert_raised: bool,
}

/// Drives the read/report/alert cycle
pub struct PollingLoop {
    schedule: TickSchedule,
    max_iterations: Option<u64>,
    humidity_attribute: String,
    max_threshold_attribute: String,
    alert_name: String,
    latch: AlertLatch,
    iterations: u64,
}

impl PollingLoop {
    pub fn new(polling: &PollingConfig, device: &DeviceConfig) -> Self {
        Self {
            schedule: TickSchedule::new(polling.interval(), polling.tick()),
            max_iterations: polling.max_iterations,
            humidity_attribute: device.humidity_attribute.clone(),
            max_threshold_attribute: device.max_threshold_attribute.clone(),
            alert_name: device.alert_name.clone(),
            latch: AlertLatch::new(),
            iterations: 0,
        }
    }

    pub fn schedule(&self) -> TickSchedule {
        self.schedule
    }

    /// Readings taken so far
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn is_alerted(&self) -> bool {
        self.latch.is_alerted()
    }

    /// Run until cancelled, the iteration limit is reached, or the sink fails
    pub async fn run<S>(
        &mut self,
        sensor: &dyn Sensor,
        sink: &S,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, ReportingError>
    where
        S: ReportingSink + ?Sized,
    {
        info!(
            sensor = %sensor.id(),
            interval_ms = self.schedule.total().as_millis() as u64,
            "Polling started"
        );

        loop {
            if cancel.is_cancelled() {
                return Ok(RunOutcome::Cancelled { iterations: self.iterations });
            }

            self.poll_once(sensor, sink).await?;

            if self.max_iterations.is_some_and(|max| self.iterations >= max) {
                return Ok(RunOutcome::Completed { iterations: self.iterations });
            }

            if self.pause(cancel).await {
                debug!("Cancellation observed while waiting");
                return Ok(RunOutcome::Cancelled { iterations: self.iterations });
            }
        }
    }

    /// One read/report/alert step
    pub async fn poll_once<S>(&mut self, sensor: &dyn Sensor, sink: &S) -> Result<Iteration, ReportingError>
    where
        S: ReportingSink + ?Sized,
    {
        let reading = sensor.read();
        self.iterations += 1;
        info!("Set : \"{}\"={}", self.humidity_attribute, reading);

        sink.begin_update()
            .set(&self.humidity_attribute, reading)
            .commit()
            .await?;

        // Read after the commit so a threshold written meanwhile applies now
        let threshold = sensor.threshold();

        let alert_raised = self.latch.observe(reading, threshold);
        if alert_raised {
            warn!(
                "Alert : \"{}\"={},\"{}\"={}",
                self.humidity_attribute, reading, self.max_threshold_attribute, threshold
            );
            sink.raise_alert(&self.alert_name, &self.humidity_attribute, reading).await?;
        }

        Ok(Iteration { reading, threshold, alert_raised })
    }

    /// Sleep one interval, checking for cancellation after every tick
    async fn pause(&self, cancel: &CancellationToken) -> bool {
        for _ in 0..self.schedule.ticks() {
            tokio::time::sleep(self.schedule.tick_len()).await;
            if cancel.is_cancelled() {
                return true;
            }
        }
        false
    }
}

/// Run the loop and release the sink whatever the outcome
pub async fn run_session<S>(
    polling: &mut PollingLoop,
    sensor: &dyn Sensor,
    sink: &S,
    cancel: &CancellationToken,
) -> Result<RunOutcome, ReportingError>
where
    S: ReportingSink + ?Sized,
{
    let outcome = polling.run(sensor, sink, cancel).await;

    match &outcome {
        Ok(done) => info!(iterations = done.iterations(), "Polling stopped"),
        Err(e) => error!(iterations = polling.iterations(), "Polling failed: {}", e),
    }

    sink.close().await;
    outcome
}
