//! Sensor module - simulated hardware

mod traits;
mod humidity;

pub use traits::{Sensor, DeviceMetadata};
pub use humidity::*;
