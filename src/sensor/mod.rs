//! Sensor acquisition
//!
//! The device driver is an opaque collaborator behind [`SensorDevice`];
//! [`SensorReader`] turns its raw samples into validated readings.

mod iio;
pub(crate) mod reader;
mod simulated;

pub use iio::IioDht;
pub use reader::{RawSample, SensorDevice, SensorError, SensorReader};
pub use simulated::SimulatedDht;
