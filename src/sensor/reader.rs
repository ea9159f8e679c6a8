//! Validating wrapper around a sensor device

use aeroscan_shared::{Reading, ReadingError};
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Errors reported by a sensor read
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    /// Device answered but a value was not a finite number
    #[error("Invalid sample: {0}")]
    InvalidSample(#[from] ReadingError),

    /// Device transaction failed (timing fault, wiring fault, missing driver)
    #[error("Device error: {0}")]
    Device(String),

    /// Device produced text that is not a number
    #[error("Malformed value {value:?} from {channel}")]
    Malformed { channel: &'static str, value: String },
}

/// Raw values from one device transaction; either may be NaN
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub temperature: f32,
    pub humidity: f32,
}

/// A temperature/humidity device driver
#[async_trait]
pub trait SensorDevice: Send {
    /// Perform one bounded hardware transaction
    async fn sample(&mut self) -> Result<RawSample, SensorError>;

    /// Human-readable name for diagnostics
    fn name(&self) -> &'static str;
}

/// Reads the device once per call and validates the result
pub struct SensorReader {
    device: Box<dyn SensorDevice>,
}

impl SensorReader {
    /// Wrap a device
    pub fn new(device: Box<dyn SensorDevice>) -> Self {
        Self { device }
    }

    /// Name of the wrapped device
    pub fn device_name(&self) -> &'static str {
        self.device.name()
    }

    /// Take one reading; no retries
    pub async fn read(&mut self) -> Result<Reading, SensorError> {
        let raw = self.device.sample().await?;
        debug!(
            "[SENSOR] {} raw sample: t={} h={}",
            self.device.name(),
            raw.temperature,
            raw.humidity
        );
        Ok(Reading::new(raw.temperature, raw.humidity)?)
    }
}
