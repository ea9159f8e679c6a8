//! Aeroscan Shared Types
//!
//! This crate provides the data model, wire codec and connection state
//! machine shared by the aeroscan edge agent. Nothing in here performs I/O.

pub mod codec;
pub mod keepalive;
pub mod state_machine;

use thiserror::Error;

/// Default operating parameters for the agent
pub mod defaults {
    /// Interval between sampling cycles in milliseconds
    pub const SAMPLE_CADENCE_MS: u64 = 10_000;

    /// Delay after a failed sensor read before the next attempt
    pub const SENSOR_RECOVERY_DELAY_MS: u64 = 2_000;

    /// Fixed delay between WebSocket reconnect attempts
    pub const RECONNECT_INTERVAL_MS: u64 = 5_000;

    /// Upper bound on a single WebSocket connect + upgrade
    pub const WS_CONNECT_TIMEOUT_MS: u64 = 10_000;

    /// Keepalive ping interval
    pub const PING_INTERVAL_MS: u64 = 15_000;

    /// Time allowed for a pong before the probe counts as missed
    pub const PONG_TIMEOUT_MS: u64 = 3_000;

    /// Consecutive missed pongs before the connection is declared dead
    pub const MISSED_PONG_THRESHOLD: u32 = 2;

    /// Internal tick of the connection task
    pub const CHANNEL_TICK_MS: u64 = 250;

    /// Fallback HTTP request timeout (kept inside the sampling cadence)
    pub const HTTP_REQUEST_TIMEOUT_MS: u64 = 8_000;

    /// Fallback HTTP connect timeout
    pub const HTTP_CONNECT_TIMEOUT_MS: u64 = 5_000;

    /// Maximum method-preserving redirects followed by the fallback client
    pub const HTTP_MAX_REDIRECTS: usize = 10;

    /// Inbound messages retained between pumps
    pub const INBOUND_QUEUE_CAPACITY: usize = 16;

    /// Outbound messages buffered toward the connection task
    pub const OUTBOUND_QUEUE_CAPACITY: usize = 32;

    /// Poll interval while waiting for the network link at startup
    pub const LINK_POLL_INTERVAL_MS: u64 = 500;

    /// Settle time after the link comes up, before opening the channel
    pub const LINK_SETTLE_DELAY_MS: u64 = 2_000;

    pub const WS_HOST: &str = "websocket.aeroscan.site";
    pub const WS_PORT: u16 = 443;
    pub const WS_PATH: &str = "/";
    pub const HTTP_URL: &str = "https://www.aeroscan.site/api/sensor-data";
    pub const USER_AGENT: &str = "aeroscan-node/0.1";
    pub const SENSOR_GPIO_PIN: u8 = 4;
    pub const IIO_DEVICE_PATH: &str = "/sys/bus/iio/devices/iio:device0";
}

/// Errors raised when building a reading from raw sensor values
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReadingError {
    #[error("Temperature is not a finite number: {0}")]
    InvalidTemperature(f32),

    #[error("Humidity is not a finite number: {0}")]
    InvalidHumidity(f32),
}

/// One sampled set of environmental measurements
///
/// Temperature and humidity are always finite: a reading is either whole or
/// it does not exist. Particulate fields are reserved for future sensors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    temperature: f32,
    humidity: f32,
    pm25: Option<f32>,
    pm10: Option<f32>,
}

impl Reading {
    /// Build a reading from temperature (°C) and relative humidity (%)
    pub fn new(temperature: f32, humidity: f32) -> Result<Self, ReadingError> {
        if !temperature.is_finite() {
            return Err(ReadingError::InvalidTemperature(temperature));
        }
        if !humidity.is_finite() {
            return Err(ReadingError::InvalidHumidity(humidity));
        }
        Ok(Self {
            temperature,
            humidity,
            pm25: None,
            pm10: None,
        })
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn humidity(&self) -> f32 {
        self.humidity
    }

    pub fn pm25(&self) -> Option<f32> {
        self.pm25
    }

    pub fn pm10(&self) -> Option<f32> {
        self.pm10
    }
}
