//! DHT11/DHT22 through the Linux IIO `dht11` driver
//!
//! The driver exposes one device directory per sensor with values in
//! thousandths: `in_temp_input` (m°C) and `in_humidityrelative_input` (m%RH).
//! A failed bus transaction surfaces as an I/O error on read.

use super::{RawSample, SensorDevice, SensorError};
use async_trait::async_trait;
use std::path::PathBuf;

const TEMPERATURE_FILE: &str = "in_temp_input";
const HUMIDITY_FILE: &str = "in_humidityrelative_input";

/// IIO-backed DHT sensor
#[derive(Debug, Clone)]
pub struct IioDht {
    device_path: PathBuf,
}

impl IioDht {
    /// Create a sensor reading from an IIO device directory
    pub fn new(device_path: impl Into<PathBuf>) -> Self {
        Self {
            device_path: device_path.into(),
        }
    }

    async fn read_channel(&self, channel: &'static str) -> Result<f32, SensorError> {
        let path = self.device_path.join(channel);
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SensorError::Device(format!("{}: {}", path.display(), e)))?;
        parse_milli(channel, &text)
    }
}

/// Parse a thousandths value as written by IIO
fn parse_milli(channel: &'static str, text: &str) -> Result<f32, SensorError> {
    let value = text.trim();
    value
        .parse::<i64>()
        .map(|milli| milli as f32 / 1000.0)
        .map_err(|_| SensorError::Malformed {
            channel,
            value: value.to_string(),
        })
}

#[async_trait]
impl SensorDevice for IioDht {
    async fn sample(&mut self) -> Result<RawSample, SensorError> {
        let temperature = self.read_channel(TEMPERATURE_FILE).await?;
        let humidity = self.read_channel(HUMIDITY_FILE).await?;
        Ok(RawSample {
            temperature,
            humidity,
        })
    }

    fn name(&self) -> &'static str {
        "iio-dht"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_device_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "aeroscan-iio-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_parse_milli() {
        assert_eq!(parse_milli(TEMPERATURE_FILE, "22500\n").unwrap(), 22.5);
        assert_eq!(parse_milli(TEMPERATURE_FILE, "-1250").unwrap(), -1.25);
        assert!(matches!(
            parse_milli(HUMIDITY_FILE, "abc"),
            Err(SensorError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn test_reads_device_directory() {
        let dir = temp_device_dir("ok");
        std::fs::write(dir.join(TEMPERATURE_FILE), "22500\n").unwrap();
        std::fs::write(dir.join(HUMIDITY_FILE), "55250\n").unwrap();

        let mut sensor = IioDht::new(&dir);
        let sample = sensor.sample().await.expect("sample");
        assert_eq!(sample.temperature, 22.5);
        assert_eq!(sample.humidity, 55.25);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_missing_device_is_device_error() {
        let mut sensor = IioDht::new("/nonexistent/iio:device42");
        assert!(matches!(sensor.sample().await, Err(SensorError::Device(_))));
    }
}
