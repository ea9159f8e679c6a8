//! Synthetic DHT sensor for running without hardware

use super::{RawSample, SensorDevice, SensorError};
use async_trait::async_trait;

/// Produces slowly drifting, deterministic readings
#[derive(Debug, Clone)]
pub struct SimulatedDht {
    tick: u32,
    /// Emit a NaN humidity every `fail_every` samples
    fail_every: Option<u32>,
}

impl SimulatedDht {
    pub fn new(fail_every: Option<u32>) -> Self {
        Self {
            tick: 0,
            fail_every: fail_every.filter(|n| *n > 0),
        }
    }
}

#[async_trait]
impl SensorDevice for SimulatedDht {
    async fn sample(&mut self) -> Result<RawSample, SensorError> {
        self.tick = self.tick.wrapping_add(1);
        let phase = self.tick as f32 / 30.0;

        let temperature = 22.0 + 1.5 * phase.sin();
        let humidity = match self.fail_every {
            Some(n) if self.tick % n == 0 => f32::NAN,
            _ => 50.0 + 5.0 * phase.cos(),
        };

        Ok(RawSample {
            temperature,
            humidity,
        })
    }

    fn name(&self) -> &'static str {
        "simulated-dht"
    }
}
