//! Sampling loop controller

use crate::clock::Clock;
use crate::config::SamplingConfig;
use crate::sensor::{SensorError, SensorReader};
use crate::transport::{DeliveryResult, FallbackPublisher, PersistentChannel};
use aeroscan_shared::{codec, Reading};
use tracing::{debug, error, info, warn};

/// What happened during one cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Sensor read failed; nothing was published
    SensorFailed(SensorError),
    /// Reading handed to the persistent channel
    SentPersistent,
    /// Channel was down; fallback publisher was used
    Fallback(DeliveryResult),
    /// Reading could not be encoded and was dropped
    EncodeFailed(String),
}

/// Runs the read-publish cycle against a sensor and two publish paths
pub struct SamplingLoop<P, F, C> {
    sensor: SensorReader,
    channel: P,
    fallback: F,
    clock: C,
    config: SamplingConfig,
    cycles: u64,
}

impl<P, F, C> SamplingLoop<P, F, C>
where
    P: PersistentChannel,
    F: FallbackPublisher,
    C: Clock,
{
    pub fn new(sensor: SensorReader, channel: P, fallback: F, clock: C, config: SamplingConfig) -> Self {
        Self {
            sensor,
            channel,
            fallback,
            clock,
            config,
            cycles: 0,
        }
    }

    #[cfg(test)]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    #[cfg(test)]
    pub fn channel(&self) -> &P {
        &self.channel
    }

    #[cfg(test)]
    pub fn fallback(&self) -> &F {
        &self.fallback
    }

    /// Run cycles forever
    pub async fn run(&mut self) {
        info!(
            "[LOOP] Sampling every {:?} from {}",
            self.config.cadence,
            self.sensor.device_name()
        );
        loop {
            let outcome = self.run_cycle().await;
            debug!("[LOOP] Cycle {} finished: {:?}", self.cycles, outcome);
        }
    }

    /// Run one cycle including its trailing delay
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.cycles += 1;

        // Always pump, even if this cycle publishes nothing
        self.channel.pump();
        for message in self.channel.take_inbound() {
            match codec::inbound_kind(&message) {
                Some(kind) => debug!("[LOOP] Inbound {} message ignored", kind),
                None => debug!("[LOOP] Inbound text ignored"),
            }
        }

        let reading = match self.sensor.read().await {
            Ok(reading) => reading,
            Err(e) => {
                warn!("[LOOP] Failed to read from sensor: {}", e);
                self.clock.sleep(self.config.recovery_delay).await;
                return CycleOutcome::SensorFailed(e);
            }
        };

        let outcome = self.publish(&reading).await;
        self.clock.sleep(self.config.cadence).await;
        outcome
    }

    async fn publish(&mut self, reading: &Reading) -> CycleOutcome {
        if self.channel.is_connected() {
            let message = match codec::encode_update(reading) {
                Ok(message) => message,
                Err(e) => {
                    error!("[LOOP] Dropping reading, encode failed: {}", e);
                    return CycleOutcome::EncodeFailed(e.to_string());
                }
            };
            self.channel.send(message);
            info!(
                "[LOOP] Sent via WebSocket: temperature={:.2} humidity={:.2}",
                reading.temperature(),
                reading.humidity()
            );
            return CycleOutcome::SentPersistent;
        }

        info!("[LOOP] WebSocket not connected, using HTTP fallback");
        let result = self.fallback.publish(reading).await;
        if result.is_delivered() {
            info!("[LOOP] Fallback delivered: {}", result);
        } else if result == DeliveryResult::NetworkUnavailable {
            warn!("[LOOP] Reading dropped: {}", result);
        } else {
            error!("[LOOP] Reading dropped: {}", result);
        }
        CycleOutcome::Fallback(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::testing::RecordingClock;
    use crate::sensor::reader::testing::{sample, ScriptedDevice};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MockChannel {
        connected: bool,
        /// Pump number at which the channel comes up
        connect_on_pump: Option<u32>,
        pumps: u32,
        sent: Vec<String>,
        inbound: Vec<String>,
    }

    impl PersistentChannel for MockChannel {
        fn pump(&mut self) {
            self.pumps += 1;
            if self.connect_on_pump == Some(self.pumps) {
                self.connected = true;
            }
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn send(&mut self, message: String) {
            self.sent.push(message);
        }

        fn take_inbound(&mut self) -> Vec<String> {
            std::mem::take(&mut self.inbound)
        }
    }

    struct MockFallback {
        result: DeliveryResult,
        published: Mutex<Vec<Reading>>,
    }

    impl MockFallback {
        fn returning(result: DeliveryResult) -> Self {
            Self {
                result,
                published: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.published.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl FallbackPublisher for MockFallback {
        async fn publish(&self, reading: &Reading) -> DeliveryResult {
            self.published.lock().unwrap().push(*reading);
            self.result.clone()
        }
    }

    fn ok_200() -> DeliveryResult {
        DeliveryResult::Success {
            status: 200,
            body: "ok".into(),
        }
    }

    fn build(
        script: Vec<Result<crate::sensor::RawSample, SensorError>>,
        channel: MockChannel,
        fallback: MockFallback,
    ) -> (SamplingLoop<MockChannel, MockFallback, RecordingClock>, RecordingClock) {
        let (device, _) = ScriptedDevice::new(script);
        let clock = RecordingClock::default();
        let sampling = SamplingLoop::new(
            SensorReader::new(Box::new(device)),
            channel,
            fallback,
            clock.clone(),
            SamplingConfig::default(),
        );
        (sampling, clock)
    }

    #[tokio::test]
    async fn test_connected_sends_envelope_once() {
        let channel = MockChannel {
            connected: true,
            ..Default::default()
        };
        let (mut sampling, clock) =
            build(vec![sample(22.5, 55.25)], channel, MockFallback::returning(ok_200()));

        let outcome = sampling.run_cycle().await;

        assert_eq!(outcome, CycleOutcome::SentPersistent);
        assert_eq!(
            sampling.channel().sent,
            vec![r#"{"type":"UPDATE_DATA","payload":{"temperature":22.50,"humidity":55.25,"pm25":null,"pm10":null}}"#.to_string()]
        );
        assert_eq!(sampling.fallback().calls(), 0);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(10)]);
    }

    #[tokio::test]
    async fn test_disconnected_uses_fallback() {
        let (mut sampling, clock) = build(
            vec![sample(22.5, 55.25)],
            MockChannel::default(),
            MockFallback::returning(ok_200()),
        );

        let outcome = sampling.run_cycle().await;

        assert_eq!(outcome, CycleOutcome::Fallback(ok_200()));
        assert!(sampling.channel().sent.is_empty());
        assert_eq!(sampling.fallback().calls(), 1);
        let published = sampling.fallback().published.lock().unwrap()[0];
        assert_eq!(published.temperature(), 22.5);
        assert_eq!(published.humidity(), 55.25);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(10)]);
    }

    #[tokio::test]
    async fn test_network_unavailable_is_reported() {
        let (mut sampling, _) = build(
            vec![sample(22.5, 55.25)],
            MockChannel::default(),
            MockFallback::returning(DeliveryResult::NetworkUnavailable),
        );

        let outcome = sampling.run_cycle().await;
        assert_eq!(
            outcome,
            CycleOutcome::Fallback(DeliveryResult::NetworkUnavailable)
        );
    }

    #[tokio::test]
    async fn test_sensor_failure_skips_publish() {
        let channel = MockChannel {
            connected: true,
            ..Default::default()
        };
        let (mut sampling, clock) = build(
            vec![sample(22.5, f32::NAN)],
            channel,
            MockFallback::returning(ok_200()),
        );

        let outcome = sampling.run_cycle().await;

        assert!(matches!(outcome, CycleOutcome::SensorFailed(_)));
        assert!(sampling.channel().sent.is_empty());
        assert_eq!(sampling.fallback().calls(), 0);
        // Only the recovery delay, not the cadence
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2)]);
    }

    #[tokio::test]
    async fn test_pump_runs_every_cycle() {
        let script = vec![
            sample(21.0, 40.0),
            sample(f32::NAN, 40.0),
            sample(21.5, 41.0),
            Err(SensorError::Device("timeout".into())),
            sample(22.0, 42.0),
        ];
        let (mut sampling, clock) =
            build(script, MockChannel::default(), MockFallback::returning(ok_200()));

        for _ in 0..5 {
            sampling.run_cycle().await;
        }

        assert_eq!(sampling.cycles(), 5);
        assert_eq!(sampling.channel().pumps, 5);
        assert_eq!(sampling.fallback().calls(), 3);
        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_secs(10),
                Duration::from_secs(2),
                Duration::from_secs(10),
                Duration::from_secs(2),
                Duration::from_secs(10),
            ]
        );
        assert_eq!(clock.elapsed(), Duration::from_secs(34));
    }

    #[tokio::test]
    async fn test_paths_are_exclusive_per_cycle() {
        let channel = MockChannel {
            connect_on_pump: Some(3),
            ..Default::default()
        };
        let script = vec![sample(20.0, 50.0)];
        let (mut sampling, _) = build(script, channel, MockFallback::returning(ok_200()));

        let mut outcomes = Vec::new();
        for _ in 0..4 {
            outcomes.push(sampling.run_cycle().await);
        }

        // Cycles 1-2 fall back; from cycle 3 the channel found by that
        // cycle's pump is used at once
        assert!(matches!(outcomes[0], CycleOutcome::Fallback(_)));
        assert!(matches!(outcomes[1], CycleOutcome::Fallback(_)));
        assert_eq!(outcomes[2], CycleOutcome::SentPersistent);
        assert_eq!(outcomes[3], CycleOutcome::SentPersistent);
        assert_eq!(sampling.fallback().calls(), 2);
        assert_eq!(sampling.channel().sent.len(), 2);
    }

    #[tokio::test]
    async fn test_inbound_messages_are_consumed() {
        let channel = MockChannel {
            connected: true,
            inbound: vec![r#"{"type":"PING"}"#.into(), "plain".into()],
            ..Default::default()
        };
        let (mut sampling, _) =
            build(vec![sample(20.0, 50.0)], channel, MockFallback::returning(ok_200()));

        sampling.run_cycle().await;
        assert!(sampling.channel().inbound.is_empty());
        assert_eq!(sampling.channel().sent.len(), 1);
    }
}
