mod clock;
mod config;
mod connection;
mod sampling;
mod sensor;
mod transport;

use anyhow::Context;
use clock::{Clock, TokioClock};
use config::{AgentConfig, SensorBackend};
use connection::ChannelManager;
use sampling::SamplingLoop;
use sensor::{IioDht, SensorDevice, SensorReader, SimulatedDht};
use std::sync::Arc;
use transport::{wait_for_link, AssumeLinkUp, HttpFallback, LinkMonitor, SysfsLink};

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = AgentConfig::default();
    config.validate().context("invalid configuration")?;

    info!("Edge agent starting: {}", config.device_id);
    info!(
        "  Sensor: {} on GPIO {}",
        config.sensor.model, config.sensor.gpio_pin
    );
    info!("  Network: {}", config.network.ssid);
    info!("  WebSocket: {}", config.channel.display_url());
    info!("  HTTP fallback: {}", config.fallback.url);

    let link: Arc<dyn LinkMonitor> = match &config.network.interface {
        Some(interface) => Arc::new(SysfsLink::new(interface)),
        None => Arc::new(AssumeLinkUp),
    };

    let clock = TokioClock;
    wait_for_link(link.as_ref(), &clock, config.link_poll_interval).await;
    clock.sleep(config.link_settle_delay).await;

    let device: Box<dyn SensorDevice> = match &config.sensor.backend {
        SensorBackend::Iio { device_path } => Box::new(IioDht::new(device_path.clone())),
        SensorBackend::Simulated { fail_every } => Box::new(SimulatedDht::new(*fail_every)),
    };
    let sensor = SensorReader::new(device);

    let channel = ChannelManager::new(&config.channel);
    let fallback = HttpFallback::new(&config.fallback, link.clone())
        .context("failed to build HTTP client")?;

    let mut sampling = SamplingLoop::new(sensor, channel, fallback, clock, config.sampling);

    tokio::select! {
        _ = sampling.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    Ok(())
}
