//! Agent configuration
//!
//! All settings are fixed at build time. Secrets and endpoints can be
//! supplied through `AEROSCAN_*` environment variables when compiling;
//! everything else comes from `aeroscan_shared::defaults`.

use aeroscan_shared::{defaults, keepalive::KeepaliveConfig};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors detected at startup
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Network association settings
///
/// Joining the network is handled by the platform network manager; the
/// agent only records the identity and watches the link.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Wireless network name
    pub ssid: String,
    /// Wireless network secret
    pub passphrase: String,
    /// Interface whose link state gates the fallback path
    pub interface: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ssid: option_env!("AEROSCAN_WIFI_SSID")
                .unwrap_or("<YOUR_WIFI_SSID>")
                .into(),
            passphrase: option_env!("AEROSCAN_WIFI_PASSWORD")
                .unwrap_or("<YOUR_WIFI_PASSWORD>")
                .into(),
            interface: Some("wlan0".into()),
        }
    }
}

/// Persistent WebSocket channel settings
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Collector host
    pub host: String,
    /// Collector port
    pub port: u16,
    /// Upgrade path
    pub path: String,
    /// Use `wss://` (TLS) rather than `ws://`
    pub secure: bool,
    /// Bearer token passed as `?token=` on the upgrade request
    pub auth_token: String,
    /// Fixed delay between reconnect attempts
    pub reconnect_interval: Duration,
    /// Upper bound on a single connect + upgrade
    pub connect_timeout: Duration,
    /// Internal tick of the connection task
    pub tick_interval: Duration,
    /// Keepalive probing
    pub keepalive: KeepaliveConfig,
    /// Inbound messages retained between pumps
    pub inbound_capacity: usize,
    /// Outbound messages buffered toward the connection task
    pub outbound_capacity: usize,
}

impl ChannelConfig {
    /// Full upgrade URL including the token query parameter
    pub fn url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!(
            "{}://{}:{}{}?token={}",
            scheme, self.host, self.port, self.path, self.auth_token
        )
    }

    /// Upgrade URL with the token redacted, for logging
    pub fn display_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}:{}{}", scheme, self.host, self.port, self.path)
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            host: option_env!("AEROSCAN_WS_HOST")
                .unwrap_or(defaults::WS_HOST)
                .into(),
            port: defaults::WS_PORT,
            path: defaults::WS_PATH.into(),
            secure: true,
            auth_token: auth_token().into(),
            reconnect_interval: Duration::from_millis(defaults::RECONNECT_INTERVAL_MS),
            connect_timeout: Duration::from_millis(defaults::WS_CONNECT_TIMEOUT_MS),
            tick_interval: Duration::from_millis(defaults::CHANNEL_TICK_MS),
            keepalive: KeepaliveConfig::default(),
            inbound_capacity: defaults::INBOUND_QUEUE_CAPACITY,
            outbound_capacity: defaults::OUTBOUND_QUEUE_CAPACITY,
        }
    }
}

/// Fallback HTTP publisher settings
#[derive(Debug, Clone)]
pub struct FallbackConfig {
    /// Collector ingest URL
    pub url: String,
    /// Bearer token for the `Authorization` header
    pub auth_token: String,
    /// `User-Agent` header value
    pub user_agent: String,
    /// Whole-request timeout
    pub request_timeout: Duration,
    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,
    /// Maximum method-preserving redirects followed
    pub max_redirects: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            url: option_env!("AEROSCAN_HTTP_URL")
                .unwrap_or(defaults::HTTP_URL)
                .into(),
            auth_token: auth_token().into(),
            user_agent: defaults::USER_AGENT.into(),
            request_timeout: Duration::from_millis(defaults::HTTP_REQUEST_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(defaults::HTTP_CONNECT_TIMEOUT_MS),
            max_redirects: defaults::HTTP_MAX_REDIRECTS,
        }
    }
}

/// Supported sensor models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorModel {
    Dht11,
    #[default]
    Dht22,
}

impl std::fmt::Display for SensorModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorModel::Dht11 => write!(f, "DHT11"),
            SensorModel::Dht22 => write!(f, "DHT22"),
        }
    }
}

/// Where readings come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorBackend {
    /// Linux IIO `dht11` driver device directory
    Iio { device_path: PathBuf },
    /// Synthetic readings, optionally failing every `fail_every` samples
    Simulated { fail_every: Option<u32> },
}

/// Sensor settings
#[derive(Debug, Clone)]
pub struct SensorConfig {
    pub model: SensorModel,
    /// GPIO line the data pin is wired to (bound by the device tree overlay)
    pub gpio_pin: u8,
    pub backend: SensorBackend,
}

impl Default for SensorConfig {
    fn default() -> Self {
        let backend = match option_env!("AEROSCAN_SENSOR") {
            Some("simulated") => SensorBackend::Simulated { fail_every: None },
            _ => SensorBackend::Iio {
                device_path: defaults::IIO_DEVICE_PATH.into(),
            },
        };
        let model = match option_env!("AEROSCAN_SENSOR_MODEL") {
            Some("DHT11") | Some("dht11") => SensorModel::Dht11,
            _ => SensorModel::Dht22,
        };
        Self {
            model,
            gpio_pin: defaults::SENSOR_GPIO_PIN,
            backend,
        }
    }
}

/// Sampling loop timing
#[derive(Debug, Clone, Copy)]
pub struct SamplingConfig {
    /// Delay between cycles
    pub cadence: Duration,
    /// Delay after a failed sensor read
    pub recovery_delay: Duration,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            cadence: Duration::from_millis(defaults::SAMPLE_CADENCE_MS),
            recovery_delay: Duration::from_millis(defaults::SENSOR_RECOVERY_DELAY_MS),
        }
    }
}

/// Complete agent configuration, built once at startup
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Identifier used in diagnostics
    pub device_id: String,
    pub network: NetworkConfig,
    pub channel: ChannelConfig,
    pub fallback: FallbackConfig,
    pub sensor: SensorConfig,
    pub sampling: SamplingConfig,
    /// Poll interval while waiting for the link at startup
    pub link_poll_interval: Duration,
    /// Settle time after the link comes up
    pub link_settle_delay: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            device_id: option_env!("AEROSCAN_DEVICE_ID")
                .unwrap_or("aeroscan-001")
                .into(),
            network: NetworkConfig::default(),
            channel: ChannelConfig::default(),
            fallback: FallbackConfig::default(),
            sensor: SensorConfig::default(),
            sampling: SamplingConfig::default(),
            link_poll_interval: Duration::from_millis(defaults::LINK_POLL_INTERVAL_MS),
            link_settle_delay: Duration::from_millis(defaults::LINK_SETTLE_DELAY_MS),
        }
    }
}

impl AgentConfig {
    /// Check settings that would make the agent useless if wrong
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.ssid.is_empty() {
            return Err(ConfigError::Missing("network.ssid"));
        }
        let passphrase_len = self.network.passphrase.len();
        if passphrase_len != 0 && !(8..=63).contains(&passphrase_len) {
            return Err(ConfigError::Invalid {
                name: "network.passphrase",
                reason: format!("WPA passphrase must be 8-63 characters, got {}", passphrase_len),
            });
        }
        if self.channel.host.is_empty() {
            return Err(ConfigError::Missing("channel.host"));
        }
        if !self.channel.path.starts_with('/') {
            return Err(ConfigError::Invalid {
                name: "channel.path",
                reason: format!("must start with '/': {:?}", self.channel.path),
            });
        }
        if self.channel.auth_token.is_empty() || self.fallback.auth_token.is_empty() {
            return Err(ConfigError::Missing("auth_token"));
        }
        if !(self.fallback.url.starts_with("https://") || self.fallback.url.starts_with("http://"))
        {
            return Err(ConfigError::Invalid {
                name: "fallback.url",
                reason: format!("not an http(s) URL: {}", self.fallback.url),
            });
        }
        if self.sampling.cadence.is_zero() {
            return Err(ConfigError::Invalid {
                name: "sampling.cadence",
                reason: "must be non-zero".into(),
            });
        }
        if self.channel.keepalive.missed_threshold == 0 {
            return Err(ConfigError::Invalid {
                name: "channel.keepalive.missed_threshold",
                reason: "must be at least 1".into(),
            });
        }
        if self.channel.inbound_capacity == 0 || self.channel.outbound_capacity == 0 {
            return Err(ConfigError::Invalid {
                name: "channel queue capacity",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

fn auth_token() -> &'static str {
    option_env!("AEROSCAN_AUTH_TOKEN").unwrap_or("<AUTH_TOKEN>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timing() {
        let config = AgentConfig::default();
        assert_eq!(config.sampling.cadence, Duration::from_secs(10));
        assert_eq!(config.sampling.recovery_delay, Duration::from_secs(2));
        assert_eq!(config.channel.reconnect_interval, Duration::from_secs(5));
        assert_eq!(config.channel.keepalive.ping_interval_ms, 15_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_channel_url_carries_token() {
        let config = ChannelConfig {
            host: "collector.local".into(),
            port: 8443,
            path: "/ws".into(),
            auth_token: "secret".into(),
            ..Default::default()
        };
        assert_eq!(config.url(), "wss://collector.local:8443/ws?token=secret");
        assert_eq!(config.display_url(), "wss://collector.local:8443/ws");

        let plain = ChannelConfig {
            secure: false,
            ..config
        };
        assert!(plain.url().starts_with("ws://"));
    }

    #[test]
    fn test_validate_rejects_empty_token() {
        let mut config = AgentConfig::default();
        config.channel.auth_token.clear();
        assert_eq!(config.validate(), Err(ConfigError::Missing("auth_token")));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = AgentConfig::default();
        config.fallback.url = "ftp://example.com".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { name: "fallback.url", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_short_passphrase() {
        let mut config = AgentConfig::default();
        config.network.passphrase = "short".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { name: "network.passphrase", .. })
        ));

        // Open networks have no passphrase
        config.network.passphrase.clear();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_cadence() {
        let mut config = AgentConfig::default();
        config.sampling.cadence = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
