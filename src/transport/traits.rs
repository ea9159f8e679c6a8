//! Transport trait abstraction for the two publish paths

use aeroscan_shared::Reading;
use async_trait::async_trait;

/// A long-lived channel whose state only advances when pumped
pub trait PersistentChannel {
    /// Apply everything the connection task reported since the last pump
    fn pump(&mut self);

    /// Last observed connectivity; never performs I/O
    fn is_connected(&self) -> bool;

    /// Queue a text message if connected, otherwise do nothing
    fn send(&mut self, message: String);

    /// Take inbound messages collected by previous pumps
    fn take_inbound(&mut self) -> Vec<String>;
}

/// Outcome of a one-shot fallback delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    /// Collector answered 2xx
    Success { status: u16, body: String },
    /// Collector answered with any other status
    HttpError { status: u16, body: String },
    /// Link was down, no request attempted
    NetworkUnavailable,
    /// Request exceeded the configured timeout
    TimedOut,
    /// Request could not be completed (DNS, connect, TLS, ...)
    TransportError(String),
}

impl DeliveryResult {
    /// Whether the collector accepted the reading
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryResult::Success { .. })
    }
}

impl std::fmt::Display for DeliveryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryResult::Success { status, body } => write!(f, "HTTP {} ok: {}", status, body),
            DeliveryResult::HttpError { status, body } => write!(f, "HTTP {} error: {}", status, body),
            DeliveryResult::NetworkUnavailable => write!(f, "network unavailable"),
            DeliveryResult::TimedOut => write!(f, "request timed out"),
            DeliveryResult::TransportError(e) => write!(f, "transport error: {}", e),
        }
    }
}

/// One-shot delivery of a reading
#[async_trait]
pub trait FallbackPublisher: Send + Sync {
    async fn publish(&self, reading: &Reading) -> DeliveryResult;
}

/// Reports whether the network link is active
#[async_trait]
pub trait LinkMonitor: Send + Sync {
    async fn is_link_up(&self) -> bool;
}
