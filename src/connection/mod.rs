//! Persistent channel to the collector
//!
//! This module handles:
//! - A long-lived WebSocket connection with fixed-interval reconnection
//! - Keepalive probing and dead-link detection
//! - An event inbox applied to the channel state only when pumped
//! - Best-effort, non-blocking outbound sends

mod manager;

pub use manager::ChannelManager;
