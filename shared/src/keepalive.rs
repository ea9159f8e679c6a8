//! Keepalive probe tracking
//!
//! The connection task asks the tracker what to do on every internal tick.
//! Time is passed in as milliseconds since the session started so the logic
//! stays independent of any clock.

use crate::defaults;

/// Keepalive timing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveConfig {
    /// Interval between pings
    pub ping_interval_ms: u64,
    /// Time allowed for the matching pong
    pub pong_timeout_ms: u64,
    /// Consecutive missed pongs before the link is declared dead
    pub missed_threshold: u32,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: defaults::PING_INTERVAL_MS,
            pong_timeout_ms: defaults::PONG_TIMEOUT_MS,
            missed_threshold: defaults::MISSED_PONG_THRESHOLD,
        }
    }
}

/// What the connection task should do on this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveAction {
    /// Nothing due
    Idle,
    /// Send a ping now
    SendPing,
    /// Too many pongs missed, tear the connection down
    Dead { missed: u32 },
}

/// Per-session keepalive state
#[derive(Debug)]
pub struct KeepaliveTracker {
    config: KeepaliveConfig,
    last_ping_ms: u64,
    awaiting_pong: bool,
    missed: u32,
}

impl KeepaliveTracker {
    /// Start tracking a session that opened at time zero
    pub fn new(config: KeepaliveConfig) -> Self {
        Self {
            config,
            last_ping_ms: 0,
            awaiting_pong: false,
            missed: 0,
        }
    }

    /// Consecutive pongs missed so far
    pub fn missed(&self) -> u32 {
        self.missed
    }

    /// Decide the action for the current time
    pub fn poll(&mut self, now_ms: u64) -> KeepaliveAction {
        let since_ping = now_ms.saturating_sub(self.last_ping_ms);

        if self.awaiting_pong && since_ping >= self.config.pong_timeout_ms {
            self.awaiting_pong = false;
            self.missed += 1;
            if self.missed >= self.config.missed_threshold {
                return KeepaliveAction::Dead {
                    missed: self.missed,
                };
            }
        }

        if !self.awaiting_pong && since_ping >= self.config.ping_interval_ms {
            self.last_ping_ms = now_ms;
            self.awaiting_pong = true;
            return KeepaliveAction::SendPing;
        }

        KeepaliveAction::Idle
    }

    /// Record a pong from the peer
    pub fn on_pong(&mut self) {
        self.awaiting_pong = false;
        self.missed = 0;
    }
}
