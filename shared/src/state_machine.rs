//! Persistent Channel State Machine
//!
//! Defines the connection states of the persistent channel, the events the
//! connection task reports, and how each event moves the state.

use thiserror::Error;

/// Observable state of the persistent channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// A connect attempt is in progress
    #[default]
    Connecting,
    /// Upgrade completed, messages can be sent
    Connected,
    /// Peer closed the connection or the stream ended
    Disconnected,
    /// The last attempt or session ended on a fault
    Error,
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelState::Connecting => write!(f, "connecting"),
            ChannelState::Connected => write!(f, "connected"),
            ChannelState::Disconnected => write!(f, "disconnected"),
            ChannelState::Error => write!(f, "error"),
        }
    }
}

/// Classified reasons for the channel entering `Error`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelFault {
    #[error("Collector rejected credentials (HTTP {status})")]
    AuthRejected { status: u16 },

    #[error("Collector refused the upgrade (HTTP {status})")]
    HandshakeRejected { status: u16 },

    #[error("Collector unreachable: {0}")]
    Unreachable(String),

    #[error("Connect attempt timed out")]
    ConnectTimeout,

    #[error("Keepalive failed: {missed} consecutive pongs missed")]
    KeepaliveTimeout { missed: u32 },

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl ChannelFault {
    /// Whether the fault points at credentials rather than connectivity
    pub fn is_auth(&self) -> bool {
        matches!(self, ChannelFault::AuthRejected { .. })
    }
}

/// Events reported by the connection task
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A connect attempt started
    Connecting,
    /// Upgrade completed
    Connected,
    /// Session ended without a fault
    Disconnected { reason: String },
    /// Inbound text frame
    Text(String),
    /// Attempt or session ended on a fault
    Fault(ChannelFault),
}

/// Compute the state after applying an event
pub fn next_state(current: ChannelState, event: &ChannelEvent) -> ChannelState {
    use ChannelState::*;

    match (current, event) {
        (_, ChannelEvent::Connecting) => Connecting,
        (_, ChannelEvent::Connected) => Connected,
        (_, ChannelEvent::Fault(_)) => Error,

        // A close following a fault keeps the fault visible
        (Error, ChannelEvent::Disconnected { .. }) => Error,
        (_, ChannelEvent::Disconnected { .. }) => Disconnected,

        // Inbound text is diagnostic only
        (state, ChannelEvent::Text(_)) => state,
    }
}

/// Tracks the channel state and the most recent fault
#[derive(Debug, Default)]
pub struct ChannelStateMachine {
    state: ChannelState,
    last_fault: Option<ChannelFault>,
}

impl ChannelStateMachine {
    /// Create a state machine in the `Connecting` state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current state
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Most recent fault, cleared once a connection succeeds
    pub fn last_fault(&self) -> Option<&ChannelFault> {
        self.last_fault.as_ref()
    }

    /// Apply an event, returning `Some((from, to))` if the state changed
    pub fn apply(&mut self, event: &ChannelEvent) -> Option<(ChannelState, ChannelState)> {
        match event {
            ChannelEvent::Fault(fault) => self.last_fault = Some(fault.clone()),
            ChannelEvent::Connected => self.last_fault = None,
            _ => {}
        }

        let from = self.state;
        let to = next_state(from, event);
        self.state = to;
        (from != to).then_some((from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let fsm = ChannelStateMachine::new();
        assert_eq!(fsm.state(), ChannelState::Connecting);
        assert!(fsm.last_fault().is_none());
    }

    #[test]
    fn test_connect_disconnect_cycle() {
        let mut fsm = ChannelStateMachine::new();

        let change = fsm.apply(&ChannelEvent::Connected);
        assert_eq!(change, Some((ChannelState::Connecting, ChannelState::Connected)));

        let change = fsm.apply(&ChannelEvent::Disconnected {
            reason: "closed".into(),
        });
        assert_eq!(change, Some((ChannelState::Connected, ChannelState::Disconnected)));

        let change = fsm.apply(&ChannelEvent::Connecting);
        assert_eq!(change, Some((ChannelState::Disconnected, ChannelState::Connecting)));
    }

    #[test]
    fn test_fault_from_any_state() {
        for start in [
            ChannelState::Connecting,
            ChannelState::Connected,
            ChannelState::Disconnected,
            ChannelState::Error,
        ] {
            let next = next_state(start, &ChannelEvent::Fault(ChannelFault::ConnectTimeout));
            assert_eq!(next, ChannelState::Error);
        }
    }

    #[test]
    fn test_error_reenters_connecting() {
        let mut fsm = ChannelStateMachine::new();
        fsm.apply(&ChannelEvent::Fault(ChannelFault::AuthRejected { status: 401 }));
        assert_eq!(fsm.state(), ChannelState::Error);
        assert!(fsm.last_fault().is_some_and(ChannelFault::is_auth));

        fsm.apply(&ChannelEvent::Connecting);
        assert_eq!(fsm.state(), ChannelState::Connecting);
        // Fault is kept until a connection actually succeeds
        assert!(fsm.last_fault().is_some());

        fsm.apply(&ChannelEvent::Connected);
        assert!(fsm.last_fault().is_none());
    }

    #[test]
    fn test_text_does_not_change_state() {
        let mut fsm = ChannelStateMachine::new();
        fsm.apply(&ChannelEvent::Connected);
        let change = fsm.apply(&ChannelEvent::Text("{}".into()));
        assert!(change.is_none());
        assert_eq!(fsm.state(), ChannelState::Connected);
    }

    #[test]
    fn test_disconnect_after_fault_stays_error() {
        let next = next_state(
            ChannelState::Error,
            &ChannelEvent::Disconnected {
                reason: "closed".into(),
            },
        );
        assert_eq!(next, ChannelState::Error);
    }

    #[test]
    fn test_fault_display() {
        let fault = ChannelFault::KeepaliveTimeout { missed: 2 };
        assert_eq!(
            fault.to_string(),
            "Keepalive failed: 2 consecutive pongs missed"
        );
    }
}
