//! Channel manager with a background connection task and a pumped inbox

use crate::config::ChannelConfig;
use crate::transport::websocket::{self, WsStream};
use crate::transport::PersistentChannel;
use aeroscan_shared::keepalive::{KeepaliveAction, KeepaliveTracker};
use aeroscan_shared::state_machine::{
    ChannelEvent, ChannelFault, ChannelState, ChannelStateMachine,
};
use futures::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, warn};

/// State events in flight between the task and the manager
///
/// The task waits for room, so a slow pump delays it instead of losing a
/// transition.
const STATE_EVENT_CAPACITY: usize = 8;

/// Bounded ring of inbound text shared with the connection task
#[derive(Debug)]
struct InboundBuffer {
    messages: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl InboundBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            messages: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append, dropping the oldest message when full. Returns true if one was dropped.
    fn push(&self, text: String) -> bool {
        let mut messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        let dropped = messages.len() >= self.capacity;
        if dropped {
            messages.pop_front();
        }
        messages.push_back(text);
        dropped
    }

    fn drain(&self) -> Vec<String> {
        let mut messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        messages.drain(..).collect()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Owns the persistent channel on behalf of the sampling loop
///
/// The connection task reports into an inbox; nothing observable changes
/// until [`PersistentChannel::pump`] drains it.
pub struct ChannelManager {
    endpoint: String,
    fsm: ChannelStateMachine,
    /// State events from the connection task
    event_rx: mpsc::Receiver<ChannelEvent>,
    /// Text frames from the connection task, not yet pumped
    pending: Arc<InboundBuffer>,
    /// Messages toward the connection task
    outbound_tx: mpsc::Sender<String>,
    inbound: VecDeque<String>,
    inbound_capacity: usize,
    task: JoinHandle<()>,
    task_stopped: bool,
}

impl ChannelManager {
    /// Create a manager and start connecting in the background
    pub fn new(config: &ChannelConfig) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel::<String>(config.outbound_capacity);
        let (event_tx, event_rx) = mpsc::channel::<ChannelEvent>(STATE_EVENT_CAPACITY);
        let pending = Arc::new(InboundBuffer::new(config.inbound_capacity));

        let config_clone = config.clone();
        let task_pending = pending.clone();
        let task = tokio::spawn(async move {
            connection_loop(config_clone, outbound_rx, event_tx, task_pending).await;
        });

        info!(
            "[WS] Connecting to {} (reconnect every {:?})",
            config.display_url(),
            config.reconnect_interval
        );

        Self {
            endpoint: config.display_url(),
            fsm: ChannelStateMachine::new(),
            event_rx,
            pending,
            outbound_tx,
            inbound: VecDeque::with_capacity(config.inbound_capacity),
            inbound_capacity: config.inbound_capacity,
            task,
            task_stopped: false,
        }
    }

    /// Last observed state
    pub fn state(&self) -> ChannelState {
        self.fsm.state()
    }

    /// Most recent fault, if the channel has not connected since
    pub fn last_fault(&self) -> Option<&ChannelFault> {
        self.fsm.last_fault()
    }

    fn apply(&mut self, event: ChannelEvent) {
        match &event {
            ChannelEvent::Connecting => debug!("[WS] Connect attempt to {}", self.endpoint),
            ChannelEvent::Connected => info!("[WS] Connected to {}", self.endpoint),
            ChannelEvent::Disconnected { reason } => {
                warn!("[WS] Disconnected: {}", reason)
            }
            ChannelEvent::Fault(fault) if fault.is_auth() => {
                error!("[WS] {} - check the auth token", fault)
            }
            ChannelEvent::Fault(fault) => warn!("[WS] {}", fault),
            ChannelEvent::Text(text) => info!("[WS] Received: {}", text),
        }

        if let Some((from, to)) = self.fsm.apply(&event) {
            debug!("[WS] State: {} -> {}", from, to);
        }

        if let ChannelEvent::Text(text) = event {
            if self.inbound.len() >= self.inbound_capacity {
                self.inbound.pop_front();
                debug!("[WS] Inbound queue full, dropped oldest message");
            }
            self.inbound.push_back(text);
        }
    }
}

impl PersistentChannel for ChannelManager {
    fn pump(&mut self) {
        for text in self.pending.drain() {
            self.apply(ChannelEvent::Text(text));
        }

        loop {
            match self.event_rx.try_recv() {
                Ok(event) => self.apply(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.task_stopped {
                        self.task_stopped = true;
                        self.apply(ChannelEvent::Fault(ChannelFault::Protocol(
                            "connection task stopped".into(),
                        )));
                    }
                    break;
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    fn send(&mut self, message: String) {
        if !self.is_connected() {
            match self.last_fault() {
                Some(fault) => debug!("[WS] Not connected ({}), message not sent", fault),
                None => debug!("[WS] Not connected ({}), message not sent", self.state()),
            }
            return;
        }

        match self.outbound_tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("[WS] Outbound queue full, message dropped"),
            Err(TrySendError::Closed(_)) => warn!("[WS] Connection task gone, message dropped"),
        }
    }

    fn take_inbound(&mut self) -> Vec<String> {
        self.inbound.drain(..).collect()
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Connect, run the session, wait the fixed backoff, repeat
async fn connection_loop(
    config: ChannelConfig,
    mut outbound_rx: mpsc::Receiver<String>,
    event_tx: mpsc::Sender<ChannelEvent>,
    pending: Arc<InboundBuffer>,
) {
    loop {
        // Messages queued for a session that is gone are not carried over
        let mut stale = 0usize;
        while outbound_rx.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            debug!("[WS] Discarded {} unsent messages", stale);
        }

        if event_tx.send(ChannelEvent::Connecting).await.is_err() {
            break;
        }

        let outcome = match websocket::connect(&config).await {
            Ok(stream) => {
                if event_tx.send(ChannelEvent::Connected).await.is_err() {
                    break;
                }
                match run_session(stream, &config, &mut outbound_rx, &pending).await {
                    Ok(reason) => ChannelEvent::Disconnected { reason },
                    Err(fault) => ChannelEvent::Fault(fault),
                }
            }
            Err(fault) => ChannelEvent::Fault(fault),
        };

        if event_tx.send(outcome).await.is_err() {
            break;
        }

        tokio::time::sleep(config.reconnect_interval).await;
    }
}

/// Handle an open connection until it closes or faults
///
/// Returns the close reason for a clean end, or the fault otherwise.
async fn run_session(
    stream: WsStream,
    config: &ChannelConfig,
    outbound_rx: &mut mpsc::Receiver<String>,
    pending: &InboundBuffer,
) -> Result<String, ChannelFault> {
    let (mut sink, mut source) = stream.split();
    let mut keepalive = KeepaliveTracker::new(config.keepalive);
    let started = Instant::now();

    let mut ticker = interval(config.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now_ms = started.elapsed().as_millis() as u64;
                match keepalive.poll(now_ms) {
                    KeepaliveAction::Idle => {}
                    KeepaliveAction::SendPing => {
                        sink.send(Message::Ping(Vec::new()))
                            .await
                            .map_err(websocket::classify)?;
                    }
                    KeepaliveAction::Dead { missed } => {
                        let _ = timeout(Duration::from_secs(1), sink.close()).await;
                        return Err(ChannelFault::KeepaliveTimeout { missed });
                    }
                }
            }

            Some(text) = outbound_rx.recv() => {
                sink.send(Message::Text(text))
                    .await
                    .map_err(websocket::classify)?;
            }

            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if pending.push(text) {
                        debug!("[WS] Inbox full, dropped oldest message");
                    }
                }
                Some(Ok(Message::Pong(_))) => keepalive.on_pong(),
                Some(Ok(Message::Close(frame))) => {
                    let reason = match frame {
                        Some(frame) => format!(
                            "closed by server ({}): {}",
                            u16::from(frame.code),
                            frame.reason
                        ),
                        None => "closed by server".to_string(),
                    };
                    return Ok(reason);
                }
                // Pings are answered by tungstenite; binary frames are not used
                Some(Ok(_)) => {}
                Some(Err(tungstenite::Error::ConnectionClosed)) | None => {
                    return Ok("stream ended".to_string());
                }
                Some(Err(e)) => return Err(websocket::classify(e)),
            }
        }
    }
}
