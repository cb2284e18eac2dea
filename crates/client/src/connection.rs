//! Connection resilience manager
//!
//! Owns one logical WebSocket slot: dialing, the read/write loop, and
//! automatic reconnection with bounded exponential backoff. Decoded frames
//! are forwarded synchronously to a single registered handler; everything
//! else (transcript assembly, action tracking) lives downstream.
//!
//! Timer-vs-manual races are serialized by an epoch counter: every
//! `connect()`/`disconnect()` bumps the epoch, and spawned dial tasks and
//! reconnect timers become inert once their epoch is stale.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use agentline_protocol::{decode_frame, encode_user_text, AgentFrame};

use crate::error::ClientError;

/// Callback receiving every decoded inbound frame, invoked on the
/// connection task. It must not call back into the [`Connection`].
pub type FrameHandler = Box<dyn FnMut(AgentFrame) + Send + 'static>;

/// Observable connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

/// Deterministic bounded backoff: `min(base * 2^attempt, max)`.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.base
            .checked_mul(factor)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

struct Inner {
    attempt: u32,
    reconnect_enabled: bool,
    epoch: u64,
    handler: Option<FrameHandler>,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    reconnect_timer: Option<JoinHandle<()>>,
    io_task: Option<JoinHandle<()>>,
}

/// Handle to the connection slot (cheap to Clone).
#[derive(Clone)]
pub struct Connection {
    url: String,
    policy: ReconnectPolicy,
    inner: Arc<Mutex<Inner>>,
    state_tx: watch::Sender<ConnectionState>,
}

impl Connection {
    pub fn new(url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        Self {
            url: url.into(),
            policy,
            inner: Arc::new(Mutex::new(Inner {
                attempt: 0,
                reconnect_enabled: true,
                epoch: 0,
                handler: None,
                outbound: None,
                reconnect_timer: None,
                io_task: None,
            })),
            state_tx,
        }
    }

    /// Register the frame handler. Single slot: the latest registration
    /// wins. Frames arriving before any handler is registered are dropped.
    pub async fn set_handler(&self, handler: impl FnMut(AgentFrame) + Send + 'static) {
        let mut inner = self.inner.lock().await;
        inner.handler = Some(Box::new(handler));
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Watch lifecycle state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Current reconnect attempt counter (0 after every successful open).
    pub async fn attempt(&self) -> u32 {
        self.inner.lock().await.attempt
    }

    /// Open the transport. No-op when already open; otherwise cancels any
    /// pending reconnect timer and dials a fresh connection.
    pub async fn connect(&self) {
        let mut inner = self.inner.lock().await;
        if self.state() == ConnectionState::Open {
            return;
        }
        self.start_dial(&mut inner);
    }

    /// Timer-driven redial. Verifies the epoch and the reconnect latch
    /// under the same lock acquisition that starts the dial, so a
    /// `disconnect()` landing between the timer firing and this call
    /// leaves the connection Closed.
    async fn reconnect(&self, epoch: u64) {
        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch || !inner.reconnect_enabled {
            return;
        }
        inner.reconnect_timer = None;
        self.start_dial(&mut inner);
    }

    fn start_dial(&self, inner: &mut Inner) {
        if let Some(timer) = inner.reconnect_timer.take() {
            timer.abort();
        }
        inner.epoch += 1;
        let epoch = inner.epoch;
        self.state_tx.send_replace(ConnectionState::Connecting);

        let conn = self.clone();
        inner.io_task = Some(tokio::spawn(async move {
            conn.run(epoch).await;
        }));
    }

    /// Close the transport and disable reconnection for the lifetime of
    /// this instance. Idempotent; cancels any pending timer and in-flight
    /// dial.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        inner.reconnect_enabled = false;
        inner.epoch += 1;
        if let Some(timer) = inner.reconnect_timer.take() {
            timer.abort();
        }
        if let Some(task) = inner.io_task.take() {
            task.abort();
        }
        inner.outbound = None;
        self.state_tx.send_replace(ConnectionState::Closed);
        info!(component = "connection", event = "connection.disconnected");
    }

    /// Encode and transmit user text iff the connection is open. Never a
    /// silent drop: when not open the caller gets `NotConnected` back.
    pub async fn send(&self, text: &str) -> Result<(), ClientError> {
        let inner = self.inner.lock().await;
        if self.state() != ConnectionState::Open {
            return Err(ClientError::NotConnected);
        }
        let payload = encode_user_text(text)?;
        match inner.outbound.as_ref() {
            Some(tx) => tx
                .send(Message::text(payload))
                .map_err(|_| ClientError::NotConnected),
            None => Err(ClientError::NotConnected),
        }
    }

    async fn run(self, epoch: u64) {
        debug!(component = "connection", event = "connection.dialing", url = %self.url);
        match connect_async(self.url.as_str()).await {
            Ok((ws, _)) => {
                let (mut sink, mut stream) = ws.split();
                let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
                {
                    let mut inner = self.inner.lock().await;
                    if inner.epoch != epoch {
                        return;
                    }
                    inner.attempt = 0;
                    inner.outbound = Some(out_tx);
                    self.state_tx.send_replace(ConnectionState::Open);
                }
                info!(component = "connection", event = "connection.open", url = %self.url);

                loop {
                    tokio::select! {
                        frame = stream.next() => match frame {
                            Some(Ok(Message::Text(payload))) => {
                                self.dispatch(payload.as_str()).await;
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {} // ping/pong/binary carry no frames
                            Some(Err(err)) => {
                                warn!(
                                    component = "connection",
                                    event = "connection.transport_error",
                                    error = %err,
                                );
                                break;
                            }
                        },
                        outbound = out_rx.recv() => match outbound {
                            Some(msg) => {
                                if let Err(err) = sink.send(msg).await {
                                    warn!(
                                        component = "connection",
                                        event = "connection.send_failed",
                                        error = %err,
                                    );
                                    break;
                                }
                            }
                            None => break,
                        },
                    }
                }
                self.on_closed(epoch).await;
            }
            Err(err) => {
                warn!(
                    component = "connection",
                    event = "connection.dial_failed",
                    url = %self.url,
                    error = %err,
                );
                self.on_closed(epoch).await;
            }
        }
    }

    async fn dispatch(&self, payload: &str) {
        let frame = match decode_frame(payload) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(
                    component = "connection",
                    event = "frame.decode_failed",
                    payload_len = payload.len(),
                    error = %err,
                );
                return;
            }
        };
        let mut inner = self.inner.lock().await;
        match inner.handler.as_mut() {
            Some(handler) => handler(frame),
            None => {
                debug!(
                    component = "connection",
                    event = "frame.dropped",
                    "no handler registered"
                );
            }
        }
    }

    /// Unexpected close path: mark Closed and, while reconnection is still
    /// enabled, schedule exactly one timer for the next attempt.
    async fn on_closed(&self, epoch: u64) {
        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch {
            return; // superseded by a newer connect() or a disconnect()
        }
        inner.outbound = None;
        inner.io_task = None;
        self.state_tx.send_replace(ConnectionState::Closed);
        if !inner.reconnect_enabled {
            return;
        }

        let attempt = inner.attempt;
        inner.attempt += 1;
        let delay = self.policy.delay_for(attempt);
        if let Some(timer) = inner.reconnect_timer.take() {
            timer.abort();
        }
        let conn = self.clone();
        inner.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            conn.reconnect(epoch).await;
        }));
        info!(
            component = "connection",
            event = "connection.reconnect_scheduled",
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
        );
    }
}
