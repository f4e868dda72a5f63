//! Connection management for one device endpoint.
//!
//! Owns the websocket, the reconnect schedule and the lifecycle event
//! stream. Adapters never touch the socket: commands come in over an
//! mpsc channel, decoded state and lifecycle notifications go out over
//! another. Commands that arrive while no session is live are discarded,
//! not queued — a stale command replayed after a reconnect could move an
//! actuator to an unintended position.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::protocol::{self, Command, StateEvent};

/// Address of one device. Fixed once the connection is created.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// The controller firmware serves its websocket on port 81.
    pub const DEFAULT_PORT: u16 = 81;

    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}:{}/", self.host, self.port)
    }
}

/// Reconnect schedule after a failed connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Keep retrying at a fixed interval.
    Forever { delay: Duration },
    /// Give up after `attempts` consecutive connect failures.
    Bounded { attempts: u32, delay: Duration },
}

impl RetryPolicy {
    /// Browser-style client schedule: retry every 5 seconds, forever.
    pub fn ui() -> Self {
        RetryPolicy::Forever {
            delay: Duration::from_secs(5),
        }
    }

    /// Bridge schedule: 3 attempts at 30-second intervals, then give up.
    pub fn bridge() -> Self {
        RetryPolicy::Bounded {
            attempts: 3,
            delay: Duration::from_secs(30),
        }
    }

    fn delay(&self) -> Duration {
        match self {
            RetryPolicy::Forever { delay } | RetryPolicy::Bounded { delay, .. } => *delay,
        }
    }
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal: the bounded retry budget is spent. No automatic
    /// recovery; the owner re-arms by calling [`Connection::run`] again.
    Destroyed,
}

/// Lifecycle notifications and decoded device state, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Connecting,
    Connected,
    Disconnected,
    Error(String),
    Destroyed,
    State(StateEvent),
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
}

type DeviceSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One websocket connection to one device, with automatic reconnect.
pub struct Connection {
    endpoint: Endpoint,
    policy: RetryPolicy,
    pins: Vec<String>,
    state_tx: watch::Sender<LinkState>,
}

impl Connection {
    /// `pins` selects the refresh issued after every (re)connect: empty
    /// means the pin-less `(update)`, otherwise one `(update-<p>)` each.
    pub fn new(endpoint: Endpoint, policy: RetryPolicy, pins: Vec<String>) -> Self {
        let (state_tx, _) = watch::channel(LinkState::Disconnected);
        Self {
            endpoint,
            policy,
            pins,
            state_tx,
        }
    }

    /// Watch the current connection state.
    pub fn state(&self) -> watch::Receiver<LinkState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: LinkState) {
        self.state_tx.send_replace(state);
    }

    fn refresh_commands(&self) -> Vec<Command> {
        if self.pins.is_empty() {
            vec![Command::Refresh { pin: None }]
        } else {
            self.pins
                .iter()
                .map(|pin| Command::Refresh {
                    pin: Some(pin.clone()),
                })
                .collect()
        }
    }

    /// Main connection loop. Connects, runs the session, reconnects per
    /// the retry policy. Returns when the bounded budget is spent (state
    /// `Destroyed`) or when the event receiver is dropped.
    pub async fn run(&self, event_tx: mpsc::Sender<LinkEvent>, mut cmd_rx: mpsc::Receiver<Command>) {
        let url = self.endpoint.url();
        let mut failures: u32 = 0;

        loop {
            self.set_state(LinkState::Connecting);
            if event_tx.send(LinkEvent::Connecting).await.is_err() {
                debug!("Event channel closed, stopping connection to {}", url);
                self.set_state(LinkState::Disconnected);
                return;
            }
            info!("Connecting to {}", url);

            match connect_async(url.as_str()).await {
                Ok((socket, _)) => {
                    failures = 0;
                    self.set_state(LinkState::Connected);
                    let _ = event_tx.send(LinkEvent::Connected).await;
                    info!("Connected to {}", url);

                    match self.run_session(socket, &event_tx, &mut cmd_rx).await {
                        Ok(()) => info!("Connection to {} closed by peer", url),
                        Err(e) => {
                            warn!("Connection to {} failed: {}", url, e);
                            let _ = event_tx.send(LinkEvent::Error(e.to_string())).await;
                        }
                    }
                    self.set_state(LinkState::Disconnected);
                    let _ = event_tx.send(LinkEvent::Disconnected).await;
                }
                Err(e) => {
                    warn!("Cannot connect to {}: {}", url, e);
                    let _ = event_tx.send(LinkEvent::Error(e.to_string())).await;
                    self.set_state(LinkState::Disconnected);
                    let _ = event_tx.send(LinkEvent::Disconnected).await;

                    failures += 1;
                    if let RetryPolicy::Bounded { attempts, .. } = self.policy {
                        if failures >= attempts {
                            warn!(
                                "Giving up on {} after {} failed attempts",
                                url, failures
                            );
                            self.set_state(LinkState::Destroyed);
                            let _ = event_tx.send(LinkEvent::Destroyed).await;
                            return;
                        }
                    }
                }
            }

            self.wait_retry(&mut cmd_rx).await;
        }
    }

    /// One connected session: refresh first, then serve inbound frames
    /// and outbound commands until the peer closes or the transport
    /// errors. `Ok(())` is a clean close, `Err` a transport failure.
    async fn run_session(
        &self,
        socket: DeviceSocket,
        event_tx: &mpsc::Sender<LinkEvent>,
        cmd_rx: &mut mpsc::Receiver<Command>,
    ) -> Result<(), LinkError> {
        let (mut sink, mut stream) = socket.split();

        // Anything issued while we were down is stale; never replay it.
        while let Ok(cmd) = cmd_rx.try_recv() {
            debug!("Discarding command issued while disconnected: {:?}", cmd);
        }

        // The refresh goes out before any adapter command, so adapters
        // resynchronize instead of showing pre-disconnect state.
        for refresh in self.refresh_commands() {
            sink.send(Message::text(refresh.encode())).await?;
        }

        let mut commands_open = true;
        loop {
            tokio::select! {
                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Text(raw))) => {
                        match protocol::decode(raw.as_str()) {
                            Ok(events) => {
                                for event in events {
                                    if event_tx.send(LinkEvent::State(event)).await.is_err() {
                                        return Ok(());
                                    }
                                }
                            }
                            // Bad frame: drop it, keep the session.
                            Err(e) => warn!("Dropping undecodable frame from {}: {}", self.endpoint.host, e),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                },
                cmd = cmd_rx.recv(), if commands_open => match cmd {
                    Some(cmd) => {
                        let frame = cmd.encode();
                        debug!("Sending {:?} to {}", frame, self.endpoint.host);
                        sink.send(Message::text(frame)).await?;
                    }
                    // Command side gone; keep serving inbound state.
                    None => commands_open = false,
                },
            }
        }
    }

    /// Wait out the retry delay, discarding any commands issued in the
    /// meantime. The loop is sequential, so at most one retry wait is
    /// ever pending per connection.
    async fn wait_retry(&self, cmd_rx: &mut mpsc::Receiver<Command>) {
        let wait = tokio::time::sleep(self.policy.delay());
        tokio::pin!(wait);
        loop {
            tokio::select! {
                _ = &mut wait => return,
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => {
                        debug!("Discarding command issued while disconnected: {:?}", cmd)
                    }
                    None => {
                        wait.as_mut().await;
                        return;
                    }
                },
            }
        }
    }
}
