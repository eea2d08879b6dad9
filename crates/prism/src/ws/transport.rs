//! Transport adapter.
//!
//! The transport owns the physical duplex connection and exposes exactly two
//! things to the rest of the client: a synchronous `send` that queues a frame
//! for the writer task, and an inbound channel of text frames. Reconnect and
//! auth-refresh policy belong to the caller's connection gating, not here.

use std::sync::Mutex;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use log::{debug, warn};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::config::ClientConfig;

/// Errors from the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection (or its writer task) is gone.
    #[error("connection closed")]
    Closed,

    /// The initial connect failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Bad endpoint or header while building the connection request.
    #[error("invalid connection request: {0}")]
    InvalidRequest(String),
}

/// A duplex channel the dispatcher can write to.
///
/// `send` queues and returns immediately; it fails only when the connection
/// is gone. Inbound frames arrive on the channel returned at construction.
pub trait Transport: Send + Sync {
    fn send(&self, frame: String) -> Result<(), TransportError>;
}

// ============================================================================
// WebSocket transport
// ============================================================================

/// Transport over a tokio-tungstenite WebSocket connection.
pub struct WsTransport {
    outbound: mpsc::UnboundedSender<String>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WsTransport {
    /// Connect and spawn the reader/writer tasks.
    ///
    /// Returns the transport plus the inbound frame channel. The writer task
    /// also sends periodic pings to keep intermediaries from dropping the
    /// connection.
    pub async fn connect(
        config: &ClientConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<String>), TransportError> {
        let mut request = config
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(|err| TransportError::InvalidRequest(err.to_string()))?;

        if let Some(token) = &config.auth_token {
            let value = format!("Bearer {token}")
                .parse()
                .map_err(|_| TransportError::InvalidRequest("malformed auth token".to_string()))?;
            request.headers_mut().insert("Authorization", value);
        }

        let (stream, _response) = connect_async(request)
            .await
            .map_err(|err| TransportError::Connect(err.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();

        let ping_interval = Duration::from_secs(config.ping_interval_secs.max(1));
        let writer = tokio::spawn(async move {
            let mut ping = tokio::time::interval(ping_interval);
            loop {
                tokio::select! {
                    frame = outbound_rx.recv() => {
                        let Some(frame) = frame else { break };
                        if sink.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    _ = ping.tick() => {
                        if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("websocket writer task ended");
        });

        let reader = tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if inbound_tx.send(text.to_string()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        debug!("websocket closed by peer: {frame:?}");
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!("websocket read error: {err}");
                        break;
                    }
                }
            }
            debug!("websocket reader task ended");
        });

        let transport = Self {
            outbound: outbound_tx,
            tasks: Mutex::new(vec![writer, reader]),
        };
        Ok((transport, inbound_rx))
    }

    /// Abort the reader/writer tasks. Queued frames may be lost.
    pub fn close(&self) {
        let mut tasks = self.tasks.lock().expect("transport task list poisoned");
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

impl Transport for WsTransport {
    fn send(&self, frame: String) -> Result<(), TransportError> {
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Loopback transport
// ============================================================================

/// In-memory transport: frames the client sends appear on the receiver
/// returned by [`loopback`]. Used by tests and local development harnesses;
/// the inbound direction is whatever channel the caller wires into the
/// connection manager.
pub struct LoopbackTransport {
    outbound: mpsc::UnboundedSender<String>,
}

/// Build a loopback transport and the receiver observing its sent frames.
pub fn loopback() -> (LoopbackTransport, mpsc::UnboundedReceiver<String>) {
    let (outbound, sent_frames) = mpsc::unbounded_channel();
    (LoopbackTransport { outbound }, sent_frames)
}

impl Transport for LoopbackTransport {
    fn send(&self, frame: String) -> Result<(), TransportError> {
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }
}
