//! Realtime channel to the hub: a WebSocket carrying JSON event frames.

use std::{collections::VecDeque, time::Duration};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use shared::protocol::{decode_server_frame, ClientEmit, ServerEvent};
use tokio::{
    net::TcpStream,
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::error::TransportError;

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected { reason: String },
    /// Reconnection budget exhausted; no further attempts are made.
    GaveUp { attempts: u32 },
    Server(ServerEvent),
    Malformed { raw: String, error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based), doubling up to `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: ClientEmit) -> Result<(), TransportError>;
}

pub struct WsTransport {
    outbound: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl WsTransport {
    /// Maps the hub's HTTP base url onto its realtime endpoint.
    pub fn ws_url(server_url: &str) -> Result<String, TransportError> {
        let trimmed = server_url.trim_end_matches('/');
        let ws_url = if trimmed.starts_with("https://") {
            trimmed.replacen("https://", "wss://", 1)
        } else if trimmed.starts_with("http://") {
            trimmed.replacen("http://", "ws://", 1)
        } else {
            return Err(TransportError::InvalidUrl {
                url: server_url.to_string(),
                reason: "server_url must start with http:// or https://".to_string(),
            });
        };
        Ok(format!("{ws_url}/ws"))
    }

    /// Starts the connection task. Must be called from within a tokio runtime.
    ///
    /// The returned receiver is subscribed before the task starts, so it
    /// observes the first `Connected` event.
    pub fn connect(
        server_url: &str,
        policy: ReconnectPolicy,
    ) -> Result<(Self, broadcast::Receiver<TransportEvent>), TransportError> {
        let url = Self::ws_url(server_url)?;
        let (events, first_rx) = broadcast::channel(1024);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_connection_loop(url, policy, events, outbound_rx));
        Ok((Self { outbound, task }, first_rx))
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
impl EventSink for WsTransport {
    async fn emit(&self, event: ClientEmit) -> Result<(), TransportError> {
        let frame = serde_json::to_string(&event)?;
        debug!(event = event.name(), "queueing outbound event");
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }
}

enum PumpExit {
    Shutdown,
    Lost(String),
}

async fn run_connection_loop(
    url: String,
    policy: ReconnectPolicy,
    events: broadcast::Sender<TransportEvent>,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    // Frames not yet written to a live socket; flushed first after each connect.
    let mut pending = VecDeque::new();
    let mut failures = 0u32;
    loop {
        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                failures = 0;
                info!(url = %url, "realtime channel connected");
                let _ = events.send(TransportEvent::Connected);
                match pump(stream, &events, &mut outbound, &mut pending).await {
                    PumpExit::Shutdown => {
                        info!(url = %url, "realtime channel closed by client");
                        return;
                    }
                    PumpExit::Lost(reason) => {
                        warn!(url = %url, %reason, "realtime channel lost");
                        let _ = events.send(TransportEvent::Disconnected { reason });
                    }
                }
            }
            Err(err) => {
                failures += 1;
                warn!(url = %url, attempt = failures, "realtime connect failed: {err}");
            }
        }

        if failures >= policy.max_attempts {
            error!(url = %url, attempts = failures, "giving up on realtime channel");
            let _ = events.send(TransportEvent::GaveUp { attempts: failures });
            return;
        }
        tokio::time::sleep(policy.delay_for(failures.max(1))).await;
    }
}

async fn pump(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    events: &broadcast::Sender<TransportEvent>,
    outbound: &mut mpsc::UnboundedReceiver<String>,
    pending: &mut VecDeque<String>,
) -> PumpExit {
    let (mut writer, mut reader) = stream.split();
    if !pending.is_empty() {
        debug!(queued = pending.len(), "flushing queued outbound events");
    }
    loop {
        while let Some(frame) = pending.front() {
            if let Err(err) = writer.send(Message::Text(frame.clone())).await {
                return PumpExit::Lost(format!("websocket send failed: {err}"));
            }
            pending.pop_front();
        }
        tokio::select! {
            frame = reader.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let event = match decode_server_frame(&text) {
                        Ok(event) => {
                            debug!(event = event.name(), "realtime event received");
                            TransportEvent::Server(event)
                        }
                        Err(err) => {
                            warn!("dropping malformed realtime frame: {err}");
                            TransportEvent::Malformed {
                                raw: text,
                                error: err.to_string(),
                            }
                        }
                    };
                    let _ = events.send(event);
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|frame| frame.reason.to_string())
                        .filter(|reason| !reason.is_empty())
                        .unwrap_or_else(|| "server closed the connection".to_string());
                    return PumpExit::Lost(reason);
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    return PumpExit::Lost(format!("websocket receive failed: {err}"))
                }
                None => return PumpExit::Lost("connection ended".to_string()),
            },
            outgoing = outbound.recv() => match outgoing {
                Some(frame) => pending.push_back(frame),
                None => {
                    let _ = writer.send(Message::Close(None)).await;
                    return PumpExit::Shutdown;
                }
            },
        }
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
