//! Realtime WebSocket client implementation

use std::sync::RwLock;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::errors::ConsoleError;
use crate::realtime::events::Frame;

/// Observable state of the realtime channel.
///
/// Advisory only: a degraded channel disables automatic reconciliation but
/// must never block an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Failed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Shared connection-state cell, readable from the presentation layer
pub struct ConnectionMonitor {
    state: RwLock<ConnectionState>,
}

impl ConnectionMonitor {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
        }
    }

    pub fn set(&self, state: ConnectionState) {
        let mut current = self.state.write().unwrap_or_else(|e| e.into_inner());
        if *current != state {
            info!("Realtime channel {}", state);
        }
        *current = state;
    }

    pub fn get(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// WebSocket client wrapper
pub struct RealtimeClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    client_id: String,
}

impl RealtimeClient {
    /// Connect to the realtime endpoint
    pub async fn connect(url: &str) -> Result<Self, ConsoleError> {
        if url.is_empty() {
            return Err(ConsoleError::RealtimeError(
                "Realtime URL is not configured".to_string(),
            ));
        }

        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| ConsoleError::RealtimeError(e.to_string()))?;

        let client_id = format!("orbit-console-{}", uuid::Uuid::new_v4());
        info!("Realtime connected as {}", client_id);

        Ok(Self { ws, client_id })
    }

    /// Get the client id used for this connection
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Subscribe to a channel
    pub async fn subscribe(&mut self, channel: &str) -> Result<(), ConsoleError> {
        let frame = serde_json::json!({
            "event": "subscribe",
            "channel": channel,
            "client_id": self.client_id,
        });

        self.ws
            .send(Message::text(frame.to_string()))
            .await
            .map_err(|e| ConsoleError::RealtimeError(e.to_string()))?;

        info!("Subscribed to: {}", channel);
        Ok(())
    }

    /// Poll for the next frame.
    ///
    /// Returns `Ok(None)` for control messages and unparseable frames; an
    /// `Err` means the connection is gone and the caller should reconnect.
    pub async fn poll(&mut self) -> Result<Option<Frame>, ConsoleError> {
        match self.ws.next().await {
            Some(Ok(Message::Text(text))) => match Frame::parse(text.as_str()) {
                Ok(frame) => {
                    debug!("Received event: {}", frame.event);
                    Ok(Some(frame))
                }
                Err(e) => {
                    warn!("Unparseable realtime frame: {}", e);
                    Ok(None)
                }
            },
            Some(Ok(Message::Ping(payload))) => {
                self.ws
                    .send(Message::Pong(payload))
                    .await
                    .map_err(|e| ConsoleError::RealtimeError(e.to_string()))?;
                Ok(None)
            }
            Some(Ok(Message::Close(_))) | None => {
                Err(ConsoleError::RealtimeError("Connection closed".to_string()))
            }
            Some(Ok(_)) => Ok(None),
            Some(Err(e)) => Err(ConsoleError::RealtimeError(e.to_string())),
        }
    }

    /// Close the connection
    pub async fn disconnect(&mut self) -> Result<(), ConsoleError> {
        self.ws
            .close(None)
            .await
            .map_err(|e| ConsoleError::RealtimeError(e.to_string()))?;
        info!("Realtime disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_starts_disconnected() {
        let monitor = ConnectionMonitor::new();
        assert_eq!(monitor.get(), ConnectionState::Disconnected);
        assert!(!monitor.is_connected());
    }

    #[test]
    fn test_monitor_transitions() {
        let monitor = ConnectionMonitor::new();
        monitor.set(ConnectionState::Connected);
        assert!(monitor.is_connected());
        monitor.set(ConnectionState::Failed);
        assert_eq!(monitor.get(), ConnectionState::Failed);
    }
}
