//! Outbound side of a client connection

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::sync::mpsc;

use crate::error::SendError;

/// Where a publisher pushes its JSON messages
#[async_trait]
pub trait SnapshotSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), SendError>;

    /// Whether the client can still receive messages
    fn is_open(&self) -> bool;
}

/// Sending half of an upgraded WebSocket
pub struct WebSocketSink {
    sender: SplitSink<WebSocket, Message>,
    open: bool,
}

impl WebSocketSink {
    pub fn new(sender: SplitSink<WebSocket, Message>) -> Self {
        Self { sender, open: true }
    }

    /// Send a close frame if the socket is still open
    pub async fn close(&mut self) {
        if self.open {
            self.open = false;
            let _ = self.sender.close().await;
        }
    }
}

#[async_trait]
impl SnapshotSink for WebSocketSink {
    async fn send_text(&mut self, text: String) -> Result<(), SendError> {
        if !self.open {
            return Err(SendError::Closed);
        }
        match self.sender.send(Message::Text(text.into())).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // axum does not tell a peer close apart from an I/O failure;
                // either way the socket is unusable
                tracing::debug!(error = %e, "WebSocket send failed");
                self.open = false;
                Err(SendError::Closed)
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Sink backed by an unbounded channel
///
/// Lets a publisher run without a socket; the receiver plays the client.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl SnapshotSink for ChannelSink {
    async fn send_text(&mut self, text: String) -> Result<(), SendError> {
        self.tx.send(text).map_err(|_| SendError::Closed)
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}
