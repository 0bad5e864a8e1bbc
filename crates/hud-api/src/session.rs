//! Per-connection supervision
//!
//! Each upgraded socket gets one publisher task. The supervisor reads the
//! inbound half concurrently so a client close is noticed even while the
//! publisher is waiting on the adapter.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::StreamExt;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::publisher::StreamExit;
use crate::sink::WebSocketSink;
use crate::state::AppState;

/// WebSocket upgrade handler
pub async fn stream_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| ClientSessionSupervisor::new(state).run(socket))
}

/// Owns one client connection from upgrade to teardown
pub struct ClientSessionSupervisor {
    state: AppState,
    client: String,
}

impl ClientSessionSupervisor {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            client: Uuid::new_v4().to_string(),
        }
    }

    pub async fn run(self, socket: WebSocket) {
        let client = self.client.clone();
        let active = self.state.session_opened();
        info!(client = %client, active, "Client connected");

        let (sender, mut receiver) = socket.split();
        let cancel = self.state.shutdown_token().child_token();
        let publisher = self.state.publisher(client.clone());

        let task_cancel = cancel.clone();
        let mut publish = tokio::spawn(async move {
            let mut sink = WebSocketSink::new(sender);
            let exit = publisher.run(&mut sink, task_cancel).await;
            sink.close().await;
            exit
        });

        let mut publisher_done = false;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(client = %client, "Session cancelled");
                    break;
                }
                result = &mut publish => {
                    publisher_done = true;
                    match result {
                        Ok(StreamExit::Failed(reason)) => {
                            error!(client = %client, %reason, "Telemetry stream failed");
                        }
                        Ok(exit) => debug!(client = %client, ?exit, "Telemetry stream ended"),
                        Err(e) if e.is_cancelled() => {}
                        Err(e) => error!(client = %client, error = %e, "Publisher task panicked"),
                    }
                    break;
                }
                message = receiver.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        debug!(client = %client, len = text.as_str().len(), "Ignoring control message");
                    }
                    Some(Ok(Message::Binary(data))) => {
                        debug!(client = %client, len = data.len(), "Ignoring binary message");
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(client = %client, "Client closed connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(client = %client, error = %e, "WebSocket receive failed");
                        break;
                    }
                },
            }
        }

        if !publisher_done {
            cancel.cancel();
            match publish.await {
                Ok(exit) => debug!(client = %client, ?exit, "Publisher stopped"),
                Err(e) if e.is_cancelled() => {}
                Err(e) => error!(client = %client, error = %e, "Publisher task panicked"),
            }
        }

        let active = self.state.session_closed();
        info!(client = %client, active, "Client disconnected");
    }
}
