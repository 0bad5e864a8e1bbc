//! End-to-end tests for the telemetry WebSocket
//!
//! Each test binds the router to an ephemeral port and connects with a
//! real WebSocket client.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use hud_api::{create_router, AppState, StreamingConfig};
use hud_core::ParameterCatalog;
use hud_obd::adapter::mock::MockDriver;
use hud_obd::{AdapterConfig, ConnectionManager};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Test server
// =============================================================================

struct TestServer {
    addr: SocketAddr,
    state: AppState,
    driver: MockDriver,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    async fn start(connected: bool) -> Self {
        let driver = MockDriver::new();
        let manager = Arc::new(ConnectionManager::new(
            Arc::new(driver.clone()),
            AdapterConfig::default(),
        ));
        if connected {
            manager.connect().await.unwrap();
        }

        let streaming = StreamingConfig {
            poll_interval_ms: 50,
            degraded_interval_ms: 100,
        };
        let state = AppState::new(manager, Arc::new(ParameterCatalog::standard()), streaming);
        let router = create_router(state.clone(), "/ws");

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            driver,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    async fn connect(&self, path: &str) -> Client {
        let url = format!("ws://{}{}", self.addr, path);
        let (client, _) = connect_async(url).await.unwrap();
        client
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.state.shutdown_token().cancel();
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn next_snapshot(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(RECV_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for a snapshot")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn wait_for<F, Fut>(condition: F) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

// =============================================================================
// Streaming
// =============================================================================

#[tokio::test]
async fn test_disconnected_stream_has_full_schema() {
    let server = TestServer::start(false).await;
    let mut client = server.connect("/ws").await;

    let snapshot = next_snapshot(&mut client).await;
    assert_eq!(snapshot["status"], "OBD_DISCONNECTED");

    let object = snapshot.as_object().unwrap();
    for key in ParameterCatalog::standard().schema_keys() {
        assert!(object.contains_key(&key), "missing key {key}");
    }
    assert!(!object.contains_key("error_details"));
    assert_eq!(snapshot["rpm"], Value::Null);
    assert_eq!(snapshot["speed_unit"], "mph");
    assert_eq!(snapshot["mil_on"], false);
    assert_eq!(snapshot["dtc_count"], 0);
    assert!(server.driver.requests().is_empty());
}

#[tokio::test]
async fn test_connected_stream_reports_values() {
    let server = TestServer::start(true).await;
    let mut client = server.connect("/ws").await;

    let snapshot = next_snapshot(&mut client).await;
    assert_eq!(snapshot["status"], "OK");
    assert_eq!(snapshot["rpm"], 850);
    assert_eq!(snapshot["speed"], 0);
    assert_eq!(snapshot["coolant_temp"], 90);
    assert_eq!(snapshot["throttle_pos"], 14.9);

    let next = next_snapshot(&mut client).await;
    assert_eq!(next["status"], "OK");
}

#[tokio::test]
async fn test_root_path_serves_stream() {
    let server = TestServer::start(false).await;
    let mut client = server.connect("/").await;

    let snapshot = next_snapshot(&mut client).await;
    assert_eq!(snapshot["status"], "OBD_DISCONNECTED");
}

#[tokio::test]
async fn test_clients_share_one_link() {
    let server = TestServer::start(true).await;
    server.driver.set_latency(Duration::from_millis(2));

    let mut first = server.connect("/ws").await;
    let mut second = server.connect("/ws").await;

    for _ in 0..3 {
        assert_eq!(next_snapshot(&mut first).await["status"], "OK");
        assert_eq!(next_snapshot(&mut second).await["status"], "OK");
    }
    assert_eq!(server.driver.max_in_flight(), 1);
    assert_eq!(server.driver.connect_calls(), 1);
}

#[tokio::test]
async fn test_control_messages_are_ignored() {
    let server = TestServer::start(false).await;
    let mut client = server.connect("/ws").await;

    next_snapshot(&mut client).await;
    client
        .send(Message::Text(r#"{"command":"reset"}"#.into()))
        .await
        .unwrap();
    client
        .send(Message::Binary(vec![1u8, 2, 3].into()))
        .await
        .unwrap();

    let snapshot = next_snapshot(&mut client).await;
    assert_eq!(snapshot["status"], "OBD_DISCONNECTED");
}

// =============================================================================
// Session lifecycle
// =============================================================================

#[tokio::test]
async fn test_session_count_tracks_clients() {
    let server = TestServer::start(false).await;

    let mut client = server.connect("/ws").await;
    next_snapshot(&mut client).await;
    assert_eq!(server.state.active_sessions(), 1);

    client.close(None).await.unwrap();
    let state = server.state.clone();
    assert!(wait_for(|| {
        let state = state.clone();
        async move { state.active_sessions() == 0 }
    })
    .await);
}

#[tokio::test]
async fn test_shutdown_closes_sessions() {
    let server = TestServer::start(false).await;
    let mut client = server.connect("/ws").await;
    next_snapshot(&mut client).await;

    server.state.shutdown_token().cancel();

    let closed = tokio::time::timeout(RECV_TIMEOUT, async {
        while let Some(message) = client.next().await {
            match message {
                Ok(Message::Close(_)) | Err(_) => return true,
                Ok(_) => {}
            }
        }
        true
    })
    .await
    .unwrap();
    assert!(closed);

    let state = server.state.clone();
    assert!(wait_for(|| {
        let state = state.clone();
        async move { state.active_sessions() == 0 }
    })
    .await);
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::start(false).await;

    let response = reqwest::get(format!("http://{}/health", server.addr))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_plain_request_to_stream_is_rejected() {
    let server = TestServer::start(false).await;

    let response = reqwest::get(format!("http://{}/ws", server.addr))
        .await
        .unwrap();
    assert!(response.status().is_client_error());
    assert_eq!(server.state.active_sessions(), 0);
}
