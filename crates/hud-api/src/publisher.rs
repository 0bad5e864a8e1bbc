//! Per-client publish loop
//!
//! ```text
//! Idle ──► Streaming ──┬──► Cancelled     (session cancelled)
//!            │  ▲      ├──► ClientClosed  (send reported closed)
//!            ▼  │      └──► Failed        (any other failure)
//!         cycle, send, sleep
//! ```
//!
//! Cancellation is observed while a cycle runs and while sleeping. A cycle
//! interrupted by cancellation is dropped whole; nothing partial is sent.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use hud_core::{SnapshotStatus, TelemetrySnapshot};
use hud_obd::{ConnectionManager, LinkState, TelemetryAcquirer};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::StreamingConfig;
use crate::error::SendError;
use crate::sink::SnapshotSink;

/// Why a publisher stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamExit {
    Cancelled,
    ClientClosed,
    Failed(String),
}

/// Streams snapshots to one client
pub struct StreamPublisher {
    manager: Arc<ConnectionManager>,
    acquirer: TelemetryAcquirer,
    config: StreamingConfig,
    client: String,
}

impl StreamPublisher {
    pub fn new(
        manager: Arc<ConnectionManager>,
        acquirer: TelemetryAcquirer,
        config: StreamingConfig,
        client: impl Into<String>,
    ) -> Self {
        Self {
            manager,
            acquirer,
            config,
            client: client.into(),
        }
    }

    /// Run until cancelled or the client can no longer be reached
    pub async fn run<S: SnapshotSink>(&self, sink: &mut S, cancel: CancellationToken) -> StreamExit {
        info!(client = %self.client, "Starting telemetry stream");

        loop {
            let cycle = AssertUnwindSafe(self.cycle()).catch_unwind();
            let snapshot = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancelled(),
                outcome = cycle => match outcome {
                    Ok(snapshot) => snapshot,
                    Err(panic) => return self.fail(sink, panic_message(panic.as_ref())).await,
                },
            };
            if cancel.is_cancelled() {
                return self.cancelled();
            }

            let sent = AssertUnwindSafe(self.send(sink, &snapshot))
                .catch_unwind()
                .await;
            match sent {
                Ok(Ok(())) => {}
                Ok(Err(SendError::Closed)) => {
                    info!(client = %self.client, "Client disconnected, stopping stream");
                    return StreamExit::ClientClosed;
                }
                Ok(Err(e)) => return self.fail(sink, e.to_string()).await,
                Err(panic) => return self.fail(sink, panic_message(panic.as_ref())).await,
            }

            let pause = if snapshot.status.is_degraded() {
                self.config.degraded_interval()
            } else {
                self.config.poll_interval()
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancelled(),
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    /// One snapshot, degraded unless the link is ready
    async fn cycle(&self) -> TelemetrySnapshot {
        let state = self.manager.refresh().await;
        if let Some(connection) = self.manager.current() {
            return self.acquirer.snapshot(&connection).await;
        }

        let status = match state {
            LinkState::ConnectedNoProtocol => SnapshotStatus::ObdNoProtocol,
            _ => SnapshotStatus::ObdDisconnected,
        };
        debug!(client = %self.client, %status, "Adapter not ready, sending degraded snapshot");
        self.acquirer.normalizer().degraded(status)
    }

    /// Report an unexpected failure to the client if it is still there
    async fn fail<S: SnapshotSink>(&self, sink: &mut S, details: String) -> StreamExit {
        error!(client = %self.client, error = %details, "Error in telemetry stream");
        if sink.is_open() {
            let payload = json!({
                "error": "Backend streaming error",
                "details": details,
            });
            let _ = sink.send_text(payload.to_string()).await;
        }
        StreamExit::Failed(details)
    }

    async fn send<S: SnapshotSink>(
        &self,
        sink: &mut S,
        snapshot: &TelemetrySnapshot,
    ) -> Result<(), SendError> {
        let text = snapshot.to_json()?;
        sink.send_text(text).await?;

        debug!(
            client = %self.client,
            status = %snapshot.status,
            populated = snapshot.populated_count(),
            rpm = ?snapshot.number("rpm"),
            speed = ?snapshot.number("speed"),
            coolant_temp = ?snapshot.number("coolant_temp"),
            "Sent snapshot"
        );
        Ok(())
    }

    fn cancelled(&self) -> StreamExit {
        debug!(client = %self.client, "Telemetry stream cancelled");
        StreamExit::Cancelled
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "publisher panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;
    use async_trait::async_trait;
    use hud_core::ParameterCatalog;
    use hud_obd::adapter::mock::MockDriver;
    use hud_obd::AdapterConfig;
    use serde_json::Value;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    fn publisher(driver: &MockDriver) -> (StreamPublisher, Arc<ConnectionManager>) {
        let manager = Arc::new(ConnectionManager::new(
            Arc::new(driver.clone()),
            AdapterConfig::default(),
        ));
        let publisher = StreamPublisher::new(
            manager.clone(),
            TelemetryAcquirer::new(Arc::new(ParameterCatalog::standard())),
            StreamingConfig::default(),
            "test-client",
        );
        (publisher, manager)
    }

    async fn next_json(rx: &mut mpsc::UnboundedReceiver<String>) -> Value {
        let text = rx.recv().await.unwrap();
        serde_json::from_str(&text).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnected_cadence() {
        let driver = MockDriver::new();
        let (publisher, _manager) = publisher(&driver);
        let (mut sink, mut rx) = ChannelSink::new();
        let cancel = CancellationToken::new();

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move { publisher.run(&mut sink, task_cancel).await });

        let first = next_json(&mut rx).await;
        let t0 = Instant::now();
        let second = next_json(&mut rx).await;

        assert_eq!(first["status"], "OBD_DISCONNECTED");
        assert_eq!(first["rpm"], Value::Null);
        assert_eq!(first["speed_unit"], "mph");
        assert_eq!(second["status"], "OBD_DISCONNECTED");
        assert_eq!(t0.elapsed(), Duration::from_secs(2));
        assert!(driver.requests().is_empty());

        cancel.cancel();
        assert_eq!(task.await.unwrap(), StreamExit::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_protocol_status() {
        let driver = MockDriver::new();
        driver.set_protocol(None);
        let (publisher, manager) = publisher(&driver);
        manager.install(Box::new(driver.open_link())).await;
        let (mut sink, mut rx) = ChannelSink::new();
        let cancel = CancellationToken::new();

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move { publisher.run(&mut sink, task_cancel).await });

        assert_eq!(next_json(&mut rx).await["status"], "OBD_NO_PROTOCOL");
        assert!(driver.requests().is_empty());

        cancel.cancel();
        assert_eq!(task.await.unwrap(), StreamExit::Cancelled);
    }

    #[tokio::test]
    async fn test_streams_ok_snapshots() {
        let driver = MockDriver::new();
        let (publisher, manager) = publisher(&driver);
        manager.connect().await.unwrap();
        let (mut sink, mut rx) = ChannelSink::new();
        let cancel = CancellationToken::new();

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move { publisher.run(&mut sink, task_cancel).await });

        let first = next_json(&mut rx).await;
        let t0 = std::time::Instant::now();
        let second = next_json(&mut rx).await;

        assert_eq!(first["status"], "OK");
        assert_eq!(first["rpm"], 850);
        assert_eq!(first["speed"], 0);
        assert_eq!(first["mil_on"], false);
        assert_eq!(second["status"], "OK");
        assert!(t0.elapsed() >= Duration::from_millis(500));

        cancel.cancel();
        assert_eq!(task.await.unwrap(), StreamExit::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_client_stops_stream() {
        let driver = MockDriver::new();
        let (publisher, _manager) = publisher(&driver);
        let (mut sink, rx) = ChannelSink::new();
        drop(rx);

        let exit = publisher.run(&mut sink, CancellationToken::new()).await;
        assert_eq!(exit, StreamExit::ClientClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_cycle() {
        let driver = MockDriver::new();
        let (publisher, _manager) = publisher(&driver);
        let (mut sink, mut rx) = ChannelSink::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(publisher.run(&mut sink, cancel).await, StreamExit::Cancelled);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_link_degrades_stream() {
        let driver = MockDriver::new();
        let (publisher, manager) = publisher(&driver);
        manager.connect().await.unwrap();
        let (mut sink, mut rx) = ChannelSink::new();
        let cancel = CancellationToken::new();

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move { publisher.run(&mut sink, task_cancel).await });

        assert_eq!(next_json(&mut rx).await["status"], "OK");

        driver.set_report_disconnected(true);
        let degraded = next_json(&mut rx).await;
        assert_eq!(degraded["status"], "OBD_DISCONNECTED");
        assert_eq!(degraded["rpm"], Value::Null);
        assert_eq!(manager.state(), LinkState::Disconnected);

        let queried = driver.request_count("RPM");
        let t0 = Instant::now();
        assert_eq!(next_json(&mut rx).await["status"], "OBD_DISCONNECTED");
        assert!(t0.elapsed() >= Duration::from_secs(2));
        assert_eq!(driver.request_count("RPM"), queried);

        driver.set_report_disconnected(false);
        let recovered = next_json(&mut rx).await;
        assert_eq!(recovered["status"], "OK");
        assert_eq!(recovered["rpm"], 850);

        cancel.cancel();
        assert_eq!(task.await.unwrap(), StreamExit::Cancelled);
    }

    /// Panics on the first message, records the rest
    struct PanickingSink {
        panicked: bool,
        sent: Vec<String>,
    }

    #[async_trait]
    impl SnapshotSink for PanickingSink {
        async fn send_text(&mut self, text: String) -> Result<(), SendError> {
            if !self.panicked {
                self.panicked = true;
                panic!("snapshot sink exploded");
            }
            self.sent.push(text);
            Ok(())
        }

        fn is_open(&self) -> bool {
            true
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_failure_sends_error_payload() {
        let driver = MockDriver::new();
        let (publisher, _manager) = publisher(&driver);
        let mut sink = PanickingSink {
            panicked: false,
            sent: Vec::new(),
        };

        let exit = publisher.run(&mut sink, CancellationToken::new()).await;
        assert_eq!(exit, StreamExit::Failed("snapshot sink exploded".to_string()));
        assert_eq!(sink.sent.len(), 1);

        let payload: Value = serde_json::from_str(&sink.sent[0]).unwrap();
        assert_eq!(payload["error"], "Backend streaming error");
        assert_eq!(payload["details"], "snapshot sink exploded");
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(&"static text"), "static text");
        assert_eq!(panic_message(&String::from("owned text")), "owned text");
        assert_eq!(panic_message(&42_u32), "publisher panicked");
    }
}
