//! Application state for the streaming API

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hud_core::ParameterCatalog;
use hud_obd::{ConnectionManager, TelemetryAcquirer};
use tokio_util::sync::CancellationToken;

use crate::config::StreamingConfig;
use crate::publisher::StreamPublisher;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Owner of the single adapter link
    manager: Arc<ConnectionManager>,
    acquirer: TelemetryAcquirer,
    streaming: StreamingConfig,
    /// Cancelled on server shutdown; every session holds a child token
    shutdown: CancellationToken,
    sessions: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(
        manager: Arc<ConnectionManager>,
        catalog: Arc<ParameterCatalog>,
        streaming: StreamingConfig,
    ) -> Self {
        Self {
            manager,
            acquirer: TelemetryAcquirer::new(catalog),
            streaming,
            shutdown: CancellationToken::new(),
            sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// A publisher bound to one client
    pub fn publisher(&self, client: impl Into<String>) -> StreamPublisher {
        StreamPublisher::new(
            self.manager.clone(),
            self.acquirer.clone(),
            self.streaming,
            client,
        )
    }

    /// Number of connected clients
    pub fn active_sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    pub(crate) fn session_opened(&self) -> usize {
        self.sessions.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn session_closed(&self) -> usize {
        self.sessions.fetch_sub(1, Ordering::SeqCst).saturating_sub(1)
    }
}
