//! Adapter connection lifecycle
//!
//! The [`ConnectionManager`] is the sole owner of the adapter link. Streams
//! never hold the link itself: they take an [`AdapterConnection`] handle
//! from [`ConnectionManager::current`] for one cycle and issue queries
//! through it. Every query and the final close go through the same lock,
//! so the sequential adapter sees exactly one request at a time.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::adapter::{AdapterDriver, AdapterError, AdapterLink, AdapterResponse};
use crate::config::AdapterConfig;
use crate::error::{ConnectionError, QueryError};

/// Owned state of the adapter link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    /// Link is open but no protocol is active
    ConnectedNoProtocol,
    ConnectedReady,
    /// Retries exhausted
    Failed,
}

/// Shared handle to the open adapter link
#[derive(Clone)]
pub struct AdapterConnection {
    link: Arc<Mutex<Box<dyn AdapterLink>>>,
    protocol_id: Option<String>,
    protocol_name: Option<String>,
}

impl std::fmt::Debug for AdapterConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterConnection")
            .field("protocol_id", &self.protocol_id)
            .field("protocol_name", &self.protocol_name)
            .finish()
    }
}

impl AdapterConnection {
    fn new(link: Box<dyn AdapterLink>) -> Self {
        let protocol_id = link.protocol_id();
        let protocol_name = link.protocol_name();
        Self {
            link: Arc::new(Mutex::new(link)),
            protocol_id,
            protocol_name,
        }
    }

    pub fn protocol_id(&self) -> Option<&str> {
        self.protocol_id.as_deref()
    }

    pub fn protocol_name(&self) -> Option<&str> {
        self.protocol_name.as_deref()
    }

    /// Issue one command
    ///
    /// Waits for exclusive access to the link, then runs the blocking
    /// request on the blocking pool. If the caller is dropped while the
    /// request is running, the request still completes and its response
    /// is discarded.
    pub async fn query(&self, command: &str) -> Result<AdapterResponse, QueryError> {
        let mut link = self.link.clone().lock_owned().await;
        let command = command.to_string();

        let response = tokio::task::spawn_blocking(move || link.query(&command))
            .await
            .map_err(|e| QueryError::Worker(e.to_string()))??;

        if response.is_null() {
            return Err(QueryError::NullResponse);
        }
        Ok(response)
    }

    /// The link's own view of itself, read under the link lock
    async fn observe(&self) -> Result<LinkState, QueryError> {
        let link = self.link.clone().lock_owned().await;
        tokio::task::spawn_blocking(move || link_state(&**link))
            .await
            .map_err(|e| QueryError::Worker(e.to_string()))
    }

    fn same_link(&self, other: &AdapterConnection) -> bool {
        Arc::ptr_eq(&self.link, &other.link)
    }

    async fn close(&self) -> Result<(), AdapterError> {
        let mut link = self.link.clone().lock_owned().await;
        tokio::task::spawn_blocking(move || link.close())
            .await
            .map_err(|e| AdapterError::ConnectionFailed(e.to_string()))?
    }
}

struct Inner {
    state: LinkState,
    connection: Option<AdapterConnection>,
}

/// Owns the adapter link: connect with retries, observe, close
pub struct ConnectionManager {
    driver: Arc<dyn AdapterDriver>,
    config: AdapterConfig,
    inner: RwLock<Inner>,
}

/// Outcome of the blocking part of one connection attempt
enum Handshake {
    Ready(Box<dyn AdapterLink>),
    /// Fallback protocol accepted; must be re-checked after settling
    FallbackSelected(Box<dyn AdapterLink>),
}

impl ConnectionManager {
    pub fn new(driver: Arc<dyn AdapterDriver>, config: AdapterConfig) -> Self {
        Self {
            driver,
            config,
            inner: RwLock::new(Inner {
                state: LinkState::Disconnected,
                connection: None,
            }),
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn state(&self) -> LinkState {
        self.inner.read().state
    }

    /// The connection, only while it is ready for queries
    pub fn current(&self) -> Option<AdapterConnection> {
        let inner = self.inner.read();
        match inner.state {
            LinkState::ConnectedReady => inner.connection.clone(),
            _ => None,
        }
    }

    /// Adopt an already open link
    ///
    /// The state follows what the link reports. A link installed earlier is
    /// closed. Used to attach links opened outside the retry loop.
    pub async fn install(&self, link: Box<dyn AdapterLink>) -> LinkState {
        let state = link_state(&*link);
        let previous = {
            let mut inner = self.inner.write();
            inner.state = state;
            inner.connection.replace(AdapterConnection::new(link))
        };

        if let Some(previous) = previous {
            debug!("Replacing installed adapter link");
            if let Err(e) = previous.close().await {
                warn!(error = %e, "Error while closing replaced adapter link");
            }
        }
        state
    }

    /// Re-read the state the open link reports
    ///
    /// A link that stops reporting connected moves to `Disconnected`, one
    /// that loses its protocol to `ConnectedNoProtocol`. The link stays
    /// owned, so it is ready again once it reports a protocol. Returns the
    /// state afterwards.
    pub async fn refresh(&self) -> LinkState {
        let connection = {
            let inner = self.inner.read();
            match inner.state {
                LinkState::ConnectedReady
                | LinkState::ConnectedNoProtocol
                | LinkState::Disconnected => inner.connection.clone(),
                LinkState::Connecting | LinkState::Failed => None,
            }
        };
        let Some(connection) = connection else {
            return self.state();
        };

        let observed = match connection.observe().await {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Failed to check adapter link");
                LinkState::Disconnected
            }
        };

        let mut inner = self.inner.write();
        let unchanged_link = inner
            .connection
            .as_ref()
            .is_some_and(|current| current.same_link(&connection));
        if !unchanged_link {
            // Closed or replaced while probing
            return inner.state;
        }

        if inner.state != observed {
            match observed {
                LinkState::ConnectedReady => info!("Adapter link ready again"),
                LinkState::ConnectedNoProtocol => warn!("Adapter link lost its protocol"),
                _ => warn!("Adapter link reports disconnected"),
            }
            inner.state = observed;
        }
        observed
    }

    /// Connect, retrying up to `max_retries` times
    ///
    /// Any previously open link is closed first. On failure no link is left
    /// open and the state is [`LinkState::Failed`].
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        self.close().await;
        self.inner.write().state = LinkState::Connecting;

        let attempts = self.config.max_retries;
        for attempt in 1..=attempts {
            info!(
                attempt,
                max_retries = attempts,
                connection = %self.config.connection_string(),
                "Connecting to adapter"
            );

            match self.attempt().await {
                Ok(connection) => {
                    info!(
                        protocol = connection.protocol_name().unwrap_or("unknown"),
                        protocol_id = connection.protocol_id().unwrap_or("-"),
                        "Adapter connected"
                    );
                    let mut inner = self.inner.write();
                    inner.state = LinkState::ConnectedReady;
                    inner.connection = Some(connection);
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Connection attempt failed");
                }
            }

            if attempt < attempts {
                debug!(delay_ms = self.config.retry_delay_ms, "Retrying connection");
                tokio::time::sleep(self.config.retry_delay()).await;
            }
        }

        error!(attempts, "Failed to connect to adapter");
        self.inner.write().state = LinkState::Failed;
        Err(ConnectionError::RetriesExhausted { attempts })
    }

    async fn attempt(&self) -> Result<AdapterConnection, ConnectionError> {
        let driver = self.driver.clone();
        let params = self.config.connect_params();
        let fallback = self.config.fallback_protocol.clone();

        let handshake = tokio::task::spawn_blocking(move || handshake(&*driver, &params, &fallback))
            .await
            .map_err(|e| AdapterError::ConnectionFailed(e.to_string()))??;

        let link = match handshake {
            Handshake::Ready(link) => link,
            Handshake::FallbackSelected(link) => {
                tokio::time::sleep(self.config.protocol_settle()).await;
                tokio::task::spawn_blocking(move || confirm_protocol(link))
                    .await
                    .map_err(|e| AdapterError::ConnectionFailed(e.to_string()))??
            }
        };

        Ok(AdapterConnection::new(link))
    }

    /// Close the link if one is open
    ///
    /// Idempotent. The state is `Disconnected` afterwards even when the
    /// driver reports an error while closing.
    pub async fn close(&self) {
        let connection = {
            let mut inner = self.inner.write();
            inner.state = LinkState::Disconnected;
            inner.connection.take()
        };

        let Some(connection) = connection else {
            debug!("No adapter connection to close");
            return;
        };

        match connection.close().await {
            Ok(()) => info!("Adapter connection closed"),
            Err(e) => warn!(error = %e, "Error while closing adapter connection"),
        }
    }
}

fn link_state(link: &dyn AdapterLink) -> LinkState {
    match (link.is_connected(), link.protocol_id()) {
        (true, Some(_)) => LinkState::ConnectedReady,
        (true, None) => LinkState::ConnectedNoProtocol,
        (false, _) => LinkState::Disconnected,
    }
}

fn handshake(
    driver: &dyn AdapterDriver,
    params: &crate::adapter::ConnectParams,
    fallback: &str,
) -> Result<Handshake, ConnectionError> {
    let mut link = driver.connect(params)?;

    if !link.is_connected() {
        let _ = link.close();
        return Err(AdapterError::NotConnected.into());
    }
    info!(status = %link.status(), "Adapter status");

    if link.protocol_id().is_some() {
        return Ok(Handshake::Ready(link));
    }

    warn!(fallback, "No protocol auto-detected, selecting fallback");
    if link.set_protocol(fallback) {
        Ok(Handshake::FallbackSelected(link))
    } else {
        let _ = link.close();
        Err(ConnectionError::ProtocolNegotiation(format!(
            "adapter rejected protocol '{}'",
            fallback
        )))
    }
}

fn confirm_protocol(mut link: Box<dyn AdapterLink>) -> Result<Box<dyn AdapterLink>, ConnectionError> {
    if link.protocol_id().is_some() {
        Ok(link)
    } else {
        let _ = link.close();
        Err(ConnectionError::ProtocolNegotiation(
            "no protocol active after selection".to_string(),
        ))
    }
}
