//! hud-api - WebSocket streaming layer for the OBD HUD
//!
//! Serves one WebSocket route. Every client that connects gets its own
//! publisher pushing JSON telemetry snapshots until it disconnects or the
//! server shuts down. All clients share the single adapter link owned by
//! the [`hud_obd::ConnectionManager`].
//!
//! # Usage
//!
//! ```ignore
//! use hud_api::{create_router, AppState, StreamingConfig};
//!
//! let state = AppState::new(manager, catalog, StreamingConfig::default());
//! let router = create_router(state, "/ws");
//! ```

pub mod config;
pub mod error;
pub mod publisher;
pub mod session;
pub mod sink;
pub mod state;

pub use config::StreamingConfig;
pub use error::{ConfigError, SendError};
pub use publisher::{StreamExit, StreamPublisher};
pub use session::ClientSessionSupervisor;
pub use sink::{ChannelSink, SnapshotSink, WebSocketSink};
pub use state::AppState;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the streaming router
///
/// The stream is served at `ws_path` and at `/`.
pub fn create_router(state: AppState, ws_path: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/", get(session::stream_handler));

    if ws_path != "/" {
        router = router.route(ws_path, get(session::stream_handler));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
