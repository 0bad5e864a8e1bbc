//! hudd - OBD HUD Daemon
//!
//! Connects to an OBD-II adapter and streams telemetry snapshots to every
//! WebSocket client.
//!
//! Usage:
//!   hudd [OPTIONS]
//!
//! Without `--config` every setting has its default and the built-in
//! vehicle simulator stands in for the adapter.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use hud_api::{create_router, AppState};
use hud_core::ParameterCatalog;
use hud_obd::{create_driver, ConnectionManager, SanityReport, Verdict};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::HudConfig;

const DEFAULT_LOG_FILTER: &str = "hudd=info,hud_api=info,hud_obd=info,hud_core=info";

#[derive(Parser, Debug)]
#[command(name = "hudd")]
#[command(version, about = "OBD HUD daemon - streams vehicle telemetry over WebSocket")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "HUDD_CONFIG")]
    config: Option<PathBuf>,

    /// Bind host
    #[arg(long)]
    host: Option<String>,

    /// Bind port
    #[arg(short, long)]
    port: Option<u16>,

    /// Adapter host
    #[arg(long)]
    adapter_host: Option<String>,

    /// Adapter port
    #[arg(long)]
    adapter_port: Option<u16>,

    /// Pause between telemetry cycles in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Check the adapter and exit
    #[arg(long)]
    check: bool,
}

impl Cli {
    /// File values over defaults, flags over file values
    fn load_config(&self) -> anyhow::Result<HudConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!(path = %path.display(), "Loading config");
                HudConfig::load(path)?
            }
            None => HudConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut HudConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = &self.adapter_host {
            config.adapter.host = host.clone();
        }
        if let Some(port) = self.adapter_port {
            config.adapter.port = port;
        }
        if let Some(interval) = self.poll_interval_ms {
            config.streaming.poll_interval_ms = interval;
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    tracing::info!("Starting hudd (OBD HUD Daemon)");

    let config = cli.load_config()?;
    let driver = create_driver(&config.adapter)?;
    let manager = Arc::new(ConnectionManager::new(driver, config.adapter.clone()));

    if cli.check {
        let healthy = run_check(&manager).await;
        std::process::exit(if healthy { 0 } else { 1 });
    }

    tracing::info!(
        driver = ?config.adapter.driver,
        target = %config.adapter.connection_string(),
        "Connecting to adapter"
    );
    if let Err(e) = manager.connect().await {
        // Clients still get degraded snapshots until the adapter comes back
        tracing::error!(error = %e, "Adapter connection failed, serving degraded telemetry");
    }

    let catalog = Arc::new(ParameterCatalog::standard());
    let state = AppState::new(manager.clone(), catalog, config.streaming);
    let shutdown = state.shutdown_token().clone();
    let app = create_router(state, &config.server.path);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        "Listening on ws://{}{} (health at http://{}/health)",
        addr,
        config.server.path,
        addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    manager.close().await;
    tracing::info!("hudd stopped");

    Ok(())
}

/// Resolve on Ctrl-C and cancel every client session
async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                return;
            }
            tracing::info!("Shutdown requested");
        }
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}

/// Connect, query the essential commands, print the report
async fn run_check(manager: &ConnectionManager) -> bool {
    if let Err(e) = manager.connect().await {
        eprintln!("Adapter check failed: {}", e);
        return false;
    }

    let healthy = match manager.current() {
        Some(connection) => {
            let report = SanityReport::run(&connection).await;
            print!("{}", report);
            report.verdict() == Verdict::Healthy
        }
        None => {
            eprintln!("Adapter connected without a usable protocol");
            false
        }
    };

    manager.close().await;
    healthy
}
