//! thermowatch - Edge IoT Temperature Dashboard
//!
//! Analyzes temperature sensor readings and serves a browser dashboard with
//! statistics, outlier flags, trends, and generated reports.
//!
//! # Usage
//!
//! ```bash
//! # Run against the default JSON data file
//! cargo run --release
//!
//! # Run with a local GGUF model
//! cargo run --release --features llm
//!
//! # Generate a sample dataset first
//! cargo run --bin seed-data -- --out data/temperature_data.json
//! ```
//!
//! # Environment Variables
//!
//! - `THERMOWATCH_CONFIG`: path to a TOML config file
//! - `THERMOWATCH_API_KEY`: API key for the remote model backend
//! - `RUST_LOG`: logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use thermowatch::analyzer::Analyzer;
use thermowatch::api::{create_app, DashboardState};
use thermowatch::config::{self, DashboardConfig};
use thermowatch::poller::{self, SharedSnapshot};
use thermowatch::{llm, source};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "thermowatch")]
#[command(about = "Edge IoT temperature analysis dashboard")]
#[command(version)]
struct CliArgs {
    /// Override the server address (default: "0.0.0.0:8080")
    #[arg(short, long)]
    addr: Option<String>,

    /// Path to a TOML config file (overrides THERMOWATCH_CONFIG)
    #[arg(short, long)]
    config: Option<String>,
}

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    Poller,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::Poller => write!(f, "Poller"),
        }
    }
}

// ============================================================================
// Task Spawning
// ============================================================================

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: axum::Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Spawn the background snapshot poller.
fn spawn_poller(
    task_set: &mut JoinSet<Result<TaskName>>,
    analyzer: Arc<Analyzer>,
    snapshot: SharedSnapshot,
    refresh_interval_secs: u64,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[Poller] Task starting");
        poller::run(analyzer, snapshot, refresh_interval_secs, cancel_token).await;
        Ok(TaskName::Poller)
    });
}

/// Run the supervisor loop: monitor tasks, cancel on failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: all tasks spawned, monitoring");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("Supervisor: task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("Supervisor: task failed: {}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Supervisor: task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("Supervisor: all tasks completed");
                        break;
                    }
                }
            }
        }
    }

    // Give remaining tasks a moment to observe the cancellation.
    while let Some(result) = task_set.join_next().await {
        if let Ok(Ok(task_name)) = result {
            info!("Supervisor: task {} stopped", task_name);
        }
    }

    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    if let Some(path) = &args.config {
        // The CLI flag wins over any pre-set environment variable.
        std::env::set_var("THERMOWATCH_CONFIG", path);
    }
    let dashboard_config = DashboardConfig::load();
    config::init(dashboard_config);
    let cfg = config::get();

    let server_addr = args.addr.clone().unwrap_or_else(|| cfg.server.addr.clone());

    info!("thermowatch - edge temperature dashboard");
    info!(
        "source: {:?} | model: {:?} | outlier threshold: {}",
        cfg.data.source, cfg.model.kind, cfg.analysis.outlier_threshold
    );

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown");
        shutdown_token.cancel();
    });

    let data_source = source::build_source(&cfg.data)
        .await
        .context("Failed to initialize the data source")?;
    info!("data source ready: {}", data_source.describe());

    let model = llm::build_backend(&cfg.model).await;
    let analyzer = Arc::new(Analyzer::new(data_source, model, &cfg.analysis));
    let snapshot: SharedSnapshot = Arc::default();

    let state = DashboardState::new(Arc::clone(&analyzer), Arc::clone(&snapshot));
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&server_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", server_addr))?;
    info!("dashboard available at http://{}", server_addr);

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    spawn_http_server(&mut task_set, listener, app, cancel_token.clone());
    spawn_poller(
        &mut task_set,
        analyzer,
        snapshot,
        cfg.analysis.refresh_interval_secs,
        cancel_token.clone(),
    );

    run_supervisor(&mut task_set, cancel_token).await?;
    info!("thermowatch stopped");
    Ok(())
}
