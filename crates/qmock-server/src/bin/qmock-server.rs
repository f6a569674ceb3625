//! Mock QPU job server binary.
//!
//! # Configuration
//!
//! Settings come from an optional YAML file, then `QMOCK_*` environment
//! variables (a `.env` file is honored), then command-line flags.
//!
//! # Usage
//!
//! ```bash
//! qmock-server --port 8100
//! QMOCK_SEED=7 qmock-server --config qmock.yaml
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::Notify;
use tracing::{info, warn};

use qmock_server::{AppState, Config, JobService, router};

#[derive(Parser, Debug)]
#[command(name = "qmock-server", version, about = "Mock QPU cloud job server")]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the configured address's port
    #[arg(short, long, env = "QMOCK_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(port) = args.port {
        config = config.with_port(port)?;
    }

    config.telemetry().init()?;

    info!(
        max_qubits = config.executor.max_qubits,
        poll_threshold = config.jobs.poll_threshold,
        "Starting mock QPU job server"
    );
    if let Some(seed) = config.executor.seed {
        info!(seed, "Sampling with a fixed seed");
    }

    let state = AppState::new(JobService::from_config(&config));
    let app = router(state);

    // Graceful shutdown
    let shutdown = Arc::new(Notify::new());
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_clone.notify_one();
    });

    let addr = config.address()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.notified().await;
            info!("Shutdown signal received");
        })
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT"),
        () = terminate => info!("Received SIGTERM"),
    }
}
