//! echoserv binary: standalone hosting.
//!
//! Loads configuration, initializes logging, builds the runtime, starts the
//! service, and blocks on the serve loop. Ctrl-C triggers graceful shutdown
//! with the configured drain deadline.

use echoserv::config::ServiceConfig;
use echoserv::service;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = ServiceConfig::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        mode = ?config.mode,
        store = ?config.store,
        drain_deadline = ?config.drain_deadline,
        workers = ?config.workers,
        "Starting echoserv"
    );

    // Build the runtime, honoring the configured worker count
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(workers) = config.workers {
        builder.worker_threads(workers);
    }
    let runtime = builder.build()?;

    runtime.block_on(run(config))?;
    Ok(())
}

/// Start the service and block until it stops.
async fn run(config: ServiceConfig) -> echoserv::Result<()> {
    let handle = service::start(config).await?;

    // Shutdown trigger: Ctrl-C cancels the service's token.
    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received; shutting down");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    handle.run().await
}
