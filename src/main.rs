use std::net::SocketAddr;
use pixelproxy::{config::ProxyConfig, router, AppState};

/// Edge image proxy entry point.
///
/// Initializes tracing, loads configuration, and serves image requests until
/// interrupted. Cache writes still in flight at shutdown are awaited before
/// the process exits.
///
/// # Configuration
/// Environment variables (see [`ProxyConfig::from_env`]):
/// - `PORT`: HTTP listen port (default: 8080)
/// - `CACHE_BACKEND`: `sled` or `memory` (default: sled)
/// - `RUST_LOG`: Logging verbosity (default: "pixelproxy=debug,tower_http=debug")
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pixelproxy=debug,tower_http=debug".into())
        )
        .init();

    tracing::info!("Starting pixelproxy");

    let cfg = ProxyConfig::from_env()?;
    tracing::debug!("Loaded configuration: {:?}", cfg);

    let state = AppState::from_config(&cfg)?;
    let writer = state.pipeline.writer().clone();
    let app = router(state);

    // Bind to 0.0.0.0 for external access (required for containerized deployment)
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!("Server listening on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    writer.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
