mod config;
mod error;
mod routes;
mod telemetry;

use std::sync::Arc;

use anyhow::Context;
use gastocr_ocr::{EngineSlot, ReceiptPipeline};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::load().context("Failed to load configuration")?;
    telemetry::init_tracing(config.log_format)?;

    info!(
        "Starting gastocr-server v{} (engine: {}, model dir: {})",
        env!("CARGO_PKG_VERSION"),
        config.engine.kind,
        config.engine.model_dir.display()
    );

    let pipeline_config = config.pipeline_config();
    let slot = Arc::new(EngineSlot::new(config.engine.loader(&pipeline_config.tokens)));
    if let Err(e) = slot.initialize().await {
        warn!("Inference engine not loaded at startup, requests will retry: {e}");
    }

    let state = AppState::new(ReceiptPipeline::new(slot.clone(), pipeline_config), config.engine.kind);
    let app = routes::router(state, config.max_upload_bytes);

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("Listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    slot.shutdown().await;
    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
