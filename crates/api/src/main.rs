use anyhow::{Context, Result};
use api::server::{AppState, router};
use api::{AppConfig, Metrics};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Optional config path as the only argument
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load_or_default(config_path.as_deref())?;
    api::logging::init_tracing(&config.logging);

    let runner = api::build_runner(&config, Metrics::new())?;
    let state = AppState {
        runner: Arc::new(runner),
        mode: config.mode,
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;

    tracing::info!(bind = %config.server.bind, mode = ?config.mode, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("Server error")?;
    Ok(())
}
