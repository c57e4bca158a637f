//! admission_server: REST server for the admission risk classifier.
//!
//! ## Usage
//!
//! ```bash
//! ADMISSION_PIPELINE_PATH=models/pipeline.json cargo run --bin admission_server
//!
//! curl -X POST http://localhost:5000/predict \
//!   -H "Content-Type: application/json" \
//!   -d @observation.json
//!
//! curl -X POST http://localhost:5000/update \
//!   -H "Content-Type: application/json" \
//!   -d '{"observation_id": "a1", "true_value": 1}'
//! ```
//!
//! See `admission_api::config` for the environment variables.

use anyhow::Context;
use tokio::net::TcpListener;

use admission_api::config::AppConfig;
use admission_api::router::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,admission_api=debug,admission_core=debug".into()),
        )
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let state = admission_api::build_state(&config).await?;
    let app = build_router(state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;
    tracing::info!("admission_server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install Ctrl+C handler: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
