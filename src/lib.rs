//! admission-api: HTTP surface of the hospital admission risk classifier.
//!
//! Wires the domain core (`admission_core`) to axum and, with the `database`
//! feature, to the Postgres record store.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use admission_core::{
    AdmissionService, InMemoryPredictionStore, LogisticPipeline, PredictionStore, SchemaRegistry,
};

use crate::config::AppConfig;
use crate::router::AppState;

/// Load the schema and classifier, connect the record store and assemble the
/// shared state. Any failure here is fatal at startup.
pub async fn build_state(config: &AppConfig) -> anyhow::Result<Arc<AppState>> {
    let schema = Arc::new(SchemaRegistry::standard());
    let classifier = LogisticPipeline::load(&config.pipeline_path, &schema).with_context(|| {
        format!(
            "failed to load classification pipeline from {}",
            config.pipeline_path.display()
        )
    })?;
    let store = connect_store(config).await?;

    let service = AdmissionService::new(schema, Arc::new(classifier), store)
        .with_relabel_policy(config.relabel_policy);
    info!(
        strict_status = config.strict_status,
        relabel_policy = ?config.relabel_policy,
        "admission service ready"
    );
    Ok(Arc::new(AppState::new(service, config.strict_status)))
}

#[cfg(feature = "database")]
async fn connect_store(config: &AppConfig) -> anyhow::Result<Arc<dyn PredictionStore>> {
    use admission_postgres::{connect, PgPredictionStore, PoolConfig};

    let Some(database_url) = config.database_url.as_deref() else {
        warn!("DATABASE_URL not set; predictions are kept in memory and lost on restart");
        return Ok(Arc::new(InMemoryPredictionStore::new()));
    };
    let mut pool_config = PoolConfig::new(database_url);
    pool_config.max_connections = config.db_pool_size;
    let store = PgPredictionStore::new(connect(&pool_config).await?);
    store.ensure_schema().await?;
    info!("Connected to database");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "database"))]
async fn connect_store(config: &AppConfig) -> anyhow::Result<Arc<dyn PredictionStore>> {
    if config.database_url.is_some() {
        warn!("DATABASE_URL ignored: built without the `database` feature");
    }
    warn!("predictions are kept in memory and lost on restart");
    Ok(Arc::new(InMemoryPredictionStore::new()))
}
