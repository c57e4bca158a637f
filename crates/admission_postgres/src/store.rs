use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::{info, warn};

use admission_core::store::{
    LabelOutcome, NewPrediction, PredictionRecord, PredictionStore, RelabelPolicy, Result,
};

const SCHEMA_SQL: &str = include_str!("../migrations/001_predictions.sql");

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

impl PoolConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 10,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
        }
    }
}

/// Open a pool, logging the target with the password masked.
pub async fn connect(config: &PoolConfig) -> anyhow::Result<PgPool> {
    info!(
        "Connecting to database: {}",
        mask_database_url(&config.database_url)
    );

    let mut pool_options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.connection_timeout);
    if let Some(idle_timeout) = config.idle_timeout {
        pool_options = pool_options.idle_timeout(idle_timeout);
    }
    if let Some(max_lifetime) = config.max_lifetime {
        pool_options = pool_options.max_lifetime(max_lifetime);
    }

    pool_options
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            warn!("Failed to connect to database: {}", e);
            e
        })
        .context("failed to connect to prediction database")
}

/// Mask the password in a database URL for logging.
pub fn mask_database_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let mut masked = parsed.clone();
            if parsed.password().is_some() {
                let _ = masked.set_password(Some("***"));
            }
            masked.to_string()
        }
        Err(_) => "***".to_string(),
    }
}

#[derive(Debug, FromRow)]
struct PgPredictionRow {
    observation_id: String,
    observation: serde_json::Value,
    prediction: i64,
    true_value: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<PgPredictionRow> for PredictionRecord {
    fn from(row: PgPredictionRow) -> Self {
        Self {
            observation_id: row.observation_id,
            observation: row.observation,
            prediction: row.prediction,
            true_value: row.true_value,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Postgres-backed prediction store over `admission.predictions`.
///
/// The primary key on `observation_id` makes create-if-absent atomic; each
/// labeling is a single `UPDATE` statement, so the read-modify-write is
/// atomic per row.
#[derive(Debug, Clone)]
pub struct PgPredictionStore {
    pool: PgPool,
}

impl PgPredictionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the schema and table if they do not exist yet.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .context("failed to create admission.predictions")?;
        Ok(())
    }
}

#[async_trait]
impl PredictionStore for PgPredictionStore {
    async fn insert_if_absent(&self, record: NewPrediction) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO admission.predictions (observation_id, observation, prediction)
            VALUES ($1, $2, $3)
            ON CONFLICT (observation_id) DO NOTHING
            "#,
        )
        .bind(&record.observation_id)
        .bind(&record.observation)
        .bind(record.prediction)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn get(&self, observation_id: &str) -> Result<Option<PredictionRecord>> {
        let row = sqlx::query_as::<_, PgPredictionRow>(
            r#"
            SELECT observation_id, observation, prediction, true_value, created_at, updated_at
            FROM admission.predictions
            WHERE observation_id = $1
            "#,
        )
        .bind(observation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        Ok(row.map(PredictionRecord::from))
    }

    async fn set_true_value(
        &self,
        observation_id: &str,
        true_value: i64,
        policy: RelabelPolicy,
    ) -> Result<LabelOutcome> {
        let guard = match policy {
            RelabelPolicy::Overwrite => "",
            RelabelPolicy::Reject => "AND (true_value IS NULL OR true_value = $2)",
        };
        let sql = format!(
            r#"
            UPDATE admission.predictions
            SET true_value = $2, updated_at = now()
            WHERE observation_id = $1 {guard}
            RETURNING observation_id
            "#
        );
        let updated = sqlx::query_scalar::<_, String>(&sql)
            .bind(observation_id)
            .bind(true_value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;

        if updated.is_some() {
            return Ok(LabelOutcome::Labeled);
        }

        // Records are never deleted, so a follow-up read tells "unknown" from
        // "labeled with another value".
        let existing = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT true_value FROM admission.predictions WHERE observation_id = $1",
        )
        .bind(observation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        Ok(outcome_after_missed_update(policy, existing))
    }
}

/// Classify a labeling `UPDATE` that matched no row from a follow-up read of
/// `true_value`. Only the reject guard can skip an existing row; any other
/// miss means the row did not exist when the update ran, even if it was
/// inserted before the read.
fn outcome_after_missed_update(
    policy: RelabelPolicy,
    existing: Option<Option<i64>>,
) -> LabelOutcome {
    match (policy, existing) {
        (RelabelPolicy::Reject, Some(Some(value))) => LabelOutcome::AlreadyLabeled(value),
        _ => LabelOutcome::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn masks_password() {
        assert_eq!(
            mask_database_url("postgresql://admin:hunter2@db:5432/admissions"),
            "postgresql://admin:***@db:5432/admissions"
        );
        assert_eq!(
            mask_database_url("postgresql://localhost/admissions"),
            "postgresql://localhost/admissions"
        );
        assert_eq!(mask_database_url("not a url"), "***");
    }

    #[test]
    fn missed_update_outcomes() {
        use RelabelPolicy::{Overwrite, Reject};

        assert_eq!(outcome_after_missed_update(Reject, None), LabelOutcome::NotFound);
        assert_eq!(
            outcome_after_missed_update(Reject, Some(Some(0))),
            LabelOutcome::AlreadyLabeled(0)
        );
        assert_eq!(outcome_after_missed_update(Overwrite, None), LabelOutcome::NotFound);
        // Inserted concurrently between the UPDATE and the follow-up read.
        assert_eq!(
            outcome_after_missed_update(Overwrite, Some(None)),
            LabelOutcome::NotFound
        );
        assert_eq!(
            outcome_after_missed_update(Reject, Some(None)),
            LabelOutcome::NotFound
        );
        assert_eq!(
            outcome_after_missed_update(Overwrite, Some(Some(1))),
            LabelOutcome::NotFound
        );
    }

    #[test]
    fn schema_sql_declares_unique_key() {
        assert!(SCHEMA_SQL.contains("observation_id TEXT PRIMARY KEY"));
    }

    async fn test_store() -> PgPredictionStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = connect(&PoolConfig::new(url)).await.expect("connect");
        let store = PgPredictionStore::new(pool);
        store.ensure_schema().await.expect("schema");
        store
    }

    fn unique_id(prefix: &str) -> String {
        format!("{prefix}-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
    }

    #[tokio::test]
    #[ignore] // requires DATABASE_URL
    async fn insert_get_label_roundtrip() {
        let store = test_store().await;
        let id = unique_id("pg-roundtrip");

        let new = NewPrediction {
            observation_id: id.clone(),
            observation: json!({ "Gender": "M" }),
            prediction: 1,
        };
        assert!(store.insert_if_absent(new.clone()).await.unwrap());
        assert!(!store.insert_if_absent(new).await.unwrap());

        assert_eq!(
            store
                .set_true_value(&id, 0, RelabelPolicy::Reject)
                .await
                .unwrap(),
            LabelOutcome::Labeled
        );
        assert_eq!(
            store
                .set_true_value(&id, 1, RelabelPolicy::Reject)
                .await
                .unwrap(),
            LabelOutcome::AlreadyLabeled(0)
        );

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.prediction, 1);
        assert_eq!(record.true_value, Some(0));
        assert_eq!(record.observation, json!({ "Gender": "M" }));
    }

    #[tokio::test]
    #[ignore] // requires DATABASE_URL
    async fn label_unknown_observation() {
        let store = test_store().await;
        let outcome = store
            .set_true_value(&unique_id("pg-missing"), 1, RelabelPolicy::Overwrite)
            .await
            .unwrap();
        assert_eq!(outcome, LabelOutcome::NotFound);
    }
}
