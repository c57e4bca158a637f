//! Record store port and the in-memory implementation.
//!
//! `admission_postgres` implements the same trait with sqlx; services depend
//! only on `Arc<dyn PredictionStore>`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::AdmissionError;

pub type Result<T> = std::result::Result<T, AdmissionError>;

/// What to do when a labeled record receives a different true value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelabelPolicy {
    #[default]
    Overwrite,
    Reject,
}

impl std::str::FromStr for RelabelPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "unknown relabel policy '{other}' (expected 'overwrite' or 'reject')"
            )),
        }
    }
}

/// Row written on a successful prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrediction {
    pub observation_id: String,
    pub observation: serde_json::Value,
    pub prediction: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub observation_id: String,
    pub observation: serde_json::Value,
    pub prediction: i64,
    pub true_value: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Result of attaching a true value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelOutcome {
    Labeled,
    NotFound,
    /// Refused under [`RelabelPolicy::Reject`]; carries the stored value.
    AlreadyLabeled(i64),
}

/// Durable mapping from observation id to prediction and true value.
///
/// Implementations must make `insert_if_absent` an atomic create-if-absent
/// and `set_true_value` an atomic read-modify-write per observation id.
#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Create the record; `false` if the id is already taken.
    async fn insert_if_absent(&self, record: NewPrediction) -> Result<bool>;

    async fn get(&self, observation_id: &str) -> Result<Option<PredictionRecord>>;

    async fn set_true_value(
        &self,
        observation_id: &str,
        true_value: i64,
        policy: RelabelPolicy,
    ) -> Result<LabelOutcome>;
}

/// Process-local store for tests and database-less runs.
#[derive(Debug, Default)]
pub struct InMemoryPredictionStore {
    records: RwLock<HashMap<String, PredictionRecord>>,
}

impl InMemoryPredictionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl PredictionStore for InMemoryPredictionStore {
    async fn insert_if_absent(&self, record: NewPrediction) -> Result<bool> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.observation_id) {
            return Ok(false);
        }
        records.insert(
            record.observation_id.clone(),
            PredictionRecord {
                observation_id: record.observation_id,
                observation: record.observation,
                prediction: record.prediction,
                true_value: None,
                created_at: Utc::now(),
                updated_at: None,
            },
        );
        Ok(true)
    }

    async fn get(&self, observation_id: &str) -> Result<Option<PredictionRecord>> {
        Ok(self.records.read().await.get(observation_id).cloned())
    }

    async fn set_true_value(
        &self,
        observation_id: &str,
        true_value: i64,
        policy: RelabelPolicy,
    ) -> Result<LabelOutcome> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(observation_id) else {
            return Ok(LabelOutcome::NotFound);
        };
        match (policy, record.true_value) {
            (RelabelPolicy::Reject, Some(existing)) if existing != true_value => {
                Ok(LabelOutcome::AlreadyLabeled(existing))
            }
            _ => {
                record.true_value = Some(true_value);
                record.updated_at = Some(Utc::now());
                Ok(LabelOutcome::Labeled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn new_prediction(id: &str, prediction: i64) -> NewPrediction {
        NewPrediction {
            observation_id: id.into(),
            observation: json!({ "Gender": "F" }),
            prediction,
        }
    }

    #[tokio::test]
    async fn insert_is_create_if_absent() {
        let store = InMemoryPredictionStore::new();
        assert!(store.insert_if_absent(new_prediction("a1", 1)).await.unwrap());
        assert!(!store.insert_if_absent(new_prediction("a1", 0)).await.unwrap());

        let record = store.get("a1").await.unwrap().unwrap();
        assert_eq!(record.prediction, 1);
        assert_eq!(record.true_value, None);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn get_unknown_is_none() {
        let store = InMemoryPredictionStore::new();
        assert!(store.get("missing").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn label_lifecycle_overwrite() {
        let store = InMemoryPredictionStore::new();
        assert_eq!(
            store
                .set_true_value("a1", 1, RelabelPolicy::Overwrite)
                .await
                .unwrap(),
            LabelOutcome::NotFound
        );

        store.insert_if_absent(new_prediction("a1", 0)).await.unwrap();
        assert_eq!(
            store
                .set_true_value("a1", 1, RelabelPolicy::Overwrite)
                .await
                .unwrap(),
            LabelOutcome::Labeled
        );
        assert_eq!(
            store
                .set_true_value("a1", 0, RelabelPolicy::Overwrite)
                .await
                .unwrap(),
            LabelOutcome::Labeled
        );
        let record = store.get("a1").await.unwrap().unwrap();
        assert_eq!(record.true_value, Some(0));
        assert!(record.updated_at.is_some());
    }

    #[tokio::test]
    async fn label_lifecycle_reject() {
        let store = InMemoryPredictionStore::new();
        store.insert_if_absent(new_prediction("a1", 0)).await.unwrap();
        store
            .set_true_value("a1", 1, RelabelPolicy::Reject)
            .await
            .unwrap();
        // Same value again is a no-op success.
        assert_eq!(
            store
                .set_true_value("a1", 1, RelabelPolicy::Reject)
                .await
                .unwrap(),
            LabelOutcome::Labeled
        );
        assert_eq!(
            store
                .set_true_value("a1", 0, RelabelPolicy::Reject)
                .await
                .unwrap(),
            LabelOutcome::AlreadyLabeled(1)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicate_inserts_have_one_winner() {
        let store = Arc::new(InMemoryPredictionStore::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .insert_if_absent(new_prediction("race", i % 2))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn relabel_policy_parses() {
        assert_eq!(
            "overwrite".parse::<RelabelPolicy>().unwrap(),
            RelabelPolicy::Overwrite
        );
        assert_eq!(
            " Reject ".parse::<RelabelPolicy>().unwrap(),
            RelabelPolicy::Reject
        );
        assert!("sometimes".parse::<RelabelPolicy>().is_err());
    }
}
