//! Postgres implementation of the admission record store.
//!
//! All SQL is runtime-checked (`sqlx::query`, not `sqlx::query!`) so the crate
//! builds without a live database.

pub mod store;

pub use store::{connect, PgPredictionStore, PoolConfig};
