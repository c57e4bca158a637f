//! Server configuration from environment variables.
//!
//!   ADMISSION_BIND_ADDR      : listen address (default: 0.0.0.0:5000)
//!   DATABASE_URL             : Postgres connection string (optional; in-memory store when unset)
//!   ADMISSION_DB_POOL_SIZE   : max pool connections (default: 10)
//!   ADMISSION_PIPELINE_PATH  : classifier artifact (default: models/pipeline.json)
//!   ADMISSION_STRICT_STATUS  : map errors to 4xx/5xx instead of 200 (default: false)
//!   ADMISSION_RELABEL_POLICY : `overwrite` or `reject` (default: overwrite)

use std::net::SocketAddr;
use std::path::PathBuf;

use admission_core::RelabelPolicy;
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_PIPELINE_PATH: &str = "models/pipeline.json";
pub const DEFAULT_POOL_SIZE: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not a valid socket address: {value}")]
    InvalidAddr { var: &'static str, value: String },

    #[error("{var} must be a positive integer, got {value}")]
    InvalidPoolSize { var: &'static str, value: String },

    #[error("{var} must be true or false, got {value}")]
    InvalidBool { var: &'static str, value: String },

    #[error("{var}: {reason}")]
    InvalidPolicy { var: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub db_pool_size: u32,
    pub pipeline_path: PathBuf,
    pub strict_status: bool,
    pub relabel_policy: RelabelPolicy,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = {
            let var = "ADMISSION_BIND_ADDR";
            let value = get(var).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidAddr { var, value })?
        };

        let db_pool_size = match get("ADMISSION_DB_POOL_SIZE") {
            None => DEFAULT_POOL_SIZE,
            Some(value) => match value.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidPoolSize {
                        var: "ADMISSION_DB_POOL_SIZE",
                        value,
                    })
                }
            },
        };

        let strict_status = match get("ADMISSION_STRICT_STATUS") {
            None => false,
            Some(value) => parse_bool(&value).ok_or(ConfigError::InvalidBool {
                var: "ADMISSION_STRICT_STATUS",
                value,
            })?,
        };

        let relabel_policy = match get("ADMISSION_RELABEL_POLICY") {
            None => RelabelPolicy::default(),
            Some(value) => value
                .parse()
                .map_err(|reason| ConfigError::InvalidPolicy {
                    var: "ADMISSION_RELABEL_POLICY",
                    reason,
                })?,
        };

        Ok(Self {
            bind_addr,
            database_url: get("DATABASE_URL"),
            db_pool_size,
            pipeline_path: get("ADMISSION_PIPELINE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PIPELINE_PATH)),
            strict_status,
            relabel_policy,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
