//! Storage configuration, read once at process start.
//!
//! Values come from environment variables through a lookup function so tests
//! can inject them without touching the process environment.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::retry::RetryPolicy;

pub const DEFAULT_FILE_PATH: &str = "file.json";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("{0} must be set when HBNB_TYPE_STORAGE=db")]
    Missing(&'static str),
}

/// Which backing medium holds the live set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Single JSON document on disk.
    File { path: PathBuf },
    /// Postgres, one table per entity type.
    Database {
        url: String,
        max_connections: u32,
        /// Drop and recreate every table on reload (`HBNB_ENV=test`).
        reset_on_reload: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub retry: RetryPolicy,
}

impl StorageConfig {
    /// File-backed configuration with default retry policy.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::File { path: path.into() },
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let kind = lookup("HBNB_TYPE_STORAGE").unwrap_or_else(|| "file".to_string());

        let backend = match kind.trim().to_lowercase().as_str() {
            "file" | "fs" => StorageBackend::File {
                path: lookup("HBNB_FILE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_PATH)),
            },
            "db" | "database" => StorageBackend::Database {
                url: lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
                max_connections: parse_or(&lookup, "HBNB_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
                reset_on_reload: lookup("HBNB_ENV").is_some_and(|env| env == "test"),
            },
            _ => {
                return Err(ConfigError::Invalid {
                    key: "HBNB_TYPE_STORAGE",
                    value: kind,
                });
            }
        };

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: parse_or(&lookup, "HBNB_SAVE_RETRIES", defaults.max_attempts)?,
            ..defaults
        };

        Ok(Self { backend, retry })
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::file(DEFAULT_FILE_PATH)
    }
}

/// Parse `key` with `FromStr`, falling back to `default` when unset.
pub fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
