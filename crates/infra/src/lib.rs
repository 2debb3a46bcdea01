//! Infrastructure layer: storage engine, backends, configuration.

pub mod config;
pub mod retry;
pub mod storage;

pub use config::{ConfigError, StorageBackend, StorageConfig};
pub use retry::RetryPolicy;
pub use storage::{FileStorage, PostgresStorage, Storage, StorageError, StorageExt};
