//! Storage engine and its two backends.
//!
//! The backend is chosen once at startup from [`StorageConfig`] and shared as
//! `Arc<dyn Storage>`.

mod file;
mod live_set;
mod postgres;
mod r#trait;

use std::sync::Arc;

use tracing::info;

pub use file::FileStorage;
pub use live_set::{LiveSet, PendingBatch, PendingChanges};
pub use postgres::PostgresStorage;
pub use r#trait::{Storage, StorageError, StorageExt};

use crate::config::{StorageBackend, StorageConfig};

/// Build the configured backend. The live set starts empty; call
/// [`Storage::reload`] to populate it.
pub async fn open(config: &StorageConfig) -> Result<Arc<dyn Storage>, StorageError> {
    let storage: Arc<dyn Storage> = match &config.backend {
        StorageBackend::File { path } => {
            Arc::new(FileStorage::new(path.clone()).with_retry_policy(config.retry.clone()))
        }
        StorageBackend::Database {
            url,
            max_connections,
            reset_on_reload,
        } => Arc::new(
            PostgresStorage::connect(url, *max_connections)
                .await?
                .reset_on_reload(*reset_on_reload)
                .with_retry_policy(config.retry.clone()),
        ),
    };
    info!(backend = storage.backend_name(), "storage opened");
    Ok(storage)
}
