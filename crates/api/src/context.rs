use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use hbnb_infra::Storage;

/// Shared request context: the storage engine plus the write guard.
///
/// Handlers that read, modify and save hold the guard for the whole
/// sequence; plain reads go straight to storage.
pub struct AppContext {
    storage: Arc<dyn Storage>,
    write_lock: Mutex<()>,
}

impl AppContext {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub async fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }
}
