use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use hbnb_core::{AnyEntity, EntityKind, Model};

/// Storage operation error.
///
/// These are **infrastructure errors** (the backing medium could not be read
/// or written). Absent entities are never errors; lookups return `None`.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o failure during {operation}: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed storage document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("database failure during {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("storage task failed: {0}")]
    Task(String),
}

impl StorageError {
    pub fn io(operation: &'static str, source: std::io::Error) -> Self {
        Self::Io { operation, source }
    }

    pub fn database(operation: &'static str, source: sqlx::Error) -> Self {
        Self::Database { operation, source }
    }

    pub fn corrupt(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Io { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            ),
            StorageError::Database { source, .. } => matches!(
                source,
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)
            ),
            _ => false,
        }
    }
}

/// The storage engine: sole owner of the live entity set.
///
/// `new` and `delete` only touch the in-memory set; `save` makes the current
/// set durable. Handlers can therefore group several mutations into a single
/// persistence round-trip.
///
/// Implementations serialize access to the live set internally, and
/// `save`/`reload` are serialized against each other.
#[async_trait]
pub trait Storage: Send + Sync {
    /// All live entities keyed by `"<TypeName>.<id>"`, optionally one kind only.
    fn all(&self, kind: Option<EntityKind>) -> HashMap<String, AnyEntity>;

    /// Register an entity as live (replacing any entity with the same key).
    fn new(&self, entity: AnyEntity);

    fn get(&self, kind: EntityKind, id: &str) -> Option<AnyEntity>;

    fn count(&self, kind: Option<EntityKind>) -> usize;

    /// Remove a live entity together with everything it owns. No-op if the
    /// entity is not live.
    fn delete(&self, entity: &AnyEntity);

    /// Persist the full live set atomically.
    async fn save(&self) -> Result<(), StorageError>;

    /// Replace the live set with the contents of the backing medium.
    async fn reload(&self) -> Result<(), StorageError>;

    /// Flush and release backend resources.
    async fn close(&self) -> Result<(), StorageError>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;

    /// Lookup by type name; unknown names yield `None`.
    fn get_by_name(&self, type_name: &str, id: &str) -> Option<AnyEntity> {
        EntityKind::from_name(type_name).and_then(|kind| self.get(kind, id))
    }

    /// Count by type name; unknown names count zero.
    fn count_by_name(&self, type_name: &str) -> usize {
        EntityKind::from_name(type_name).map_or(0, |kind| self.count(Some(kind)))
    }
}

/// Typed helpers over [`Storage`].
pub trait StorageExt: Storage {
    fn get_as<T: Model>(&self, id: &str) -> Option<T> {
        self.get(T::KIND, id).and_then(|e| e.into_model::<T>())
    }

    /// Every live `T`, oldest first.
    fn all_of<T: Model>(&self) -> Vec<T> {
        let mut items: Vec<T> = self
            .all(Some(T::KIND))
            .into_values()
            .filter_map(|e| e.into_model::<T>())
            .collect();
        items.sort_by(|a, b| {
            (a.base().created_at, a.id()).cmp(&(b.base().created_at, b.id()))
        });
        items
    }

    fn count_of<T: Model>(&self) -> usize {
        self.count(Some(T::KIND))
    }

    fn put<T: Model>(&self, model: T) {
        self.new(model.into())
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}
