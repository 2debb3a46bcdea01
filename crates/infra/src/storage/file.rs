//! JSON-document backend.
//!
//! The whole live set is serialized to one JSON object keyed by
//! `"<TypeName>.<id>"`. Saves write a temporary file in the target directory
//! and atomically rename it over the document, so a crash leaves either the
//! old or the new document, never a mix.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use hbnb_core::{AnyEntity, Attributes, EntityKind, split_key};

use super::live_set::LiveSet;
use super::r#trait::{Storage, StorageError};
use crate::retry::{RetryPolicy, retry};

#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    objects: LiveSet,
    persist_lock: Mutex<()>,
    retry: RetryPolicy,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            objects: LiveSet::new(),
            persist_lock: Mutex::new(()),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Storage for FileStorage {
    fn all(&self, kind: Option<EntityKind>) -> HashMap<String, AnyEntity> {
        self.objects.all(kind)
    }

    fn new(&self, entity: AnyEntity) {
        self.objects.insert(entity);
    }

    fn get(&self, kind: EntityKind, id: &str) -> Option<AnyEntity> {
        self.objects.get(kind, id)
    }

    fn count(&self, kind: Option<EntityKind>) -> usize {
        self.objects.count(kind)
    }

    fn delete(&self, entity: &AnyEntity) {
        let removed = self.objects.remove(entity);
        if removed.len() > 1 {
            debug!(root = %entity.key(), cascaded = removed.len() - 1, "cascading delete");
        }
    }

    #[instrument(skip(self), fields(path = %self.path.display()), err)]
    async fn save(&self) -> Result<(), StorageError> {
        let _guard = self.persist_lock.lock().await;

        let snapshot = self.objects.checkpoint();
        let bytes = Arc::new(encode_document(&snapshot)?);

        let path = self.path.clone();
        retry(&self.retry, "file.save", move || {
            let path = path.clone();
            let bytes = bytes.clone();
            async move {
                tokio::task::spawn_blocking(move || write_document(&path, &bytes))
                    .await
                    .map_err(|e| StorageError::Task(e.to_string()))?
                    .map_err(|e| StorageError::io("file.save", e))
            }
        })
        .await?;

        debug!(entities = snapshot.len(), "storage document written");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %self.path.display()), err)]
    async fn reload(&self) -> Result<(), StorageError> {
        let _guard = self.persist_lock.lock().await;

        let path = self.path.clone();
        let raw = retry(&self.retry, "file.reload", move || {
            let path = path.clone();
            async move {
                match tokio::fs::read(&path).await {
                    Ok(bytes) => Ok(Some(bytes)),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(StorageError::io("file.reload", e)),
                }
            }
        })
        .await?;

        let entities = match raw {
            Some(bytes) => decode_document(&bytes)?,
            None => Vec::new(),
        };

        info!(entities = entities.len(), "storage reloaded");
        self.objects.replace_all(entities);
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.save().await
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

fn encode_document(objects: &HashMap<String, AnyEntity>) -> Result<Vec<u8>, StorageError> {
    let document: Attributes = objects
        .iter()
        .map(|(key, entity)| (key.clone(), Value::Object(entity.to_attributes())))
        .collect();
    Ok(serde_json::to_vec(&document)?)
}

/// Parse a stored document. Empty input is an empty store; records under an
/// unknown type prefix are skipped.
fn decode_document(bytes: &[u8]) -> Result<Vec<AnyEntity>, StorageError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let document: HashMap<String, Value> = serde_json::from_slice(bytes)?;
    let mut entities = Vec::with_capacity(document.len());

    for (key, value) in document {
        let Some((kind, id)) = split_key(&key) else {
            warn!(%key, "skipping record with unknown type prefix");
            continue;
        };
        let Value::Object(mut attrs) = value else {
            return Err(StorageError::corrupt(key, "record is not an object"));
        };

        match attrs.get("id").cloned() {
            None => {
                attrs.insert("id".into(), Value::String(id.to_string()));
            }
            Some(Value::String(stored)) if stored == id => {}
            Some(_) => return Err(StorageError::corrupt(key, "id does not match key")),
        }

        let entity = AnyEntity::from_attributes(kind, attrs)
            .map_err(|e| StorageError::corrupt(key.clone(), e.to_string()))?;
        entities.push(entity);
    }

    Ok(entities)
}

fn write_document(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
