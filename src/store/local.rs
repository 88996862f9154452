use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::models::TodoNode;

use super::{StoreError, TodoStore};

/// Namespace of the single record holding every local list.
pub const STORAGE_KEY: &str = "nested-todos-lists";

type Record = BTreeMap<String, Vec<TodoNode>>;

/// File-backed key-value store.
///
/// All lists live in one JSON object (`list id -> TodoNode[]`) stored at
/// `<dir>/nested-todos-lists.json`. Every save rewrites the whole record
/// through a synced temporary file that is renamed over the old one.
#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the record.
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", STORAGE_KEY)),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identifiers of every stored list, sorted.
    pub async fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.read_record().await?.into_keys().collect())
    }

    /// Remove a list from the record. Returns false if it was not stored.
    pub async fn delete_list(&self, list_id: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut record = self.read_record().await?;
        let removed = record.remove(list_id).is_some();
        if removed {
            self.write_record(&record).await?;
        }
        Ok(removed)
    }

    async fn read_record(&self) -> Result<Record, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Record::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Record::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_record(&self, record: &Record) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string(record)?;
        let staging = self.path.with_extension("json.tmp");

        let mut file = tokio::fs::File::create(&staging).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&staging, &self.path).await?;

        // Best effort: sync the directory entry for the rename.
        if let Some(dir) = self.path.parent() {
            if let Ok(dir) = tokio::fs::File::open(dir).await {
                let _ = dir.sync_all().await;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TodoStore for LocalStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn load(&self, list_id: &str) -> Result<Vec<TodoNode>, StoreError> {
        let mut record = self.read_record().await?;
        Ok(record.remove(list_id).unwrap_or_default())
    }

    async fn save(&self, list_id: &str, todos: &[TodoNode]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut record = self.read_record().await?;
        record.insert(list_id.to_string(), todos.to_vec());
        self.write_record(&record).await?;
        tracing::debug!(list_id, path = %self.path.display(), "wrote local record");
        Ok(())
    }
}
