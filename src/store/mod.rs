//! Persistence backends for todo trees.
//!
//! Every backend presents the same two-operation contract to the engine:
//! `load` returns the stored tree for a list identifier (an unknown list is
//! an empty tree, not an error) and `save` overwrites the full tree.
//!
//! - [`LocalStore`]: one namespaced JSON record on disk holding every list.
//! - [`RemoteStore`]: the list server, over HTTP.
//! - [`MemoryStore`]: an in-process map.

mod local;
mod remote;

pub use local::{LocalStore, STORAGE_KEY};
pub use remote::RemoteStore;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::TodoNode;

/// Failures talking to a backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored record is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },
}

/// Load/save contract between the engine and a backing store.
#[async_trait]
pub trait TodoStore: Send + Sync {
    /// Short backend name used in logs.
    fn backend(&self) -> &'static str;

    async fn load(&self, list_id: &str) -> Result<Vec<TodoNode>, StoreError>;

    async fn save(&self, list_id: &str, todos: &[TodoNode]) -> Result<(), StoreError>;
}

/// Process-local store. Clones share the same lists.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    lists: Arc<Mutex<HashMap<String, Vec<TodoNode>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_list(list_id: impl Into<String>, todos: Vec<TodoNode>) -> Self {
        let store = Self::new();
        store.lists().insert(list_id.into(), todos);
        store
    }

    /// Current stored value of a list, if it was ever saved.
    pub fn get(&self, list_id: &str) -> Option<Vec<TodoNode>> {
        self.lists().get(list_id).cloned()
    }

    fn lists(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<TodoNode>>> {
        match self.lists.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl TodoStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, list_id: &str) -> Result<Vec<TodoNode>, StoreError> {
        Ok(self.get(list_id).unwrap_or_default())
    }

    async fn save(&self, list_id: &str, todos: &[TodoNode]) -> Result<(), StoreError> {
        self.lists().insert(list_id.to_string(), todos.to_vec());
        Ok(())
    }
}
