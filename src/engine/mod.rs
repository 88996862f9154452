//! Engine facade: the single entry point for editing one todo list.
//!
//! Commands mutate the in-memory tree synchronously and return immediately.
//! Persistence happens behind the [`SyncGuard`]: nothing is saved until the
//! list's load has completed, after which every change queues a save of the
//! full tree on the [`SaveQueue`]. After each command an
//! [`EngineEvent::Changed`] is broadcast so a presentation layer can react
//! (re-render, move focus) without polling.

mod sync;

pub use sync::{SaveQueue, SyncGuard, SyncState};

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;

use crate::models::{Position, TodoId, TodoNode};
use crate::store::TodoStore;
use crate::tree::{transfer, Command, Outcome, Tree};

/// Notifications published by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The stored tree for `list_id` arrived and the engine is now `Ready`.
    Loaded { list_id: String, nodes: usize },
    /// A command finished.
    Changed {
        list_id: Option<String>,
        command: &'static str,
        outcome: Outcome,
    },
    Saved { list_id: String, nodes: usize },
    SaveFailed { list_id: String, error: String },
}

struct Session {
    tree: Tree,
    guard: SyncGuard,
}

/// Handle to a todo-tree editing session. Clones share the same session.
#[derive(Clone)]
pub struct Engine {
    session: Arc<Mutex<Session>>,
    store: Arc<dyn TodoStore>,
    saves: SaveQueue,
    events: broadcast::Sender<EngineEvent>,
}

impl Engine {
    /// Create an engine over `store`. Must be called from within a Tokio runtime.
    pub fn new(store: Arc<dyn TodoStore>) -> Self {
        let (events, _rx) = broadcast::channel(100);
        let saves = SaveQueue::spawn(store.clone(), events.clone());

        Self {
            session: Arc::new(Mutex::new(Session {
                tree: Tree::new(),
                guard: SyncGuard::new(),
            })),
            store,
            saves,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ============================================================
    // Session lifecycle
    // ============================================================

    /// Switch to `list_id` and load it from the store.
    ///
    /// The in-memory tree is cleared immediately. Edits made while the load
    /// is in flight are not saved and are replaced by the loaded tree. A
    /// failed or malformed load yields an empty tree. If another `open`
    /// starts before this one resolves, this load is discarded.
    pub async fn open(&self, list_id: impl Into<String>) {
        let list_id = list_id.into();
        let generation = {
            let mut session = self.session();
            let generation = session.guard.switch_to(&list_id);
            session.tree = Tree::new();
            session.guard.begin_load(generation);
            self.saves.retarget(generation);
            generation
        };

        let tree = match self.store.load(&list_id).await {
            Ok(nodes) => Tree::from_nodes(nodes).unwrap_or_else(|e| {
                tracing::warn!(list_id = %list_id, error = %e, "stored list is not a valid tree; starting empty");
                Tree::new()
            }),
            Err(e) => {
                tracing::warn!(
                    list_id = %list_id,
                    backend = self.store.backend(),
                    error = %e,
                    "failed to load list; starting empty"
                );
                Tree::new()
            }
        };

        let nodes = tree.len();
        {
            let mut session = self.session();
            if !session.guard.finish_load(generation) {
                tracing::debug!(list_id = %list_id, "discarding load for a list no longer open");
                return;
            }
            session.tree = tree;
        }

        tracing::info!(list_id = %list_id, nodes, backend = self.store.backend(), "loaded todo list");
        let _ = self.events.send(EngineEvent::Loaded { list_id, nodes });
    }

    pub fn list_id(&self) -> Option<String> {
        self.session().guard.list_id().map(str::to_string)
    }

    pub fn state(&self) -> SyncState {
        self.session().guard.state()
    }

    /// Wait for every save queued so far to finish.
    pub async fn flush(&self) {
        self.saves.flush().await;
    }

    // ============================================================
    // Reading
    // ============================================================

    pub fn todos(&self) -> Vec<TodoNode> {
        self.session().tree.to_nodes()
    }

    pub fn tree(&self) -> Tree {
        self.session().tree.clone()
    }

    // ============================================================
    // Commands
    // ============================================================

    /// Apply one command, queue a save when allowed, and publish the result.
    pub fn apply(&self, command: Command) -> Outcome {
        let (list_id, outcome) = {
            let mut session = self.session();
            let outcome = session.tree.apply(&command);
            let list_id = session.guard.list_id().map(str::to_string);

            if outcome.changed {
                match (&list_id, session.guard.should_save()) {
                    (Some(list_id), true) => self.saves.enqueue(
                        session.guard.generation(),
                        list_id.clone(),
                        session.tree.to_nodes(),
                    ),
                    _ => tracing::debug!(
                        command = command.name(),
                        state = ?session.guard.state(),
                        "list not loaded yet; change kept in memory only"
                    ),
                }
            }
            (list_id, outcome)
        };

        let _ = self.events.send(EngineEvent::Changed {
            list_id,
            command: command.name(),
            outcome: outcome.clone(),
        });
        outcome
    }

    pub fn add(&self, parent: Option<&TodoId>, text: &str) -> Option<TodoId> {
        self.apply(Command::Add {
            parent: parent.cloned(),
            text: text.to_string(),
        })
        .created
    }

    pub fn add_after(&self, after: &TodoId, text: &str) -> Option<TodoId> {
        self.apply(Command::AddAfter {
            after: after.clone(),
            text: text.to_string(),
        })
        .created
    }

    pub fn update(&self, id: &TodoId, text: &str) -> bool {
        self.apply(Command::Update {
            id: id.clone(),
            text: text.to_string(),
        })
        .changed
    }

    pub fn toggle(&self, id: &TodoId) -> bool {
        self.apply(Command::Toggle { id: id.clone() }).changed
    }

    pub fn toggle_many(&self, ids: &[TodoId], completed: bool) -> bool {
        self.apply(Command::ToggleMany {
            ids: ids.to_vec(),
            completed,
        })
        .changed
    }

    pub fn delete(&self, id: &TodoId) -> bool {
        self.apply(Command::Delete { id: id.clone() }).changed
    }

    pub fn move_todo(&self, dragged: &TodoId, target: &TodoId, position: Position) -> bool {
        self.apply(Command::Move {
            dragged: dragged.clone(),
            target: target.clone(),
            position,
        })
        .changed
    }

    pub fn indent(&self, id: &TodoId) -> bool {
        self.apply(Command::Indent { id: id.clone() }).changed
    }

    pub fn outdent(&self, id: &TodoId) -> bool {
        self.apply(Command::Outdent { id: id.clone() }).changed
    }

    pub fn check_all(&self) -> bool {
        self.apply(Command::CheckAll).changed
    }

    pub fn uncheck_all(&self) -> bool {
        self.apply(Command::UncheckAll).changed
    }

    // ============================================================
    // Export / import
    // ============================================================

    pub fn export_json(&self) -> serde_json::Result<String> {
        transfer::export_json(&self.session().tree)
    }

    /// Replace the whole tree with `json`. Returns false, leaving the tree
    /// untouched, if the payload is not a valid `TodoNode[]`.
    pub fn import_json(&self, json: &str) -> bool {
        match transfer::import_json(json) {
            Ok(tree) => self.apply(Command::Replace(tree)).changed,
            Err(e) => {
                tracing::warn!(error = %e, "rejected todo import");
                false
            }
        }
    }
}
