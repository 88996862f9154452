//! Load-then-save sequencing.
//!
//! # Invariants
//! - No save is queued for a list until its load has completed (`Ready`).
//! - Saves run one at a time, in the order they were queued.
//! - Saves queued under an older generation are dropped once the engine
//!   switches to another list.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};

use crate::models::{count_nodes, TodoNode};
use crate::store::TodoStore;

use super::EngineEvent;

/// Lifecycle of the list the engine is bound to.
///
/// - `Unloaded`: a list was selected but its load has not started
/// - `Loading`: the load is in flight; edits apply in memory only
/// - `Ready`: the stored tree arrived; every change is saved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncState {
    #[default]
    Unloaded,
    Loading,
    Ready,
}

/// Per-list state machine deciding whether a change may be persisted.
#[derive(Debug, Default)]
pub struct SyncGuard {
    list_id: Option<String>,
    state: SyncState,
    generation: u64,
}

impl SyncGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_id(&self) -> Option<&str> {
        self.list_id.as_deref()
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Bind to `list_id` in the `Unloaded` state and start a new generation.
    pub fn switch_to(&mut self, list_id: &str) -> u64 {
        self.generation += 1;
        self.list_id = Some(list_id.to_string());
        self.state = SyncState::Unloaded;
        self.generation
    }

    /// `Unloaded -> Loading`, only for the current generation.
    pub fn begin_load(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.state != SyncState::Unloaded {
            return false;
        }
        self.state = SyncState::Loading;
        true
    }

    /// `Loading -> Ready`. A load from a superseded generation is refused.
    pub fn finish_load(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.state != SyncState::Loading {
            return false;
        }
        self.state = SyncState::Ready;
        true
    }

    pub fn should_save(&self) -> bool {
        self.state == SyncState::Ready && self.list_id.is_some()
    }
}

enum SaveJob {
    Save {
        generation: u64,
        list_id: String,
        todos: Vec<TodoNode>,
    },
    Flush(oneshot::Sender<()>),
}

/// Ordered, fire-and-forget save pipeline backed by one worker task.
#[derive(Clone)]
pub struct SaveQueue {
    tx: mpsc::UnboundedSender<SaveJob>,
    current: Arc<AtomicU64>,
}

impl SaveQueue {
    /// Start the worker. Must be called from within a Tokio runtime.
    pub fn spawn(store: Arc<dyn TodoStore>, events: broadcast::Sender<EngineEvent>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let current = Arc::new(AtomicU64::new(0));
        tokio::spawn(run_saves(store, rx, current.clone(), events));
        Self { tx, current }
    }

    /// Only saves tagged with `generation` will be performed from now on.
    pub fn retarget(&self, generation: u64) {
        self.current.store(generation, Ordering::SeqCst);
    }

    pub fn enqueue(&self, generation: u64, list_id: String, todos: Vec<TodoNode>) {
        let job = SaveJob::Save {
            generation,
            list_id,
            todos,
        };
        if self.tx.send(job).is_err() {
            tracing::warn!("save worker has stopped; change not persisted");
        }
    }

    /// Wait until every save queued before this call has finished.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(SaveJob::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn run_saves(
    store: Arc<dyn TodoStore>,
    mut rx: mpsc::UnboundedReceiver<SaveJob>,
    current: Arc<AtomicU64>,
    events: broadcast::Sender<EngineEvent>,
) {
    while let Some(job) = rx.recv().await {
        let (generation, list_id, todos) = match job {
            SaveJob::Flush(done) => {
                let _ = done.send(());
                continue;
            }
            SaveJob::Save {
                generation,
                list_id,
                todos,
            } => (generation, list_id, todos),
        };

        if generation != current.load(Ordering::SeqCst) {
            tracing::debug!(list_id = %list_id, generation, "dropping save for a list no longer open");
            continue;
        }

        let nodes = count_nodes(&todos);
        match store.save(&list_id, &todos).await {
            Ok(()) => {
                tracing::debug!(list_id = %list_id, nodes, backend = store.backend(), "saved todos");
                let _ = events.send(EngineEvent::Saved { list_id, nodes });
            }
            Err(e) => {
                tracing::error!(
                    list_id = %list_id,
                    backend = store.backend(),
                    error = %e,
                    "failed to save todos"
                );
                let _ = events.send(EngineEvent::SaveFailed {
                    list_id,
                    error: e.to_string(),
                });
            }
        }
    }
}
