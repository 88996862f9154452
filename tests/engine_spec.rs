use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nested_todos::engine::{Engine, EngineEvent, SaveQueue, SyncState};
use nested_todos::models::*;
use nested_todos::store::{LocalStore, MemoryStore, StoreError, TodoStore};
use nested_todos::tree::MAX_DEPTH;
use tokio::sync::{broadcast, Notify};

type SaveLog = Vec<(String, Vec<TodoNode>)>;

/// Store that records every save and can hold individual loads until released.
#[derive(Clone, Default)]
struct RecordingStore {
    lists: Arc<Mutex<HashMap<String, Vec<TodoNode>>>>,
    saves: Arc<Mutex<SaveLog>>,
    gates: Arc<Mutex<HashMap<String, Arc<Notify>>>>,
}

impl RecordingStore {
    fn seeded(list_id: &str, todos: Vec<TodoNode>) -> Self {
        let store = Self::default();
        store.lists.lock().unwrap().insert(list_id.to_string(), todos);
        store
    }

    /// Hold loads of `list_id` until the returned gate is notified.
    fn gate(&self, list_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(list_id.to_string(), gate.clone());
        gate
    }

    fn saves(&self) -> SaveLog {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl TodoStore for RecordingStore {
    fn backend(&self) -> &'static str {
        "recording"
    }

    async fn load(&self, list_id: &str) -> Result<Vec<TodoNode>, StoreError> {
        let gate = self.gates.lock().unwrap().get(list_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(self
            .lists
            .lock()
            .unwrap()
            .get(list_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, list_id: &str, todos: &[TodoNode]) -> Result<(), StoreError> {
        self.saves
            .lock()
            .unwrap()
            .push((list_id.to_string(), todos.to_vec()));
        self.lists
            .lock()
            .unwrap()
            .insert(list_id.to_string(), todos.to_vec());
        Ok(())
    }
}

/// Store whose every call fails.
struct BrokenStore;

#[async_trait]
impl TodoStore for BrokenStore {
    fn backend(&self) -> &'static str {
        "broken"
    }

    async fn load(&self, _list_id: &str) -> Result<Vec<TodoNode>, StoreError> {
        Err(StoreError::Server {
            status: 500,
            message: "Internal server error".to_string(),
        })
    }

    async fn save(&self, _list_id: &str, _todos: &[TodoNode]) -> Result<(), StoreError> {
        Err(StoreError::Server {
            status: 503,
            message: "unavailable".to_string(),
        })
    }
}

fn seeded_todos() -> Vec<TodoNode> {
    vec![TodoNode {
        id: "a".into(),
        text: "Groceries".to_string(),
        completed: false,
        children: vec![TodoNode::leaf("b".into(), "Milk")],
    }]
}

async fn wait_for_state(engine: &Engine, state: SyncState) {
    while engine.state() != state {
        tokio::task::yield_now().await;
    }
}

mod loading {
    use super::*;

    #[tokio::test]
    async fn loads_the_stored_tree() {
        let store = RecordingStore::seeded("abc", seeded_todos());
        let engine = Engine::new(Arc::new(store.clone()));

        engine.open("abc").await;

        assert_eq!(engine.state(), SyncState::Ready);
        assert_eq!(engine.list_id().as_deref(), Some("abc"));
        assert_eq!(engine.todos(), seeded_todos());
        engine.flush().await;
        assert!(store.saves().is_empty());
    }

    #[tokio::test]
    async fn does_not_save_before_the_load_resolves() {
        let store = RecordingStore::seeded("abc", seeded_todos());
        let gate = store.gate("abc");
        let engine = Engine::new(Arc::new(store.clone()));

        let opener = engine.clone();
        let opening = tokio::spawn(async move { opener.open("abc").await });
        wait_for_state(&engine, SyncState::Loading).await;

        assert!(engine.todos().is_empty());
        assert!(engine.add(None, "typed while loading").is_some());
        engine.flush().await;
        assert!(store.saves().is_empty());

        gate.notify_one();
        opening.await.unwrap();

        // The stored tree replaces edits made while loading.
        assert_eq!(engine.todos(), seeded_todos());
        engine.flush().await;
        assert!(store.saves().is_empty());
    }

    #[tokio::test]
    async fn starts_empty_when_the_load_fails() {
        let engine = Engine::new(Arc::new(BrokenStore));

        engine.open("abc").await;

        assert_eq!(engine.state(), SyncState::Ready);
        assert!(engine.todos().is_empty());
    }

    #[tokio::test]
    async fn starts_empty_when_the_stored_tree_is_invalid() {
        let duplicated = vec![
            TodoNode::leaf("x".into(), "One"),
            TodoNode::leaf("x".into(), "Two"),
        ];
        let engine = Engine::new(Arc::new(MemoryStore::with_list("abc", duplicated)));

        engine.open("abc").await;

        assert!(engine.todos().is_empty());
    }

    #[tokio::test]
    async fn discards_a_load_for_a_list_no_longer_open() {
        let store = RecordingStore::seeded("two", vec![TodoNode::leaf("t".into(), "Two")]);
        store
            .lists
            .lock()
            .unwrap()
            .insert("one".to_string(), seeded_todos());
        let gate = store.gate("one");
        let engine = Engine::new(Arc::new(store.clone()));

        let opener = engine.clone();
        let opening = tokio::spawn(async move { opener.open("one").await });
        wait_for_state(&engine, SyncState::Loading).await;

        engine.open("two").await;
        gate.notify_one();
        opening.await.unwrap();

        assert_eq!(engine.list_id().as_deref(), Some("two"));
        assert_eq!(engine.state(), SyncState::Ready);
        assert_eq!(engine.todos(), vec![TodoNode::leaf("t".into(), "Two")]);
    }

    #[tokio::test]
    async fn keeps_edits_in_memory_before_any_list_is_opened() {
        let store = RecordingStore::default();
        let engine = Engine::new(Arc::new(store.clone()));

        assert!(engine.add(None, "scratch").is_some());
        engine.flush().await;

        assert_eq!(engine.state(), SyncState::Unloaded);
        assert_eq!(engine.todos().len(), 1);
        assert!(store.saves().is_empty());
    }
}

mod saving {
    use super::*;

    #[tokio::test]
    async fn saves_every_change_in_order() {
        let store = RecordingStore::default();
        let engine = Engine::new(Arc::new(store.clone()));
        engine.open("abc").await;

        let first = engine.add(None, "one").expect("root add succeeds");
        engine.add(None, "two");
        engine.toggle(&first);
        engine.flush().await;

        let saves = store.saves();
        assert_eq!(saves.len(), 3);
        assert!(saves.iter().all(|(list_id, _)| list_id == "abc"));
        assert_eq!(saves[0].1.len(), 1);
        assert_eq!(saves[1].1.len(), 2);
        assert!(saves[2].1[0].completed);
        assert_eq!(saves[2].1, engine.todos());
    }

    #[tokio::test]
    async fn skips_commands_that_change_nothing() {
        let store = RecordingStore::seeded("abc", seeded_todos());
        let engine = Engine::new(Arc::new(store.clone()));
        engine.open("abc").await;

        assert!(!engine.toggle(&"ghost".into()));
        assert!(!engine.indent(&"a".into()));
        assert!(!engine.outdent(&"a".into()));
        assert_eq!(engine.add(Some(&"ghost".into()), "orphan"), None);
        engine.flush().await;

        assert!(store.saves().is_empty());
    }

    #[tokio::test]
    async fn saves_to_the_newly_opened_list() {
        let store = RecordingStore::default();
        let engine = Engine::new(Arc::new(store.clone()));
        engine.open("one").await;
        engine.add(None, "for one");
        engine.flush().await;

        engine.open("two").await;
        engine.add(None, "for two");
        engine.flush().await;

        let lists: Vec<String> = store.saves().into_iter().map(|(id, _)| id).collect();
        assert_eq!(lists, vec!["one".to_string(), "two".to_string()]);
        assert_eq!(engine.todos().len(), 1);
    }

    #[tokio::test]
    async fn queue_drops_saves_from_an_older_generation() {
        let store = RecordingStore::default();
        let (events, _rx) = broadcast::channel(16);
        let queue = SaveQueue::spawn(Arc::new(store.clone()), events);

        queue.retarget(2);
        queue.enqueue(1, "old".to_string(), seeded_todos());
        queue.enqueue(2, "new".to_string(), seeded_todos());
        queue.flush().await;

        let lists: Vec<String> = store.saves().into_iter().map(|(id, _)| id).collect();
        assert_eq!(lists, vec!["new".to_string()]);
    }

    #[tokio::test]
    async fn deep_nesting_does_not_break_other_local_lists() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store: Arc<LocalStore> = Arc::new(LocalStore::new(dir.path()));
        store.save("shopping", &seeded_todos()).await.unwrap();

        let engine = Engine::new(store.clone());
        engine.open("deep").await;
        let mut deepest = engine.add(None, "level 1");
        for level in 2..=100 {
            let Some(parent) = deepest.clone() else { break };
            match engine.add(Some(&parent), &format!("level {}", level)) {
                Some(id) => deepest = Some(id),
                None => break,
            }
        }
        engine.flush().await;
        assert_eq!(count_nodes(&engine.todos()), MAX_DEPTH);

        engine.open("shopping").await;
        assert_eq!(engine.todos(), seeded_todos());

        engine.open("deep").await;
        assert_eq!(count_nodes(&engine.todos()), MAX_DEPTH);
    }

    #[tokio::test]
    async fn import_replaces_the_tree_and_saves_it() {
        let store = RecordingStore::seeded("abc", seeded_todos());
        let engine = Engine::new(Arc::new(store.clone()));
        engine.open("abc").await;

        let imported = engine.import_json(r#"[{"id": "n", "text": "New", "completed": true, "children": []}]"#);
        engine.flush().await;

        assert!(imported);
        assert_eq!(engine.todos(), vec![TodoNode { completed: true, ..TodoNode::leaf("n".into(), "New") }]);
        assert_eq!(store.saves().len(), 1);
    }

    #[tokio::test]
    async fn rejected_import_leaves_the_tree_alone() {
        let store = RecordingStore::seeded("abc", seeded_todos());
        let engine = Engine::new(Arc::new(store.clone()));
        engine.open("abc").await;

        assert!(!engine.import_json("{ broken"));
        assert!(!engine.import_json(r#"{"todos": []}"#));
        assert!(!engine.import_json(r#"[{"id": "d"}, {"id": "d"}]"#));
        engine.flush().await;

        assert_eq!(engine.todos(), seeded_todos());
        assert!(store.saves().is_empty());
    }

    #[tokio::test]
    async fn export_matches_the_current_tree() {
        let engine = Engine::new(Arc::new(MemoryStore::with_list("abc", seeded_todos())));
        engine.open("abc").await;

        let json = engine.export_json().expect("tree serializes");
        let nodes: Vec<TodoNode> = serde_json::from_str(&json).expect("export is a node array");

        assert_eq!(nodes, seeded_todos());
    }
}

mod events {
    use super::*;

    #[tokio::test]
    async fn publishes_load_change_and_save() {
        let engine = Engine::new(Arc::new(MemoryStore::with_list("abc", seeded_todos())));
        let mut events = engine.subscribe();

        engine.open("abc").await;
        engine.check_all();
        engine.flush().await;

        assert_eq!(
            events.recv().await.unwrap(),
            EngineEvent::Loaded {
                list_id: "abc".to_string(),
                nodes: 2
            }
        );
        match events.recv().await.unwrap() {
            EngineEvent::Changed {
                list_id,
                command,
                outcome,
            } => {
                assert_eq!(list_id.as_deref(), Some("abc"));
                assert_eq!(command, "check_all");
                assert!(outcome.changed);
            }
            other => panic!("expected Changed, got {:?}", other),
        }
        assert_eq!(
            events.recv().await.unwrap(),
            EngineEvent::Saved {
                list_id: "abc".to_string(),
                nodes: 2
            }
        );
    }

    #[tokio::test]
    async fn reports_failed_saves() {
        let engine = Engine::new(Arc::new(BrokenStore));
        engine.open("abc").await;
        let mut events = engine.subscribe();

        engine.add(None, "lost");
        engine.flush().await;

        let _changed = events.recv().await.unwrap();
        match events.recv().await.unwrap() {
            EngineEvent::SaveFailed { list_id, error } => {
                assert_eq!(list_id, "abc");
                assert!(error.contains("unavailable"));
            }
            other => panic!("expected SaveFailed, got {:?}", other),
        }
    }
}
