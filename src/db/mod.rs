mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::models::*;

/// SQLite storage behind the list server. One row per list identifier, the
/// tree kept as its JSON `TodoNode[]`.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "nested-todos")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().join("nested-todos.db"))
    }

    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        schema::run_migrations(&conn)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))
    }

    // ============================================================
    // List operations
    // ============================================================

    pub fn get_list(&self, list_id: &str) -> Result<Option<TodoList>> {
        let conn = self.conn()?;
        let todos: Option<String> = conn
            .query_row(
                "SELECT todos FROM lists WHERE list_id = ?",
                [list_id],
                |row| row.get(0),
            )
            .optional()?;

        match todos {
            Some(json) => {
                let todos = serde_json::from_str(&json)
                    .with_context(|| format!("Stored todos for list {} are corrupt", list_id))?;
                Ok(Some(TodoList {
                    list_id: list_id.to_string(),
                    todos,
                }))
            }
            None => Ok(None),
        }
    }

    /// Insert or overwrite the whole tree of a list.
    pub fn upsert_list(&self, list_id: &str, todos: Vec<TodoNode>) -> Result<TodoList> {
        let conn = self.conn()?;
        // Fixed-width timestamps keep ORDER BY updated_at chronological.
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let json = serde_json::to_string(&todos)?;

        conn.execute(
            "INSERT INTO lists (list_id, todos, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(list_id) DO UPDATE SET todos = excluded.todos, updated_at = excluded.updated_at",
            (list_id, &json, &now),
        )?;

        Ok(TodoList {
            list_id: list_id.to_string(),
            todos,
        })
    }

    pub fn delete_list(&self, list_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM lists WHERE list_id = ?", [list_id])?;
        Ok(rows > 0)
    }

    /// Every stored list, most recently updated first.
    pub fn list_summaries(&self) -> Result<Vec<ListSummary>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT list_id, updated_at FROM lists ORDER BY updated_at DESC, list_id")?;

        let lists = stmt
            .query_map([], |row| {
                Ok(ListSummary {
                    list_id: row.get(0)?,
                    updated_at: parse_datetime(row.get::<_, String>(1)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(lists)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
