use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TodoNode;

/// A stored todo tree as exchanged with the list server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoList {
    pub list_id: String,
    #[serde(default)]
    pub todos: Vec<TodoNode>,
}

/// Body of `PUT /list/{listId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateListInput {
    pub todos: Vec<TodoNode>,
}

/// One entry of `GET /lists`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSummary {
    pub list_id: String,
    pub updated_at: DateTime<Utc>,
}

/// Error payload returned by the list server with any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
