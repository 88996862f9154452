use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a todo node.
///
/// Ids created by the engine are UUID v4 strings. Ids that arrive through a
/// load or an import are kept verbatim, so any non-empty string is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(String);

impl TodoId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TodoId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TodoId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A single todo entry with its nested children.
///
/// This is the value view of a tree: it is what gets serialized to the
/// backends and exported, and what callers read. Nodes never point back at
/// their parent; parent lookups go through [`crate::tree::Tree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoNode {
    pub id: TodoId,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub children: Vec<TodoNode>,
}

impl TodoNode {
    /// A fresh, incomplete leaf.
    pub fn leaf(id: TodoId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            completed: false,
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(TodoNode::count).sum::<usize>()
    }

    /// True when this node and every descendant are completed.
    pub fn is_fully_complete(&self) -> bool {
        self.completed && self.children.iter().all(TodoNode::is_fully_complete)
    }
}

/// Total number of nodes in a forest.
pub fn count_nodes(nodes: &[TodoNode]) -> usize {
    nodes.iter().map(TodoNode::count).sum()
}

/// Number of nodes in a forest whose own flag is set.
pub fn count_completed(nodes: &[TodoNode]) -> usize {
    nodes
        .iter()
        .map(|node| usize::from(node.completed) + count_completed(&node.children))
        .sum()
}

/// Where a relocated subtree lands relative to the target node.
///
/// - `Before`/`After`: sibling of the target, adjacent to it
/// - `Inside`: last child of the target
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Before,
    After,
    Inside,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
            Self::Inside => "inside",
        }
    }
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "before" => Ok(Self::Before),
            "after" => Ok(Self::After),
            "inside" => Ok(Self::Inside),
            other => Err(format!(
                "unknown position `{}` (expected before, after or inside)",
                other
            )),
        }
    }
}
