//! JSON export and import of whole trees.
//!
//! The exchange format is exactly the `TodoNode[]` array, pretty-printed on
//! export. Import is all-or-nothing: anything that is not an array of valid
//! nodes with unique ids is rejected.

use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

use crate::models::TodoNode;

use super::{Tree, TreeError};

/// Reasons an import payload is rejected.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("import is not valid JSON: {0}")]
    Syntax(#[source] serde_json::Error),

    #[error("import must be a JSON array of todos")]
    NotAnArray,

    #[error("import contains a malformed todo: {0}")]
    Node(#[source] serde_json::Error),

    #[error("import contains an invalid tree: {0}")]
    Tree(#[from] TreeError),
}

pub fn export_json(tree: &Tree) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&tree.to_nodes())
}

pub fn import_json(input: &str) -> Result<Tree, ImportError> {
    let value: Value = serde_json::from_str(input).map_err(ImportError::Syntax)?;
    if !value.is_array() {
        return Err(ImportError::NotAnArray);
    }
    let nodes: Vec<TodoNode> = serde_json::from_value(value).map_err(ImportError::Node)?;
    Ok(Tree::from_nodes(nodes)?)
}

/// Default file name for an export taken on `date`, e.g. `todos-2024-05-01.json`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("todos-{}.json", date.format("%Y-%m-%d"))
}
