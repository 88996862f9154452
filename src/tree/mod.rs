//! Arena-backed todo tree.
//!
//! # Representation
//! Nodes live in a flat table keyed by [`TodoId`]. Each slot keeps its ordered
//! child ids and an index of its parent, so relocating a subtree only touches
//! two sibling lists instead of rebuilding the tree. Callers read the tree
//! through the [`TodoNode`] projection ([`Tree::to_nodes`]), which carries no
//! parent links.
//!
//! # Invariants
//! - Every id appears in exactly one sibling list (`roots` or one slot's `children`).
//! - `slot.parent` always names the slot whose `children` contains the id.
//! - Ids are unique; the structure never contains a cycle.
//! - No node sits more than [`MAX_DEPTH`] levels deep (roots are level 1).

mod completion;
mod ops;
pub mod transfer;

pub use ops::{Command, Outcome};

use std::collections::HashMap;

use thiserror::Error;

use crate::models::{TodoId, TodoNode};

/// Deepest nesting a tree may reach. Keeps every persisted form of a tree
/// within serde_json's recursion limit, including the local record and the
/// server's `{ listId, todos }` envelope.
pub const MAX_DEPTH: usize = 50;

/// Rejections raised while building a tree from node values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("duplicate todo id: {0}")]
    DuplicateId(TodoId),

    #[error("todo id must not be empty")]
    EmptyId,

    #[error("todos may nest at most {max} levels deep")]
    TooDeep { max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    text: String,
    completed: bool,
    parent: Option<TodoId>,
    children: Vec<TodoId>,
}

/// An ordered forest of todo nodes owned by one list identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    slots: HashMap<TodoId, Slot>,
    roots: Vec<TodoId>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from node values, rejecting empty or repeated ids.
    pub fn from_nodes(nodes: Vec<TodoNode>) -> Result<Self, TreeError> {
        let mut tree = Self::new();
        for node in nodes {
            let id = tree.insert_subtree(node, None, 1)?;
            tree.roots.push(id);
        }
        Ok(tree)
    }

    fn insert_subtree(
        &mut self,
        node: TodoNode,
        parent: Option<TodoId>,
        level: usize,
    ) -> Result<TodoId, TreeError> {
        if level > MAX_DEPTH {
            return Err(TreeError::TooDeep { max: MAX_DEPTH });
        }

        let TodoNode {
            id,
            text,
            completed,
            children,
        } = node;

        if id.as_str().is_empty() {
            return Err(TreeError::EmptyId);
        }
        if self.slots.contains_key(&id) {
            return Err(TreeError::DuplicateId(id));
        }

        self.slots.insert(
            id.clone(),
            Slot {
                text,
                completed,
                parent,
                children: Vec::with_capacity(children.len()),
            },
        );

        for child in children {
            let child_id = self.insert_subtree(child, Some(id.clone()), level + 1)?;
            if let Some(slot) = self.slots.get_mut(&id) {
                slot.children.push(child_id);
            }
        }

        Ok(id)
    }

    /// Project the whole tree into node values, preserving order.
    pub fn to_nodes(&self) -> Vec<TodoNode> {
        self.roots.iter().filter_map(|id| self.node(id)).collect()
    }

    /// Project one subtree into a node value.
    pub fn node(&self, id: &TodoId) -> Option<TodoNode> {
        let slot = self.slots.get(id)?;
        Some(TodoNode {
            id: id.clone(),
            text: slot.text.clone(),
            completed: slot.completed,
            children: slot
                .children
                .iter()
                .filter_map(|child| self.node(child))
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: &TodoId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn roots(&self) -> &[TodoId] {
        &self.roots
    }

    pub fn children(&self, id: &TodoId) -> Option<&[TodoId]> {
        self.slots.get(id).map(|slot| slot.children.as_slice())
    }

    /// Parent of `id`, or `None` for roots and unknown ids.
    pub fn parent(&self, id: &TodoId) -> Option<&TodoId> {
        self.slots.get(id).and_then(|slot| slot.parent.as_ref())
    }

    pub fn text(&self, id: &TodoId) -> Option<&str> {
        self.slots.get(id).map(|slot| slot.text.as_str())
    }

    pub fn is_completed(&self, id: &TodoId) -> Option<bool> {
        self.slots.get(id).map(|slot| slot.completed)
    }

    /// Number of strict ancestors of `id`.
    pub fn depth(&self, id: &TodoId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(id);
        while let Some(parent) = current {
            depth += 1;
            current = self.parent(parent);
        }
        depth
    }

    /// Number of levels in the subtree rooted at `id` (1 for a leaf, 0 if absent).
    pub fn height(&self, id: &TodoId) -> usize {
        let mut tallest = 0;
        let mut pending = vec![(id, 1)];
        while let Some((next, level)) = pending.pop() {
            if let Some(slot) = self.slots.get(next) {
                tallest = tallest.max(level);
                pending.extend(slot.children.iter().map(|child| (child, level + 1)));
            }
        }
        tallest
    }

    /// True when a subtree `height` levels tall can hang under `parent`
    /// (`None` for the root level) without exceeding [`MAX_DEPTH`].
    pub fn fits_under(&self, parent: Option<&TodoId>, height: usize) -> bool {
        let base = parent.map_or(0, |parent| self.depth(parent) + 1);
        base + height <= MAX_DEPTH
    }

    /// True when `id` is `ancestor` itself or lies somewhere below it.
    pub fn is_within(&self, id: &TodoId, ancestor: &TodoId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    // ============================================================
    // Arena plumbing
    // ============================================================

    fn fresh_id(&self) -> TodoId {
        loop {
            let id = TodoId::generate();
            if !self.slots.contains_key(&id) {
                return id;
            }
        }
    }

    fn siblings(&self, parent: Option<&TodoId>) -> Option<&Vec<TodoId>> {
        match parent {
            None => Some(&self.roots),
            Some(parent) => self.slots.get(parent).map(|slot| &slot.children),
        }
    }

    fn siblings_mut(&mut self, parent: Option<&TodoId>) -> Option<&mut Vec<TodoId>> {
        match parent {
            None => Some(&mut self.roots),
            Some(parent) => self.slots.get_mut(parent).map(|slot| &mut slot.children),
        }
    }

    /// Parent and index of `id` within its sibling list.
    fn locate(&self, id: &TodoId) -> Option<(Option<TodoId>, usize)> {
        let parent = self.slots.get(id)?.parent.clone();
        let index = self
            .siblings(parent.as_ref())?
            .iter()
            .position(|sibling| sibling == id)?;
        Some((parent, index))
    }

    /// Unlink `id` from its sibling list. The subtree stays in the arena.
    fn detach(&mut self, id: &TodoId) -> Option<(Option<TodoId>, usize)> {
        let (parent, index) = self.locate(id)?;
        self.siblings_mut(parent.as_ref())?.remove(index);
        if let Some(slot) = self.slots.get_mut(id) {
            slot.parent = None;
        }
        Some((parent, index))
    }

    /// Link a detached `id` into `parent`'s children at `index` (clamped).
    fn attach(&mut self, id: &TodoId, parent: Option<TodoId>, index: usize) {
        let Some(siblings) = self.siblings_mut(parent.as_ref()) else {
            return;
        };
        let index = index.min(siblings.len());
        siblings.insert(index, id.clone());
        if let Some(slot) = self.slots.get_mut(id) {
            slot.parent = parent;
        }
    }

    /// Drop `id` and all of its descendants from the arena.
    fn remove_subtree(&mut self, id: &TodoId) {
        let mut pending = vec![id.clone()];
        while let Some(next) = pending.pop() {
            if let Some(slot) = self.slots.remove(&next) {
                pending.extend(slot.children);
            }
        }
    }
}
