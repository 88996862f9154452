//! Structural commands on a [`Tree`].
//!
//! Every command is forgiving: an id that is not in the tree turns the
//! command into a no-op instead of an error, reported as
//! `Outcome { changed: false, .. }`.

use crate::models::{Position, TodoId};

use super::{Slot, Tree};

/// A mutation the engine can apply to a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Append a new leaf to `parent`'s children, or to the roots.
    Add { parent: Option<TodoId>, text: String },
    /// Insert a new leaf right after `after` in its sibling list.
    AddAfter { after: TodoId, text: String },
    Update { id: TodoId, text: String },
    /// Flip completion, cascade it downward and roll it up.
    Toggle { id: TodoId },
    /// Set completion on each named node, then roll up every touched path.
    ToggleMany { ids: Vec<TodoId>, completed: bool },
    Delete { id: TodoId },
    Move {
        dragged: TodoId,
        target: TodoId,
        position: Position,
    },
    Indent { id: TodoId },
    Outdent { id: TodoId },
    CheckAll,
    UncheckAll,
    /// Swap in a whole new tree (import, load completion).
    Replace(Tree),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::AddAfter { .. } => "add_after",
            Self::Update { .. } => "update",
            Self::Toggle { .. } => "toggle",
            Self::ToggleMany { .. } => "toggle_many",
            Self::Delete { .. } => "delete",
            Self::Move { .. } => "move",
            Self::Indent { .. } => "indent",
            Self::Outdent { .. } => "outdent",
            Self::CheckAll => "check_all",
            Self::UncheckAll => "uncheck_all",
            Self::Replace(_) => "replace",
        }
    }
}

/// What applying a command did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// False when the command was a no-op (unknown id, illegal move, ...).
    pub changed: bool,
    /// Id of the node created by `Add`/`AddAfter`.
    pub created: Option<TodoId>,
}

impl Outcome {
    fn from_changed(changed: bool) -> Self {
        Self {
            changed,
            created: None,
        }
    }

    fn from_created(created: Option<TodoId>) -> Self {
        Self {
            changed: created.is_some(),
            created,
        }
    }
}

impl Tree {
    /// Apply `command` in place.
    pub fn apply(&mut self, command: &Command) -> Outcome {
        let outcome = match command {
            Command::Add { parent, text } => Outcome::from_created(self.add(parent.as_ref(), text)),
            Command::AddAfter { after, text } => Outcome::from_created(self.add_after(after, text)),
            Command::Update { id, text } => Outcome::from_changed(self.update(id, text)),
            Command::Toggle { id } => Outcome::from_changed(self.toggle(id)),
            Command::ToggleMany { ids, completed } => {
                Outcome::from_changed(self.toggle_many(ids, *completed))
            }
            Command::Delete { id } => Outcome::from_changed(self.delete(id)),
            Command::Move {
                dragged,
                target,
                position,
            } => Outcome::from_changed(self.move_node(dragged, target, *position)),
            Command::Indent { id } => Outcome::from_changed(self.indent(id)),
            Command::Outdent { id } => Outcome::from_changed(self.outdent(id)),
            Command::CheckAll => Outcome::from_changed(self.set_all(true)),
            Command::UncheckAll => Outcome::from_changed(self.set_all(false)),
            Command::Replace(tree) => {
                *self = tree.clone();
                Outcome::from_changed(true)
            }
        };

        tracing::debug!(
            command = command.name(),
            changed = outcome.changed,
            nodes = self.len(),
            "applied todo command"
        );
        outcome
    }

    /// Apply `command` to a copy, leaving `self` untouched.
    pub fn applied(&self, command: &Command) -> (Tree, Outcome) {
        let mut next = self.clone();
        let outcome = next.apply(command);
        (next, outcome)
    }

    /// Append a fresh leaf under `parent` (or at the root level).
    ///
    /// Returns `None` when `parent` is given but absent, or already sits at
    /// [`super::MAX_DEPTH`].
    pub fn add(&mut self, parent: Option<&TodoId>, text: &str) -> Option<TodoId> {
        if let Some(parent) = parent {
            if !self.contains(parent) {
                return None;
            }
        }
        if !self.fits_under(parent, 1) {
            return None;
        }
        let index = self.siblings(parent)?.len();
        Some(self.insert_leaf(parent.cloned(), index, text))
    }

    /// Insert a fresh leaf immediately after `after`, at whatever depth it sits.
    pub fn add_after(&mut self, after: &TodoId, text: &str) -> Option<TodoId> {
        let (parent, index) = self.locate(after)?;
        Some(self.insert_leaf(parent, index + 1, text))
    }

    fn insert_leaf(&mut self, parent: Option<TodoId>, index: usize, text: &str) -> TodoId {
        let id = self.fresh_id();
        self.slots.insert(
            id.clone(),
            Slot {
                text: text.to_string(),
                completed: false,
                parent: None,
                children: Vec::new(),
            },
        );
        self.attach(&id, parent, index);
        id
    }

    pub fn update(&mut self, id: &TodoId, text: &str) -> bool {
        match self.slots.get_mut(id) {
            Some(slot) => {
                slot.text = text.to_string();
                true
            }
            None => false,
        }
    }

    /// Remove `id` and its entire subtree.
    pub fn delete(&mut self, id: &TodoId) -> bool {
        if self.detach(id).is_none() {
            return false;
        }
        self.remove_subtree(id);
        true
    }

    /// Relocate the subtree rooted at `dragged` relative to `target`.
    ///
    /// Refuses to move a node onto itself, into its own subtree, or to where
    /// its subtree would nest deeper than [`super::MAX_DEPTH`].
    pub fn move_node(&mut self, dragged: &TodoId, target: &TodoId, position: Position) -> bool {
        if dragged == target || !self.contains(dragged) || !self.contains(target) {
            return false;
        }
        if self.is_within(target, dragged) {
            return false;
        }

        let Some((old_parent, old_index)) = self.detach(dragged) else {
            return false;
        };

        let destination = match position {
            Position::Inside => self
                .children(target)
                .map(|children| (Some(target.clone()), children.len())),
            Position::Before => self.locate(target),
            Position::After => self
                .locate(target)
                .map(|(parent, index)| (parent, index + 1)),
        };

        let height = self.height(dragged);
        match destination.filter(|(parent, _)| self.fits_under(parent.as_ref(), height)) {
            Some((parent, index)) => {
                self.attach(dragged, parent, index);
                true
            }
            None => {
                self.attach(dragged, old_parent, old_index);
                false
            }
        }
    }

    /// Make `id` the last child of its preceding sibling.
    pub fn indent(&mut self, id: &TodoId) -> bool {
        let Some((parent, index)) = self.locate(id) else {
            return false;
        };
        if index == 0 {
            return false;
        }
        let Some(previous) = self
            .siblings(parent.as_ref())
            .and_then(|siblings| siblings.get(index - 1))
            .cloned()
        else {
            return false;
        };
        self.move_node(id, &previous, Position::Inside)
    }

    /// Move `id` to sit right after its former parent.
    pub fn outdent(&mut self, id: &TodoId) -> bool {
        let Some(parent) = self.parent(id).cloned() else {
            return false;
        };
        self.move_node(id, &parent, Position::After)
    }
}
