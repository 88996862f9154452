//! Completion cascade and roll-up.
//!
//! A node is *fully complete* when its own flag is set and every child is
//! fully complete. Toggling cascades the new flag to the whole subtree; any
//! change below a node then recomputes its ancestors from the bottom up, each
//! ancestor becoming complete exactly when all of its children are fully
//! complete.

use std::collections::HashSet;

use crate::models::TodoId;

use super::Tree;

impl Tree {
    pub fn is_fully_complete(&self, id: &TodoId) -> bool {
        match self.slots.get(id) {
            Some(slot) => {
                slot.completed
                    && slot
                        .children
                        .iter()
                        .all(|child| self.is_fully_complete(child))
            }
            None => false,
        }
    }

    /// Flip `id`, push the new flag to every descendant, then roll up.
    pub fn toggle(&mut self, id: &TodoId) -> bool {
        let Some(completed) = self.is_completed(id).map(|completed| !completed) else {
            return false;
        };
        self.cascade(id, completed);
        self.roll_up(id);
        true
    }

    /// Set `completed` on each named node without cascading, then recompute
    /// the strict ancestors of every node that was found.
    pub fn toggle_many(&mut self, ids: &[TodoId], completed: bool) -> bool {
        let mut touched = Vec::new();
        for id in ids {
            if let Some(slot) = self.slots.get_mut(id) {
                slot.completed = completed;
                touched.push(id.clone());
            }
        }
        if touched.is_empty() {
            return false;
        }

        let mut ancestors: HashSet<TodoId> = HashSet::new();
        for id in &touched {
            let mut current = self.parent(id).cloned();
            while let Some(parent) = current {
                current = self.parent(&parent).cloned();
                ancestors.insert(parent);
            }
        }

        let mut ancestors: Vec<(usize, TodoId)> = ancestors
            .into_iter()
            .map(|id| (self.depth(&id), id))
            .collect();
        ancestors.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        for (_, id) in ancestors {
            self.recompute(&id);
        }
        true
    }

    /// Set every node in the tree to `completed`.
    pub fn set_all(&mut self, completed: bool) -> bool {
        for slot in self.slots.values_mut() {
            slot.completed = completed;
        }
        !self.slots.is_empty()
    }

    fn cascade(&mut self, id: &TodoId, completed: bool) {
        let mut pending = vec![id.clone()];
        while let Some(next) = pending.pop() {
            if let Some(slot) = self.slots.get_mut(&next) {
                slot.completed = completed;
                pending.extend(slot.children.iter().cloned());
            }
        }
    }

    /// Recompute every strict ancestor of `id`, nearest first, up to the root.
    fn roll_up(&mut self, id: &TodoId) {
        let mut current = self.parent(id).cloned();
        while let Some(parent) = current {
            self.recompute(&parent);
            current = self.parent(&parent).cloned();
        }
    }

    fn recompute(&mut self, id: &TodoId) {
        let Some(children) = self.children(id) else {
            return;
        };
        let complete =
            !children.is_empty() && children.iter().all(|child| self.is_fully_complete(child));
        if let Some(slot) = self.slots.get_mut(id) {
            slot.completed = complete;
        }
    }
}
