//! Domain models for nested todo lists.
//!
//! - [`TodoNode`]: one todo entry with its ordered children, the value view of a tree.
//! - [`TodoId`]: opaque node identifier, unique within one tree.
//! - [`Position`]: relative placement used when relocating a subtree.
//! - [`TodoList`]: a whole tree stored under a list identifier.

mod list;
mod todo;

pub use list::*;
pub use todo::*;
