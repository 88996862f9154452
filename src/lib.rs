//! Nested todo outlines persisted under shareable list identifiers.
//!
//! - [`tree`]: arena-backed todo tree and its structural commands
//! - [`engine`]: the facade that sequences loads and saves around the tree
//! - [`store`]: local, remote and in-memory persistence backends
//! - [`api`] / [`db`]: the list server the remote backend talks to

pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod models;
pub mod store;
pub mod tree;
pub mod tree_render;
