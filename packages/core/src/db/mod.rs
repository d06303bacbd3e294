//! Database Layer
//!
//! This module handles persistence of blueprints and outline nodes:
//!
//! - The `NodeStore` trait the reposition engine is written against
//! - `MemoryStore`, an in-process store with failure injection for tests
//! - `DatabaseService` + `TursoStore`, the libsql backend (feature `turso`)
//!
//! # Architecture
//!
//! Outline nodes are stored as a flat relation keyed by id, with
//! `(blueprint_id, parent_id, position)` describing the tree. Stores only
//! offer point reads/writes and sibling range scans; every ordering decision
//! lives in `crate::operations`.

#[cfg(feature = "turso")]
mod database;
#[cfg(feature = "turso")]
mod error;
mod memory_store;
mod node_store;
#[cfg(feature = "turso")]
mod turso_store;

#[cfg(feature = "turso")]
pub use database::DatabaseService;
#[cfg(feature = "turso")]
pub use error::DatabaseError;
pub use memory_store::MemoryStore;
pub use node_store::{NodeStore, StoreWrite};
#[cfg(feature = "turso")]
pub use turso_store::TursoStore;
