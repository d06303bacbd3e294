//! Tree Reposition Operations
//!
//! This module keeps every blueprint sibling group densely numbered `0..n`
//! across structural edits:
//!
//! - `reposition`: pure planning of moves, inserts, deletes and repairs
//! - `TreeEngine`: reads the affected groups, applies plans to a `NodeStore`
//! - `SiblingLocks`: optional per-group serialization for concurrent callers
//! - `TreePolicies`: delete policy and sibling weight budget

pub mod engine;
pub mod error;
pub mod policy;
pub mod reposition;
pub mod sibling_locks;

pub use engine::{DeleteOutcome, InvariantViolation, MoveOutcome, RepairReport, TreeEngine};
pub use error::TreeOperationError;
pub use policy::{DeletePolicy, TreePolicies, WeightPolicy};
pub use reposition::RepositionPlan;
pub use sibling_locks::{SiblingGuard, SiblingLocks, StructureAccess};
