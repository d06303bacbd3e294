//! NodeStore Trait - Storage Abstraction Layer
//!
//! This module defines the `NodeStore` trait that abstracts persistence of
//! blueprints and outline nodes. The reposition engine only ever talks to this
//! trait, so any ordered-record store offering point reads/writes and
//! range-filtered sibling scans can back it.
//!
//! # Architecture
//!
//! - **Abstraction Point**: Between the tree engine (ordering logic) and storage
//! - **Multiple Backends**: `MemoryStore` (in-process) and `TursoStore` (libsql)
//! - **Write vocabulary**: Engine plans are expressed as [`StoreWrite`] values
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async so embedded and networked backends fit
//! 2. **Ownership Semantics**: Methods take ownership of values to avoid cloning
//! 3. **Error Handling**: Uses `anyhow::Result` for flexible error context
//! 4. **Transactions Optional**: Stores opt in via `supports_transactions()`;
//!    otherwise the engine applies writes one at a time
//!
//! # Examples
//!
//! ```rust,no_run
//! use blueprint_core::db::{MemoryStore, NodeStore};
//! use blueprint_core::models::{Blueprint, OutlineNode};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store: Arc<dyn NodeStore> = Arc::new(MemoryStore::new());
//!
//!     let blueprint = store
//!         .create_blueprint(Blueprint::new("Step 1".into(), String::new(), String::new()))
//!         .await?;
//!     let node = OutlineNode::new(blueprint.id.clone(), "Cardiology".into(), String::new(), 25);
//!     store.insert_node(node).await?;
//!
//!     Ok(())
//! }
//! ```

use crate::models::{
    Blueprint, BlueprintUpdate, NodePayloadUpdate, OutlineNode, PositionRange, SiblingGroup,
};
use anyhow::{bail, Result};
use async_trait::async_trait;

/// A single write of a reposition plan.
///
/// Plans are applied strictly in order. Only `Relocate` changes `parent_id`;
/// `SetPosition` is the sibling shift that touches `position` alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWrite {
    /// Sibling shift: `position` moves from `from` to `to`
    SetPosition { id: String, from: i64, to: i64 },

    /// Primary mutation of a move: new parent and position
    Relocate {
        id: String,
        parent_id: Option<String>,
        position: i64,
    },

    /// New node, already carrying its final placement
    Insert(OutlineNode),

    /// Single-row removal (no cascade at the store level)
    Delete { id: String },
}

impl StoreWrite {
    /// ID of the node this write touches
    pub fn node_id(&self) -> &str {
        match self {
            StoreWrite::SetPosition { id, .. }
            | StoreWrite::Relocate { id, .. }
            | StoreWrite::Delete { id } => id,
            StoreWrite::Insert(node) => &node.id,
        }
    }

    /// Short operation name used in errors and logs
    pub fn operation(&self) -> &'static str {
        match self {
            StoreWrite::SetPosition { .. } => "shift_position",
            StoreWrite::Relocate { .. } => "relocate_node",
            StoreWrite::Insert(_) => "insert_node",
            StoreWrite::Delete { .. } => "delete_node",
        }
    }
}

/// Abstraction layer for blueprint and outline node persistence
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow usage in async contexts where
/// futures may be moved between threads.
///
/// # Method Categories
///
/// - **Blueprints**: 5 methods (create, read, list, update, delete)
/// - **Node reads**: 4 methods (point read, sibling scan, blueprint scan, children)
/// - **Node writes**: 6 methods (insert, batch insert, shift, relocate, payload, delete)
/// - **Write plans**: 3 methods (transaction capability, atomic apply, single apply)
#[async_trait]
pub trait NodeStore: Send + Sync {
    //
    // BLUEPRINT OPERATIONS
    //

    /// Persist a new blueprint record
    async fn create_blueprint(&self, blueprint: Blueprint) -> Result<Blueprint>;

    /// Get blueprint by ID (`Ok(None)` when absent)
    async fn get_blueprint(&self, id: &str) -> Result<Option<Blueprint>>;

    /// All blueprints, newest first
    async fn list_blueprints(&self) -> Result<Vec<Blueprint>>;

    /// Sparse update of name/description
    ///
    /// # Errors
    ///
    /// Returns error if the blueprint doesn't exist
    async fn update_blueprint(&self, id: &str, update: BlueprintUpdate) -> Result<Blueprint>;

    /// Delete a blueprint together with all of its nodes
    ///
    /// Returns `false` when the blueprint did not exist (idempotent delete).
    async fn delete_blueprint(&self, id: &str) -> Result<bool>;

    //
    // NODE READS
    //

    /// Get node by ID
    ///
    /// # Returns
    ///
    /// - `Ok(Some(node))` if node exists
    /// - `Ok(None)` if node doesn't exist (not an error)
    /// - `Err(_)` if the store fails
    async fn get_node(&self, id: &str) -> Result<Option<OutlineNode>>;

    /// Scan one sibling group, filtered by position range
    ///
    /// Results are ordered by `position`, then `created_at`, then `id`, so that
    /// duplicated positions left behind by a partial failure still come back in
    /// a deterministic order.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use blueprint_core::db::NodeStore;
    /// # use blueprint_core::models::{PositionRange, SiblingGroup};
    /// # async fn example(store: &dyn NodeStore) -> anyhow::Result<()> {
    /// // Every root-level sibling after position 1
    /// let tail = store
    ///     .list_siblings(&SiblingGroup::root("bp-1"), PositionRange::all().after(1))
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    async fn list_siblings(
        &self,
        group: &SiblingGroup,
        range: PositionRange,
    ) -> Result<Vec<OutlineNode>>;

    /// All nodes of a blueprint, ordered by `(parent_id, position)`
    async fn list_nodes(&self, blueprint_id: &str) -> Result<Vec<OutlineNode>>;

    /// Direct children of a node, ordered by position
    async fn list_children(&self, id: &str) -> Result<Vec<OutlineNode>>;

    //
    // NODE WRITES
    //

    /// Insert a node exactly as given (placement included)
    ///
    /// # Errors
    ///
    /// Returns error if the ID already exists
    async fn insert_node(&self, node: OutlineNode) -> Result<OutlineNode>;

    /// Insert many nodes, in order
    ///
    /// Used by bulk import, which is append-only and performs no repositioning.
    async fn batch_insert_nodes(&self, nodes: Vec<OutlineNode>) -> Result<Vec<OutlineNode>> {
        let mut created = Vec::with_capacity(nodes.len());
        for node in nodes {
            created.push(self.insert_node(node).await?);
        }
        Ok(created)
    }

    /// Set `position` only
    async fn update_position(&self, id: &str, position: i64) -> Result<()>;

    /// Set `parent_id` and `position` together
    async fn relocate_node(&self, id: &str, parent_id: Option<&str>, position: i64) -> Result<()>;

    /// Apply a payload update and return the updated node
    async fn update_payload(&self, id: &str, update: NodePayloadUpdate) -> Result<OutlineNode>;

    /// Delete one row. Returns `false` if it did not exist.
    async fn delete_node(&self, id: &str) -> Result<bool>;

    //
    // WRITE PLANS
    //

    /// Whether `apply_in_transaction` is all-or-nothing for this store
    fn supports_transactions(&self) -> bool {
        false
    }

    /// Apply every write atomically
    ///
    /// Only called when `supports_transactions()` returns `true`.
    async fn apply_in_transaction(&self, writes: &[StoreWrite]) -> Result<()> {
        let _ = writes;
        bail!("this store does not support transactions")
    }

    /// Apply a single write through the point-write primitives
    async fn apply_write(&self, write: &StoreWrite) -> Result<()> {
        match write {
            StoreWrite::SetPosition { id, to, .. } => self.update_position(id, *to).await,
            StoreWrite::Relocate {
                id,
                parent_id,
                position,
            } => {
                self.relocate_node(id, parent_id.as_deref(), *position)
                    .await
            }
            StoreWrite::Insert(node) => self.insert_node(node.clone()).await.map(|_| ()),
            StoreWrite::Delete { id } => self.delete_node(id).await.map(|_| ()),
        }
    }
}
