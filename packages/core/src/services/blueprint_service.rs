//! Blueprint Service - Blueprint lifecycle and outline editing
//!
//! This service sits between callers (the tool server, embedders) and the
//! tree engine. It provides:
//!
//! - Blueprint CRUD (name, description, ai_notes)
//! - Outline reads: flat node lists and ordered trees
//! - Payload updates that never touch placement
//! - Bulk import of extracted outlines (append-only)
//! - Structural edits delegated to [`TreeEngine`], serialized per sibling
//!   group through [`SiblingLocks`]. Moves between groups and deletes also
//!   hold the blueprint's structure lock exclusively, so ancestry checks and
//!   subtree removal never interleave.
//!
//! # Examples
//!
//! ```rust,no_run
//! use blueprint_core::db::MemoryStore;
//! use blueprint_core::models::{NewOutlineNode, ParentTarget};
//! use blueprint_core::services::{BlueprintService, ServiceConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = BlueprintService::new(Arc::new(MemoryStore::new()), ServiceConfig::default())?;
//!
//! let blueprint = service
//!     .create_blueprint("USMLE Step 1", "Content outline", "")
//!     .await?;
//! let cardio = service
//!     .insert_node(&blueprint.id, NewOutlineNode::new("Cardiology", 30), None, None)
//!     .await?;
//! service.move_node(&cardio.id, 0, ParentTarget::Root).await?;
//! # Ok(())
//! # }
//! ```

use crate::db::NodeStore;
use crate::models::{
    Blueprint, BlueprintUpdate, NewOutlineNode, NodePayloadUpdate, OutlineNode, OutlineTree,
    ParentTarget, PositionRange, SiblingGroup,
};
use crate::operations::{
    DeleteOutcome, InvariantViolation, MoveOutcome, RepairReport, SiblingGuard, SiblingLocks,
    StructureAccess, TreeEngine,
};
use crate::services::import::{normalize_import, ImportedNode};
use crate::services::{BlueprintServiceError, ServiceConfig};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::time::Duration;

/// Attempts at locking a node's groups before giving up on a moving target
const MAX_LOCK_ATTEMPTS: usize = 4;

type Result<T> = std::result::Result<T, BlueprintServiceError>;

/// Coordinates blueprint records, outline reads and structural edits
pub struct BlueprintService {
    store: Arc<dyn NodeStore>,
    engine: TreeEngine,
    locks: SiblingLocks,
    config: ServiceConfig,
}

impl BlueprintService {
    /// Create a service over `store`
    ///
    /// # Errors
    ///
    /// Returns `InitializationError` if the configuration is invalid
    pub fn new(store: Arc<dyn NodeStore>, config: ServiceConfig) -> Result<Self> {
        config
            .validate()
            .map_err(BlueprintServiceError::InitializationError)?;

        let engine = TreeEngine::with_policies(store.clone(), config.tree_policies());
        tracing::info!(
            "Blueprint service ready (delete policy: {}, weight policy: {}, transactions: {})",
            config.delete_policy,
            config.weight_policy,
            store.supports_transactions()
        );

        Ok(Self {
            store,
            engine,
            locks: SiblingLocks::new(),
            config,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn engine(&self) -> &TreeEngine {
        &self.engine
    }

    //
    // BLUEPRINTS
    //

    pub async fn create_blueprint(
        &self,
        name: &str,
        description: &str,
        ai_notes: &str,
    ) -> Result<Blueprint> {
        let blueprint = Blueprint::new(
            name.trim().to_string(),
            description.to_string(),
            ai_notes.to_string(),
        );
        blueprint.validate()?;

        let created = self
            .store
            .create_blueprint(blueprint)
            .await
            .map_err(BlueprintServiceError::database_error)?;
        tracing::info!("✅ Created blueprint '{}' ({})", created.name, created.id);
        Ok(created)
    }

    pub async fn get_blueprint(&self, id: &str) -> Result<Blueprint> {
        self.store
            .get_blueprint(id)
            .await
            .map_err(BlueprintServiceError::database_error)?
            .ok_or_else(|| BlueprintServiceError::blueprint_not_found(id))
    }

    /// All blueprints, newest first
    pub async fn list_blueprints(&self) -> Result<Vec<Blueprint>> {
        self.store
            .list_blueprints()
            .await
            .map_err(BlueprintServiceError::database_error)
    }

    pub async fn update_blueprint(&self, id: &str, update: BlueprintUpdate) -> Result<Blueprint> {
        if update.name.is_none() && update.description.is_none() {
            return Err(BlueprintServiceError::invalid_update(
                "update must set name or description",
            ));
        }
        update.validate()?;
        self.get_blueprint(id).await?;

        self.store
            .update_blueprint(id, update)
            .await
            .map_err(BlueprintServiceError::database_error)
    }

    /// Delete a blueprint and every node it owns
    pub async fn delete_blueprint(&self, id: &str) -> Result<bool> {
        let deleted = self
            .store
            .delete_blueprint(id)
            .await
            .map_err(BlueprintServiceError::database_error)?;
        if deleted {
            tracing::info!("🗑️  Deleted blueprint {}", id);
        }
        Ok(deleted)
    }

    //
    // OUTLINE READS
    //

    pub async fn get_node(&self, id: &str) -> Result<OutlineNode> {
        self.store
            .get_node(id)
            .await
            .map_err(BlueprintServiceError::database_error)?
            .ok_or_else(|| BlueprintServiceError::node_not_found(id))
    }

    /// Every node of a blueprint, ordered by `(parent_id, position)`
    pub async fn list_nodes(&self, blueprint_id: &str) -> Result<Vec<OutlineNode>> {
        self.get_blueprint(blueprint_id).await?;
        self.store
            .list_nodes(blueprint_id)
            .await
            .map_err(BlueprintServiceError::database_error)
    }

    /// Nested outline, children in position order at every level
    pub async fn get_tree(&self, blueprint_id: &str) -> Result<Vec<OutlineTree>> {
        let nodes = self.list_nodes(blueprint_id).await?;
        Ok(OutlineTree::build_forest(nodes))
    }

    //
    // PAYLOAD UPDATES
    //

    /// Update title, description or weight; placement is never changed
    pub async fn update_node(&self, id: &str, update: NodePayloadUpdate) -> Result<OutlineNode> {
        if update.is_empty() {
            return Err(BlueprintServiceError::invalid_update(
                "update must set title, description or weight",
            ));
        }
        update.validate()?;

        let Some(weight) = update.weight else {
            self.get_node(id).await?;
            return self
                .store
                .update_payload(id, update)
                .await
                .map_err(BlueprintServiceError::database_error);
        };

        // Weight changes are checked against the group under its lock
        let (node, _guard) = self
            .lock_node_groups(id, |_| (StructureAccess::Shared, Vec::new()))
            .await?;
        let group = node.group();
        let siblings = self
            .store
            .list_siblings(&group, PositionRange::all())
            .await
            .map_err(BlueprintServiceError::database_error)?;
        self.engine
            .policies()
            .check_weight_budget(&group, &siblings, Some(id), weight)?;

        self.store
            .update_payload(id, update)
            .await
            .map_err(BlueprintServiceError::database_error)
    }

    //
    // STRUCTURAL EDITS
    //

    /// Insert a node; `position: None` appends to the group
    pub async fn insert_node(
        &self,
        blueprint_id: &str,
        payload: NewOutlineNode,
        parent_id: Option<&str>,
        position: Option<i64>,
    ) -> Result<OutlineNode> {
        self.get_blueprint(blueprint_id).await?;

        let group = SiblingGroup::new(blueprint_id.to_string(), parent_id.map(str::to_string));
        let _guard = self
            .locks
            .lock_in(blueprint_id, StructureAccess::Shared, [group])
            .await;
        let node = self
            .engine
            .insert_node(blueprint_id, payload, parent_id, position)
            .await?;

        tracing::debug!("Inserted '{}' at position {}", node.id, node.position);
        Ok(node)
    }

    /// Move a node under `new_parent` at `new_position`
    pub async fn move_node(
        &self,
        node_id: &str,
        new_position: i64,
        new_parent: ParentTarget,
    ) -> Result<MoveOutcome> {
        let (_, _guard) = self
            .lock_node_groups(node_id, |node| {
                let target = new_parent
                    .resolve(node.parent_id.as_deref())
                    .map(str::to_string);
                let access = if target == node.parent_id {
                    StructureAccess::Shared
                } else {
                    StructureAccess::Exclusive
                };
                (access, vec![SiblingGroup::new(node.blueprint_id.clone(), target)])
            })
            .await?;

        let outcome = self
            .engine
            .move_node(node_id, new_position, new_parent)
            .await?;
        if !outcome.noop {
            tracing::info!(
                "Moved '{}' to position {} ({} sibling shift(s))",
                node_id,
                outcome.node.position,
                outcome.shifts
            );
        }
        Ok(outcome)
    }

    /// Delete a node according to the configured delete policy
    pub async fn delete_node(&self, node_id: &str) -> Result<DeleteOutcome> {
        let (_, _guard) = self
            .lock_node_groups(node_id, |node| {
                (
                    StructureAccess::Exclusive,
                    vec![SiblingGroup::new(
                        node.blueprint_id.clone(),
                        Some(node.id.clone()),
                    )],
                )
            })
            .await?;

        let outcome = self.engine.delete_node(node_id).await?;
        tracing::info!(
            "🗑️  Deleted {} node(s) starting at '{}'",
            outcome.deleted.len(),
            node_id
        );
        Ok(outcome)
    }

    /// Import an extracted outline into an existing blueprint
    ///
    /// Rows reference parents inside the batch or already stored nodes. The
    /// import only appends to groups and never shifts existing nodes.
    pub async fn import_outline(
        &self,
        blueprint_id: &str,
        batch: Vec<ImportedNode>,
    ) -> Result<Vec<OutlineNode>> {
        self.get_blueprint(blueprint_id).await?;
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        // Rows may only land in groups named by their own parent_id
        let _guard = self
            .locks
            .lock_in(
                blueprint_id,
                StructureAccess::Shared,
                batch
                    .iter()
                    .map(|row| SiblingGroup::new(blueprint_id.to_string(), row.parent_id.clone())),
            )
            .await;

        let existing = self
            .store
            .list_nodes(blueprint_id)
            .await
            .map_err(BlueprintServiceError::database_error)?;
        let nodes = normalize_import(blueprint_id, &existing, batch)?;
        let count = nodes.len();

        let created = self.store.batch_insert_nodes(nodes).await.map_err(|e| {
            BlueprintServiceError::bulk_operation_failed(format!(
                "import of {} node(s) into blueprint '{}' failed: {}",
                count, blueprint_id, e
            ))
        })?;

        tracing::info!("✅ Imported {} node(s) into blueprint {}", count, blueprint_id);
        Ok(created)
    }

    //
    // REPAIR & VERIFICATION
    //

    /// Renumber the given groups, one lock at a time
    pub async fn repair_groups(&self, groups: &[SiblingGroup]) -> Result<RepairReport> {
        let mut report = RepairReport::default();
        for group in groups {
            let _guard = self
                .locks
                .lock_in(&group.blueprint_id, StructureAccess::Shared, [group.clone()])
                .await;
            let writes = self.engine.repair_group(group).await?;
            report.groups_checked += 1;
            if writes > 0 {
                report.groups_repaired += 1;
                report.writes += writes;
            }
        }
        Ok(report)
    }

    /// Renumber every group of a blueprint
    pub async fn repair_blueprint(&self, blueprint_id: &str) -> Result<RepairReport> {
        let nodes = self.list_nodes(blueprint_id).await?;
        let groups: Vec<SiblingGroup> = nodes
            .iter()
            .map(OutlineNode::group)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let report = self.repair_groups(&groups).await?;
        if report.writes > 0 {
            tracing::info!(
                "🔧 Repaired {} group(s) of blueprint {} ({} write(s))",
                report.groups_repaired,
                blueprint_id,
                report.writes
            );
        }
        Ok(report)
    }

    pub async fn check_invariants(&self, blueprint_id: &str) -> Result<Vec<InvariantViolation>> {
        self.get_blueprint(blueprint_id).await?;
        Ok(self.engine.check_invariants(blueprint_id).await?)
    }

    //
    // LOCKING
    //

    /// Lock the node's blueprint structure and current group plus the
    /// groups returned by `extra(node)`, in the mode it returns.
    ///
    /// The node is re-read under the lock; if it changed group in between,
    /// the locks are released and acquisition is retried with backoff.
    async fn lock_node_groups(
        &self,
        node_id: &str,
        extra: impl Fn(&OutlineNode) -> (StructureAccess, Vec<SiblingGroup>),
    ) -> Result<(OutlineNode, SiblingGuard)> {
        let mut attempt = 0;

        loop {
            let node = self.get_node(node_id).await?;
            let (access, mut groups) = extra(&node);
            groups.push(node.group());
            let guard = self.locks.lock_in(&node.blueprint_id, access, groups).await;

            let current = self.get_node(node_id).await?;
            if current.group() == node.group() {
                if attempt > 0 {
                    tracing::debug!(
                        "Locked groups of '{}' after {} retry(ies)",
                        node_id,
                        attempt
                    );
                }
                return Ok((current, guard));
            }

            drop(guard);
            attempt += 1;
            if attempt >= MAX_LOCK_ATTEMPTS {
                tracing::warn!(
                    "Node '{}' kept changing group, giving up after {} attempt(s)",
                    node_id,
                    attempt
                );
                return Err(BlueprintServiceError::ConcurrentModification {
                    node_id: node_id.to_string(),
                    attempts: attempt,
                });
            }

            // Exponential backoff: 10ms, 20ms, 40ms, ...
            let backoff_ms = 10u64 * (1 << (attempt - 1));
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        }
    }
}

#[cfg(test)]
#[path = "blueprint_service_test.rs"]
mod blueprint_service_test;
