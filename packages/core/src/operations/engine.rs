//! Tree Reposition Engine
//!
//! `TreeEngine` reads the sibling groups an operation touches, asks
//! [`reposition`](super::reposition) for a plan and applies it against a
//! [`NodeStore`]. Transactional stores receive the whole plan at once; other
//! stores get writes one by one in plan order, and the first failure is
//! reported as [`TreeOperationError::StoreFailure`] naming the groups that
//! need a repair pass.
//!
//! # Examples
//!
//! ```rust,no_run
//! use blueprint_core::db::MemoryStore;
//! use blueprint_core::models::{NewOutlineNode, ParentTarget};
//! use blueprint_core::operations::TreeEngine;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), blueprint_core::operations::TreeOperationError> {
//! let engine = TreeEngine::new(Arc::new(MemoryStore::new()));
//!
//! let cardio = engine
//!     .insert_node("bp-1", NewOutlineNode::new("Cardiology", 30), None, None)
//!     .await?;
//! let outcome = engine
//!     .move_node(&cardio.id, 0, ParentTarget::Unchanged)
//!     .await?;
//! assert!(outcome.noop);
//! # Ok(())
//! # }
//! ```

use crate::db::{NodeStore, StoreWrite};
use crate::models::{
    NewOutlineNode, OutlineNode, ParentTarget, PositionRange, SiblingGroup, ValidationError,
};
use crate::operations::reposition::{self, RepositionPlan};
use crate::operations::{DeletePolicy, TreeOperationError, TreePolicies};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Upper bound on ancestor walks; deeper chains are treated as corrupt
const MAX_ANCESTRY_DEPTH: usize = 1000;

/// Result of a successful move
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    /// The moved node as stored after the move
    pub node: OutlineNode,
    /// Sibling position writes performed besides the primary write
    pub shifts: usize,
    /// True when the node already sat at the target and nothing was written
    pub noop: bool,
}

/// Result of a successful delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    /// Every removed node id, the requested node last
    pub deleted: Vec<String>,
    /// Children moved into the deleted node's slot
    pub promoted: Vec<String>,
    pub shifts: usize,
}

/// Summary of a repair pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    pub groups_checked: usize,
    pub groups_repaired: usize,
    pub writes: usize,
}

/// One broken structural invariant found by `check_invariants`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum InvariantViolation {
    /// Group positions are not exactly `0..n`
    #[serde(rename_all = "camelCase")]
    NonDenseGroup {
        group: SiblingGroup,
        positions: Vec<i64>,
    },
    /// `parent_id` points at a node that does not exist
    #[serde(rename_all = "camelCase")]
    MissingParent { node_id: String, parent_id: String },
    /// `parent_id` points at a node of another blueprint
    #[serde(rename_all = "camelCase")]
    ForeignParent {
        node_id: String,
        parent_id: String,
        parent_blueprint_id: String,
    },
    /// Following `parent_id` from this node never reaches the root level
    #[serde(rename_all = "camelCase")]
    ParentCycle { node_id: String },
}

/// Reposition engine over an abstract node store
///
/// The engine holds no locks; see [`SiblingLocks`](super::SiblingLocks) for
/// caller-side serialization.
pub struct TreeEngine {
    store: Arc<dyn NodeStore>,
    policies: TreePolicies,
}

impl TreeEngine {
    /// Create an engine with default policies (cascade delete, warn on weights)
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self::with_policies(store, TreePolicies::default())
    }

    pub fn with_policies(store: Arc<dyn NodeStore>, policies: TreePolicies) -> Self {
        Self { store, policies }
    }

    pub fn policies(&self) -> &TreePolicies {
        &self.policies
    }

    pub fn store(&self) -> &Arc<dyn NodeStore> {
        &self.store
    }

    //
    // READ HELPERS
    //

    async fn require_node(&self, id: &str) -> Result<OutlineNode, TreeOperationError> {
        self.store
            .get_node(id)
            .await
            .map_err(TreeOperationError::database_error)?
            .ok_or_else(|| TreeOperationError::node_not_found(id))
    }

    async fn group_members(
        &self,
        group: &SiblingGroup,
    ) -> Result<Vec<OutlineNode>, TreeOperationError> {
        self.store
            .list_siblings(group, PositionRange::all())
            .await
            .map_err(TreeOperationError::database_error)
    }

    /// Resolve a target parent id into a node of the same blueprint
    async fn require_parent(
        &self,
        node_id: &str,
        blueprint_id: &str,
        parent_id: &str,
    ) -> Result<OutlineNode, TreeOperationError> {
        let parent = self.require_node(parent_id).await?;
        if parent.blueprint_id != blueprint_id {
            return Err(TreeOperationError::invalid_parent(
                node_id,
                parent_id,
                format!(
                    "parent belongs to blueprint '{}', node to '{}'",
                    parent.blueprint_id, blueprint_id
                ),
            ));
        }
        Ok(parent)
    }

    /// Fail with `CycleDetected` if `node_id` is `parent` or one of its ancestors
    async fn ensure_not_ancestor(
        &self,
        node_id: &str,
        parent: &OutlineNode,
    ) -> Result<(), TreeOperationError> {
        if parent.id == node_id {
            return Err(TreeOperationError::cycle_detected(node_id, &parent.id));
        }

        let mut current = parent.parent_id.clone();
        let mut depth = 0;
        while let Some(ancestor_id) = current {
            if ancestor_id == node_id {
                return Err(TreeOperationError::cycle_detected(node_id, &parent.id));
            }
            depth += 1;
            if depth > MAX_ANCESTRY_DEPTH {
                tracing::warn!(
                    "Ancestor chain of '{}' exceeds {} levels, treating as cycle",
                    parent.id,
                    MAX_ANCESTRY_DEPTH
                );
                return Err(TreeOperationError::cycle_detected(node_id, &parent.id));
            }
            current = match self
                .store
                .get_node(&ancestor_id)
                .await
                .map_err(TreeOperationError::database_error)?
            {
                Some(ancestor) => ancestor.parent_id,
                None => None,
            };
        }
        Ok(())
    }

    /// Every node below `id`
    async fn collect_descendants(
        &self,
        id: &str,
    ) -> Result<Vec<OutlineNode>, TreeOperationError> {
        let mut descendants = Vec::new();
        let mut seen = HashSet::new();
        let mut frontier = vec![id.to_string()];
        while let Some(current) = frontier.pop() {
            let children = self
                .store
                .list_children(&current)
                .await
                .map_err(TreeOperationError::database_error)?;
            for child in children {
                if seen.insert(child.id.clone()) {
                    frontier.push(child.id.clone());
                    descendants.push(child);
                }
            }
        }
        Ok(descendants)
    }

    //
    // PLAN APPLICATION
    //

    /// Apply a plan, all-or-nothing when the store supports transactions
    pub async fn apply(&self, plan: &RepositionPlan) -> Result<(), TreeOperationError> {
        if plan.is_empty() {
            return Ok(());
        }
        let total = plan.len();

        if self.store.supports_transactions() {
            return self
                .store
                .apply_in_transaction(&plan.writes)
                .await
                .map_err(|e| {
                    let first = &plan.writes[0];
                    tracing::warn!("❌ Transaction of {} write(s) rolled back: {}", total, e);
                    TreeOperationError::StoreFailure {
                        operation: "transaction".to_string(),
                        node_id: first.node_id().to_string(),
                        applied: 0,
                        total,
                        groups: plan.groups.clone(),
                        message: e.to_string(),
                    }
                });
        }

        for (applied, write) in plan.writes.iter().enumerate() {
            if let Err(e) = self.store.apply_write(write).await {
                tracing::warn!(
                    "❌ {} of node '{}' failed after {}/{} writes: {}",
                    write.operation(),
                    write.node_id(),
                    applied,
                    total,
                    e
                );
                return Err(TreeOperationError::StoreFailure {
                    operation: write.operation().to_string(),
                    node_id: write.node_id().to_string(),
                    applied,
                    total,
                    groups: plan.groups.clone(),
                    message: e.to_string(),
                });
            }
        }
        Ok(())
    }

    //
    // STRUCTURAL OPERATIONS
    //

    /// Move a node to `new_position` under `new_parent`
    ///
    /// All validation (existence, blueprint scope, cycles, position sign)
    /// happens before the first write.
    pub async fn move_node(
        &self,
        node_id: &str,
        new_position: i64,
        new_parent: ParentTarget,
    ) -> Result<MoveOutcome, TreeOperationError> {
        let node = self.require_node(node_id).await?;
        let target_parent = new_parent
            .resolve(node.parent_id.as_deref())
            .map(str::to_string);

        if let Some(parent_id) = target_parent.as_deref() {
            if parent_id == node.id {
                return Err(TreeOperationError::cycle_detected(&node.id, parent_id));
            }
            let parent = self
                .require_parent(&node.id, &node.blueprint_id, parent_id)
                .await?;
            self.ensure_not_ancestor(&node.id, &parent).await?;
        }
        if new_position < 0 {
            return Err(TreeOperationError::invalid_position(&node.id, new_position));
        }

        let source = self.group_members(&node.group()).await?;
        let same_parent = target_parent == node.parent_id;
        let destination = if same_parent {
            Vec::new()
        } else {
            let group = SiblingGroup::new(node.blueprint_id.clone(), target_parent.clone());
            let members = self.group_members(&group).await?;
            self.policies
                .check_weight_budget(&group, &members, Some(node.id.as_str()), node.weight)?;
            members
        };

        let plan = reposition::plan_move(
            &node,
            target_parent.as_deref(),
            new_position,
            &source,
            &destination,
        )?;

        if plan.is_empty() {
            tracing::debug!("Move of '{}' to position {} is a no-op", node.id, node.position);
            return Ok(MoveOutcome {
                node,
                shifts: 0,
                noop: true,
            });
        }

        tracing::debug!(
            "Moving '{}' from {} to {:?}@{} ({} write(s))",
            node.id,
            node.group(),
            target_parent,
            new_position,
            plan.len()
        );
        self.apply(&plan).await?;

        let moved = self.require_node(node_id).await?;
        Ok(MoveOutcome {
            node: moved,
            shifts: plan.shift_count(),
            noop: false,
        })
    }

    /// Insert a new node into `blueprint_id` under `parent_id`
    ///
    /// `position: None` appends; positions beyond the group size clamp to append.
    pub async fn insert_node(
        &self,
        blueprint_id: &str,
        payload: NewOutlineNode,
        parent_id: Option<&str>,
        position: Option<i64>,
    ) -> Result<OutlineNode, TreeOperationError> {
        let node = payload.into_node(
            blueprint_id.to_string(),
            parent_id.map(str::to_string),
            position.unwrap_or(i64::MAX),
        );
        node.validate()?;

        // Caller-supplied ids must be rejected before any sibling shifts
        if self
            .store
            .get_node(&node.id)
            .await
            .map_err(TreeOperationError::database_error)?
            .is_some()
        {
            return Err(ValidationError::DuplicateId(node.id).into());
        }

        if let Some(parent_id) = parent_id {
            self.require_parent(&node.id, blueprint_id, parent_id)
                .await?;
        }
        let group = node.group();
        let siblings = self.group_members(&group).await?;
        self.policies
            .check_weight_budget(&group, &siblings, None, node.weight)?;

        let id = node.id.clone();
        let plan = reposition::plan_insert(node, &siblings)?;
        tracing::debug!("Inserting '{}' into {} ({} write(s))", id, group, plan.len());
        self.apply(&plan).await?;

        self.require_node(&id).await
    }

    /// Delete a node; children are handled according to the delete policy
    pub async fn delete_node(&self, node_id: &str) -> Result<DeleteOutcome, TreeOperationError> {
        let node = self.require_node(node_id).await?;
        let siblings = self.group_members(&node.group()).await?;
        let children = self
            .store
            .list_children(&node.id)
            .await
            .map_err(TreeOperationError::database_error)?;
        let descendants = if children.is_empty() {
            Vec::new()
        } else {
            self.collect_descendants(&node.id).await?
        };

        // Promoted children take the deleted node's share of the group budget
        if self.policies.delete == DeletePolicy::PromoteChildren && !children.is_empty() {
            let promoted_weight: i64 = children.iter().map(|c| c.weight).sum();
            self.policies.check_weight_budget(
                &node.group(),
                &siblings,
                Some(node.id.as_str()),
                promoted_weight,
            )?;
        }

        let plan = reposition::plan_delete(
            &node,
            &siblings,
            &descendants,
            &children,
            self.policies.delete,
        )?;

        let mut deleted = Vec::new();
        let mut promoted = Vec::new();
        for write in &plan.writes {
            match write {
                StoreWrite::Delete { id } => deleted.push(id.clone()),
                StoreWrite::Relocate { id, .. } => promoted.push(id.clone()),
                _ => {}
            }
        }

        tracing::debug!(
            "Deleting '{}' with policy {} ({} node(s), {} write(s))",
            node.id,
            self.policies.delete,
            deleted.len(),
            plan.len()
        );
        self.apply(&plan).await?;

        Ok(DeleteOutcome {
            deleted,
            promoted,
            shifts: plan.shift_count(),
        })
    }

    //
    // REPAIR
    //

    /// Renumber one group to `0..n`; returns the number of writes
    pub async fn repair_group(&self, group: &SiblingGroup) -> Result<usize, TreeOperationError> {
        let members = self.group_members(group).await?;
        let plan = reposition::plan_repair(group, &members);
        if !plan.is_empty() {
            tracing::info!("🔧 Repairing group {} ({} write(s))", group, plan.len());
            self.apply(&plan).await?;
        }
        Ok(plan.len())
    }

    /// Repair every listed group, typically the ones of a `StoreFailure`
    pub async fn repair_groups(
        &self,
        groups: &[SiblingGroup],
    ) -> Result<RepairReport, TreeOperationError> {
        let mut report = RepairReport::default();
        for group in groups {
            let writes = self.repair_group(group).await?;
            report.groups_checked += 1;
            if writes > 0 {
                report.groups_repaired += 1;
                report.writes += writes;
            }
        }
        Ok(report)
    }

    /// Repair every group of a blueprint
    pub async fn repair_blueprint(
        &self,
        blueprint_id: &str,
    ) -> Result<RepairReport, TreeOperationError> {
        let nodes = self
            .store
            .list_nodes(blueprint_id)
            .await
            .map_err(TreeOperationError::database_error)?;
        let groups: Vec<SiblingGroup> = group_nodes(nodes).into_keys().collect();
        self.repair_groups(&groups).await
    }

    /// Report every broken structural invariant of a blueprint
    pub async fn check_invariants(
        &self,
        blueprint_id: &str,
    ) -> Result<Vec<InvariantViolation>, TreeOperationError> {
        let nodes = self
            .store
            .list_nodes(blueprint_id)
            .await
            .map_err(TreeOperationError::database_error)?;
        let by_id: HashMap<&str, &OutlineNode> =
            nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        let mut violations = Vec::new();
        for node in &nodes {
            let Some(parent_id) = node.parent_id.as_deref() else {
                continue;
            };
            if by_id.contains_key(parent_id) {
                continue;
            }
            // Not in this blueprint: either gone or owned by another one
            match self
                .store
                .get_node(parent_id)
                .await
                .map_err(TreeOperationError::database_error)?
            {
                Some(parent) => violations.push(InvariantViolation::ForeignParent {
                    node_id: node.id.clone(),
                    parent_id: parent_id.to_string(),
                    parent_blueprint_id: parent.blueprint_id,
                }),
                None => violations.push(InvariantViolation::MissingParent {
                    node_id: node.id.clone(),
                    parent_id: parent_id.to_string(),
                }),
            }
        }

        for node in &nodes {
            let mut current = node.parent_id.as_deref();
            let mut steps = 0;
            while let Some(parent_id) = current {
                steps += 1;
                if parent_id == node.id || steps > nodes.len() {
                    violations.push(InvariantViolation::ParentCycle {
                        node_id: node.id.clone(),
                    });
                    break;
                }
                current = by_id.get(parent_id).and_then(|p| p.parent_id.as_deref());
            }
        }

        for (group, members) in group_nodes(nodes.clone()) {
            if !reposition::is_dense(&members) {
                let mut positions: Vec<i64> = members.iter().map(|n| n.position).collect();
                positions.sort_unstable();
                violations.push(InvariantViolation::NonDenseGroup { group, positions });
            }
        }

        if !violations.is_empty() {
            tracing::warn!(
                "Blueprint '{}' has {} invariant violation(s)",
                blueprint_id,
                violations.len()
            );
        }
        Ok(violations)
    }
}

/// Bucket nodes by sibling group, in deterministic group order
fn group_nodes(nodes: Vec<OutlineNode>) -> BTreeMap<SiblingGroup, Vec<OutlineNode>> {
    let mut groups: BTreeMap<SiblingGroup, Vec<OutlineNode>> = BTreeMap::new();
    for node in nodes {
        groups.entry(node.group()).or_default().push(node);
    }
    groups
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;
