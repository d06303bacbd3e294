//! Pure reposition planning
//!
//! Every structural operation is computed here from a read snapshot of the
//! affected sibling groups and returned as a [`RepositionPlan`]: the ordered
//! list of store writes plus the groups those writes touch. Nothing in this
//! module performs I/O, so plans can be inspected, logged, benchmarked and
//! property-tested without a store.
//!
//! Write ordering rules shared by all plans:
//!
//! - Removal side first, insertion side second, primary node write last
//! - Shifts toward lower positions run ascending, shifts toward higher
//!   positions run descending, so two siblings share a position only where
//!   the primary node still occupies its old slot

use crate::db::StoreWrite;
use crate::models::{OutlineNode, SiblingGroup};
use crate::operations::{DeletePolicy, TreeOperationError};
use std::collections::{HashMap, HashSet};

/// Ordered writes for one structural operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositionPlan {
    pub writes: Vec<StoreWrite>,
    /// Sibling groups touched by `writes`, sorted and deduplicated
    pub groups: Vec<SiblingGroup>,
}

impl RepositionPlan {
    fn new(groups: impl IntoIterator<Item = SiblingGroup>) -> Self {
        let mut groups: Vec<SiblingGroup> = groups.into_iter().collect();
        groups.sort();
        groups.dedup();
        Self {
            writes: Vec::new(),
            groups,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Number of sibling position shifts (everything except the primary write)
    pub fn shift_count(&self) -> usize {
        self.writes
            .iter()
            .filter(|w| matches!(w, StoreWrite::SetPosition { .. }))
            .count()
    }

    /// Append shifts of `delta` for `nodes`, ordered by the shift direction
    fn push_shifts<'a>(&mut self, nodes: impl IntoIterator<Item = &'a OutlineNode>, delta: i64) {
        if delta == 0 {
            return;
        }
        let mut nodes: Vec<&OutlineNode> = nodes.into_iter().collect();
        nodes.sort_by(|a, b| OutlineNode::sibling_cmp(a, b));
        if delta > 0 {
            nodes.reverse();
        }
        self.writes
            .extend(nodes.into_iter().map(|n| StoreWrite::SetPosition {
                id: n.id.clone(),
                from: n.position,
                to: n.position + delta,
            }));
    }
}

/// Clamp a requested position into `0..=max`
fn clamp(requested: i64, max: i64) -> i64 {
    requested.min(max).max(0)
}

/// Plan a move of `node` to `new_position` under `new_parent`.
///
/// `source` is the node's current sibling group and `destination` the target
/// group (ignored when the parent does not change). Both may or may not contain
/// the node itself; it is filtered out by id. Cycle and parent checks are the
/// caller's job since they need ancestry reads.
///
/// Clamping: inside the same group the position clamps to the last index,
/// across groups it clamps to the destination's count (append).
pub fn plan_move(
    node: &OutlineNode,
    new_parent: Option<&str>,
    new_position: i64,
    source: &[OutlineNode],
    destination: &[OutlineNode],
) -> Result<RepositionPlan, TreeOperationError> {
    if new_position < 0 {
        return Err(TreeOperationError::invalid_position(&node.id, new_position));
    }

    let old = node.position;
    let others = |group: &[OutlineNode]| -> Vec<OutlineNode> {
        group.iter().filter(|n| n.id != node.id).cloned().collect()
    };

    if new_parent == node.parent_id.as_deref() {
        let siblings = others(source);
        let target = clamp(new_position, siblings.len() as i64);
        let mut plan = RepositionPlan::new([node.group()]);
        if target == old {
            return Ok(plan);
        }

        if old < target {
            plan.push_shifts(
                siblings
                    .iter()
                    .filter(|n| n.position > old && n.position <= target),
                -1,
            );
        } else {
            plan.push_shifts(
                siblings
                    .iter()
                    .filter(|n| n.position >= target && n.position < old),
                1,
            );
        }
        plan.writes.push(StoreWrite::Relocate {
            id: node.id.clone(),
            parent_id: node.parent_id.clone(),
            position: target,
        });
        return Ok(plan);
    }

    let destination_group = SiblingGroup::new(
        node.blueprint_id.clone(),
        new_parent.map(str::to_string),
    );
    let source_siblings = others(source);
    let destination_siblings = others(destination);
    let target = clamp(new_position, destination_siblings.len() as i64);

    let mut plan = RepositionPlan::new([node.group(), destination_group]);
    plan.push_shifts(source_siblings.iter().filter(|n| n.position > old), -1);
    plan.push_shifts(
        destination_siblings.iter().filter(|n| n.position >= target),
        1,
    );
    plan.writes.push(StoreWrite::Relocate {
        id: node.id.clone(),
        parent_id: new_parent.map(str::to_string),
        position: target,
    });
    Ok(plan)
}

/// Plan the insertion of `node` at `node.position` into its group.
///
/// Positions beyond the group size clamp to append. The planned `Insert`
/// carries the clamped position.
pub fn plan_insert(
    mut node: OutlineNode,
    siblings: &[OutlineNode],
) -> Result<RepositionPlan, TreeOperationError> {
    if node.position < 0 {
        return Err(TreeOperationError::invalid_position(&node.id, node.position));
    }
    node.position = clamp(node.position, siblings.len() as i64);

    let mut plan = RepositionPlan::new([node.group()]);
    let at = node.position;
    plan.push_shifts(siblings.iter().filter(|n| n.position >= at), 1);
    plan.writes.push(StoreWrite::Insert(node));
    Ok(plan)
}

/// Plan the deletion of `node`.
///
/// - `siblings`: the node's current group
/// - `descendants`: every node below it (any order), used by `Cascade`
/// - `children`: direct children in sibling order, used by the other policies
///
/// Deletes run leaves first so no row ever references a removed parent.
pub fn plan_delete(
    node: &OutlineNode,
    siblings: &[OutlineNode],
    descendants: &[OutlineNode],
    children: &[OutlineNode],
    policy: DeletePolicy,
) -> Result<RepositionPlan, TreeOperationError> {
    let old = node.position;
    let later: Vec<&OutlineNode> = siblings
        .iter()
        .filter(|n| n.id != node.id && n.position > old)
        .collect();
    let child_group = SiblingGroup::new(node.blueprint_id.clone(), Some(node.id.clone()));

    match policy {
        DeletePolicy::RejectIfHasChildren if !children.is_empty() => {
            Err(TreeOperationError::has_children(&node.id, children.len()))
        }
        DeletePolicy::PromoteChildren if !children.is_empty() => {
            let mut plan = RepositionPlan::new([node.group(), child_group]);
            plan.push_shifts(later, children.len() as i64 - 1);

            let mut ordered: Vec<&OutlineNode> = children.iter().collect();
            ordered.sort_by(|a, b| OutlineNode::sibling_cmp(a, b));
            plan.writes
                .extend(ordered.into_iter().enumerate().map(|(i, child)| {
                    StoreWrite::Relocate {
                        id: child.id.clone(),
                        parent_id: node.parent_id.clone(),
                        position: old + i as i64,
                    }
                }));
            plan.writes.push(StoreWrite::Delete {
                id: node.id.clone(),
            });
            Ok(plan)
        }
        _ => {
            let removed: &[OutlineNode] = match policy {
                DeletePolicy::Cascade => descendants,
                _ => &[],
            };
            let mut groups = vec![node.group(), child_group];
            groups.extend(
                removed
                    .iter()
                    .map(|d| SiblingGroup::new(d.blueprint_id.clone(), Some(d.id.clone()))),
            );

            let mut plan = RepositionPlan::new(groups);
            plan.writes.extend(
                leaves_first(&node.id, removed)
                    .into_iter()
                    .map(|id| StoreWrite::Delete { id }),
            );
            plan.writes.push(StoreWrite::Delete {
                id: node.id.clone(),
            });
            plan.push_shifts(later, -1);
            Ok(plan)
        }
    }
}

/// Order subtree ids so every node comes before its parent
fn leaves_first(root_id: &str, descendants: &[OutlineNode]) -> Vec<String> {
    let parents: HashMap<&str, &str> = descendants
        .iter()
        .filter_map(|d| d.parent_id.as_deref().map(|p| (d.id.as_str(), p)))
        .collect();

    let depth = |id: &str| -> usize {
        let mut depth = 0;
        let mut current = id;
        let mut seen = HashSet::new();
        while let Some(parent) = parents.get(current) {
            if *parent == root_id || !seen.insert(current) {
                break;
            }
            depth += 1;
            current = parent;
        }
        depth
    };

    let mut ordered: Vec<(usize, &OutlineNode)> =
        descendants.iter().map(|d| (depth(&d.id), d)).collect();
    ordered.sort_by(|(da, a), (db, b)| db.cmp(da).then_with(|| OutlineNode::sibling_cmp(a, b)));
    ordered.into_iter().map(|(_, d)| d.id.clone()).collect()
}

/// Plan the repair of one group: stable sort, then rewrite `0..n` where it differs.
///
/// Ties on `position` are broken by `created_at`, then `id`. A dense group
/// yields an empty plan, which makes repeated repairs no-ops.
pub fn plan_repair(group: &SiblingGroup, siblings: &[OutlineNode]) -> RepositionPlan {
    let mut ordered: Vec<&OutlineNode> = siblings.iter().collect();
    ordered.sort_by(|a, b| OutlineNode::sibling_cmp(a, b));

    let mut plan = RepositionPlan::new([group.clone()]);
    plan.writes.extend(
        ordered
            .into_iter()
            .enumerate()
            .filter(|(i, n)| n.position != *i as i64)
            .map(|(i, n)| StoreWrite::SetPosition {
                id: n.id.clone(),
                from: n.position,
                to: i as i64,
            }),
    );
    plan
}

/// True when the group's positions are exactly `0..n`
pub fn is_dense(siblings: &[OutlineNode]) -> bool {
    let mut positions: Vec<i64> = siblings.iter().map(|n| n.position).collect();
    positions.sort_unstable();
    positions
        .iter()
        .enumerate()
        .all(|(i, p)| *p == i as i64)
}

#[cfg(test)]
#[path = "reposition_test.rs"]
mod reposition_test;
