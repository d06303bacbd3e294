//! Error types for the tree reposition engine
//!
//! Every variant names the node (or sibling group) it is about, so callers can
//! surface actionable messages without extra lookups.

use crate::models::{SiblingGroup, ValidationError};
use thiserror::Error;

/// Errors that can occur while moving, inserting, deleting or repairing nodes
///
/// # Examples
///
/// ```rust
/// use blueprint_core::operations::TreeOperationError;
///
/// let err = TreeOperationError::cycle_detected("cardio", "cardio-arrhythmia");
/// assert_eq!(
///     err.to_string(),
///     "Moving node 'cardio' under 'cardio-arrhythmia' would create a cycle"
/// );
/// ```
#[derive(Error, Debug)]
pub enum TreeOperationError {
    /// Referenced node (moved node or target parent) does not exist
    #[error("Node '{node_id}' does not exist")]
    NodeNotFound { node_id: String },

    /// Target parent is the node itself or one of its descendants
    #[error("Moving node '{node_id}' under '{parent_id}' would create a cycle")]
    CycleDetected { node_id: String, parent_id: String },

    /// Requested position is negative
    #[error("Invalid position {position} for node '{node_id}': positions start at 0")]
    InvalidPosition { node_id: String, position: i64 },

    /// Target parent exists but cannot hold the node
    #[error("Invalid parent '{parent_id}' for node '{node_id}': {reason}")]
    InvalidParent {
        node_id: String,
        parent_id: String,
        reason: String,
    },

    /// Delete refused because the node still has children
    #[error("Node '{node_id}' has {child_count} child node(s) and cannot be deleted")]
    HasChildren { node_id: String, child_count: usize },

    /// Sibling weights would exceed the configured budget
    #[error("Weight budget exceeded in group {group}: total {total} > limit {limit}")]
    WeightBudgetExceeded {
        group: SiblingGroup,
        total: i64,
        limit: i64,
    },

    /// A store write failed while applying a plan
    ///
    /// `applied` writes of `total` reached the store before the failure. The
    /// listed groups may be left non-dense and can be handed to the repair pass.
    #[error("Store failure during {operation} of node '{node_id}' ({applied}/{total} writes applied): {message}")]
    StoreFailure {
        operation: String,
        node_id: String,
        applied: usize,
        total: usize,
        groups: Vec<SiblingGroup>,
        message: String,
    },

    /// Payload validation failed
    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),

    /// A store read failed before any write was issued
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl TreeOperationError {
    /// Create a NodeNotFound error
    pub fn node_not_found(node_id: impl Into<String>) -> Self {
        Self::NodeNotFound {
            node_id: node_id.into(),
        }
    }

    /// Create a CycleDetected error
    pub fn cycle_detected(node_id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self::CycleDetected {
            node_id: node_id.into(),
            parent_id: parent_id.into(),
        }
    }

    /// Create an InvalidPosition error
    pub fn invalid_position(node_id: impl Into<String>, position: i64) -> Self {
        Self::InvalidPosition {
            node_id: node_id.into(),
            position,
        }
    }

    /// Create an InvalidParent error
    pub fn invalid_parent(
        node_id: impl Into<String>,
        parent_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParent {
            node_id: node_id.into(),
            parent_id: parent_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a HasChildren error
    pub fn has_children(node_id: impl Into<String>, child_count: usize) -> Self {
        Self::HasChildren {
            node_id: node_id.into(),
            child_count,
        }
    }

    /// Create a WeightBudgetExceeded error
    pub fn weight_budget_exceeded(group: SiblingGroup, total: i64, limit: i64) -> Self {
        Self::WeightBudgetExceeded {
            group,
            total,
            limit,
        }
    }

    /// Create a DatabaseError from any store error
    pub fn database_error(message: impl std::fmt::Display) -> Self {
        Self::DatabaseError(message.to_string())
    }

    /// Groups a caller should repair after this error, if any
    ///
    /// Only `StoreFailure` can leave partially applied state behind.
    pub fn groups_to_repair(&self) -> &[SiblingGroup] {
        match self {
            Self::StoreFailure { groups, .. } => groups,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_not_found_error() {
        let err = TreeOperationError::node_not_found("missing-node");
        assert!(matches!(err, TreeOperationError::NodeNotFound { .. }));
        assert_eq!(format!("{}", err), "Node 'missing-node' does not exist");
    }

    #[test]
    fn test_invalid_position_error() {
        let err = TreeOperationError::invalid_position("node-1", -2);
        assert_eq!(
            format!("{}", err),
            "Invalid position -2 for node 'node-1': positions start at 0"
        );
    }

    #[test]
    fn test_has_children_error() {
        let err = TreeOperationError::has_children("node-1", 3);
        assert_eq!(
            format!("{}", err),
            "Node 'node-1' has 3 child node(s) and cannot be deleted"
        );
    }

    #[test]
    fn test_weight_budget_error_names_group() {
        let err = TreeOperationError::weight_budget_exceeded(SiblingGroup::root("bp-1"), 130, 100);
        assert_eq!(
            format!("{}", err),
            "Weight budget exceeded in group bp-1/<root>: total 130 > limit 100"
        );
    }

    #[test]
    fn test_store_failure_exposes_groups() {
        let groups = vec![SiblingGroup::under("bp", "p1"), SiblingGroup::root("bp")];
        let err = TreeOperationError::StoreFailure {
            operation: "shift_position".to_string(),
            node_id: "n3".to_string(),
            applied: 2,
            total: 5,
            groups: groups.clone(),
            message: "connection reset".to_string(),
        };
        assert_eq!(err.groups_to_repair(), groups.as_slice());
        assert!(err.to_string().contains("2/5 writes applied"));

        let other = TreeOperationError::node_not_found("x");
        assert!(other.groups_to_repair().is_empty());
    }

    #[test]
    fn test_validation_error_conversion() {
        let err: TreeOperationError = ValidationError::MissingField("title".to_string()).into();
        assert_eq!(
            format!("{}", err),
            "Validation error: Missing required field: title"
        );
    }
}
