//! MCP Request Handlers
//!
//! Handler modules for different MCP operations.
//!
//! - `blueprints`: blueprint records, outline reads, import and repair
//! - `edges`: node ("edge") insert, move, update and delete
//! - `tools`: tools/list schemas and tools/call dispatch
//! - `initialize`: protocol handshake

pub mod blueprints;
pub mod edges;
pub mod initialize;
pub mod tools;

use crate::mcp::types::MCPError;
use crate::operations::TreeOperationError;
use crate::services::BlueprintServiceError;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

/// Parse tool parameters, treating a missing params object as `{}`
pub(crate) fn parse_params<T: DeserializeOwned>(tool: &str, params: Value) -> Result<T, MCPError> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params)
        .map_err(|e| MCPError::invalid_params(format!("{}: invalid parameters: {}", tool, e)))
}

pub(crate) fn to_json<T: serde::Serialize>(tool: &str, value: &T) -> Result<Value, MCPError> {
    serde_json::to_value(value).map_err(|e| {
        MCPError::internal_error(format!("{}: failed to serialize result: {}", tool, e))
    })
}

/// Map a service error onto a JSON-RPC error naming the tool and its subject
pub(crate) fn service_error(tool: &str, subject: &str, err: BlueprintServiceError) -> MCPError {
    let message = format!("{} failed for '{}': {}", tool, subject, err);

    match &err {
        e if e.is_not_found() => MCPError::not_found(message),
        BlueprintServiceError::ValidationFailed(_) | BlueprintServiceError::InvalidUpdate(_) => {
            MCPError::validation_error(message)
        }
        BlueprintServiceError::TreeOperation(TreeOperationError::StoreFailure {
            operation,
            node_id,
            applied,
            total,
            groups,
            ..
        }) => MCPError::store_failure(message).with_data(json!({
            "operation": operation,
            "nodeId": node_id,
            "applied": applied,
            "total": total,
            "groupsToRepair": groups,
        })),
        BlueprintServiceError::TreeOperation(TreeOperationError::DatabaseError(_))
        | BlueprintServiceError::BulkOperationFailed { .. }
        | BlueprintServiceError::DatabaseError(_) => MCPError::store_failure(message),
        BlueprintServiceError::TreeOperation(_) => MCPError::validation_error(message),
        BlueprintServiceError::ConcurrentModification { .. }
        | BlueprintServiceError::InitializationError(_)
        | BlueprintServiceError::BlueprintNotFound { .. }
        | BlueprintServiceError::NodeNotFound { .. } => MCPError::internal_error(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::types::{INTERNAL_ERROR, NOT_FOUND, STORE_FAILURE, VALIDATION_ERROR};
    use crate::models::SiblingGroup;

    #[test]
    fn test_service_error_codes() {
        let err = service_error(
            "move_edge",
            "e-1",
            TreeOperationError::node_not_found("e-1").into(),
        );
        assert_eq!(err.code, NOT_FOUND);
        assert!(err.message.starts_with("move_edge failed for 'e-1'"));

        let err = service_error(
            "move_edge",
            "e-1",
            TreeOperationError::cycle_detected("e-1", "e-2").into(),
        );
        assert_eq!(err.code, VALIDATION_ERROR);

        let err = service_error(
            "update_edge",
            "e-1",
            BlueprintServiceError::invalid_update("no fields"),
        );
        assert_eq!(err.code, VALIDATION_ERROR);

        let err = service_error(
            "import_blueprint",
            "bp",
            BlueprintServiceError::bulk_operation_failed("disk full"),
        );
        assert_eq!(err.code, STORE_FAILURE);

        let err = service_error(
            "move_edge",
            "e-1",
            BlueprintServiceError::ConcurrentModification {
                node_id: "e-1".to_string(),
                attempts: 4,
            },
        );
        assert_eq!(err.code, INTERNAL_ERROR);
    }

    #[test]
    fn test_store_failure_carries_groups_to_repair() {
        let failure = TreeOperationError::StoreFailure {
            operation: "shift_position".to_string(),
            node_id: "e-3".to_string(),
            applied: 2,
            total: 5,
            groups: vec![SiblingGroup::root("bp")],
            message: "connection reset".to_string(),
        };
        let err = service_error("move_edge", "e-1", failure.into());

        assert_eq!(err.code, STORE_FAILURE);
        let data = err.data.unwrap();
        assert_eq!(data["applied"], 2);
        assert_eq!(data["total"], 5);
        assert_eq!(data["groupsToRepair"][0]["blueprintId"], "bp");
        assert!(data["groupsToRepair"][0]["parentId"].is_null());
    }

    #[test]
    fn test_parse_params_accepts_missing_params() {
        #[derive(serde::Deserialize)]
        struct Empty {}
        assert!(parse_params::<Empty>("list_blueprints", Value::Null).is_ok());

        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct NeedsId {
            id: String,
        }
        let err = parse_params::<NeedsId>("get_blueprint_edges", json!({})).unwrap_err();
        assert!(err.message.starts_with("get_blueprint_edges: invalid parameters"));
    }
}
