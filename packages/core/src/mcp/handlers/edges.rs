//! MCP Edge Handlers
//!
//! An "edge" is one outline node of a blueprint. Structural edits go through
//! the reposition engine; `update_edge` only touches the payload.

use crate::mcp::handlers::{parse_params, service_error, to_json};
use crate::mcp::types::MCPError;
use crate::models::{NewOutlineNode, NodePayloadUpdate, ParentTarget};
use crate::services::BlueprintService;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::sync::Arc;

/// Keep `null` distinct from an absent field: absent => `None`,
/// `null` => `Some(None)`, string => `Some(Some(id))`
fn deserialize_parent_target<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Parameters for add_edge
#[derive(Debug, Deserialize)]
pub struct AddEdgeParams {
    #[serde(alias = "blueprintId")]
    pub blueprint_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub weight: i64,
    /// Omitted => append to the group
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default, alias = "parentId")]
    pub parent_id: Option<String>,
}

/// Parameters for move_edge
#[derive(Debug, Deserialize)]
pub struct MoveEdgeParams {
    #[serde(alias = "edgeId")]
    pub edge_id: String,
    pub position: i64,
    #[serde(
        default,
        alias = "parentId",
        deserialize_with = "deserialize_parent_target"
    )]
    pub parent_id: Option<Option<String>>,
}

impl MoveEdgeParams {
    pub fn target(&self) -> ParentTarget {
        ParentTarget::from(self.parent_id.clone())
    }
}

/// Parameters for update_edge
#[derive(Debug, Deserialize)]
pub struct UpdateEdgeParams {
    #[serde(alias = "edgeId")]
    pub edge_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub weight: Option<i64>,
}

/// Parameters for delete_edge
#[derive(Debug, Deserialize)]
pub struct DeleteEdgeParams {
    #[serde(alias = "edgeId")]
    pub edge_id: String,
}

pub async fn handle_add_edge(
    service: &Arc<BlueprintService>,
    params: Value,
) -> Result<Value, MCPError> {
    const TOOL: &str = "add_edge";
    let params: AddEdgeParams = parse_params(TOOL, params)?;

    let payload = NewOutlineNode::new(params.title, params.weight)
        .with_description(params.description);
    let edge = service
        .insert_node(
            &params.blueprint_id,
            payload,
            params.parent_id.as_deref(),
            params.position,
        )
        .await
        .map_err(|e| service_error(TOOL, &params.blueprint_id, e))?;

    to_json(TOOL, &edge)
}

pub async fn handle_move_edge(
    service: &Arc<BlueprintService>,
    params: Value,
) -> Result<Value, MCPError> {
    const TOOL: &str = "move_edge";
    let params: MoveEdgeParams = parse_params(TOOL, params)?;

    let outcome = service
        .move_node(&params.edge_id, params.position, params.target())
        .await
        .map_err(|e| service_error(TOOL, &params.edge_id, e))?;

    Ok(json!({
        "edge": to_json(TOOL, &outcome.node)?,
        "shifts": outcome.shifts,
        "noop": outcome.noop,
    }))
}

pub async fn handle_update_edge(
    service: &Arc<BlueprintService>,
    params: Value,
) -> Result<Value, MCPError> {
    const TOOL: &str = "update_edge";
    let params: UpdateEdgeParams = parse_params(TOOL, params)?;

    let update = NodePayloadUpdate {
        title: params.title,
        description: params.description,
        weight: params.weight,
    };
    let edge = service
        .update_node(&params.edge_id, update)
        .await
        .map_err(|e| service_error(TOOL, &params.edge_id, e))?;

    to_json(TOOL, &edge)
}

pub async fn handle_delete_edge(
    service: &Arc<BlueprintService>,
    params: Value,
) -> Result<Value, MCPError> {
    const TOOL: &str = "delete_edge";
    let params: DeleteEdgeParams = parse_params(TOOL, params)?;

    let outcome = service
        .delete_node(&params.edge_id)
        .await
        .map_err(|e| service_error(TOOL, &params.edge_id, e))?;

    to_json(TOOL, &outcome)
}
