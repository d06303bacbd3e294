//! MCP Blueprint Handlers
//!
//! Blueprint records, outline reads, bulk import and the repair pass.

use crate::mcp::handlers::{parse_params, service_error, to_json};
use crate::mcp::types::MCPError;
use crate::models::BlueprintUpdate;
use crate::services::{BlueprintService, ImportedNode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Parameters for create_blueprint
#[derive(Debug, Deserialize)]
pub struct CreateBlueprintParams {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "aiNotes")]
    pub ai_notes: String,
}

/// Parameters for tools addressing one blueprint
#[derive(Debug, Deserialize)]
pub struct BlueprintIdParams {
    #[serde(alias = "blueprintId")]
    pub blueprint_id: String,
}

/// Parameters for update_blueprint
#[derive(Debug, Deserialize)]
pub struct UpdateBlueprintParams {
    #[serde(alias = "blueprintId")]
    pub blueprint_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Parameters for import_blueprint
#[derive(Debug, Deserialize)]
pub struct ImportBlueprintParams {
    #[serde(alias = "blueprintId")]
    pub blueprint_id: String,
    pub edges: Vec<ImportedNode>,
}

pub async fn handle_create_blueprint(
    service: &Arc<BlueprintService>,
    params: Value,
) -> Result<Value, MCPError> {
    const TOOL: &str = "create_blueprint";
    let params: CreateBlueprintParams = parse_params(TOOL, params)?;

    let blueprint = service
        .create_blueprint(&params.name, &params.description, &params.ai_notes)
        .await
        .map_err(|e| service_error(TOOL, &params.name, e))?;

    to_json(TOOL, &blueprint)
}

pub async fn handle_list_blueprints(
    service: &Arc<BlueprintService>,
    _params: Value,
) -> Result<Value, MCPError> {
    const TOOL: &str = "list_blueprints";
    let blueprints = service
        .list_blueprints()
        .await
        .map_err(|e| service_error(TOOL, "*", e))?;

    Ok(json!({
        "blueprints": to_json(TOOL, &blueprints)?,
        "count": blueprints.len(),
    }))
}

pub async fn handle_update_blueprint(
    service: &Arc<BlueprintService>,
    params: Value,
) -> Result<Value, MCPError> {
    const TOOL: &str = "update_blueprint";
    let params: UpdateBlueprintParams = parse_params(TOOL, params)?;

    let blueprint = service
        .update_blueprint(
            &params.blueprint_id,
            BlueprintUpdate {
                name: params.name,
                description: params.description,
            },
        )
        .await
        .map_err(|e| service_error(TOOL, &params.blueprint_id, e))?;

    to_json(TOOL, &blueprint)
}

pub async fn handle_delete_blueprint(
    service: &Arc<BlueprintService>,
    params: Value,
) -> Result<Value, MCPError> {
    const TOOL: &str = "delete_blueprint";
    let params: BlueprintIdParams = parse_params(TOOL, params)?;

    let deleted = service
        .delete_blueprint(&params.blueprint_id)
        .await
        .map_err(|e| service_error(TOOL, &params.blueprint_id, e))?;

    Ok(json!({
        "blueprint_id": params.blueprint_id,
        "deleted": deleted,
    }))
}

/// Flat edge list ordered by `(parent_id, position)`
pub async fn handle_get_blueprint_edges(
    service: &Arc<BlueprintService>,
    params: Value,
) -> Result<Value, MCPError> {
    const TOOL: &str = "get_blueprint_edges";
    let params: BlueprintIdParams = parse_params(TOOL, params)?;

    let edges = service
        .list_nodes(&params.blueprint_id)
        .await
        .map_err(|e| service_error(TOOL, &params.blueprint_id, e))?;

    Ok(json!({
        "blueprint_id": params.blueprint_id,
        "edges": to_json(TOOL, &edges)?,
        "count": edges.len(),
    }))
}

pub async fn handle_get_blueprint_tree(
    service: &Arc<BlueprintService>,
    params: Value,
) -> Result<Value, MCPError> {
    const TOOL: &str = "get_blueprint_tree";
    let params: BlueprintIdParams = parse_params(TOOL, params)?;

    let tree = service
        .get_tree(&params.blueprint_id)
        .await
        .map_err(|e| service_error(TOOL, &params.blueprint_id, e))?;

    Ok(json!({
        "blueprint_id": params.blueprint_id,
        "tree": to_json(TOOL, &tree)?,
    }))
}

pub async fn handle_import_blueprint(
    service: &Arc<BlueprintService>,
    params: Value,
) -> Result<Value, MCPError> {
    const TOOL: &str = "import_blueprint";
    let params: ImportBlueprintParams = parse_params(TOOL, params)?;

    let created = service
        .import_outline(&params.blueprint_id, params.edges)
        .await
        .map_err(|e| service_error(TOOL, &params.blueprint_id, e))?;

    Ok(json!({
        "blueprint_id": params.blueprint_id,
        "imported": created.len(),
        "edges": to_json(TOOL, &created)?,
    }))
}

pub async fn handle_repair_blueprint(
    service: &Arc<BlueprintService>,
    params: Value,
) -> Result<Value, MCPError> {
    const TOOL: &str = "repair_blueprint";
    let params: BlueprintIdParams = parse_params(TOOL, params)?;

    let report = service
        .repair_blueprint(&params.blueprint_id)
        .await
        .map_err(|e| service_error(TOOL, &params.blueprint_id, e))?;

    to_json(TOOL, &report)
}

/// Report structural invariant violations without changing anything
pub async fn handle_check_blueprint(
    service: &Arc<BlueprintService>,
    params: Value,
) -> Result<Value, MCPError> {
    const TOOL: &str = "check_blueprint";
    let params: BlueprintIdParams = parse_params(TOOL, params)?;

    let violations = service
        .check_invariants(&params.blueprint_id)
        .await
        .map_err(|e| service_error(TOOL, &params.blueprint_id, e))?;

    Ok(json!({
        "blueprint_id": params.blueprint_id,
        "valid": violations.is_empty(),
        "violations": to_json(TOOL, &violations)?,
    }))
}
