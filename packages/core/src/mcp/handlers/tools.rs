//! MCP Tools Handler
//!
//! Implements MCP-compliant tools/list and tools/call methods. Every tool is
//! also callable directly as a JSON-RPC method of the same name.

use crate::mcp::handlers::{blueprints, edges};
use crate::mcp::types::MCPError;
use crate::services::BlueprintService;
use serde_json::{json, Value};
use std::sync::Arc;

/// Names of every tool, in tools/list order
pub const TOOL_NAMES: &[&str] = &[
    "create_blueprint",
    "list_blueprints",
    "update_blueprint",
    "delete_blueprint",
    "get_blueprint_edges",
    "get_blueprint_tree",
    "import_blueprint",
    "repair_blueprint",
    "check_blueprint",
    "add_edge",
    "move_edge",
    "update_edge",
    "delete_edge",
];

pub fn is_tool(name: &str) -> bool {
    TOOL_NAMES.contains(&name)
}

/// Route a tool invocation to its handler
pub async fn call_tool(
    service: &Arc<BlueprintService>,
    tool_name: &str,
    arguments: Value,
) -> Result<Value, MCPError> {
    match tool_name {
        // Blueprints
        "create_blueprint" => blueprints::handle_create_blueprint(service, arguments).await,
        "list_blueprints" => blueprints::handle_list_blueprints(service, arguments).await,
        "update_blueprint" => blueprints::handle_update_blueprint(service, arguments).await,
        "delete_blueprint" => blueprints::handle_delete_blueprint(service, arguments).await,

        // Outline reads
        "get_blueprint_edges" => blueprints::handle_get_blueprint_edges(service, arguments).await,
        "get_blueprint_tree" => blueprints::handle_get_blueprint_tree(service, arguments).await,

        // Bulk import & maintenance
        "import_blueprint" => blueprints::handle_import_blueprint(service, arguments).await,
        "repair_blueprint" => blueprints::handle_repair_blueprint(service, arguments).await,
        "check_blueprint" => blueprints::handle_check_blueprint(service, arguments).await,

        // Edges
        "add_edge" => edges::handle_add_edge(service, arguments).await,
        "move_edge" => edges::handle_move_edge(service, arguments).await,
        "update_edge" => edges::handle_update_edge(service, arguments).await,
        "delete_edge" => edges::handle_delete_edge(service, arguments).await,

        _ => Err(MCPError::method_not_found(tool_name)),
    }
}

/// Handle tools/list
pub fn handle_tools_list(_params: Value) -> Result<Value, MCPError> {
    Ok(json!({
        "tools": get_tool_schemas()
    }))
}

/// Handle tools/call
///
/// Tool execution errors are returned as successful responses with
/// `isError: true`; only malformed calls become JSON-RPC errors.
pub async fn handle_tools_call(
    service: &Arc<BlueprintService>,
    params: Value,
) -> Result<Value, MCPError> {
    let tool_name = params["name"]
        .as_str()
        .ok_or_else(|| MCPError::invalid_params("Missing 'name' parameter".to_string()))?;

    if !is_tool(tool_name) {
        return Err(MCPError::invalid_params(format!(
            "Unknown tool: {}",
            tool_name
        )));
    }

    let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

    match call_tool(service, tool_name, arguments).await {
        Ok(data) => {
            let text = serde_json::to_string_pretty(&data).map_err(|e| {
                MCPError::internal_error(format!("JSON serialization failed: {}", e))
            })?;

            Ok(json!({
                "content": [{
                    "type": "text",
                    "text": text
                }],
                "isError": false
            }))
        }
        Err(e) => Ok(json!({
            "content": [{
                "type": "text",
                "text": e.message
            }],
            "isError": true,
            "errorCode": e.code
        })),
    }
}

fn blueprint_id_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "blueprint_id": {
                "type": "string",
                "description": description
            }
        },
        "required": ["blueprint_id"]
    })
}

fn get_tool_schemas() -> Value {
    json!([
        {
            "name": "create_blueprint",
            "description": "Create an empty blueprint (exam outline container)",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "name": { "type": "string", "minLength": 1 },
                    "description": { "type": "string" },
                    "ai_notes": {
                        "type": "string",
                        "description": "Where the outline was found in the source document"
                    }
                },
                "required": ["name"]
            }
        },
        {
            "name": "list_blueprints",
            "description": "List every blueprint, newest first",
            "inputSchema": { "type": "object", "properties": {} }
        },
        {
            "name": "update_blueprint",
            "description": "Update the name and/or description of a blueprint",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "blueprint_id": { "type": "string" },
                    "name": { "type": "string", "minLength": 1 },
                    "description": { "type": "string" }
                },
                "required": ["blueprint_id"]
            }
        },
        {
            "name": "delete_blueprint",
            "description": "Delete a blueprint together with all of its edges",
            "inputSchema": blueprint_id_schema("The blueprint to delete")
        },
        {
            "name": "get_blueprint_edges",
            "description": "Get all edges of a blueprint, ordered by parent and position",
            "inputSchema": blueprint_id_schema("The blueprint to read")
        },
        {
            "name": "get_blueprint_tree",
            "description": "Get the outline of a blueprint as nested trees in position order",
            "inputSchema": blueprint_id_schema("The blueprint to read")
        },
        {
            "name": "import_blueprint",
            "description": "Append an extracted outline; rows reference parents by id within the batch or existing edges",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "blueprint_id": { "type": "string" },
                    "edges": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": { "type": "string" },
                                "title": { "type": "string", "minLength": 1 },
                                "description": { "type": "string" },
                                "weight": { "type": "integer", "minimum": 0, "maximum": 100 },
                                "position": {
                                    "type": "integer",
                                    "description": "Ordering hint within the row's siblings"
                                },
                                "parentId": { "type": ["string", "null"] }
                            },
                            "required": ["title"]
                        }
                    }
                },
                "required": ["blueprint_id", "edges"]
            }
        },
        {
            "name": "repair_blueprint",
            "description": "Renumber every sibling group of a blueprint to 0..n-1",
            "inputSchema": blueprint_id_schema("The blueprint to repair")
        },
        {
            "name": "check_blueprint",
            "description": "Report sibling groups with gaps or duplicates and dangling parents",
            "inputSchema": blueprint_id_schema("The blueprint to verify")
        },
        {
            "name": "add_edge",
            "description": "Insert a topic or sub-topic; later siblings shift down",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "blueprint_id": { "type": "string" },
                    "title": { "type": "string", "minLength": 1 },
                    "description": { "type": "string" },
                    "weight": {
                        "type": "integer",
                        "minimum": 0,
                        "maximum": 100,
                        "description": "Relative weight (0-100)"
                    },
                    "position": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Index among siblings; omitted or too large appends"
                    },
                    "parent_id": {
                        "type": ["string", "null"],
                        "description": "Parent edge; null or omitted for a top-level topic"
                    }
                },
                "required": ["blueprint_id", "title"]
            }
        },
        {
            "name": "move_edge",
            "description": "Move an edge to a new position, optionally under a new parent",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "edge_id": { "type": "string" },
                    "position": { "type": "integer", "minimum": 0 },
                    "parent_id": {
                        "type": ["string", "null"],
                        "description": "Omit to keep the current parent, null to move to the top level"
                    }
                },
                "required": ["edge_id", "position"]
            }
        },
        {
            "name": "update_edge",
            "description": "Update title, description or weight of an edge; never moves it",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "edge_id": { "type": "string" },
                    "title": { "type": "string", "minLength": 1 },
                    "description": { "type": "string" },
                    "weight": { "type": "integer", "minimum": 0, "maximum": 100 }
                },
                "required": ["edge_id"]
            }
        },
        {
            "name": "delete_edge",
            "description": "Delete an edge; children follow the configured delete policy",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "edge_id": { "type": "string" }
                },
                "required": ["edge_id"]
            }
        }
    ])
}

#[cfg(test)]
#[path = "tools_test.rs"]
mod tools_test;
