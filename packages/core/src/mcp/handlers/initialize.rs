//! MCP Initialize Handler
//!
//! Handles the MCP initialization handshake and capability discovery.
//! This is the first method called when a client connects to the server.

use crate::mcp::types::MCPError;
use serde_json::{json, Value};

/// Supported MCP protocol versions, newest first
const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// Handle MCP initialize request
///
/// Echoes the client's protocol version when supported and advertises the
/// tools capability. Tool schemas are retrieved separately via tools/list.
///
/// # Errors
///
/// Returns error if:
/// - protocolVersion is missing
/// - Client requests an unsupported protocol version
pub fn handle_initialize(params: Value) -> Result<Value, MCPError> {
    let client_version = params["protocolVersion"]
        .as_str()
        .ok_or_else(|| MCPError::invalid_params("Missing protocolVersion parameter".to_string()))?;

    if !SUPPORTED_PROTOCOL_VERSIONS.contains(&client_version) {
        return Err(MCPError::invalid_request(format!(
            "Unsupported protocol version: {}. Server supports: {:?}",
            client_version, SUPPORTED_PROTOCOL_VERSIONS
        )));
    }

    Ok(json!({
        "protocolVersion": client_version,
        "serverInfo": {
            "name": "blueprint-mcp",
            "version": env!("CARGO_PKG_VERSION")
        },
        "capabilities": {
            "tools": {
                "listChanged": false
            }
        },
        "instructions": {
            "edges": "An edge is one topic or sub-topic of a blueprint outline. Siblings are numbered 0..n-1 by position and the server keeps that numbering dense after every add, move and delete.",
            "move_edge": "Omit parent_id to reorder within the current parent, pass null to move to the top level, or pass an edge id to re-parent. Positions beyond the end append.",
            "weights": "Weights are integers 0-100. Sibling weights are checked against a budget according to the server's weight policy."
        }
    }))
}

#[cfg(test)]
#[path = "initialize_test.rs"]
mod initialize_test;
