//! Tests for MCP types module
//!
//! Verifies JSON-RPC 2.0 request/response parsing and error handling.

use super::*;
use serde_json::json;

#[test]
fn test_parse_valid_request() {
    let json_str = r#"{
        "jsonrpc": "2.0",
        "id": 123,
        "method": "move_edge",
        "params": {
            "edge_id": "e-1",
            "position": 2
        }
    }"#;

    let request: MCPRequest = serde_json::from_str(json_str).unwrap();

    assert_eq!(request.jsonrpc, "2.0");
    assert_eq!(request.id, 123);
    assert_eq!(request.method, "move_edge");
    assert_eq!(request.params["position"], 2);
}

#[test]
fn test_parse_request_missing_jsonrpc() {
    let json_str = r#"{"id": 123, "method": "list_blueprints", "params": {}}"#;
    let result: Result<MCPRequest, _> = serde_json::from_str(json_str);
    assert!(result.is_err());
}

#[test]
fn test_parse_request_wrong_version() {
    let json_str = r#"{"jsonrpc": "1.0", "id": 1, "method": "list_blueprints"}"#;
    let result: Result<MCPRequest, _> = serde_json::from_str(json_str);
    assert!(result.is_err());
}

#[test]
fn test_params_default_to_null() {
    let json_str = r#"{"jsonrpc": "2.0", "id": 5, "method": "list_blueprints"}"#;
    let request: MCPRequest = serde_json::from_str(json_str).unwrap();
    assert!(request.params.is_null());
}

#[test]
fn test_request_without_id_should_fail() {
    let json_str = r#"{"jsonrpc": "2.0", "method": "add_edge", "params": {}}"#;
    let result: Result<MCPRequest, _> = serde_json::from_str(json_str);
    assert!(result.is_err());
}

#[test]
fn test_serialize_success_response() {
    let response = MCPResponse::success(42, json!({"success": true, "edge_id": "abc123"}));
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["jsonrpc"], "2.0");
    assert_eq!(json["id"], 42);
    assert_eq!(json["result"]["edge_id"], "abc123");
    assert!(json.get("error").is_none()); // Should be omitted
}

#[test]
fn test_serialize_error_response() {
    let response = MCPResponse::error(
        99,
        MCPError::not_found("move_edge: node 'xyz789' does not exist".to_string()),
    );
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["id"], 99);
    assert_eq!(json["error"]["code"], NOT_FOUND);
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("xyz789"));
    assert!(json["error"].get("data").is_none());
    assert!(json.get("result").is_none()); // Should be omitted
}

#[test]
fn test_error_codes_constants() {
    // Standard JSON-RPC error codes
    assert_eq!(PARSE_ERROR, -32700);
    assert_eq!(INVALID_REQUEST, -32600);
    assert_eq!(METHOD_NOT_FOUND, -32601);
    assert_eq!(INVALID_PARAMS, -32602);
    assert_eq!(INTERNAL_ERROR, -32603);

    // Blueprint tool codes
    assert_eq!(NOT_FOUND, -32001);
    assert_eq!(VALIDATION_ERROR, -32002);
    assert_eq!(STORE_FAILURE, -32003);
}

#[test]
fn test_error_with_data() {
    let error = MCPError::store_failure("boom".to_string())
        .with_data(json!({"groupsToRepair": [{"blueprintId": "bp", "parentId": null}]}));
    let json = serde_json::to_value(&error).unwrap();

    assert_eq!(json["code"], STORE_FAILURE);
    assert_eq!(json["data"]["groupsToRepair"][0]["blueprintId"], "bp");
    assert_eq!(error.to_string(), "boom (code: -32003)");
}

#[test]
fn test_method_not_found_names_method() {
    let error = MCPError::method_not_found("teleport_edge");
    assert_eq!(error.code, METHOD_NOT_FOUND);
    assert!(error.message.contains("teleport_edge"));
}

#[test]
fn test_parse_notification() {
    let json_str = r#"{"jsonrpc": "2.0", "method": "notifications/initialized", "params": {}}"#;
    let notification: MCPNotification = serde_json::from_str(json_str).unwrap();
    assert_eq!(notification.method, "notifications/initialized");
}

#[test]
fn test_notification_with_id_should_be_request() {
    let json_str = r#"{"jsonrpc": "2.0", "id": 123, "method": "initialize", "params": {}}"#;

    assert!(serde_json::from_str::<MCPRequest>(json_str).is_ok());
    // deny_unknown_fields rejects 'id'
    assert!(serde_json::from_str::<MCPNotification>(json_str).is_err());
}
