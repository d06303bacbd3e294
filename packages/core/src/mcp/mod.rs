//! Model Context Protocol (MCP) Integration
//!
//! stdio-based JSON-RPC 2.0 server giving AI agents access to blueprint
//! outlines through [`BlueprintService`](crate::services::BlueprintService).
//!
//! # Usage
//!
//! Agents send one JSON-RPC request per line on stdin:
//!
//! ```json
//! {
//!   "jsonrpc": "2.0",
//!   "id": 1,
//!   "method": "move_edge",
//!   "params": {
//!     "edge_id": "3f0c...",
//!     "position": 0,
//!     "parent_id": null
//!   }
//! }
//! ```
//!
//! Every tool is callable as a method of the same name or through
//! `tools/call`. `parent_id` on `move_edge` is tri-state: omitted keeps the
//! current parent, `null` moves to the top level.

pub mod handlers;
pub mod server;
pub mod types;

pub use server::{handle_request, run_mcp_server, run_mcp_server_with_callback, serve, ResponseCallback};
pub use types::{MCPError, MCPNotification, MCPRequest, MCPResponse};
