//! Blueprint Core Business Logic Layer
//!
//! This crate keeps exam blueprint outlines (hierarchical topic/weight trees)
//! consistently ordered while they are edited by people and AI agents.
//!
//! # Architecture
//!
//! - **Dense sibling positions**: every `(blueprint_id, parent_id)` group is numbered `0..n-1`
//! - **Pure planning**: moves, inserts, deletes and repairs compute write plans from a snapshot
//! - **Pluggable stores**: `NodeStore` trait with in-memory and libsql/Turso backends
//! - **Repairable**: non-transactional failures report affected groups for the repair pass
//!
//! # Modules
//!
//! - [`models`] - Data structures (Blueprint, OutlineNode, SiblingGroup, etc.)
//! - [`operations`] - Tree reposition engine and per-group locks
//! - [`services`] - BlueprintService, configuration and bulk import
//! - [`db`] - Node stores, with libsql integration behind the `turso` feature
//! - [`mcp`] - MCP stdio server for AI agent integration

pub mod db;
pub mod mcp;
pub mod models;
pub mod operations;
pub mod services;

// Re-export commonly used types
pub use models::*;
pub use operations::{
    DeleteOutcome, DeletePolicy, MoveOutcome, RepairReport, TreeEngine, TreeOperationError,
    TreePolicies, WeightPolicy,
};
pub use services::{BlueprintService, BlueprintServiceError, ImportedNode, ServiceConfig};
