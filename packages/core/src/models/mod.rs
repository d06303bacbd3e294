//! Data Models
//!
//! This module contains the core data structures used throughout the blueprint core:
//!
//! - `Blueprint` - Outline container (name, description, extraction notes)
//! - `OutlineNode` - One topic or sub-topic, ordered by `parent_id` + `position`
//! - Value types for the reposition engine (`SiblingGroup`, `PositionRange`, `ParentTarget`)

mod blueprint;
mod node;


pub use blueprint::{Blueprint, BlueprintUpdate};
pub use node::{
    validate_weight, NewOutlineNode, NodePayloadUpdate, OutlineNode, OutlineTree, ParentTarget,
    PositionRange, SiblingGroup, ValidationError, MAX_WEIGHT,
};
