//! Outline Node Data Structures
//!
//! This module defines `OutlineNode`, one topic or sub-topic of a blueprint,
//! and the small value types the reposition engine speaks in.
//!
//! # Architecture
//!
//! - **Flat relation**: Nodes carry `parent_id` + `position`, there is no native tree
//! - **Sibling groups**: `(blueprint_id, parent_id)` is the unit of dense ordering
//! - **Zero-based positions**: Every group holds exactly `0..n`
//!
//! # Examples
//!
//! ```rust
//! use blueprint_core::models::OutlineNode;
//!
//! let node = OutlineNode::new(
//!     "bp-1".to_string(),
//!     "Cardiology".to_string(),
//!     "Heart and vessels".to_string(),
//!     30,
//! );
//! assert_eq!(node.position, 0);
//! assert!(node.parent_id.is_none());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Upper bound for a single node weight and for a sibling group's weight sum
pub const MAX_WEIGHT: i64 = 100;

/// Validation errors for outline nodes and blueprints
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Weight {weight} is outside the allowed range 0..={max}")]
    WeightOutOfRange { weight: i64, max: i64 },

    #[error("Invalid node ID format: {0}")]
    InvalidId(String),

    #[error("Duplicate node ID: {0}")]
    DuplicateId(String),

    #[error("Node '{node_id}' references unknown parent '{parent_id}'")]
    UnknownParent { node_id: String, parent_id: String },

    #[error("Import would create a parent cycle through node '{0}'")]
    ImportCycle(String),
}

/// One entry of a blueprint outline.
///
/// # Fields
///
/// - `id`: Opaque identifier, stable for the node's lifetime
/// - `blueprint_id`: Owning blueprint
/// - `parent_id`: Parent node, `None` for the blueprint's root level
/// - `position`: Zero-based dense rank among siblings
/// - `title` / `description` / `weight`: Payload, ignored by the ordering logic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineNode {
    pub id: String,

    pub blueprint_id: String,

    pub parent_id: Option<String>,

    pub position: i64,

    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Relative weight (0-100) of this topic inside its sibling group
    pub weight: i64,

    pub created_at: DateTime<Utc>,

    pub modified_at: DateTime<Utc>,
}

impl OutlineNode {
    /// Create a root-level node at position 0 with a generated UUID
    pub fn new(blueprint_id: String, title: String, description: String, weight: i64) -> Self {
        Self::new_with_id(
            Uuid::new_v4().to_string(),
            blueprint_id,
            title,
            description,
            weight,
        )
    }

    /// Create a root-level node at position 0 with a caller-provided ID
    pub fn new_with_id(
        id: String,
        blueprint_id: String,
        title: String,
        description: String,
        weight: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            blueprint_id,
            parent_id: None,
            position: 0,
            title,
            description,
            weight,
            created_at: now,
            modified_at: now,
        }
    }

    /// Builder-style helper to place the node under a parent at a position
    pub fn placed(mut self, parent_id: Option<String>, position: i64) -> Self {
        self.parent_id = parent_id;
        self.position = position;
        self
    }

    /// The sibling group this node currently belongs to
    pub fn group(&self) -> SiblingGroup {
        SiblingGroup::new(self.blueprint_id.clone(), self.parent_id.clone())
    }

    /// Canonical sibling order: position, then creation time, then id
    pub fn sibling_cmp(a: &OutlineNode, b: &OutlineNode) -> std::cmp::Ordering {
        a.position
            .cmp(&b.position)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    }

    /// Validate payload fields
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::InvalidId(self.id.clone()));
        }
        if self.blueprint_id.trim().is_empty() {
            return Err(ValidationError::MissingField("blueprint_id".to_string()));
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title".to_string()));
        }
        validate_weight(self.weight)
    }
}

/// Check a weight against `0..=MAX_WEIGHT`
pub fn validate_weight(weight: i64) -> Result<(), ValidationError> {
    if !(0..=MAX_WEIGHT).contains(&weight) {
        return Err(ValidationError::WeightOutOfRange {
            weight,
            max: MAX_WEIGHT,
        });
    }
    Ok(())
}

/// Payload for inserting a new node
///
/// Placement (`parent_id`, `position`) is passed separately to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOutlineNode {
    /// Optional pre-generated ID (UUID is generated when absent)
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub weight: i64,
}

impl NewOutlineNode {
    pub fn new(title: impl Into<String>, weight: i64) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: String::new(),
            weight,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Materialize the payload into a node of `blueprint_id` at the given placement
    pub fn into_node(
        self,
        blueprint_id: String,
        parent_id: Option<String>,
        position: i64,
    ) -> OutlineNode {
        let id = self.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        OutlineNode::new_with_id(id, blueprint_id, self.title, self.description, self.weight)
            .placed(parent_id, position)
    }
}

/// Sparse payload update. Never touches `parent_id` or `position`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePayloadUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub weight: Option<i64>,
}

impl NodePayloadUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.weight.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(ValidationError::MissingField("title".to_string()));
            }
        }
        if let Some(weight) = self.weight {
            validate_weight(weight)?;
        }
        Ok(())
    }

    /// Apply the update onto a node in place, bumping `modified_at`
    pub fn apply_to(&self, node: &mut OutlineNode) {
        if let Some(title) = &self.title {
            node.title = title.clone();
        }
        if let Some(description) = &self.description {
            node.description = description.clone();
        }
        if let Some(weight) = self.weight {
            node.weight = weight;
        }
        node.modified_at = Utc::now();
    }
}

/// Requested parent for a move.
///
/// Distinguishes "keep the current parent" from "promote to root".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ParentTarget {
    #[default]
    Unchanged,
    Root,
    Node(String),
}

impl ParentTarget {
    /// Resolve against the node's current parent
    pub fn resolve<'a>(&'a self, current: Option<&'a str>) -> Option<&'a str> {
        match self {
            ParentTarget::Unchanged => current,
            ParentTarget::Root => None,
            ParentTarget::Node(id) => Some(id.as_str()),
        }
    }
}

/// `None` = field absent, `Some(None)` = explicit null, `Some(Some(id))` = parent id
impl From<Option<Option<String>>> for ParentTarget {
    fn from(value: Option<Option<String>>) -> Self {
        match value {
            None => ParentTarget::Unchanged,
            Some(None) => ParentTarget::Root,
            Some(Some(id)) => ParentTarget::Node(id),
        }
    }
}

/// The set of nodes sharing `(blueprint_id, parent_id)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiblingGroup {
    pub blueprint_id: String,
    pub parent_id: Option<String>,
}

impl SiblingGroup {
    pub fn new(blueprint_id: String, parent_id: Option<String>) -> Self {
        Self {
            blueprint_id,
            parent_id,
        }
    }

    pub fn root(blueprint_id: impl Into<String>) -> Self {
        Self::new(blueprint_id.into(), None)
    }

    pub fn under(blueprint_id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self::new(blueprint_id.into(), Some(parent_id.into()))
    }
}

impl fmt::Display for SiblingGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent_id {
            Some(parent) => write!(f, "{}/{}", self.blueprint_id, parent),
            None => write!(f, "{}/<root>", self.blueprint_id),
        }
    }
}

/// Position filter for sibling scans. All bounds combine with AND.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionRange {
    pub gte: Option<i64>,
    pub gt: Option<i64>,
    pub lte: Option<i64>,
    pub lt: Option<i64>,
}

impl PositionRange {
    /// No bounds: the whole group
    pub fn all() -> Self {
        Self::default()
    }

    /// `position >= p`
    pub fn at_or_after(mut self, p: i64) -> Self {
        self.gte = Some(p);
        self
    }

    /// `position > p`
    pub fn after(mut self, p: i64) -> Self {
        self.gt = Some(p);
        self
    }

    /// `position <= p`
    pub fn at_or_before(mut self, p: i64) -> Self {
        self.lte = Some(p);
        self
    }

    /// `position < p`
    pub fn before(mut self, p: i64) -> Self {
        self.lt = Some(p);
        self
    }

    pub fn contains(&self, position: i64) -> bool {
        self.gte.map_or(true, |b| position >= b)
            && self.gt.map_or(true, |b| position > b)
            && self.lte.map_or(true, |b| position <= b)
            && self.lt.map_or(true, |b| position < b)
    }
}

/// Nested view of a blueprint outline with children in position order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineTree {
    #[serde(flatten)]
    pub node: OutlineNode,
    pub children: Vec<OutlineTree>,
}

impl OutlineTree {
    /// Build ordered root trees from a flat node list.
    ///
    /// Nodes whose parent is absent from `nodes` are not reachable and are
    /// left out; `check_invariants` reports them.
    pub fn build_forest(nodes: Vec<OutlineNode>) -> Vec<OutlineTree> {
        use std::collections::HashMap;

        let mut adjacency: HashMap<Option<String>, Vec<OutlineNode>> = HashMap::new();
        for node in nodes {
            adjacency.entry(node.parent_id.clone()).or_default().push(node);
        }
        for children in adjacency.values_mut() {
            children.sort_by(OutlineNode::sibling_cmp);
        }

        fn build(
            parent: Option<String>,
            adjacency: &mut HashMap<Option<String>, Vec<OutlineNode>>,
        ) -> Vec<OutlineTree> {
            let children = adjacency.remove(&parent).unwrap_or_default();
            children
                .into_iter()
                .map(|node| {
                    let children = build(Some(node.id.clone()), adjacency);
                    OutlineTree { node, children }
                })
                .collect()
        }

        build(None, &mut adjacency)
    }

    /// Total number of nodes in this subtree, including the root
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(OutlineTree::node_count)
            .sum::<usize>()
    }
}
