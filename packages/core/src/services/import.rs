//! Bulk outline import
//!
//! Extracted outlines arrive as a flat list of rows whose `parent_id`
//! references either another row of the same batch or a node that already
//! exists in the blueprint. [`normalize_import`] validates the batch and turns
//! it into nodes that can be appended without any repositioning:
//!
//! 1. Ids are assigned (generated when absent) and checked for uniqueness
//! 2. Titles and weights are validated
//! 3. Parent references must resolve, and the batch must be acyclic
//! 4. Each group is numbered after the nodes it already holds, ordered by the
//!    provided `position` (stable on input order, missing positions last)
//! 5. Parents are emitted before their children

use crate::models::{validate_weight, OutlineNode, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

/// One row of an extracted outline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedNode {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub weight: i64,
    /// Ordering hint inside the row's group; need not be dense
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default, alias = "parent_id")]
    pub parent_id: Option<String>,
}

impl ImportedNode {
    pub fn new(title: impl Into<String>, weight: i64) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: String::new(),
            weight,
            position: None,
            parent_id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn under(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn at(mut self, position: i64) -> Self {
        self.position = Some(position);
        self
    }
}

/// Validate a batch and produce insert-ready nodes, parents first.
///
/// `existing` holds the blueprint's current nodes.
pub fn normalize_import(
    blueprint_id: &str,
    existing: &[OutlineNode],
    batch: Vec<ImportedNode>,
) -> Result<Vec<OutlineNode>, ValidationError> {
    let existing_ids: HashSet<&str> = existing.iter().map(|n| n.id.as_str()).collect();

    // Ids, uniqueness and payload
    let mut rows: Vec<(String, ImportedNode)> = Vec::with_capacity(batch.len());
    let mut batch_ids: HashSet<String> = HashSet::new();
    for row in batch {
        let id = match &row.id {
            Some(id) if id.trim().is_empty() => return Err(ValidationError::InvalidId(id.clone())),
            Some(id) => id.clone(),
            None => Uuid::new_v4().to_string(),
        };
        if existing_ids.contains(id.as_str()) || !batch_ids.insert(id.clone()) {
            return Err(ValidationError::DuplicateId(id));
        }
        if row.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title".to_string()));
        }
        validate_weight(row.weight)?;
        rows.push((id, row));
    }

    // Parent references
    for (id, row) in &rows {
        if let Some(parent_id) = &row.parent_id {
            if !batch_ids.contains(parent_id) && !existing_ids.contains(parent_id.as_str()) {
                return Err(ValidationError::UnknownParent {
                    node_id: id.clone(),
                    parent_id: parent_id.clone(),
                });
            }
        }
    }

    // Acyclicity inside the batch (existing nodes never point into it)
    let batch_parent: HashMap<&str, &str> = rows
        .iter()
        .filter_map(|(id, row)| {
            row.parent_id
                .as_deref()
                .filter(|p| batch_ids.contains(*p))
                .map(|p| (id.as_str(), p))
        })
        .collect();
    for (id, _) in &rows {
        let mut seen = HashSet::new();
        let mut current = id.as_str();
        while let Some(parent) = batch_parent.get(current) {
            if !seen.insert(current) || *parent == id.as_str() {
                return Err(ValidationError::ImportCycle(id.clone()));
            }
            current = *parent;
        }
    }

    // Dense numbering per group, appended after existing members
    let mut existing_counts: HashMap<Option<&str>, i64> = HashMap::new();
    for node in existing {
        *existing_counts.entry(node.parent_id.as_deref()).or_default() += 1;
    }

    let mut groups: HashMap<Option<String>, Vec<usize>> = HashMap::new();
    for (index, (_, row)) in rows.iter().enumerate() {
        groups.entry(row.parent_id.clone()).or_default().push(index);
    }

    let mut positions = vec![0i64; rows.len()];
    for (parent, mut members) in groups {
        members.sort_by_key(|&i| (rows[i].1.position.unwrap_or(i64::MAX), i));
        let offset = existing_counts
            .get(&parent.as_deref())
            .copied()
            .unwrap_or(0);
        for (rank, index) in members.into_iter().enumerate() {
            positions[index] = offset + rank as i64;
        }
    }

    // Parents first: breadth-first from rows anchored outside the batch
    let mut children: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut queue: VecDeque<usize> = VecDeque::new();
    for (index, (id, _)) in rows.iter().enumerate() {
        match batch_parent.get(id.as_str()) {
            Some(parent) => children.entry(*parent).or_default().push(index),
            None => queue.push_back(index),
        }
    }

    let mut order = Vec::with_capacity(rows.len());
    while let Some(index) = queue.pop_front() {
        order.push(index);
        if let Some(next) = children.get(rows[index].0.as_str()) {
            queue.extend(next.iter().copied());
        }
    }

    let mut slots: Vec<Option<(String, ImportedNode)>> = rows.into_iter().map(Some).collect();
    let nodes = order
        .into_iter()
        .filter_map(|index| {
            let (id, row) = slots[index].take()?;
            Some(
                OutlineNode::new_with_id(
                    id,
                    blueprint_id.to_string(),
                    row.title,
                    row.description,
                    row.weight,
                )
                .placed(row.parent_id, positions[index]),
            )
        })
        .collect();

    Ok(nodes)
}
