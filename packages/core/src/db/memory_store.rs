//! MemoryStore - In-process NodeStore implementation
//!
//! Keeps blueprints and nodes in hash maps behind a `tokio::sync::RwLock`.
//! Used by tests, benchmarks and embedders that don't need durability.
//!
//! Two knobs make it useful for exercising the engine's failure handling:
//!
//! - [`MemoryStore::transactional`] builds a store whose
//!   `apply_in_transaction` stages writes on a copy and swaps it in only when
//!   every write succeeded.
//! - [`MemoryStore::fail_writes_after`] lets the next `n` writes succeed and
//!   fails every write after that, simulating a connectivity loss mid-plan.

use crate::db::node_store::{NodeStore, StoreWrite};
use crate::models::{
    Blueprint, BlueprintUpdate, NodePayloadUpdate, OutlineNode, PositionRange, SiblingGroup,
};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    blueprints: HashMap<String, Blueprint>,
    nodes: HashMap<String, OutlineNode>,
}

impl MemoryState {
    fn node_mut(&mut self, id: &str) -> Result<&mut OutlineNode> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| anyhow!("node '{}' not found", id))
    }

    fn insert(&mut self, node: OutlineNode) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            bail!("node '{}' already exists", node.id);
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    fn apply(&mut self, write: &StoreWrite) -> Result<()> {
        match write {
            StoreWrite::SetPosition { id, to, .. } => {
                let node = self.node_mut(id)?;
                node.position = *to;
                node.modified_at = Utc::now();
            }
            StoreWrite::Relocate {
                id,
                parent_id,
                position,
            } => {
                let node = self.node_mut(id)?;
                node.parent_id = parent_id.clone();
                node.position = *position;
                node.modified_at = Utc::now();
            }
            StoreWrite::Insert(node) => self.insert(node.clone())?,
            StoreWrite::Delete { id } => {
                self.nodes.remove(id);
            }
        }
        Ok(())
    }
}

/// In-memory store with optional transaction support and failure injection
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    transactional: bool,
    /// Successful node writes since creation
    write_count: AtomicUsize,
    /// Remaining writes before injected failures start (-1 = never fail)
    writes_until_failure: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Store without transaction support: plans are applied write by write
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            transactional: false,
            write_count: AtomicUsize::new(0),
            writes_until_failure: AtomicI64::new(-1),
        }
    }

    /// Store whose `apply_in_transaction` is all-or-nothing
    pub fn transactional() -> Self {
        Self {
            transactional: true,
            ..Self::new()
        }
    }

    /// Allow `n` more successful writes, then fail every following write
    pub fn fail_writes_after(&self, n: usize) {
        self.writes_until_failure
            .store(n as i64, Ordering::SeqCst);
    }

    /// Stop injecting failures
    pub fn clear_failures(&self) {
        self.writes_until_failure.store(-1, Ordering::SeqCst);
    }

    /// Number of successful node writes so far
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    /// Gate every node write through the failure injector
    fn admit_write(&self, write: &StoreWrite) -> Result<()> {
        let admitted = self
            .writes_until_failure
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                match remaining {
                    0 => None,
                    r if r < 0 => Some(r),
                    r => Some(r - 1),
                }
            });
        if admitted.is_err() {
            bail!(
                "injected store failure during {} of node '{}'",
                write.operation(),
                write.node_id()
            );
        }
        Ok(())
    }

    async fn write(&self, write: StoreWrite) -> Result<()> {
        self.admit_write(&write)?;
        let mut state = self.state.write().await;
        state.apply(&write)?;
        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn create_blueprint(&self, blueprint: Blueprint) -> Result<Blueprint> {
        let mut state = self.state.write().await;
        if state.blueprints.contains_key(&blueprint.id) {
            bail!("blueprint '{}' already exists", blueprint.id);
        }
        state
            .blueprints
            .insert(blueprint.id.clone(), blueprint.clone());
        Ok(blueprint)
    }

    async fn get_blueprint(&self, id: &str) -> Result<Option<Blueprint>> {
        Ok(self.state.read().await.blueprints.get(id).cloned())
    }

    async fn list_blueprints(&self) -> Result<Vec<Blueprint>> {
        let mut blueprints: Vec<Blueprint> =
            self.state.read().await.blueprints.values().cloned().collect();
        blueprints.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(blueprints)
    }

    async fn update_blueprint(&self, id: &str, update: BlueprintUpdate) -> Result<Blueprint> {
        let mut state = self.state.write().await;
        let blueprint = state
            .blueprints
            .get_mut(id)
            .ok_or_else(|| anyhow!("blueprint '{}' not found", id))?;
        update.apply_to(blueprint);
        Ok(blueprint.clone())
    }

    async fn delete_blueprint(&self, id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let existed = state.blueprints.remove(id).is_some();
        state.nodes.retain(|_, node| node.blueprint_id != id);
        Ok(existed)
    }

    async fn get_node(&self, id: &str) -> Result<Option<OutlineNode>> {
        Ok(self.state.read().await.nodes.get(id).cloned())
    }

    async fn list_siblings(
        &self,
        group: &SiblingGroup,
        range: PositionRange,
    ) -> Result<Vec<OutlineNode>> {
        let state = self.state.read().await;
        let mut siblings: Vec<OutlineNode> = state
            .nodes
            .values()
            .filter(|n| {
                n.blueprint_id == group.blueprint_id
                    && n.parent_id == group.parent_id
                    && range.contains(n.position)
            })
            .cloned()
            .collect();
        siblings.sort_by(OutlineNode::sibling_cmp);
        Ok(siblings)
    }

    async fn list_nodes(&self, blueprint_id: &str) -> Result<Vec<OutlineNode>> {
        let state = self.state.read().await;
        let mut nodes: Vec<OutlineNode> = state
            .nodes
            .values()
            .filter(|n| n.blueprint_id == blueprint_id)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| {
            a.parent_id
                .cmp(&b.parent_id)
                .then_with(|| OutlineNode::sibling_cmp(a, b))
        });
        Ok(nodes)
    }

    async fn list_children(&self, id: &str) -> Result<Vec<OutlineNode>> {
        let state = self.state.read().await;
        let mut children: Vec<OutlineNode> = state
            .nodes
            .values()
            .filter(|n| n.parent_id.as_deref() == Some(id))
            .cloned()
            .collect();
        children.sort_by(OutlineNode::sibling_cmp);
        Ok(children)
    }

    async fn insert_node(&self, node: OutlineNode) -> Result<OutlineNode> {
        self.write(StoreWrite::Insert(node.clone())).await?;
        Ok(node)
    }

    async fn update_position(&self, id: &str, position: i64) -> Result<()> {
        self.write(StoreWrite::SetPosition {
            id: id.to_string(),
            from: position,
            to: position,
        })
        .await
    }

    async fn relocate_node(&self, id: &str, parent_id: Option<&str>, position: i64) -> Result<()> {
        self.write(StoreWrite::Relocate {
            id: id.to_string(),
            parent_id: parent_id.map(str::to_string),
            position,
        })
        .await
    }

    async fn update_payload(&self, id: &str, update: NodePayloadUpdate) -> Result<OutlineNode> {
        let mut state = self.state.write().await;
        let node = state.node_mut(id)?;
        update.apply_to(node);
        Ok(node.clone())
    }

    async fn delete_node(&self, id: &str) -> Result<bool> {
        let existed = self.state.read().await.nodes.contains_key(id);
        if existed {
            self.write(StoreWrite::Delete { id: id.to_string() }).await?;
        }
        Ok(existed)
    }

    fn supports_transactions(&self) -> bool {
        self.transactional
    }

    async fn apply_in_transaction(&self, writes: &[StoreWrite]) -> Result<()> {
        if !self.transactional {
            bail!("this store does not support transactions");
        }

        let mut state = self.state.write().await;
        let mut staged = state.clone();
        for write in writes {
            self.admit_write(write)?;
            staged.apply(write)?;
        }
        *state = staged;
        self.write_count.fetch_add(writes.len(), Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, parent: Option<&str>, position: i64) -> OutlineNode {
        OutlineNode::new_with_id(
            id.to_string(),
            "bp".to_string(),
            id.to_string(),
            String::new(),
            0,
        )
        .placed(parent.map(str::to_string), position)
    }

    #[tokio::test]
    async fn test_list_siblings_filters_by_group_and_range() {
        let store = MemoryStore::new();
        for (id, pos) in [("a", 0), ("b", 1), ("c", 2)] {
            store.insert_node(node(id, Some("p"), pos)).await.unwrap();
        }
        store.insert_node(node("x", None, 0)).await.unwrap();

        let group = SiblingGroup::under("bp", "p");
        let tail = store
            .list_siblings(&group, PositionRange::all().after(0))
            .await
            .unwrap();
        let ids: Vec<_> = tail.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);

        let roots = store
            .list_siblings(&SiblingGroup::root("bp"), PositionRange::all())
            .await
            .unwrap();
        assert_eq!(roots.len(), 1);

        let other = store
            .list_siblings(&SiblingGroup::root("other"), PositionRange::all())
            .await
            .unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_insert_fails() {
        let store = MemoryStore::new();
        store.insert_node(node("a", None, 0)).await.unwrap();
        assert!(store.insert_node(node("a", None, 1)).await.is_err());
    }

    #[tokio::test]
    async fn test_failure_injection_counts_writes() {
        let store = MemoryStore::new();
        store.fail_writes_after(1);
        store.insert_node(node("a", None, 0)).await.unwrap();
        let err = store.insert_node(node("b", None, 1)).await.unwrap_err();
        assert!(err.to_string().contains("injected store failure"));
        assert_eq!(store.write_count(), 1);

        store.clear_failures();
        store.insert_node(node("b", None, 1)).await.unwrap();
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_transaction_is_all_or_nothing() {
        let store = MemoryStore::transactional();
        store.insert_node(node("a", None, 0)).await.unwrap();
        store.fail_writes_after(1);

        let writes = vec![
            StoreWrite::SetPosition {
                id: "a".to_string(),
                from: 0,
                to: 1,
            },
            StoreWrite::Insert(node("b", None, 0)),
        ];
        assert!(store.apply_in_transaction(&writes).await.is_err());

        let a = store.get_node("a").await.unwrap().unwrap();
        assert_eq!(a.position, 0, "staged shift must be discarded");
        assert!(store.get_node("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_blueprint_removes_nodes() {
        let store = MemoryStore::new();
        let bp = store
            .create_blueprint(Blueprint::new("BP".into(), String::new(), String::new()))
            .await
            .unwrap();
        let mut n = node("a", None, 0);
        n.blueprint_id = bp.id.clone();
        store.insert_node(n).await.unwrap();

        assert!(store.delete_blueprint(&bp.id).await.unwrap());
        assert!(store.get_node("a").await.unwrap().is_none());
        assert!(!store.delete_blueprint(&bp.id).await.unwrap());
    }
}
