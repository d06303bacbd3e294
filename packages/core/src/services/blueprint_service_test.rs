use super::*;
use crate::db::{MemoryStore, StoreWrite};
use crate::operations::{DeletePolicy, TreeOperationError, WeightPolicy};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Barrier;

fn service_with(config: ServiceConfig) -> (Arc<MemoryStore>, BlueprintService) {
    let store = Arc::new(MemoryStore::new());
    let service = BlueprintService::new(store.clone(), config).unwrap();
    (store, service)
}

fn service() -> (Arc<MemoryStore>, BlueprintService) {
    service_with(ServiceConfig::default())
}

async fn titles(service: &BlueprintService, blueprint_id: &str, parent: Option<&str>) -> Vec<String> {
    service
        .list_nodes(blueprint_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|n| n.parent_id.as_deref() == parent)
        .map(|n| n.title)
        .collect()
}

async fn add(
    service: &BlueprintService,
    blueprint_id: &str,
    title: &str,
    parent: Option<&str>,
) -> OutlineNode {
    service
        .insert_node(blueprint_id, NewOutlineNode::new(title, 0), parent, None)
        .await
        .unwrap()
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = ServiceConfig {
        weight_budget: 0,
        ..ServiceConfig::default()
    };
    let result = BlueprintService::new(Arc::new(MemoryStore::new()), config);
    assert!(matches!(
        result,
        Err(BlueprintServiceError::InitializationError(_))
    ));
}

#[tokio::test]
async fn test_blueprint_lifecycle() {
    let (_, service) = service();

    let created = service
        .create_blueprint("  NCLEX-RN  ", "Test plan", "Found on page 4")
        .await
        .unwrap();
    assert_eq!(created.name, "NCLEX-RN");
    assert_eq!(created.ai_notes, "Found on page 4");

    let fetched = service.get_blueprint(&created.id).await.unwrap();
    assert_eq!(fetched, created);

    let updated = service
        .update_blueprint(
            &created.id,
            BlueprintUpdate {
                name: Some("NCLEX-RN 2026".to_string()),
                description: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "NCLEX-RN 2026");
    assert_eq!(updated.description, "Test plan");

    assert_eq!(service.list_blueprints().await.unwrap().len(), 1);
    assert!(service.delete_blueprint(&created.id).await.unwrap());
    assert!(!service.delete_blueprint(&created.id).await.unwrap());
    assert!(service
        .get_blueprint(&created.id)
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_blueprint_validation() {
    let (_, service) = service();

    assert!(matches!(
        service.create_blueprint("   ", "", "").await,
        Err(BlueprintServiceError::ValidationFailed(_))
    ));

    let bp = service.create_blueprint("Step 1", "", "").await.unwrap();
    assert!(matches!(
        service
            .update_blueprint(&bp.id, BlueprintUpdate::default())
            .await,
        Err(BlueprintServiceError::InvalidUpdate(_))
    ));
    assert!(matches!(
        service
            .update_blueprint(
                "missing",
                BlueprintUpdate {
                    name: Some("x".to_string()),
                    description: None
                }
            )
            .await,
        Err(BlueprintServiceError::BlueprintNotFound { .. })
    ));
}

#[tokio::test]
async fn test_delete_blueprint_removes_its_nodes() {
    let (store, service) = service();
    let bp = service.create_blueprint("Step 1", "", "").await.unwrap();
    let root = add(&service, &bp.id, "Cardio", None).await;
    add(&service, &bp.id, "Valves", Some(&root.id)).await;

    service.delete_blueprint(&bp.id).await.unwrap();
    assert!(store.list_nodes(&bp.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_insert_requires_existing_blueprint() {
    let (_, service) = service();
    let err = service
        .insert_node("ghost", NewOutlineNode::new("Orphan", 0), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, BlueprintServiceError::BlueprintNotFound { .. }));
}

#[tokio::test]
async fn test_tree_is_ordered_by_position() {
    let (_, service) = service();
    let bp = service.create_blueprint("Step 1", "", "").await.unwrap();
    let cardio = add(&service, &bp.id, "Cardio", None).await;
    add(&service, &bp.id, "Renal", None).await;
    add(&service, &bp.id, "Valves", Some(&cardio.id)).await;
    service
        .insert_node(&bp.id, NewOutlineNode::new("Rhythm", 0), Some(&cardio.id), Some(0))
        .await
        .unwrap();

    let tree = service.get_tree(&bp.id).await.unwrap();
    let roots: Vec<&str> = tree.iter().map(|t| t.node.title.as_str()).collect();
    assert_eq!(roots, ["Cardio", "Renal"]);

    let children: Vec<&str> = tree[0]
        .children
        .iter()
        .map(|t| t.node.title.as_str())
        .collect();
    assert_eq!(children, ["Rhythm", "Valves"]);
}

#[tokio::test]
async fn test_update_node_never_moves_it() {
    let (_, service) = service();
    let bp = service.create_blueprint("Step 1", "", "").await.unwrap();
    add(&service, &bp.id, "A", None).await;
    let b = add(&service, &bp.id, "B", None).await;

    let updated = service
        .update_node(
            &b.id,
            NodePayloadUpdate {
                title: Some("B renamed".to_string()),
                weight: Some(40),
                ..NodePayloadUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.position, 1);
    assert_eq!(updated.parent_id, None);
    assert_eq!(updated.weight, 40);
    assert_eq!(titles(&service, &bp.id, None).await, ["A", "B renamed"]);

    assert!(matches!(
        service
            .update_node(&b.id, NodePayloadUpdate::default())
            .await,
        Err(BlueprintServiceError::InvalidUpdate(_))
    ));
    assert!(service
        .update_node(
            "missing",
            NodePayloadUpdate {
                description: Some("x".to_string()),
                ..NodePayloadUpdate::default()
            }
        )
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_weight_budget_enforced_on_update() {
    let (_, service) = service_with(ServiceConfig {
        weight_policy: WeightPolicy::Enforce,
        ..ServiceConfig::default()
    });
    let bp = service.create_blueprint("Step 1", "", "").await.unwrap();
    let a = service
        .insert_node(&bp.id, NewOutlineNode::new("A", 60), None, None)
        .await
        .unwrap();
    service
        .insert_node(&bp.id, NewOutlineNode::new("B", 30), None, None)
        .await
        .unwrap();

    // Replacing A's own weight: 70 + 30 fits
    service
        .update_node(
            &a.id,
            NodePayloadUpdate {
                weight: Some(70),
                ..NodePayloadUpdate::default()
            },
        )
        .await
        .unwrap();

    let err = service
        .update_node(
            &a.id,
            NodePayloadUpdate {
                weight: Some(80),
                ..NodePayloadUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BlueprintServiceError::TreeOperation(TreeOperationError::WeightBudgetExceeded {
            total: 110,
            ..
        })
    ));
}

#[tokio::test]
async fn test_move_and_delete_through_service() {
    let (_, service) = service_with(ServiceConfig {
        delete_policy: DeletePolicy::PromoteChildren,
        ..ServiceConfig::default()
    });
    let bp = service.create_blueprint("Step 1", "", "").await.unwrap();
    let a = add(&service, &bp.id, "A", None).await;
    let b = add(&service, &bp.id, "B", None).await;
    add(&service, &bp.id, "C", None).await;
    add(&service, &bp.id, "B1", Some(&b.id)).await;
    add(&service, &bp.id, "B2", Some(&b.id)).await;

    let outcome = service
        .move_node(&a.id, 2, ParentTarget::Unchanged)
        .await
        .unwrap();
    assert_eq!(outcome.node.position, 2);
    assert_eq!(titles(&service, &bp.id, None).await, ["B", "C", "A"]);

    let deleted = service.delete_node(&b.id).await.unwrap();
    assert_eq!(deleted.deleted, vec![b.id.clone()]);
    assert_eq!(deleted.promoted.len(), 2);
    assert_eq!(titles(&service, &bp.id, None).await, ["B1", "B2", "C", "A"]);
    assert!(service.check_invariants(&bp.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_import_outline_appends_tree() {
    let (_, service) = service();
    let bp = service.create_blueprint("Step 1", "", "").await.unwrap();
    add(&service, &bp.id, "Existing", None).await;

    let created = service
        .import_outline(
            &bp.id,
            vec![
                ImportedNode::new("Valves", 10).with_id("valves").under("cardio"),
                ImportedNode::new("Cardio", 30).with_id("cardio"),
                ImportedNode::new("Renal", 20).with_id("renal"),
            ],
        )
        .await
        .unwrap();
    assert_eq!(created.len(), 3);
    assert_eq!(created[0].id, "cardio");

    assert_eq!(
        titles(&service, &bp.id, None).await,
        ["Existing", "Cardio", "Renal"]
    );
    assert_eq!(titles(&service, &bp.id, Some("cardio")).await, ["Valves"]);
    assert!(service.check_invariants(&bp.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_import_writes_nothing() {
    let (store, service) = service();
    let bp = service.create_blueprint("Step 1", "", "").await.unwrap();

    let err = service
        .import_outline(
            &bp.id,
            vec![
                ImportedNode::new("Fine", 10),
                ImportedNode::new("Lost", 10).under("nowhere"),
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BlueprintServiceError::ValidationFailed(_)));
    assert!(store.list_nodes(&bp.id).await.unwrap().is_empty());
    assert!(service.import_outline(&bp.id, Vec::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_import_reports_bulk_failure() {
    let (store, service) = service();
    let bp = service.create_blueprint("Step 1", "", "").await.unwrap();
    store.fail_writes_after(1);

    let err = service
        .import_outline(
            &bp.id,
            vec![ImportedNode::new("One", 10), ImportedNode::new("Two", 10)],
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BlueprintServiceError::BulkOperationFailed { .. }
    ));
}

#[tokio::test]
async fn test_repair_blueprint_after_partial_failure() {
    let (store, service) = service();
    let bp = service.create_blueprint("Step 1", "", "").await.unwrap();
    for title in ["A", "B", "C", "D"] {
        add(&service, &bp.id, title, None).await;
    }
    let first = service.list_nodes(&bp.id).await.unwrap()[0].clone();

    // The first shift lands, the rest of the plan does not
    store.fail_writes_after(1);
    let err = service
        .move_node(&first.id, 3, ParentTarget::Unchanged)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BlueprintServiceError::TreeOperation(TreeOperationError::StoreFailure { .. })
    ));
    assert!(!service.check_invariants(&bp.id).await.unwrap().is_empty());

    store.clear_failures();
    let report = service.repair_blueprint(&bp.id).await.unwrap();
    assert_eq!(report.groups_checked, 1);
    assert_eq!(report.groups_repaired, 1);
    assert!(service.check_invariants(&bp.id).await.unwrap().is_empty());

    let again = service.repair_blueprint(&bp.id).await.unwrap();
    assert_eq!(again.writes, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_moves_keep_groups_dense() {
    let (_, service) = service();
    let service = Arc::new(service);
    let bp = service.create_blueprint("Step 1", "", "").await.unwrap();
    let mut ids = Vec::new();
    for i in 0..8 {
        ids.push(add(&service, &bp.id, &format!("T{}", i), None).await.id);
    }

    let mut handles = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        let service = service.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            for round in 0..5 {
                let target = ((i * 3 + round) % 8) as i64;
                service
                    .move_node(&id, target, ParentTarget::Unchanged)
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut positions: Vec<i64> = service
        .list_nodes(&bp.id)
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.position)
        .collect();
    positions.sort_unstable();
    assert_eq!(positions, (0..8).collect::<Vec<i64>>());
}

/// Store whose first two sibling scans after `arm()` wait for each other.
///
/// Two operations that are not serialized both finish validating before
/// either one writes. Serialized operations only pay the timeout.
struct RendezvousStore {
    inner: MemoryStore,
    armed: AtomicBool,
    arrivals: AtomicUsize,
    barrier: Barrier,
}

impl RendezvousStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            armed: AtomicBool::new(false),
            arrivals: AtomicUsize::new(0),
            barrier: Barrier::new(2),
        }
    }

    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl NodeStore for RendezvousStore {
    async fn create_blueprint(&self, blueprint: Blueprint) -> anyhow::Result<Blueprint> {
        self.inner.create_blueprint(blueprint).await
    }

    async fn get_blueprint(&self, id: &str) -> anyhow::Result<Option<Blueprint>> {
        self.inner.get_blueprint(id).await
    }

    async fn list_blueprints(&self) -> anyhow::Result<Vec<Blueprint>> {
        self.inner.list_blueprints().await
    }

    async fn update_blueprint(&self, id: &str, update: BlueprintUpdate) -> anyhow::Result<Blueprint> {
        self.inner.update_blueprint(id, update).await
    }

    async fn delete_blueprint(&self, id: &str) -> anyhow::Result<bool> {
        self.inner.delete_blueprint(id).await
    }

    async fn get_node(&self, id: &str) -> anyhow::Result<Option<OutlineNode>> {
        self.inner.get_node(id).await
    }

    async fn list_siblings(
        &self,
        group: &SiblingGroup,
        range: PositionRange,
    ) -> anyhow::Result<Vec<OutlineNode>> {
        if self.armed.load(Ordering::SeqCst) && self.arrivals.fetch_add(1, Ordering::SeqCst) < 2 {
            let _ = tokio::time::timeout(Duration::from_millis(200), self.barrier.wait()).await;
        }
        self.inner.list_siblings(group, range).await
    }

    async fn list_nodes(&self, blueprint_id: &str) -> anyhow::Result<Vec<OutlineNode>> {
        self.inner.list_nodes(blueprint_id).await
    }

    async fn list_children(&self, id: &str) -> anyhow::Result<Vec<OutlineNode>> {
        self.inner.list_children(id).await
    }

    async fn insert_node(&self, node: OutlineNode) -> anyhow::Result<OutlineNode> {
        self.inner.insert_node(node).await
    }

    async fn update_position(&self, id: &str, position: i64) -> anyhow::Result<()> {
        self.inner.update_position(id, position).await
    }

    async fn relocate_node(
        &self,
        id: &str,
        parent_id: Option<&str>,
        position: i64,
    ) -> anyhow::Result<()> {
        self.inner.relocate_node(id, parent_id, position).await
    }

    async fn update_payload(
        &self,
        id: &str,
        update: NodePayloadUpdate,
    ) -> anyhow::Result<OutlineNode> {
        self.inner.update_payload(id, update).await
    }

    async fn delete_node(&self, id: &str) -> anyhow::Result<bool> {
        self.inner.delete_node(id).await
    }

    fn supports_transactions(&self) -> bool {
        self.inner.supports_transactions()
    }

    async fn apply_in_transaction(&self, writes: &[StoreWrite]) -> anyhow::Result<()> {
        self.inner.apply_in_transaction(writes).await
    }
}

fn rendezvous_service() -> (Arc<RendezvousStore>, BlueprintService) {
    let store = Arc::new(RendezvousStore::new());
    let service = BlueprintService::new(store.clone(), ServiceConfig::default()).unwrap();
    (store, service)
}

#[tokio::test]
async fn test_crossing_moves_cannot_create_a_cycle() {
    let (store, service) = rendezvous_service();
    let bp = service.create_blueprint("Step 1", "", "").await.unwrap();
    let c = add(&service, &bp.id, "C", None).await;
    let a = add(&service, &bp.id, "A", None).await;
    let b = add(&service, &bp.id, "B", Some(&c.id)).await;
    store.arm();

    // Source and destination groups of the two moves are disjoint
    let (a_under_b, b_under_a) = tokio::join!(
        service.move_node(&a.id, 0, ParentTarget::Node(b.id.clone())),
        service.move_node(&b.id, 0, ParentTarget::Node(a.id.clone())),
    );

    let failures: Vec<_> = [a_under_b, b_under_a]
        .into_iter()
        .filter_map(|r| r.err())
        .collect();
    assert_eq!(failures.len(), 1, "exactly one move must be refused");
    assert!(matches!(
        failures[0],
        BlueprintServiceError::TreeOperation(TreeOperationError::CycleDetected { .. })
    ));

    let violations = service.check_invariants(&bp.id).await.unwrap();
    assert!(violations.is_empty(), "violations: {:?}", violations);
}

#[tokio::test]
async fn test_cascade_delete_and_grandchild_insert_do_not_interleave() {
    let (store, service) = rendezvous_service();
    let bp = service.create_blueprint("Step 1", "", "").await.unwrap();
    let p = add(&service, &bp.id, "P", None).await;
    let c = add(&service, &bp.id, "C", Some(&p.id)).await;
    store.arm();

    let (deleted, inserted) = tokio::join!(
        service.delete_node(&p.id),
        service.insert_node(&bp.id, NewOutlineNode::new("Late", 0), Some(&c.id), None),
    );
    deleted.unwrap();
    if let Err(err) = inserted {
        assert!(err.is_not_found(), "unexpected insert failure: {}", err);
    }

    // Whichever ran first, nothing survives under the deleted subtree
    assert!(service.list_nodes(&bp.id).await.unwrap().is_empty());
    let violations = service.check_invariants(&bp.id).await.unwrap();
    assert!(violations.is_empty(), "violations: {:?}", violations);
}
