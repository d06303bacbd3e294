//! Performance benchmarks for the reposition engine
//!
//! Run with: `cargo bench -p blueprint-core`
//!
//! These benchmarks measure:
//! - Pure move planning over large sibling groups
//! - Repair planning over a shuffled group
//! - End-to-end moves through TreeEngine + MemoryStore

use blueprint_core::db::MemoryStore;
use blueprint_core::models::{NewOutlineNode, OutlineNode, ParentTarget, SiblingGroup};
use blueprint_core::operations::{reposition, TreeEngine};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn group_of(size: usize, parent: Option<&str>) -> Vec<OutlineNode> {
    (0..size)
        .map(|i| {
            OutlineNode::new_with_id(
                format!("{}-{}", parent.unwrap_or("root"), i),
                "bench".to_string(),
                format!("Topic {}", i),
                String::new(),
                1,
            )
            .placed(parent.map(str::to_string), i as i64)
        })
        .collect()
}

fn bench_plan_move(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_move");

    for size in [10usize, 100, 1000] {
        let siblings = group_of(size, Some("p"));
        let destination = group_of(size, Some("q"));
        let first = siblings[0].clone();

        group.bench_with_input(BenchmarkId::new("within_parent", size), &size, |b, &size| {
            b.iter(|| {
                reposition::plan_move(
                    black_box(&first),
                    Some("p"),
                    black_box(size as i64 - 1),
                    &siblings,
                    &[],
                )
                .unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("across_parents", size), &size, |b, _| {
            b.iter(|| {
                reposition::plan_move(black_box(&first), Some("q"), 0, &siblings, &destination)
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_plan_repair(c: &mut Criterion) {
    let mut siblings = group_of(1000, None);
    // Reverse order with gaps
    for (i, node) in siblings.iter_mut().enumerate() {
        node.position = ((1000 - i) * 3) as i64;
    }
    let group = SiblingGroup::root("bench");

    c.bench_function("plan_repair_1000_shuffled", |b| {
        b.iter(|| reposition::plan_repair(black_box(&group), black_box(&siblings)))
    });
}

fn bench_engine_move(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let engine = TreeEngine::new(store);

    rt.block_on(async {
        for i in 0..200 {
            engine
                .insert_node("bench", NewOutlineNode::new(format!("Topic {}", i), 0), None, None)
                .await
                .unwrap();
        }
    });

    c.bench_function("engine_move_first_to_last_200", |b| {
        b.iter(|| {
            rt.block_on(async {
                let node = engine
                    .store()
                    .list_siblings(&SiblingGroup::root("bench"), Default::default())
                    .await
                    .unwrap()
                    .remove(0);
                engine
                    .move_node(black_box(&node.id), 199, ParentTarget::Unchanged)
                    .await
                    .unwrap()
            })
        })
    });
}

criterion_group!(benches, bench_plan_move, bench_plan_repair, bench_engine_move);
criterion_main!(benches);
