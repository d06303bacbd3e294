//! Per-group serialization for structural operations
//!
//! Two concurrent operations on the same sibling group can both read the
//! group, compute plans from the same snapshot and interleave their writes,
//! which breaks contiguity. The engine itself is lock-free; callers that may
//! run operations concurrently acquire the touched groups here first.
//!
//! Group locks alone do not protect ancestry. A move between groups checks
//! the target's ancestor chain, and a cascade delete removes groups it never
//! locked. Those operations also take the blueprint's structure lock in
//! [`StructureAccess::Exclusive`] mode; every other edit holds it shared.
//! The structure lock is always acquired before any group lock.
//!
//! # Example
//!
//! ```rust
//! use blueprint_core::models::SiblingGroup;
//! use blueprint_core::operations::SiblingLocks;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let locks = SiblingLocks::new();
//! let source = SiblingGroup::under("bp-1", "cardio");
//! let destination = SiblingGroup::root("bp-1");
//!
//! // Both groups are acquired in sorted order, whatever order they are passed in
//! let _guard = locks.lock([destination, source]).await;
//! # }
//! ```

use crate::models::SiblingGroup;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Registry size above which idle entries are dropped on the next lock
const PRUNE_THRESHOLD: usize = 1024;

/// How an operation holds its blueprint's structure lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureAccess {
    /// Edits confined to the groups they lock
    Shared,
    /// Moves between groups and deletes that drop or relocate children
    Exclusive,
}

/// Keyed registry of async mutexes, one per sibling group, plus one
/// reader-writer lock per blueprint
#[derive(Debug, Default)]
pub struct SiblingLocks {
    locks: Mutex<HashMap<SiblingGroup, Arc<Mutex<()>>>>,
    structures: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

#[derive(Debug)]
enum StructureHold {
    Shared(OwnedRwLockReadGuard<()>),
    Exclusive(OwnedRwLockWriteGuard<()>),
}

/// Holds every lock of one operation until dropped
#[derive(Debug)]
pub struct SiblingGuard {
    groups: Vec<SiblingGroup>,
    _guards: Vec<OwnedMutexGuard<()>>,
    // Field order matters: released after the group guards
    structure: Option<StructureHold>,
}

impl SiblingGuard {
    /// Groups held by this guard, in acquisition order
    pub fn groups(&self) -> &[SiblingGroup] {
        &self.groups
    }

    /// Whether `group` is covered by this guard
    pub fn covers(&self, group: &SiblingGroup) -> bool {
        self.groups.binary_search(group).is_ok()
    }

    /// Structure lock mode held, `None` for a group-only guard
    pub fn structure_access(&self) -> Option<StructureAccess> {
        self.structure.as_ref().map(|hold| match hold {
            StructureHold::Shared(_) => StructureAccess::Shared,
            StructureHold::Exclusive(_) => StructureAccess::Exclusive,
        })
    }
}

impl SiblingLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire all `groups`, always in sorted order so that two operations
    /// touching the same pair of groups cannot deadlock.
    pub async fn lock(&self, groups: impl IntoIterator<Item = SiblingGroup>) -> SiblingGuard {
        self.acquire_groups(groups, None).await
    }

    /// Acquire `blueprint_id`'s structure lock in `access` mode, then `groups`
    pub async fn lock_in(
        &self,
        blueprint_id: &str,
        access: StructureAccess,
        groups: impl IntoIterator<Item = SiblingGroup>,
    ) -> SiblingGuard {
        let structure = {
            let mut registry = self.structures.lock().await;
            if registry.len() > PRUNE_THRESHOLD {
                registry.retain(|_, l| Arc::strong_count(l) > 1);
            }
            registry.entry(blueprint_id.to_string()).or_default().clone()
        };

        let hold = match access {
            StructureAccess::Shared => StructureHold::Shared(structure.read_owned().await),
            StructureAccess::Exclusive => {
                tracing::debug!("Taking exclusive structure lock of blueprint {}", blueprint_id);
                StructureHold::Exclusive(structure.write_owned().await)
            }
        };
        self.acquire_groups(groups, Some(hold)).await
    }

    async fn acquire_groups(
        &self,
        groups: impl IntoIterator<Item = SiblingGroup>,
        structure: Option<StructureHold>,
    ) -> SiblingGuard {
        let mut groups: Vec<SiblingGroup> = groups.into_iter().collect();
        groups.sort();
        groups.dedup();

        let mutexes: Vec<Arc<Mutex<()>>> = {
            let mut registry = self.locks.lock().await;
            if registry.len() > PRUNE_THRESHOLD {
                registry.retain(|_, m| Arc::strong_count(m) > 1);
            }
            groups
                .iter()
                .map(|g| registry.entry(g.clone()).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }

        tracing::debug!("Acquired {} sibling group lock(s)", groups.len());
        SiblingGuard {
            groups,
            _guards: guards,
            structure,
        }
    }

    /// Number of groups currently tracked
    pub async fn tracked_groups(&self) -> usize {
        self.locks.lock().await.len()
    }
}
