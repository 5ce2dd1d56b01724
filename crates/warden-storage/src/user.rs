//! A loaded user and their materialized permission data.
//!
//! A [`User`] is the in-memory form of a [`UserRecord`]: the same groups and
//! nodes, plus a cache of permission snapshots keyed by [`Contexts`]. The
//! cache is what "materialized" means here: computing a snapshot walks all
//! nodes once, after that every check in the same context is a map lookup.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use warden_protocol::{Contexts, PlayerId};

use crate::{Node, UserRecord};

/// Resolved permission values for one context: node name → granted?
pub type PermissionSnapshot = HashMap<String, bool>;

/// Node that grants everything not explicitly set.
const WILDCARD: &str = "*";

#[derive(Debug)]
struct UserState {
    name: String,
    primary_group: String,
    groups: BTreeSet<String>,
    nodes: Vec<Node>,
}

/// A user whose data is currently held in memory.
///
/// Shared as `Arc<User>` between the loaded-user registry, the permission
/// wrapper attached to the live connection, and background pre-computation
/// tasks, so all mutation goes through interior locks.
#[derive(Debug)]
pub struct User {
    id: PlayerId,
    state: Mutex<UserState>,
    cache: Mutex<HashMap<Contexts, Arc<PermissionSnapshot>>>,
}

impl User {
    pub fn from_record(record: UserRecord) -> Self {
        Self {
            id: record.id,
            state: Mutex::new(UserState {
                name: record.name,
                primary_group: record.primary_group,
                groups: record.groups,
                nodes: record.nodes,
            }),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Snapshot of the user's data in persisted form.
    pub fn to_record(&self) -> UserRecord {
        let state = self.state();
        UserRecord {
            id: self.id,
            name: state.name.clone(),
            primary_group: state.primary_group.clone(),
            groups: state.groups.clone(),
            nodes: state.nodes.clone(),
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn name(&self) -> String {
        self.state().name.clone()
    }

    pub fn primary_group(&self) -> String {
        self.state().primary_group.clone()
    }

    pub fn set_primary_group(&self, group: impl Into<String>) {
        self.state().primary_group = group.into();
    }

    /// Case-insensitive group membership check.
    pub fn is_in_group(&self, group: &str) -> bool {
        self.state()
            .groups
            .iter()
            .any(|g| g.eq_ignore_ascii_case(group))
    }

    /// Adds a node and drops every cached snapshot, since any of them may
    /// now be stale.
    pub fn add_node(&self, node: Node) {
        self.state().nodes.push(node);
        self.invalidate_caches();
    }

    /// Looks up a single node in the given context.
    ///
    /// Returns `None` when nothing (not even the wildcard) decides it.
    pub fn permission_value(&self, permission: &str, contexts: &Contexts) -> Option<bool> {
        let snapshot = self.snapshot(contexts);
        snapshot
            .get(permission)
            .or_else(|| snapshot.get(WILDCARD))
            .copied()
    }

    /// Returns the resolved permissions for `contexts`, computing and caching
    /// them on first use.
    pub fn snapshot(&self, contexts: &Contexts) -> Arc<PermissionSnapshot> {
        if let Some(cached) = self.cache_lock().get(contexts) {
            return Arc::clone(cached);
        }

        // Computed outside the cache lock; two racing callers may both
        // compute, the second insert just wins.
        let computed = Arc::new(self.compute(contexts));
        self.cache_lock()
            .insert(contexts.clone(), Arc::clone(&computed));
        computed
    }

    /// Fills the cache for every context in `contexts` ahead of time.
    pub fn pre_calculate(&self, contexts: &[Contexts]) {
        for ctx in contexts {
            self.snapshot(ctx);
        }
        tracing::trace!(player_id = %self.id, count = contexts.len(), "pre-calculated permission data");
    }

    /// Drops every cached snapshot.
    pub fn invalidate_caches(&self) {
        self.cache_lock().clear();
    }

    /// Number of contexts with a cached snapshot.
    pub fn cached_contexts(&self) -> usize {
        self.cache_lock().len()
    }

    /// Global nodes first, then nodes for the current world on top.
    fn compute(&self, contexts: &Contexts) -> PermissionSnapshot {
        let state = self.state();
        let mut snapshot = PermissionSnapshot::new();

        for node in state.nodes.iter().filter(|n| n.world.is_none()) {
            snapshot.insert(node.permission.clone(), node.value);
        }
        if let Some(world) = &contexts.world {
            for node in state
                .nodes
                .iter()
                .filter(|n| n.world.as_deref() == Some(world.as_str()))
            {
                snapshot.insert(node.permission.clone(), node.value);
            }
        }
        snapshot
    }

    fn state(&self) -> std::sync::MutexGuard<'_, UserState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cache_lock(&self) -> std::sync::MutexGuard<'_, HashMap<Contexts, Arc<PermissionSnapshot>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
