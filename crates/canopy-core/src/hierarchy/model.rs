//! The materialized entity hierarchy.
//!
//! [`HierarchyModel`] indexes the current [`EntityNode`] for every
//! materialized entity and keeps parent/child adjacency in both directions.
//!
//! # Invariants
//!
//! - At most one node per entity identity.
//! - Every edge joins two indexed nodes. An edge whose parent is not yet
//!   indexed is parked (see [`OrphanPolicy`]) and only becomes visible once
//!   the parent appears.
//! - Nodes are stored behind [`Arc`] and never mutated in place. A reader
//!   that obtained a node keeps a complete value even after the model moves
//!   on.
//!
//! # Scope
//!
//! A node stays in scope while it is a root or has at least one parent.
//! Removing the last placement of a node removes it, and cascades to any
//! descendants that lose their last parent as a result.

#![allow(clippy::module_name_repetitions)]

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::error::ErrorCode;
use crate::model::{EntityId, EntityNode};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What to do with an edge whose parent is not materialized yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrphanPolicy {
    /// Park the edge and attach it once the parent appears.
    #[default]
    Defer,
    /// Refuse the edge with [`HierarchyError::DanglingEdge`].
    Reject,
}

/// Result of [`HierarchyModel::add_child`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// A new edge (or root placement) became visible.
    Attached,
    /// The edge was already present; nothing changed.
    AlreadyAttached,
    /// The parent is missing; the edge is parked until it appears.
    Deferred,
}

/// Result of a removal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removal {
    /// Whether the named edge (or node) existed.
    pub removed: bool,
    /// Every node dropped from the index, in removal order.
    pub nodes_removed: Vec<EntityId>,
}

/// Errors from structural hierarchy mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    #[error("edge {parent} -> {child} references a parent that is not in the hierarchy")]
    DanglingEdge { parent: EntityId, child: EntityId },

    #[error("placing {child} under {parent} would create a cycle")]
    CycleDetected { parent: EntityId, child: EntityId },
}

impl HierarchyError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::DanglingEdge { .. } => ErrorCode::DanglingEdge,
            Self::CycleDetected { .. } => ErrorCode::CycleDetected,
        }
    }
}

// ---------------------------------------------------------------------------
// HierarchyModel
// ---------------------------------------------------------------------------

/// Index of entity nodes plus bidirectional parent/child adjacency.
#[derive(Debug, Default)]
pub struct HierarchyModel {
    nodes: HashMap<EntityId, Arc<EntityNode>>,
    children: HashMap<EntityId, BTreeSet<EntityId>>,
    parents: HashMap<EntityId, BTreeSet<EntityId>>,
    roots: BTreeSet<EntityId>,
    /// Parked edges keyed by the missing parent.
    pending: HashMap<EntityId, Vec<EntityNode>>,
    orphan_policy: OrphanPolicy,
}

impl HierarchyModel {
    /// Create an empty model that defers orphaned edges.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty model with the given orphan policy.
    #[must_use]
    pub fn with_orphan_policy(orphan_policy: OrphanPolicy) -> Self {
        Self {
            orphan_policy,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn orphan_policy(&self) -> OrphanPolicy {
        self.orphan_policy
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Current node for `entity`, if materialized.
    #[must_use]
    pub fn get_node(&self, entity: &EntityId) -> Option<Arc<EntityNode>> {
        self.nodes.get(entity).cloned()
    }

    #[must_use]
    pub fn contains(&self, entity: &EntityId) -> bool {
        self.nodes.contains_key(entity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct children of `entity`, in identity order.
    #[must_use]
    pub fn children(&self, entity: &EntityId) -> Vec<EntityId> {
        self.children
            .get(entity)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Direct parents of `entity`, in identity order.
    #[must_use]
    pub fn parents(&self, entity: &EntityId) -> Vec<EntityId> {
        self.parents
            .get(entity)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Entities placed at the root.
    #[must_use]
    pub fn roots(&self) -> Vec<EntityId> {
        self.roots.iter().cloned().collect()
    }

    /// Every materialized entity, in identity order.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityId> {
        let mut all: Vec<EntityId> = self.nodes.keys().cloned().collect();
        all.sort();
        all
    }

    #[must_use]
    pub fn is_root(&self, entity: &EntityId) -> bool {
        self.roots.contains(entity)
    }

    /// All ancestors of `entity` in BFS order, nearest first.
    #[must_use]
    pub fn ancestors(&self, entity: &EntityId) -> Vec<EntityId> {
        let mut visited: HashSet<&EntityId> = HashSet::new();
        let mut queue: VecDeque<&EntityId> = VecDeque::new();
        let mut result = Vec::new();

        if let Some(direct) = self.parents.get(entity) {
            queue.extend(direct.iter());
        }
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            result.push(current.clone());
            if let Some(next) = self.parents.get(current) {
                queue.extend(next.iter());
            }
        }
        result
    }

    /// Number of edges parked waiting for a parent.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    // -----------------------------------------------------------------------
    // Point updates
    // -----------------------------------------------------------------------

    /// Replace the node for `node.entity()`, or insert it if absent.
    ///
    /// Adjacency is left untouched. Returns the previous node, if any.
    pub fn update_node(&mut self, node: EntityNode) -> Option<Arc<EntityNode>> {
        let entity = node.entity().clone();
        let previous = self.nodes.insert(entity.clone(), Arc::new(node));
        tracing::debug!(entity = %entity, inserted = previous.is_none(), "updated hierarchy node");
        if previous.is_none() {
            self.release_pending(&entity);
        }
        previous
    }

    // -----------------------------------------------------------------------
    // Structural updates
    // -----------------------------------------------------------------------

    /// Place `child` under `parent`, or at the root when `parent` is `None`.
    ///
    /// An already-indexed child keeps its current cached metadata; `child`
    /// only seeds the node when it is first materialized.
    ///
    /// # Errors
    ///
    /// [`HierarchyError::CycleDetected`] if `parent` is `child` or one of its
    /// descendants; [`HierarchyError::DanglingEdge`] if `parent` is missing
    /// and the orphan policy is [`OrphanPolicy::Reject`].
    pub fn add_child(
        &mut self,
        parent: Option<&EntityId>,
        child: EntityNode,
    ) -> Result<Attachment, HierarchyError> {
        let child_id = child.entity().clone();

        let Some(parent) = parent else {
            let inserted = self.insert_if_absent(child);
            let attached = self.roots.insert(child_id.clone());
            if inserted {
                self.release_pending(&child_id);
            }
            return Ok(if attached {
                Attachment::Attached
            } else {
                Attachment::AlreadyAttached
            });
        };

        if !self.nodes.contains_key(parent) {
            return match self.orphan_policy {
                OrphanPolicy::Defer => {
                    tracing::warn!(parent = %parent, child = %child_id, "parent not materialized; deferring edge");
                    let parked = self.pending.entry(parent.clone()).or_default();
                    parked.retain(|n| n.entity() != &child_id);
                    parked.push(child);
                    Ok(Attachment::Deferred)
                }
                OrphanPolicy::Reject => Err(HierarchyError::DanglingEdge {
                    parent: parent.clone(),
                    child: child_id,
                }),
            };
        }

        if *parent == child_id || self.ancestors(parent).contains(&child_id) {
            return Err(HierarchyError::CycleDetected {
                parent: parent.clone(),
                child: child_id,
            });
        }

        // The edge goes in before parked edges on the child are released, so
        // those see the child's new ancestry in their own cycle check.
        let materialized = self.insert_if_absent(child);
        let inserted = self
            .children
            .entry(parent.clone())
            .or_default()
            .insert(child_id.clone());
        self.parents
            .entry(child_id.clone())
            .or_default()
            .insert(parent.clone());
        if materialized {
            self.release_pending(&child_id);
        }

        if inserted {
            tracing::debug!(parent = %parent, child = %child_id, "attached child");
            Ok(Attachment::Attached)
        } else {
            Ok(Attachment::AlreadyAttached)
        }
    }

    /// Remove the placement of `child` under `parent` (or at the root).
    ///
    /// If that was the child's last placement, the child leaves scope and is
    /// removed together with every descendant left without a parent.
    pub fn remove_child(&mut self, parent: Option<&EntityId>, child: &EntityId) -> Removal {
        let removed = match parent {
            None => self.roots.remove(child),
            Some(parent) => {
                let parked = self.unpark(parent, child);
                self.unlink(parent, child) || parked
            }
        };

        let mut removal = Removal {
            removed,
            nodes_removed: Vec::new(),
        };
        if removed && self.nodes.contains_key(child) && self.is_unplaced(child) {
            self.cascade_from(child.clone(), &mut removal.nodes_removed);
        }
        removal
    }

    /// Remove `entity`, every incident edge, and every parked edge that
    /// mentions it. Children left without a parent are removed too.
    pub fn remove_node(&mut self, entity: &EntityId) -> Removal {
        let mut removal = Removal::default();

        let dropped = self.pending.remove(entity).map_or(0, |v| v.len());
        if dropped > 0 {
            tracing::debug!(entity = %entity, dropped, "dropped parked edges for deleted parent");
        }
        for parked in self.pending.values_mut() {
            parked.retain(|n| n.entity() != entity);
        }
        self.pending.retain(|_, parked| !parked.is_empty());

        if !self.nodes.contains_key(entity) {
            return removal;
        }
        removal.removed = true;
        self.cascade_from(entity.clone(), &mut removal.nodes_removed);
        removal
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Index `node` unless its entity is already present. Parked edges are
    /// left for the caller to release.
    fn insert_if_absent(&mut self, node: EntityNode) -> bool {
        if self.nodes.contains_key(node.entity()) {
            return false;
        }
        let entity = node.entity().clone();
        tracing::debug!(entity = %entity, "materialized hierarchy node");
        self.nodes.insert(entity, Arc::new(node));
        true
    }

    fn is_unplaced(&self, entity: &EntityId) -> bool {
        !self.roots.contains(entity) && self.parents.get(entity).is_none_or(BTreeSet::is_empty)
    }

    fn unlink(&mut self, parent: &EntityId, child: &EntityId) -> bool {
        let removed = self
            .children
            .get_mut(parent)
            .is_some_and(|set| set.remove(child));
        if let Some(set) = self.parents.get_mut(child) {
            set.remove(parent);
            if set.is_empty() {
                self.parents.remove(child);
            }
        }
        if self.children.get(parent).is_some_and(BTreeSet::is_empty) {
            self.children.remove(parent);
        }
        removed
    }

    fn unpark(&mut self, parent: &EntityId, child: &EntityId) -> bool {
        let Some(parked) = self.pending.get_mut(parent) else {
            return false;
        };
        let before = parked.len();
        parked.retain(|n| n.entity() != child);
        let changed = parked.len() != before;
        if parked.is_empty() {
            self.pending.remove(parent);
        }
        changed
    }

    /// Drop `start` and then every descendant that ends up unplaced.
    fn cascade_from(&mut self, start: EntityId, removed: &mut Vec<EntityId>) {
        let mut queue = VecDeque::from([start]);
        while let Some(entity) = queue.pop_front() {
            if self.nodes.remove(&entity).is_none() {
                continue;
            }
            self.roots.remove(&entity);
            for parent in self.parents(&entity) {
                self.unlink(&parent, &entity);
            }
            for child in self.children(&entity) {
                self.unlink(&entity, &child);
                if self.is_unplaced(&child) {
                    queue.push_back(child);
                }
            }
            tracing::debug!(entity = %entity, "removed hierarchy node");
            removed.push(entity);
        }
    }

    /// Attach every edge parked on `parent` now that it exists.
    fn release_pending(&mut self, parent: &EntityId) {
        let Some(parked) = self.pending.remove(parent) else {
            return;
        };
        for child in parked {
            // Attaching a newly materialized child releases its own parked
            // edges in turn.
            if let Err(e) = self.add_child(Some(parent), child) {
                tracing::warn!(error = %e, "dropping parked edge");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> EntityId {
        EntityId::new(raw)
    }

    fn node(raw: &str) -> EntityNode {
        EntityNode::fresh(id(raw), raw)
    }

    /// Thing
    ///   ├── Animal
    ///   │   └── Dog
    ///   └── Plant
    fn sample() -> HierarchyModel {
        let mut model = HierarchyModel::new();
        model.add_child(None, node("Thing")).expect("root");
        model.add_child(Some(&id("Thing")), node("Animal")).expect("animal");
        model.add_child(Some(&id("Thing")), node("Plant")).expect("plant");
        model.add_child(Some(&id("Animal")), node("Dog")).expect("dog");
        model
    }

    #[test]
    fn update_node_inserts_then_replaces() {
        let mut model = HierarchyModel::new();
        assert!(model.update_node(node("E")).is_none());
        let previous = model.update_node(node("E").with_label("Bar"));
        assert_eq!(previous.map(|n| n.label().to_string()), Some("E".into()));
        assert_eq!(model.len(), 1);
        assert_eq!(model.get_node(&id("E")).map(|n| n.label().to_string()), Some("Bar".into()));
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let mut model = HierarchyModel::new();
        model.update_node(node("E"));
        let held = model.get_node(&id("E")).expect("present");
        model.update_node(node("E").with_label("changed"));
        assert_eq!(held.label(), "E");
    }

    #[test]
    fn children_and_parents() {
        let model = sample();
        assert_eq!(model.children(&id("Thing")), vec![id("Animal"), id("Plant")]);
        assert_eq!(model.parents(&id("Dog")), vec![id("Animal")]);
        assert_eq!(model.roots(), vec![id("Thing")]);
        assert!(model.children(&id("Dog")).is_empty());
        assert!(model.children(&id("missing")).is_empty());
    }

    #[test]
    fn ancestors_nearest_first() {
        let model = sample();
        assert_eq!(model.ancestors(&id("Dog")), vec![id("Animal"), id("Thing")]);
        assert!(model.ancestors(&id("Thing")).is_empty());
    }

    #[test]
    fn duplicate_add_is_idempotent_and_keeps_metadata() {
        let mut model = sample();
        model.update_node(node("Dog").with_label("Canis"));
        let again = model.add_child(Some(&id("Animal")), node("Dog")).expect("re-add");
        assert_eq!(again, Attachment::AlreadyAttached);
        assert_eq!(model.get_node(&id("Dog")).map(|n| n.label().to_string()), Some("Canis".into()));
        assert_eq!(model.len(), 4);
    }

    #[test]
    fn multiple_parents() {
        let mut model = sample();
        model.add_child(Some(&id("Plant")), node("Dog")).expect("second parent");
        assert_eq!(model.parents(&id("Dog")), vec![id("Animal"), id("Plant")]);
        let removal = model.remove_child(Some(&id("Animal")), &id("Dog"));
        assert!(removal.removed);
        assert!(removal.nodes_removed.is_empty());
        assert!(model.contains(&id("Dog")));
    }

    #[test]
    fn cycle_is_rejected() {
        let mut model = sample();
        let err = model.add_child(Some(&id("Dog")), node("Thing")).unwrap_err();
        assert_eq!(
            err,
            HierarchyError::CycleDetected {
                parent: id("Dog"),
                child: id("Thing")
            }
        );
        assert_eq!(err.code(), ErrorCode::CycleDetected);
        let self_loop = model.add_child(Some(&id("Dog")), node("Dog")).unwrap_err();
        assert!(matches!(self_loop, HierarchyError::CycleDetected { .. }));
    }

    #[test]
    fn missing_parent_is_deferred_until_it_appears() {
        let mut model = HierarchyModel::new();
        let outcome = model.add_child(Some(&id("P")), node("C")).expect("defer");
        assert_eq!(outcome, Attachment::Deferred);
        assert!(!model.contains(&id("C")));
        assert_eq!(model.pending_len(), 1);

        model.add_child(None, node("P")).expect("root");
        assert_eq!(model.pending_len(), 0);
        assert_eq!(model.children(&id("P")), vec![id("C")]);
    }

    #[test]
    fn deferred_chains_release_transitively() {
        let mut model = HierarchyModel::new();
        model.add_child(Some(&id("B")), node("C")).expect("defer c");
        model.add_child(Some(&id("A")), node("B")).expect("defer b");
        model.add_child(None, node("A")).expect("root");
        assert_eq!(model.ancestors(&id("C")), vec![id("B"), id("A")]);
        assert_eq!(model.pending_len(), 0);
    }

    #[test]
    fn released_edge_cannot_close_a_cycle() {
        let mut model = HierarchyModel::new();
        model.add_child(None, node("P")).expect("root");
        model.add_child(Some(&id("C")), node("P")).expect("defer");
        model.add_child(Some(&id("P")), node("C")).expect("attach");
        assert_eq!(model.parents(&id("C")), vec![id("P")]);
        assert!(model.parents(&id("P")).is_empty());
        assert_eq!(model.pending_len(), 0);
    }

    #[test]
    fn reject_policy_refuses_dangling_edge() {
        let mut model = HierarchyModel::with_orphan_policy(OrphanPolicy::Reject);
        let err = model.add_child(Some(&id("P")), node("C")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DanglingEdge);
        assert!(model.is_empty());
        assert_eq!(model.pending_len(), 0);
    }

    #[test]
    fn removing_last_placement_cascades() {
        let mut model = sample();
        let removal = model.remove_child(Some(&id("Thing")), &id("Animal"));
        assert!(removal.removed);
        assert_eq!(removal.nodes_removed, vec![id("Animal"), id("Dog")]);
        assert!(!model.contains(&id("Dog")));
        assert_eq!(model.children(&id("Thing")), vec![id("Plant")]);
    }

    #[test]
    fn remove_child_twice_is_noop() {
        let mut model = sample();
        model.remove_child(Some(&id("Animal")), &id("Dog"));
        let again = model.remove_child(Some(&id("Animal")), &id("Dog"));
        assert!(!again.removed);
        assert!(again.nodes_removed.is_empty());
    }

    #[test]
    fn remove_node_drops_incident_edges() {
        let mut model = sample();
        let removal = model.remove_node(&id("Animal"));
        assert!(removal.removed);
        assert_eq!(removal.nodes_removed, vec![id("Animal"), id("Dog")]);
        assert_eq!(model.children(&id("Thing")), vec![id("Plant")]);
        assert!(model.parents(&id("Dog")).is_empty());
        assert!(!model.remove_node(&id("Animal")).removed);
    }

    #[test]
    fn remove_node_clears_parked_edges() {
        let mut model = HierarchyModel::new();
        model.add_child(Some(&id("P")), node("C")).expect("defer");
        model.remove_node(&id("C"));
        assert_eq!(model.pending_len(), 0);
        model.add_child(None, node("P")).expect("root");
        assert!(model.children(&id("P")).is_empty());
    }

    #[test]
    fn remove_child_unparks_deferred_edge() {
        let mut model = HierarchyModel::new();
        model.add_child(Some(&id("P")), node("C")).expect("defer");
        let removal = model.remove_child(Some(&id("P")), &id("C"));
        assert!(removal.removed);
        assert_eq!(model.pending_len(), 0);
    }
}
