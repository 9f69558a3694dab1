//! Per-request state for change generation.
//!
//! A [`ChangeGenerationContext`] borrows one point-in-time
//! [`DocumentSnapshot`] and owns the [`FreshEntityAllocator`] used while
//! generating a single change set. [`super::generate`] takes the context by
//! value, so a context cannot outlive the request it was built for.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use super::GenerationError;
use crate::config::{ChangeConfig, NamingPolicyKind};
use crate::model::{EntityId, EntityKind};

// ---------------------------------------------------------------------------
// DocumentSnapshot
// ---------------------------------------------------------------------------

/// Read-only view of the document's entities, labels, and placements.
///
/// An entity with no placement sits at the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    #[serde(default)]
    entities: BTreeMap<EntityId, EntityKind>,
    #[serde(default)]
    labels: BTreeMap<EntityId, String>,
    /// `(child, parent)` pairs.
    #[serde(default)]
    placements: BTreeSet<(EntityId, EntityId)>,
}

impl DocumentSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `entity` as declared with `kind`. Returns `false` if it was
    /// already declared.
    pub fn declare(&mut self, entity: EntityId, kind: EntityKind) -> bool {
        if self.entities.contains_key(&entity) {
            return false;
        }
        self.entities.insert(entity, kind);
        true
    }

    pub fn set_label(&mut self, entity: EntityId, label: impl Into<String>) {
        self.labels.insert(entity, label.into());
    }

    /// Returns `false` if the placement was already present.
    pub fn place(&mut self, child: EntityId, parent: EntityId) -> bool {
        self.placements.insert((child, parent))
    }

    /// Returns `false` if the placement was not present.
    pub fn unplace(&mut self, child: &EntityId, parent: &EntityId) -> bool {
        self.placements.remove(&(child.clone(), parent.clone()))
    }

    #[must_use]
    pub fn contains(&self, entity: &EntityId) -> bool {
        self.entities.contains_key(entity)
    }

    #[must_use]
    pub fn kind_of(&self, entity: &EntityId) -> Option<EntityKind> {
        self.entities.get(entity).copied()
    }

    #[must_use]
    pub fn label_of(&self, entity: &EntityId) -> Option<&str> {
        self.labels.get(entity).map(String::as_str)
    }

    #[must_use]
    pub fn has_placement(&self, child: &EntityId, parent: &EntityId) -> bool {
        self.placements.contains(&(child.clone(), parent.clone()))
    }

    /// Direct parents of `child`, in identity order.
    #[must_use]
    pub fn parents_of(&self, child: &EntityId) -> Vec<&EntityId> {
        // Placements sort by child first, and the empty identity sorts
        // before every parent.
        self.placements
            .range((child.clone(), EntityId::new(""))..)
            .take_while(|(c, _)| c == child)
            .map(|(_, p)| p)
            .collect()
    }

    /// Returns `true` if `candidate` is `entity` or lies beneath it.
    #[must_use]
    pub fn is_within(&self, candidate: &EntityId, entity: &EntityId) -> bool {
        let mut visited: HashSet<&EntityId> = HashSet::new();
        let mut queue = VecDeque::from([candidate]);
        while let Some(current) = queue.pop_front() {
            if current == entity {
                return true;
            }
            if visited.insert(current) {
                queue.extend(self.parents_of(current));
            }
        }
        false
    }

    /// Returns `true` if `name` is already used as an identity or a label.
    #[must_use]
    pub fn is_name_taken(&self, name: &str) -> bool {
        self.entities.contains_key(&EntityId::new(name))
            || self.labels.values().any(|label| label == name)
    }

    /// All declared entities with their kinds, in identity order.
    pub fn entities(&self) -> impl Iterator<Item = (&EntityId, EntityKind)> {
        self.entities.iter().map(|(id, kind)| (id, *kind))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Naming policies
// ---------------------------------------------------------------------------

/// Derives candidate names for a fresh entity from caller-supplied text.
///
/// Attempt `0` should return `base` unchanged; later attempts must return
/// names distinct from every earlier attempt.
pub trait NamingPolicy: std::fmt::Debug {
    fn candidate(&self, base: &str, attempt: u32) -> String;
}

/// `Widget`, `Widget (1)`, `Widget (2)`, ...
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberedSuffix;

impl NamingPolicy for NumberedSuffix {
    fn candidate(&self, base: &str, attempt: u32) -> String {
        if attempt == 0 {
            base.to_string()
        } else {
            format!("{base} ({attempt})")
        }
    }
}

/// `Widget`, `Widget_1`, `Widget_2`, ... with inner whitespace replaced by
/// underscores.
#[derive(Debug, Clone, Copy, Default)]
pub struct Underscored;

impl NamingPolicy for Underscored {
    fn candidate(&self, base: &str, attempt: u32) -> String {
        let stem = base.split_whitespace().collect::<Vec<_>>().join("_");
        if attempt == 0 {
            stem
        } else {
            format!("{stem}_{attempt}")
        }
    }
}

impl NamingPolicyKind {
    /// Instantiate the configured policy.
    #[must_use]
    pub fn build(self) -> Box<dyn NamingPolicy> {
        match self {
            Self::Numbered => Box::new(NumberedSuffix),
            Self::Underscored => Box::new(Underscored),
        }
    }
}

// ---------------------------------------------------------------------------
// FreshEntityAllocator
// ---------------------------------------------------------------------------

/// Allocates identities that collide with nothing in the snapshot and
/// nothing allocated earlier by the same allocator.
#[derive(Debug)]
pub struct FreshEntityAllocator<'a> {
    snapshot: &'a DocumentSnapshot,
    policy: Box<dyn NamingPolicy>,
    max_attempts: u32,
    allocated: HashSet<String>,
}

impl<'a> FreshEntityAllocator<'a> {
    #[must_use]
    pub fn new(
        snapshot: &'a DocumentSnapshot,
        policy: Box<dyn NamingPolicy>,
        max_attempts: u32,
    ) -> Self {
        Self {
            snapshot,
            policy,
            max_attempts,
            allocated: HashSet::new(),
        }
    }

    /// Derive a fresh identity from `source_text`.
    ///
    /// # Errors
    ///
    /// [`GenerationError::AllocationFailure`] if the text is blank or every
    /// candidate within `max_attempts` is taken.
    pub fn allocate(&mut self, source_text: &str) -> Result<EntityId, GenerationError> {
        let base = source_text.trim();
        let attempts = self.max_attempts;
        let failure = || GenerationError::AllocationFailure {
            source_text: source_text.to_string(),
            attempts,
        };
        if base.is_empty() {
            return Err(failure());
        }
        for attempt in 0..attempts {
            let candidate = self.policy.candidate(base, attempt);
            if candidate.is_empty()
                || self.snapshot.is_name_taken(&candidate)
                || self.allocated.contains(&candidate)
            {
                continue;
            }
            tracing::trace!(candidate = %candidate, attempt, "allocated fresh entity name");
            self.allocated.insert(candidate.clone());
            return Ok(EntityId::new(candidate));
        }
        Err(failure())
    }
}

// ---------------------------------------------------------------------------
// ChangeGenerationContext
// ---------------------------------------------------------------------------

/// Everything a generator may consult or allocate for one edit request.
#[derive(Debug)]
pub struct ChangeGenerationContext<'a> {
    snapshot: &'a DocumentSnapshot,
    allocator: FreshEntityAllocator<'a>,
    emit_labels: bool,
}

impl<'a> ChangeGenerationContext<'a> {
    /// Context with the default configuration.
    #[must_use]
    pub fn new(snapshot: &'a DocumentSnapshot) -> Self {
        Self::from_config(snapshot, &ChangeConfig::default())
    }

    #[must_use]
    pub fn from_config(snapshot: &'a DocumentSnapshot, config: &ChangeConfig) -> Self {
        Self {
            snapshot,
            allocator: FreshEntityAllocator::new(
                snapshot,
                config.naming.build(),
                config.max_attempts,
            ),
            emit_labels: config.emit_labels,
        }
    }

    /// Swap in a different naming policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Box<dyn NamingPolicy>, max_attempts: u32) -> Self {
        self.allocator = FreshEntityAllocator::new(self.snapshot, policy, max_attempts);
        self
    }

    #[must_use]
    pub const fn with_labels(mut self, emit_labels: bool) -> Self {
        self.emit_labels = emit_labels;
        self
    }

    #[must_use]
    pub const fn snapshot(&self) -> &'a DocumentSnapshot {
        self.snapshot
    }

    #[must_use]
    pub const fn emit_labels(&self) -> bool {
        self.emit_labels
    }

    /// See [`FreshEntityAllocator::allocate`].
    ///
    /// # Errors
    ///
    /// [`GenerationError::AllocationFailure`] when no fresh name is found.
    pub fn allocate_fresh(&mut self, source_text: &str) -> Result<EntityId, GenerationError> {
        self.allocator.allocate(source_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> EntityId {
        EntityId::new(raw)
    }

    fn widgets() -> DocumentSnapshot {
        let mut snap = DocumentSnapshot::new();
        snap.declare(id("Widget"), EntityKind::Class);
        snap.declare(id("Widget (1)"), EntityKind::Class);
        snap
    }

    #[test]
    fn numbered_suffix_skips_taken_names() {
        let snap = widgets();
        let mut alloc = FreshEntityAllocator::new(&snap, Box::new(NumberedSuffix), 10);
        assert_eq!(alloc.allocate("Widget").expect("alloc"), id("Widget (2)"));
        // Names handed out earlier in the same request are taken too.
        assert_eq!(alloc.allocate("Widget").expect("alloc"), id("Widget (3)"));
    }

    #[test]
    fn source_text_is_trimmed() {
        let snap = DocumentSnapshot::new();
        let mut alloc = FreshEntityAllocator::new(&snap, Box::new(NumberedSuffix), 10);
        assert_eq!(alloc.allocate("  Gadget \n").expect("alloc"), id("Gadget"));
    }

    #[test]
    fn labels_count_as_taken() {
        let mut snap = DocumentSnapshot::new();
        snap.declare(id("urn:1"), EntityKind::Class);
        snap.set_label(id("urn:1"), "Widget");
        let mut alloc = FreshEntityAllocator::new(&snap, Box::new(NumberedSuffix), 10);
        assert_eq!(alloc.allocate("Widget").expect("alloc"), id("Widget (1)"));
    }

    #[test]
    fn blank_text_fails() {
        let snap = DocumentSnapshot::new();
        let mut alloc = FreshEntityAllocator::new(&snap, Box::new(NumberedSuffix), 10);
        let err = alloc.allocate("   ").unwrap_err();
        assert!(matches!(err, GenerationError::AllocationFailure { .. }));
    }

    #[test]
    fn exhausted_attempts_fail() {
        let snap = widgets();
        let mut alloc = FreshEntityAllocator::new(&snap, Box::new(NumberedSuffix), 2);
        let err = alloc.allocate("Widget").unwrap_err();
        assert_eq!(
            err,
            GenerationError::AllocationFailure {
                source_text: "Widget".into(),
                attempts: 2
            }
        );
    }

    #[test]
    fn underscored_policy() {
        let policy = Underscored;
        assert_eq!(policy.candidate("Big  Widget", 0), "Big_Widget");
        assert_eq!(policy.candidate("Big Widget", 3), "Big_Widget_3");
    }

    #[test]
    fn is_within_walks_parents() {
        let mut snap = DocumentSnapshot::new();
        for name in ["A", "B", "C"] {
            snap.declare(id(name), EntityKind::Class);
        }
        snap.place(id("B"), id("A"));
        snap.place(id("C"), id("B"));
        assert!(snap.is_within(&id("C"), &id("A")));
        assert!(snap.is_within(&id("A"), &id("A")));
        assert!(!snap.is_within(&id("A"), &id("C")));
    }

    #[test]
    fn parents_of_only_returns_the_exact_child() {
        let mut snap = DocumentSnapshot::new();
        for name in ["A", "A (1)", "B", "P", "Q", ""] {
            snap.declare(id(name), EntityKind::Class);
        }
        snap.place(id("A"), id("Q"));
        snap.place(id("A"), id("P"));
        snap.place(id("A"), id(""));
        snap.place(id("A (1)"), id("P"));
        snap.place(id("B"), id("A"));
        assert_eq!(snap.parents_of(&id("A")), vec![&id(""), &id("P"), &id("Q")]);
        assert_eq!(snap.parents_of(&id("A (1)")), vec![&id("P")]);
        assert!(snap.parents_of(&id("P")).is_empty());
        assert!(snap.parents_of(&id("missing")).is_empty());
    }

    #[test]
    fn declare_twice_is_refused() {
        let mut snap = DocumentSnapshot::new();
        assert!(snap.declare(id("A"), EntityKind::Class));
        assert!(!snap.declare(id("A"), EntityKind::ObjectProperty));
        assert_eq!(snap.kind_of(&id("A")), Some(EntityKind::Class));
    }

    #[test]
    fn snapshot_json_round_trip_keeps_placements() {
        let mut snap = widgets();
        snap.place(id("Widget (1)"), id("Widget"));
        let json = serde_json::to_string(&snap).expect("serialize");
        let back: DocumentSnapshot = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, snap);
    }
}
