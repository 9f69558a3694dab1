//! Atomic document changes and the ordered change sets that group them.
//!
//! A [`ChangeSet`] is produced by one call to [`generate`] and must be
//! applied all-or-nothing. Its changes are ordered so that an entity is
//! always declared before any change that references it, and no change
//! appears twice. [`ChangeSetBuilder`] enforces both as changes are pushed.
//!
//! ## Submodules
//!
//! - [`context`]: the per-request snapshot, fresh-name allocation, and
//!   naming policies.
//! - [`generate`]: edit requests and the generator that turns them into
//!   change sets.

pub mod context;
pub mod generate;

pub use context::{
    ChangeGenerationContext, DocumentSnapshot, FreshEntityAllocator, NamingPolicy,
    NumberedSuffix, Underscored,
};
pub use generate::{Capabilities, EditRequest, GenerationError, generate};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::model::{EntityId, EntityKind};

// ---------------------------------------------------------------------------
// DocumentChange
// ---------------------------------------------------------------------------

/// How a child entity is related to the parent it is placed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementRelation {
    /// Class under class.
    SubClassOf,
    /// Property under property of the same kind.
    SubPropertyOf,
    /// Individual under its class.
    ClassAssertion,
}

impl PlacementRelation {
    /// The relation used to place an entity of `kind`.
    #[must_use]
    pub const fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Class => Self::SubClassOf,
            EntityKind::ObjectProperty
            | EntityKind::DataProperty
            | EntityKind::AnnotationProperty => Self::SubPropertyOf,
            EntityKind::NamedIndividual => Self::ClassAssertion,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SubClassOf => "sub_class_of",
            Self::SubPropertyOf => "sub_property_of",
            Self::ClassAssertion => "class_assertion",
        }
    }
}

impl fmt::Display for PlacementRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One atomic mutation of the underlying document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DocumentChange {
    DeclareEntity {
        entity: EntityId,
        kind: EntityKind,
    },
    AssertPlacement {
        child: EntityId,
        parent: EntityId,
        relation: PlacementRelation,
    },
    RetractPlacement {
        child: EntityId,
        parent: EntityId,
        relation: PlacementRelation,
    },
    AssertLabel {
        entity: EntityId,
        label: String,
    },
}

impl DocumentChange {
    /// Every entity this change refers to, declared or not.
    #[must_use]
    pub fn referenced(&self) -> Vec<&EntityId> {
        match self {
            Self::DeclareEntity { entity, .. } | Self::AssertLabel { entity, .. } => vec![entity],
            Self::AssertPlacement { child, parent, .. }
            | Self::RetractPlacement { child, parent, .. } => vec![child, parent],
        }
    }

    #[must_use]
    pub const fn is_declaration(&self) -> bool {
        matches!(self, Self::DeclareEntity { .. })
    }

    #[must_use]
    pub const fn is_placement(&self) -> bool {
        matches!(self, Self::AssertPlacement { .. })
    }
}

impl fmt::Display for DocumentChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeclareEntity { entity, kind } => write!(f, "declare {kind} {entity}"),
            Self::AssertPlacement {
                child,
                parent,
                relation,
            } => write!(f, "assert {child} {relation} {parent}"),
            Self::RetractPlacement {
                child,
                parent,
                relation,
            } => write!(f, "retract {child} {relation} {parent}"),
            Self::AssertLabel { entity, label } => write!(f, "label {entity} {label:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// ChangeSet
// ---------------------------------------------------------------------------

/// An ordered, deduplicated group of changes produced for one edit request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet {
    changes: Vec<DocumentChange>,
}

impl ChangeSet {
    #[must_use]
    pub fn changes(&self) -> &[DocumentChange] {
        &self.changes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DocumentChange> {
        self.changes.iter()
    }

    /// Number of declaration changes.
    #[must_use]
    pub fn declaration_count(&self) -> usize {
        self.changes.iter().filter(|c| c.is_declaration()).count()
    }

    /// Number of placement assertions.
    #[must_use]
    pub fn placement_count(&self) -> usize {
        self.changes.iter().filter(|c| c.is_placement()).count()
    }

    /// Content digest of the ordered changes, `blake3:<hex>`.
    ///
    /// Two change sets with the same changes in the same order share a
    /// digest, so a reviewer can name a change set by content.
    #[must_use]
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for change in &self.changes {
            hasher.update(change.to_string().as_bytes());
            hasher.update(b"\n");
        }
        format!("blake3:{}", hasher.finalize().to_hex())
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a DocumentChange;
    type IntoIter = std::slice::Iter<'a, DocumentChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for change in &self.changes {
            writeln!(f, "{change}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ChangeSetBuilder
// ---------------------------------------------------------------------------

/// Accumulates changes while enforcing declare-before-reference ordering.
///
/// An entity counts as known if it is in the snapshot or was declared by an
/// earlier change in this builder. Pushing a change that repeats an earlier
/// one is a no-op.
#[derive(Debug)]
pub struct ChangeSetBuilder<'a> {
    snapshot: &'a DocumentSnapshot,
    declared: HashSet<EntityId>,
    seen: HashSet<DocumentChange>,
    changes: Vec<DocumentChange>,
}

impl<'a> ChangeSetBuilder<'a> {
    #[must_use]
    pub fn new(snapshot: &'a DocumentSnapshot) -> Self {
        Self {
            snapshot,
            declared: HashSet::new(),
            seen: HashSet::new(),
            changes: Vec::new(),
        }
    }

    /// Append `change`.
    ///
    /// # Errors
    ///
    /// [`GenerationError::OrderingViolation`] if the change references an
    /// entity that is neither in the snapshot nor declared earlier.
    pub fn push(&mut self, change: DocumentChange) -> Result<&mut Self, GenerationError> {
        if self.seen.contains(&change) {
            return Ok(self);
        }
        if let DocumentChange::DeclareEntity { entity, .. } = &change {
            self.declared.insert(entity.clone());
        }
        if let Some(unknown) = change
            .referenced()
            .into_iter()
            .find(|e| !self.declared.contains(*e) && !self.snapshot.contains(e))
        {
            return Err(GenerationError::OrderingViolation {
                entity: unknown.clone(),
            });
        }
        self.seen.insert(change.clone());
        self.changes.push(change);
        Ok(self)
    }

    #[must_use]
    pub fn finish(self) -> ChangeSet {
        ChangeSet {
            changes: self.changes,
        }
    }
}
