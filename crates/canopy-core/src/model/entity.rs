//! Entity identities and the cached hierarchy node value.
//!
//! An [`EntityNode`] is immutable once built. Every update produces a new
//! node through one of the `with_*` constructors, which copy all fields from
//! the receiver and replace exactly one. Readers holding an older node never
//! observe a partially updated value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// Unique reference to an entity in the underlying document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Wrap a raw identity string.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Identity of the user who owns a watch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityKind
// ---------------------------------------------------------------------------

/// The kinds of entity a document can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Class,
    ObjectProperty,
    DataProperty,
    AnnotationProperty,
    NamedIndividual,
}

impl EntityKind {
    pub const ALL: [Self; 5] = [
        Self::Class,
        Self::ObjectProperty,
        Self::DataProperty,
        Self::AnnotationProperty,
        Self::NamedIndividual,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::ObjectProperty => "object_property",
            Self::DataProperty => "data_property",
            Self::AnnotationProperty => "annotation_property",
            Self::NamedIndividual => "named_individual",
        }
    }

    /// Returns `true` for the three property kinds.
    #[must_use]
    pub const fn is_property(self) -> bool {
        matches!(
            self,
            Self::ObjectProperty | Self::DataProperty | Self::AnnotationProperty
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown entity kind: {s}"))
    }
}

// ---------------------------------------------------------------------------
// Watches
// ---------------------------------------------------------------------------

/// Whether a watch covers only its entity or the entity's whole branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchType {
    Entity,
    Branch,
}

/// An observer-scoped marker attached to an entity.
///
/// Equality covers all three fields, so the same user may hold both an
/// entity watch and a branch watch on one entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Watch {
    pub user: UserId,
    pub entity: EntityId,
    #[serde(rename = "type")]
    pub watch_type: WatchType,
}

impl Watch {
    #[must_use]
    pub const fn new(user: UserId, entity: EntityId, watch_type: WatchType) -> Self {
        Self {
            user,
            entity,
            watch_type,
        }
    }
}

// ---------------------------------------------------------------------------
// EntityNode
// ---------------------------------------------------------------------------

/// One hierarchy entry and its cached metadata.
///
/// Fields are private: the identity can never change after construction, and
/// the remaining fields are only replaced wholesale via the `with_*`
/// constructors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityNode {
    entity: EntityId,
    label: String,
    deprecated: bool,
    #[serde(default)]
    watches: BTreeSet<Watch>,
    #[serde(default)]
    open_comment_count: u32,
}

impl EntityNode {
    /// Build a node with every field given explicitly.
    #[must_use]
    pub const fn new(
        entity: EntityId,
        label: String,
        deprecated: bool,
        watches: BTreeSet<Watch>,
        open_comment_count: u32,
    ) -> Self {
        Self {
            entity,
            label,
            deprecated,
            watches,
            open_comment_count,
        }
    }

    /// A fresh, undeprecated, unwatched node with no open discussions.
    #[must_use]
    pub fn fresh(entity: EntityId, label: impl Into<String>) -> Self {
        Self::new(entity, label.into(), false, BTreeSet::new(), 0)
    }

    #[must_use]
    pub const fn entity(&self) -> &EntityId {
        &self.entity
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub const fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    #[must_use]
    pub const fn watches(&self) -> &BTreeSet<Watch> {
        &self.watches
    }

    #[must_use]
    pub const fn open_comment_count(&self) -> u32 {
        self.open_comment_count
    }

    #[must_use]
    pub fn with_label(&self, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_deprecated(&self, deprecated: bool) -> Self {
        Self {
            deprecated,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_watches(&self, watches: BTreeSet<Watch>) -> Self {
        Self {
            watches,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_open_comment_count(&self, open_comment_count: u32) -> Self {
        Self {
            open_comment_count,
            ..self.clone()
        }
    }
}
