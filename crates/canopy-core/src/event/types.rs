//! Event kind catalog.
//!
//! Each kind has a stable dotted string name. Handlers are registered per
//! kind, and delivery order is only guaranteed within one kind.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The nine hierarchy event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// The display text of an entity changed.
    BrowserTextChanged,
    /// A user started watching an entity.
    WatchAdded,
    /// A user stopped watching an entity.
    WatchRemoved,
    /// An entity was marked or unmarked deprecated.
    EntityDeprecatedChanged,
    /// A comment was posted on a discussion thread.
    CommentPosted,
    /// A discussion thread was opened or closed.
    DiscussionStatusChanged,
    /// An entity was placed under a parent (or at the root).
    ChildAdded,
    /// An entity was removed from under a parent (or from the root).
    ChildRemoved,
    /// An entity was deleted from the document.
    EntityDeleted,
}

/// Error returned when parsing an unknown event kind string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind '{raw}'")]
pub struct UnknownEventKind {
    /// The unrecognised input string.
    pub raw: String,
}

impl EventKind {
    /// All known kinds in catalog order.
    pub const ALL: [Self; 9] = [
        Self::BrowserTextChanged,
        Self::WatchAdded,
        Self::WatchRemoved,
        Self::EntityDeprecatedChanged,
        Self::CommentPosted,
        Self::DiscussionStatusChanged,
        Self::ChildAdded,
        Self::ChildRemoved,
        Self::EntityDeleted,
    ];

    /// Return the canonical dotted string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BrowserTextChanged => "browser_text.changed",
            Self::WatchAdded => "watch.added",
            Self::WatchRemoved => "watch.removed",
            Self::EntityDeprecatedChanged => "entity.deprecated_changed",
            Self::CommentPosted => "comment.posted",
            Self::DiscussionStatusChanged => "discussion.status_changed",
            Self::ChildAdded => "hierarchy.child_added",
            Self::ChildRemoved => "hierarchy.child_removed",
            Self::EntityDeleted => "entity.deleted",
        }
    }

    /// Returns `true` for kinds that change the shape of the hierarchy
    /// rather than the metadata of one node.
    #[must_use]
    pub const fn is_structural(self) -> bool {
        matches!(
            self,
            Self::ChildAdded | Self::ChildRemoved | Self::EntityDeleted
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind { raw: s.to_string() })
    }
}

impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}
