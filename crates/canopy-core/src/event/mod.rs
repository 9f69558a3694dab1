//! Typed change notifications consumed by the hierarchy updater.
//!
//! Events are delivered at least once and possibly out of order across
//! kinds. Every event carries absolute values (the new label, the new open
//! comment count) rather than deltas, so replaying one is harmless.
//!
//! # JSON form
//!
//! Events serialize with a `kind` tag holding the [`EventKind`] name:
//!
//! ```text
//! {"kind":"browser_text.changed","entity":"E","new_text":"Bar"}
//! ```

pub mod bus;
pub mod types;

pub use bus::{EventBus, EventSource, Handler, SubscriptionId};
pub use types::{EventKind, UnknownEventKind};

use serde::{Deserialize, Serialize};

use crate::model::{EntityId, EntityNode, Watch};

/// A single hierarchy notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum HierarchyEvent {
    #[serde(rename = "browser_text.changed")]
    BrowserTextChanged { entity: EntityId, new_text: String },

    #[serde(rename = "watch.added")]
    WatchAdded { watch: Watch },

    #[serde(rename = "watch.removed")]
    WatchRemoved { watch: Watch },

    #[serde(rename = "entity.deprecated_changed")]
    EntityDeprecatedChanged { entity: EntityId, deprecated: bool },

    /// `entity` is absent for comments on project-level threads.
    #[serde(rename = "comment.posted")]
    CommentPosted {
        #[serde(default)]
        entity: Option<EntityId>,
        open_comment_count: u32,
    },

    #[serde(rename = "discussion.status_changed")]
    DiscussionStatusChanged {
        #[serde(default)]
        entity: Option<EntityId>,
        open_comment_count: u32,
    },

    /// `parent: None` places the child at the root.
    #[serde(rename = "hierarchy.child_added")]
    ChildAdded {
        #[serde(default)]
        parent: Option<EntityId>,
        child: EntityNode,
    },

    #[serde(rename = "hierarchy.child_removed")]
    ChildRemoved {
        #[serde(default)]
        parent: Option<EntityId>,
        child: EntityId,
    },

    #[serde(rename = "entity.deleted")]
    EntityDeleted { entity: EntityId },
}

impl HierarchyEvent {
    /// The kind this event is dispatched under.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::BrowserTextChanged { .. } => EventKind::BrowserTextChanged,
            Self::WatchAdded { .. } => EventKind::WatchAdded,
            Self::WatchRemoved { .. } => EventKind::WatchRemoved,
            Self::EntityDeprecatedChanged { .. } => EventKind::EntityDeprecatedChanged,
            Self::CommentPosted { .. } => EventKind::CommentPosted,
            Self::DiscussionStatusChanged { .. } => EventKind::DiscussionStatusChanged,
            Self::ChildAdded { .. } => EventKind::ChildAdded,
            Self::ChildRemoved { .. } => EventKind::ChildRemoved,
            Self::EntityDeleted { .. } => EventKind::EntityDeleted,
        }
    }

    /// The entity whose node this event touches, if any.
    #[must_use]
    pub fn subject(&self) -> Option<&EntityId> {
        match self {
            Self::BrowserTextChanged { entity, .. }
            | Self::EntityDeprecatedChanged { entity, .. }
            | Self::EntityDeleted { entity } => Some(entity),
            Self::WatchAdded { watch } | Self::WatchRemoved { watch } => Some(&watch.entity),
            Self::CommentPosted { entity, .. } | Self::DiscussionStatusChanged { entity, .. } => {
                entity.as_ref()
            }
            Self::ChildAdded { child, .. } => Some(child.entity()),
            Self::ChildRemoved { child, .. } => Some(child),
        }
    }
}
