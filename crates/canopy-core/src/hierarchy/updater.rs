//! Event stream → hierarchy point updates.
//!
//! Each handler is a read-modify-write against a single node: look the node
//! up, build a replacement with one field changed and every other field
//! copied, then store it. Handlers carry absolute values from the event
//! (or apply set union/difference for watches), so applying the same event
//! twice leaves the same node as applying it once.
//!
//! An event naming an entity that is not materialized is a tolerated race
//! and is absorbed as [`Outcome::Absent`]; no node is created by a metadata
//! event.
//!
//! # Lifecycle
//!
//! [`HierarchyUpdater`] is the unbound form and has no way to handle events.
//! [`HierarchyUpdater::start`] registers one handler per [`EventKind`] and
//! yields a [`StartedUpdater`] that owns the model. [`StartedUpdater::stop`]
//! tears the registrations down and hands the model back in its last state.

use crate::event::{EventKind, EventSource, Handler, HierarchyEvent, SubscriptionId};
use crate::model::{EntityId, EntityNode};

use super::model::{Attachment, HierarchyModel};

/// What a single handler invocation did to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A node or edge was replaced, inserted, or removed.
    Applied,
    /// The event matched the current state; nothing was written.
    Unchanged,
    /// The event refers to an entity that is not materialized.
    Absent,
    /// A structural edge was parked until its parent appears.
    Deferred,
    /// A structural edge was refused to keep the hierarchy consistent.
    Rejected,
    /// The handler was invoked with an event of another kind.
    Ignored,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Route `event` to its handler and apply it to `model`.
pub fn apply_event(event: &HierarchyEvent, model: &mut HierarchyModel) -> Outcome {
    handler_for(event.kind())(event, model)
}

/// The handler registered for `kind`.
#[must_use]
pub fn handler_for(kind: EventKind) -> Handler {
    match kind {
        EventKind::BrowserTextChanged => handle_browser_text_changed,
        EventKind::WatchAdded => handle_watch_added,
        EventKind::WatchRemoved => handle_watch_removed,
        EventKind::EntityDeprecatedChanged => handle_entity_deprecated_changed,
        EventKind::CommentPosted | EventKind::DiscussionStatusChanged => {
            handle_open_comment_count
        }
        EventKind::ChildAdded => handle_child_added,
        EventKind::ChildRemoved => handle_child_removed,
        EventKind::EntityDeleted => handle_entity_deleted,
    }
}

fn handle_browser_text_changed(event: &HierarchyEvent, model: &mut HierarchyModel) -> Outcome {
    let HierarchyEvent::BrowserTextChanged { entity, new_text } = event else {
        return Outcome::Ignored;
    };
    replace_node(model, entity, |node| node.with_label(new_text.as_str()))
}

fn handle_watch_added(event: &HierarchyEvent, model: &mut HierarchyModel) -> Outcome {
    let HierarchyEvent::WatchAdded { watch } = event else {
        return Outcome::Ignored;
    };
    replace_node(model, &watch.entity, |node| {
        let mut watches = node.watches().clone();
        watches.insert(watch.clone());
        node.with_watches(watches)
    })
}

fn handle_watch_removed(event: &HierarchyEvent, model: &mut HierarchyModel) -> Outcome {
    let HierarchyEvent::WatchRemoved { watch } = event else {
        return Outcome::Ignored;
    };
    replace_node(model, &watch.entity, |node| {
        let mut watches = node.watches().clone();
        watches.remove(watch);
        node.with_watches(watches)
    })
}

fn handle_entity_deprecated_changed(
    event: &HierarchyEvent,
    model: &mut HierarchyModel,
) -> Outcome {
    let HierarchyEvent::EntityDeprecatedChanged { entity, deprecated } = event else {
        return Outcome::Ignored;
    };
    replace_node(model, entity, |node| node.with_deprecated(*deprecated))
}

/// Shared by comment-posted and discussion-status-changed: both carry the
/// entity's new absolute open-thread count.
fn handle_open_comment_count(event: &HierarchyEvent, model: &mut HierarchyModel) -> Outcome {
    let (HierarchyEvent::CommentPosted {
        entity,
        open_comment_count,
    }
    | HierarchyEvent::DiscussionStatusChanged {
        entity,
        open_comment_count,
    }) = event
    else {
        return Outcome::Ignored;
    };
    let Some(entity) = entity else {
        return Outcome::Absent;
    };
    replace_node(model, entity, |node| {
        node.with_open_comment_count(*open_comment_count)
    })
}

fn handle_child_added(event: &HierarchyEvent, model: &mut HierarchyModel) -> Outcome {
    let HierarchyEvent::ChildAdded { parent, child } = event else {
        return Outcome::Ignored;
    };
    match model.add_child(parent.as_ref(), child.clone()) {
        Ok(Attachment::Attached) => Outcome::Applied,
        Ok(Attachment::AlreadyAttached) => Outcome::Unchanged,
        Ok(Attachment::Deferred) => Outcome::Deferred,
        Err(e) => {
            tracing::warn!(error = %e, code = %e.code(), "rejected hierarchy edge");
            Outcome::Rejected
        }
    }
}

fn handle_child_removed(event: &HierarchyEvent, model: &mut HierarchyModel) -> Outcome {
    let HierarchyEvent::ChildRemoved { parent, child } = event else {
        return Outcome::Ignored;
    };
    let removal = model.remove_child(parent.as_ref(), child);
    if removal.removed {
        Outcome::Applied
    } else {
        Outcome::Unchanged
    }
}

fn handle_entity_deleted(event: &HierarchyEvent, model: &mut HierarchyModel) -> Outcome {
    let HierarchyEvent::EntityDeleted { entity } = event else {
        return Outcome::Ignored;
    };
    if model.remove_node(entity).removed {
        Outcome::Applied
    } else {
        Outcome::Absent
    }
}

/// Look up `entity`, derive its replacement with `change`, and store it if
/// it differs from the current node.
fn replace_node<F>(model: &mut HierarchyModel, entity: &EntityId, change: F) -> Outcome
where
    F: FnOnce(&EntityNode) -> EntityNode,
{
    let Some(current) = model.get_node(entity) else {
        tracing::trace!(entity = %entity, "event for unmaterialized entity; skipping");
        return Outcome::Absent;
    };
    let updated = change(current.as_ref());
    if updated == *current {
        return Outcome::Unchanged;
    }
    model.update_node(updated);
    Outcome::Applied
}

// ---------------------------------------------------------------------------
// Type-state lifecycle
// ---------------------------------------------------------------------------

/// An updater that has not been bound to a model or event source yet.
#[derive(Debug, Clone)]
pub struct HierarchyUpdater {
    kinds: Vec<EventKind>,
}

impl Default for HierarchyUpdater {
    fn default() -> Self {
        Self {
            kinds: EventKind::ALL.to_vec(),
        }
    }
}

impl HierarchyUpdater {
    /// An updater that listens to every event kind.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the updater to metadata events, leaving hierarchy shape to
    /// another owner.
    #[must_use]
    pub fn metadata_only() -> Self {
        Self {
            kinds: EventKind::ALL
                .into_iter()
                .filter(|kind| !kind.is_structural())
                .collect(),
        }
    }

    #[must_use]
    pub fn kinds(&self) -> &[EventKind] {
        &self.kinds
    }

    /// Register one handler per kind on `source` and take ownership of
    /// `model`.
    pub fn start<S: EventSource>(self, source: &mut S, model: HierarchyModel) -> StartedUpdater {
        tracing::info!(kinds = self.kinds.len(), "starting hierarchy updater");
        let subscriptions = self
            .kinds
            .iter()
            .map(|&kind| source.register(kind, handler_for(kind)))
            .collect();
        StartedUpdater {
            model,
            subscriptions,
        }
    }
}

/// An updater bound to a model, with live registrations on an event source.
#[derive(Debug)]
pub struct StartedUpdater {
    model: HierarchyModel,
    subscriptions: Vec<SubscriptionId>,
}

impl StartedUpdater {
    /// Read access to the maintained hierarchy.
    #[must_use]
    pub const fn model(&self) -> &HierarchyModel {
        &self.model
    }

    #[must_use]
    pub fn subscriptions(&self) -> &[SubscriptionId] {
        &self.subscriptions
    }

    /// Deliver one event from `source` to this updater's model.
    pub fn deliver<S: EventSource>(&mut self, source: &S, event: &HierarchyEvent) -> Vec<Outcome> {
        source.dispatch(event, &mut self.model)
    }

    /// Deliver events in order, returning one outcome list per event.
    pub fn deliver_all<'a, S, I>(&mut self, source: &S, events: I) -> Vec<Vec<Outcome>>
    where
        S: EventSource,
        I: IntoIterator<Item = &'a HierarchyEvent>,
    {
        events
            .into_iter()
            .map(|event| self.deliver(source, event))
            .collect()
    }

    /// Unregister every handler and return the model in its last state.
    pub fn stop<S: EventSource>(self, source: &mut S) -> HierarchyModel {
        for id in &self.subscriptions {
            source.unregister(*id);
        }
        tracing::info!(nodes = self.model.len(), "stopped hierarchy updater");
        self.model
    }
}
