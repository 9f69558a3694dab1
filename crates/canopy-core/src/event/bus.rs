//! Handler registration keyed by event kind.
//!
//! A handler is a plain function taking the event and the model it should
//! update. The bus never owns or captures a model: whoever publishes an event
//! hands the model over for the duration of that one dispatch.

use std::collections::BTreeMap;

use super::{EventKind, HierarchyEvent};
use crate::hierarchy::{HierarchyModel, Outcome};

/// Signature of every hierarchy event handler.
pub type Handler = fn(&HierarchyEvent, &mut HierarchyModel) -> Outcome;

/// Opaque token returned by [`EventSource::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// A source of typed hierarchy events.
pub trait EventSource {
    /// Register `handler` for every future event of `kind`.
    fn register(&mut self, kind: EventKind, handler: Handler) -> SubscriptionId;

    /// Remove a registration. Returns `false` if `id` was not registered.
    fn unregister(&mut self, id: SubscriptionId) -> bool;

    /// Run every handler registered for the event's kind, in registration
    /// order, against `model`.
    fn dispatch(&self, event: &HierarchyEvent, model: &mut HierarchyModel) -> Vec<Outcome>;
}

/// In-process [`EventSource`].
#[derive(Debug, Default)]
pub struct EventBus {
    handlers: BTreeMap<EventKind, Vec<(SubscriptionId, Handler)>>,
    next_id: u64,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live registrations for `kind`.
    #[must_use]
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }
}

impl EventSource for EventBus {
    fn register(&mut self, kind: EventKind, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.entry(kind).or_default().push((id, handler));
        tracing::trace!(kind = %kind, subscription = id.0, "registered handler");
        id
    }

    fn unregister(&mut self, id: SubscriptionId) -> bool {
        for handlers in self.handlers.values_mut() {
            if let Some(pos) = handlers.iter().position(|(sub, _)| *sub == id) {
                handlers.remove(pos);
                return true;
            }
        }
        false
    }

    fn dispatch(&self, event: &HierarchyEvent, model: &mut HierarchyModel) -> Vec<Outcome> {
        let Some(handlers) = self.handlers.get(&event.kind()) else {
            return Vec::new();
        };
        handlers
            .iter()
            .map(|(_, handler)| handler(event, model))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityId, EntityNode};

    fn relabel_to_x(event: &HierarchyEvent, model: &mut HierarchyModel) -> Outcome {
        let Some(entity) = event.subject() else {
            return Outcome::Absent;
        };
        match model.get_node(entity) {
            Some(node) => {
                model.update_node(node.with_label("x"));
                Outcome::Applied
            }
            None => Outcome::Absent,
        }
    }

    fn text_event() -> HierarchyEvent {
        HierarchyEvent::BrowserTextChanged {
            entity: EntityId::new("E"),
            new_text: "ignored".into(),
        }
    }

    #[test]
    fn dispatch_without_handlers_is_empty() {
        let bus = EventBus::new();
        let mut model = HierarchyModel::new();
        assert!(bus.dispatch(&text_event(), &mut model).is_empty());
    }

    #[test]
    fn dispatch_reaches_only_matching_kind() {
        let mut bus = EventBus::new();
        bus.register(EventKind::WatchAdded, relabel_to_x);
        let mut model = HierarchyModel::new();
        model.update_node(EntityNode::fresh(EntityId::new("E"), "Foo"));

        assert!(bus.dispatch(&text_event(), &mut model).is_empty());
        assert_eq!(
            model.get_node(&EntityId::new("E")).map(|n| n.label().to_string()),
            Some("Foo".to_string())
        );
    }

    #[test]
    fn unregister_stops_delivery() {
        let mut bus = EventBus::new();
        let id = bus.register(EventKind::BrowserTextChanged, relabel_to_x);
        assert_eq!(bus.handler_count(EventKind::BrowserTextChanged), 1);
        assert!(bus.unregister(id));
        assert!(!bus.unregister(id));
        assert_eq!(bus.handler_count(EventKind::BrowserTextChanged), 0);

        let mut model = HierarchyModel::new();
        model.update_node(EntityNode::fresh(EntityId::new("E"), "Foo"));
        assert!(bus.dispatch(&text_event(), &mut model).is_empty());
    }

    #[test]
    fn subscription_ids_are_distinct() {
        let mut bus = EventBus::new();
        let a = bus.register(EventKind::BrowserTextChanged, relabel_to_x);
        let b = bus.register(EventKind::BrowserTextChanged, relabel_to_x);
        assert_ne!(a, b);
        assert_eq!(bus.handler_count(EventKind::BrowserTextChanged), 2);
    }
}
