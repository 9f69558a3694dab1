#![allow(dead_code)]

use canopy_core::change::DocumentSnapshot;
use canopy_core::event::HierarchyEvent;
use canopy_core::hierarchy::HierarchyModel;
use canopy_core::model::{EntityId, EntityKind, EntityNode, UserId, Watch, WatchType};
use proptest::prelude::*;

/// A small identity pool so generated events collide often.
pub fn arb_entity_id() -> impl Strategy<Value = EntityId> + Clone {
    (0u8..6).prop_map(|n| EntityId::new(format!("E{n}")))
}

pub fn arb_label() -> impl Strategy<Value = String> + Clone {
    "[A-Z][a-z]{0,6}"
}

pub fn arb_watch() -> impl Strategy<Value = Watch> + Clone {
    (
        (0u8..3).prop_map(|n| UserId::new(format!("u{n}"))),
        arb_entity_id(),
        prop_oneof![Just(WatchType::Entity), Just(WatchType::Branch)],
    )
        .prop_map(|(user, entity, watch_type)| Watch::new(user, entity, watch_type))
}

/// Every distinct watch the users `u0..u2` can hold on `entity`.
pub fn watches_on(entity: &EntityId) -> Vec<Watch> {
    (0..3)
        .flat_map(|n| {
            [WatchType::Entity, WatchType::Branch]
                .into_iter()
                .map(move |t| Watch::new(UserId::new(format!("u{n}")), entity.clone(), t))
        })
        .collect()
}

/// One add (`true`) / remove (`false`) sequence per watch from
/// [`watches_on`], plus a shuffled schedule of watch indices. Walking the
/// schedule and taking each watch's next op interleaves the sequences while
/// keeping each one in its own order.
pub fn arb_interleaved_watch_ops() -> impl Strategy<Value = (Vec<Vec<bool>>, Vec<usize>)> {
    prop::collection::vec(prop::collection::vec(any::<bool>(), 0..6), 6).prop_flat_map(|seqs| {
        let schedule: Vec<usize> = seqs
            .iter()
            .enumerate()
            .flat_map(|(i, ops)| std::iter::repeat_n(i, ops.len()))
            .collect();
        (Just(seqs), Just(schedule).prop_shuffle())
    })
}

/// Events that only touch cached node metadata.
pub fn arb_metadata_event() -> impl Strategy<Value = HierarchyEvent> + Clone {
    prop_oneof![
        (arb_entity_id(), arb_label())
            .prop_map(|(entity, new_text)| HierarchyEvent::BrowserTextChanged { entity, new_text }),
        arb_watch().prop_map(|watch| HierarchyEvent::WatchAdded { watch }),
        arb_watch().prop_map(|watch| HierarchyEvent::WatchRemoved { watch }),
        (arb_entity_id(), any::<bool>()).prop_map(|(entity, deprecated)| {
            HierarchyEvent::EntityDeprecatedChanged { entity, deprecated }
        }),
        (prop::option::of(arb_entity_id()), 0u32..5).prop_map(|(entity, open_comment_count)| {
            HierarchyEvent::CommentPosted {
                entity,
                open_comment_count,
            }
        }),
        (prop::option::of(arb_entity_id()), 0u32..5).prop_map(|(entity, open_comment_count)| {
            HierarchyEvent::DiscussionStatusChanged {
                entity,
                open_comment_count,
            }
        }),
    ]
}

/// Events that add or remove placements and entities.
pub fn arb_structural_event() -> impl Strategy<Value = HierarchyEvent> + Clone {
    prop_oneof![
        3 => (prop::option::of(arb_entity_id()), arb_entity_id()).prop_map(|(parent, child)| {
            let label = child.as_str().to_string();
            HierarchyEvent::ChildAdded {
                parent,
                child: EntityNode::fresh(child, label),
            }
        }),
        1 => (prop::option::of(arb_entity_id()), arb_entity_id())
            .prop_map(|(parent, child)| HierarchyEvent::ChildRemoved { parent, child }),
        1 => arb_entity_id().prop_map(|entity| HierarchyEvent::EntityDeleted { entity }),
    ]
}

pub fn arb_event() -> impl Strategy<Value = HierarchyEvent> + Clone {
    prop_oneof![arb_metadata_event(), arb_structural_event()]
}

pub fn arb_entity_kind() -> impl Strategy<Value = EntityKind> + Clone {
    prop::sample::select(EntityKind::ALL.to_vec())
}

/// A document of classes `C0..Cn` arranged as a random forest.
pub fn arb_class_snapshot() -> impl Strategy<Value = DocumentSnapshot> {
    (1usize..8)
        .prop_flat_map(|n| (Just(n), prop::collection::vec(any::<prop::sample::Index>(), n)))
        .prop_map(|(n, picks)| {
            let mut snap = DocumentSnapshot::new();
            for i in 0..n {
                snap.declare(EntityId::new(format!("C{i}")), EntityKind::Class);
            }
            for (i, pick) in picks.iter().enumerate().skip(1) {
                // Only earlier classes can be parents, so the result is acyclic.
                let parent = pick.index(i);
                snap.place(
                    EntityId::new(format!("C{i}")),
                    EntityId::new(format!("C{parent}")),
                );
            }
            snap
        })
}

/// Comparable description of everything a reader can observe in a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    pub nodes: Vec<EntityNode>,
    pub roots: Vec<EntityId>,
    pub edges: Vec<(EntityId, EntityId)>,
    pub pending: usize,
}

pub fn shape(model: &HierarchyModel) -> Shape {
    let entities = model.entities();
    let nodes = entities
        .iter()
        .filter_map(|e| model.get_node(e))
        .map(|n| n.as_ref().clone())
        .collect();
    let edges = entities
        .iter()
        .flat_map(|parent| {
            model
                .children(parent)
                .into_iter()
                .map(move |child| (parent.clone(), child))
        })
        .collect();
    Shape {
        nodes,
        roots: model.roots(),
        edges,
        pending: model.pending_len(),
    }
}

/// Structure only: which entities exist and how they are connected.
pub fn structure(model: &HierarchyModel) -> (Vec<EntityId>, Vec<EntityId>, Vec<(EntityId, EntityId)>) {
    let s = shape(model);
    (
        s.nodes.iter().map(|n| n.entity().clone()).collect(),
        s.roots,
        s.edges,
    )
}
