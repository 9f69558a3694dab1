use canopy_core::event::{EventBus, HierarchyEvent};
use canopy_core::hierarchy::{HierarchyModel, HierarchyUpdater, OrphanPolicy, apply_event};
use canopy_core::model::{EntityId, EntityNode};
use proptest::prelude::*;
use std::collections::BTreeSet;

#[path = "generators.rs"]
mod generators;
use generators::*;

fn replay(model: &mut HierarchyModel, events: &[HierarchyEvent]) {
    for event in events {
        apply_event(event, model);
    }
}

fn with_root(entity: &EntityId) -> HierarchyModel {
    let mut model = HierarchyModel::new();
    model
        .add_child(None, EntityNode::fresh(entity.clone(), entity.as_str()))
        .expect("root");
    model
}

fn built(events: &[HierarchyEvent]) -> HierarchyModel {
    let mut model = HierarchyModel::new();
    replay(&mut model, events);
    model
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn metadata_events_never_change_structure(
        setup in prop::collection::vec(arb_structural_event(), 0..30),
        updates in prop::collection::vec(arb_metadata_event(), 0..30),
    ) {
        let mut model = built(&setup);
        let before = structure(&model);
        replay(&mut model, &updates);
        prop_assert_eq!(structure(&model), before);
    }

    #[test]
    fn every_event_is_idempotent(
        setup in prop::collection::vec(arb_event(), 0..30),
        event in arb_event(),
    ) {
        let mut once = built(&setup);
        apply_event(&event, &mut once);

        let mut twice = built(&setup);
        apply_event(&event, &mut twice);
        apply_event(&event, &mut twice);

        prop_assert_eq!(shape(&once), shape(&twice));
    }

    #[test]
    fn watch_sequences_end_in_last_op_under_any_interleaving(
        (seqs, schedule) in arb_interleaved_watch_ops(),
        dup in any::<prop::sample::Index>(),
    ) {
        let entity = EntityId::new("E0");
        let watches = watches_on(&entity);
        let mut cursors = vec![0usize; seqs.len()];
        let events: Vec<HierarchyEvent> = schedule
            .iter()
            .map(|&i| {
                let add = seqs[i][cursors[i]];
                cursors[i] += 1;
                let watch = watches[i].clone();
                if add {
                    HierarchyEvent::WatchAdded { watch }
                } else {
                    HierarchyEvent::WatchRemoved { watch }
                }
            })
            .collect();
        let expected: BTreeSet<_> = seqs
            .iter()
            .zip(&watches)
            .filter(|(ops, _)| ops.last() == Some(&true))
            .map(|(_, watch)| watch.clone())
            .collect();

        let mut model = with_root(&entity);
        replay(&mut model, &events);
        let node = model.get_node(&entity).expect("node");
        prop_assert_eq!(node.watches(), &expected);

        if !events.is_empty() {
            let k = dup.index(events.len());
            let mut doubled = events.clone();
            doubled.insert(k, events[k].clone());
            let mut again = with_root(&entity);
            replay(&mut again, &doubled);
            prop_assert_eq!(shape(&again), shape(&model));
        }
    }

    #[test]
    fn metadata_on_distinct_entities_commutes(
        setup in prop::collection::vec(arb_structural_event(), 0..30),
        a in arb_metadata_event(),
        b in arb_metadata_event(),
    ) {
        prop_assume!(a.subject().is_some() && a.subject() != b.subject());

        let mut ab = built(&setup);
        apply_event(&a, &mut ab);
        apply_event(&b, &mut ab);

        let mut ba = built(&setup);
        apply_event(&b, &mut ba);
        apply_event(&a, &mut ba);

        prop_assert_eq!(shape(&ab), shape(&ba));
    }

    #[test]
    fn every_node_is_in_scope_and_acyclic(
        events in prop::collection::vec(arb_event(), 0..60),
    ) {
        let model = built(&events);
        for entity in model.entities() {
            prop_assert!(
                model.is_root(&entity) || !model.parents(&entity).is_empty(),
                "{} is neither a root nor placed", entity
            );
            prop_assert!(!model.ancestors(&entity).contains(&entity));
            for child in model.children(&entity) {
                prop_assert!(model.contains(&child));
                prop_assert!(model.parents(&child).contains(&entity));
            }
        }
    }

    #[test]
    fn reject_policy_never_parks(
        events in prop::collection::vec(arb_structural_event(), 0..40),
    ) {
        let mut model = HierarchyModel::with_orphan_policy(OrphanPolicy::Reject);
        replay(&mut model, &events);
        prop_assert_eq!(model.pending_len(), 0);
    }

    #[test]
    fn bus_delivery_matches_direct_application(
        events in prop::collection::vec(arb_event(), 0..40),
    ) {
        let mut bus = EventBus::new();
        let mut updater = HierarchyUpdater::new().start(&mut bus, HierarchyModel::new());
        updater.deliver_all(&bus, &events);
        let via_bus = updater.stop(&mut bus);

        prop_assert_eq!(shape(&via_bus), shape(&built(&events)));
    }
}
