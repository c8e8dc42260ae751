//! End-to-end lifecycle of a mirrored entity set: initial snapshots, streamed
//! deltas, filter-driven eviction, filter resets, release.

use syncra_shared::{ComponentKind, EntityCriteria, PredicateFilter};
use syncra_test::{Link, Position, Speed};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn east(p: &Position) -> bool {
    p.x > 0
}

fn west(p: &Position) -> bool {
    p.x < 0
}

fn east_criteria() -> EntityCriteria {
    EntityCriteria::new().with_filter(PredicateFilter::shared("east", east))
}

#[test]
fn initial_members_arrive_as_added() {
    init();
    let mut link = Link::default();
    let a = link.store().create_entity();
    let b = link.store().create_entity();
    link.store().set_component(a, Position { x: 5 });
    link.store().set_component(b, Position { x: -5 });

    let mut set = link.client.get_entities(east_criteria()).unwrap();
    link.pump();

    assert!(set.apply_changes().unwrap());
    assert_eq!(set.added_entities().len(), 1);
    assert!(set.contains(a));
    assert!(!set.contains(b));
}

#[test]
fn mutations_stream_as_changes() {
    init();
    let mut link = Link::default();
    let a = link.store().create_entity();
    link.store().set_component(a, Position { x: 1 });

    let mut set = link.client.get_entities(east_criteria()).unwrap();
    link.frame();
    set.apply_changes().unwrap();

    link.store().set_component(a, Position { x: 2 });
    link.frame();
    assert!(set.apply_changes().unwrap());
    assert_eq!(set.changed_entities().len(), 1);
    assert_eq!(
        set.entity(a).unwrap().get::<Position>(),
        Some(&Position { x: 2 })
    );
}

#[test]
fn filter_failure_evicts_on_both_sides() {
    init();
    let mut link = Link::default();
    let a = link.store().create_entity();
    link.store().set_component(a, Position { x: 1 });

    let mut set = link.client.get_entities(east_criteria()).unwrap();
    link.frame();
    set.apply_changes().unwrap();
    assert!(set.contains(a));

    link.store().set_component(a, Position { x: -1 });
    link.frame();
    assert!(set.apply_changes().unwrap());
    assert_eq!(set.removed_entities().len(), 1);
    assert!(set.is_empty());

    // The pair is expired server-side now; further changes stay quiet.
    link.store().set_component(a, Position { x: -2 });
    link.frame();
    assert!(!set.apply_changes().unwrap());
}

#[test]
fn component_removal_evicts_the_member() {
    init();
    let mut link = Link::default();
    let a = link.store().create_entity();
    link.store().set_component(a, Position { x: 3 });

    let mut set = link.client.get_entities(east_criteria()).unwrap();
    link.frame();
    set.apply_changes().unwrap();

    link.store()
        .remove_component(a, ComponentKind::of::<Position>());
    link.frame();
    assert!(set.apply_changes().unwrap());
    assert!(!set.contains(a));
    assert_eq!(set.removed_entities().len(), 1);
}

#[test]
fn departed_member_is_readmitted_with_a_fresh_snapshot() {
    init();
    let mut link = Link::default();
    let a = link.store().create_entity();
    link.store().set_component(a, Position { x: 1 });

    let mut set = link.client.get_entities(east_criteria()).unwrap();
    link.frame();
    set.apply_changes().unwrap();

    link.store().set_component(a, Position { x: -1 });
    link.frame();
    set.apply_changes().unwrap();
    assert!(!set.contains(a));

    link.store().set_component(a, Position { x: 4 });
    link.frame();
    assert!(set.apply_changes().unwrap());
    assert_eq!(set.added_entities().len(), 1);
    assert_eq!(
        set.entity(a).unwrap().get::<Position>(),
        Some(&Position { x: 4 })
    );
}

#[test]
fn filter_reset_swaps_membership_on_both_sides() {
    init();
    let mut link = Link::default();
    let east_id = link.store().create_entity();
    let west_id = link.store().create_entity();
    link.store().set_component(east_id, Position { x: 5 });
    link.store().set_component(west_id, Position { x: -5 });

    let mut set = link.client.get_entities(east_criteria()).unwrap();
    link.frame();
    set.apply_changes().unwrap();
    assert!(set.contains(east_id));

    set.reset_criteria(EntityCriteria::new().with_filter(PredicateFilter::shared("west", west)))
        .unwrap();
    link.frame();
    assert!(set.apply_changes().unwrap());
    assert!(!set.contains(east_id));
    assert!(set.contains(west_id));
}

#[test]
fn release_stops_the_stream_and_empties_the_mirror() {
    init();
    let mut link = Link::default();
    let a = link.store().create_entity();
    link.store().set_component(a, Position { x: 1 });

    let mut set = link.client.get_entities(east_criteria()).unwrap();
    link.frame();
    set.apply_changes().unwrap();

    set.release().unwrap();
    link.frame();
    assert!(set.apply_changes().unwrap());
    assert_eq!(set.removed_entities().len(), 1);
    assert!(set.is_empty());

    link.store().set_component(a, Position { x: 9 });
    link.frame();
    assert!(!set.apply_changes().unwrap());
}

#[test]
fn two_component_sets_require_complete_entities() {
    init();
    let mut link = Link::default();
    let a = link.store().create_entity();
    link.store().set_component(a, Position { x: 1 });

    let criteria = EntityCriteria::new()
        .with_filter(PredicateFilter::shared("east", east))
        .with::<Speed>();
    let mut set = link.client.get_entities(criteria).unwrap();
    link.frame();
    set.apply_changes().unwrap();
    assert!(set.is_empty());

    link.store().set_component(a, Speed(7));
    link.frame();
    assert!(set.apply_changes().unwrap());
    assert!(set.contains(a));
    assert_eq!(set.entity(a).unwrap().get::<Speed>(), Some(&Speed(7)));
}

#[test]
fn independent_sets_do_not_interfere() {
    init();
    let mut link = Link::default();
    let a = link.store().create_entity();
    link.store().set_component(a, Position { x: 1 });
    link.store().set_component(a, Speed(2));

    let mut positions = link.client.get_entities(east_criteria()).unwrap();
    let mut speeds = link
        .client
        .get_entities(EntityCriteria::new().with::<Speed>())
        .unwrap();
    link.frame();
    positions.apply_changes().unwrap();
    speeds.apply_changes().unwrap();
    assert!(positions.contains(a));
    assert!(speeds.contains(a));

    link.store().set_component(a, Speed(3));
    link.frame();
    assert!(!positions.apply_changes().unwrap());
    assert!(speeds.apply_changes().unwrap());
    assert_eq!(speeds.changed_entities().len(), 1);
}

#[test]
fn empty_criteria_is_rejected_before_sending() {
    init();
    let link = Link::default();
    assert!(link.client.get_entities(EntityCriteria::new()).is_err());
}
