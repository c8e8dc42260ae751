//! End-to-end watched entities and blocking point queries. Blocking calls
//! run on a scoped worker thread while the test thread pumps the link.

use std::thread;

use syncra_shared::{ComponentKind, EntityCriteria, EntityData, PredicateFilter, StringIndex};
use syncra_test::{Label, Link, Position, Speed};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn east(p: &Position) -> bool {
    p.x > 0
}

/// Runs `work` on a worker thread, pumping until it finishes.
fn pumped<T, F>(link: &mut Link, work: F) -> T
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    thread::scope(|scope| {
        let worker = scope.spawn(work);
        while !worker.is_finished() {
            link.pump();
            thread::yield_now();
        }
        worker.join().unwrap()
    })
}

#[test]
fn watch_starts_from_current_values_and_streams_deltas() {
    init();
    let mut link = Link::default();
    let a = link.store().create_entity();
    link.store().set_component(a, Position { x: 3 });

    let client = link.client.clone();
    let mut watched = pumped(&mut link, || {
        client.watch_entity(a, &[ComponentKind::of::<Position>()])
    })
    .unwrap();
    assert_eq!(watched.get::<Position>(), Some(&Position { x: 3 }));

    link.store().set_component(a, Position { x: 4 });
    link.frame();
    assert!(watched.apply_changes());
    assert_eq!(watched.get::<Position>(), Some(&Position { x: 4 }));

    // A removal empties the slot instead of evicting anything.
    link.store()
        .remove_component(a, ComponentKind::of::<Position>());
    link.frame();
    assert!(watched.apply_changes());
    assert!(watched.get::<Position>().is_none());
}

#[test]
fn watch_ignores_other_entities_and_kinds() {
    init();
    let mut link = Link::default();
    let a = link.store().create_entity();
    let b = link.store().create_entity();
    link.store().set_component(a, Position { x: 1 });
    // Drain the write above while nothing tracks it; the watch must only
    // ever hear about writes made after it exists.
    link.frame();

    let client = link.client.clone();
    let mut watched = pumped(&mut link, || {
        client.watch_entity(a, &[ComponentKind::of::<Position>()])
    })
    .unwrap();

    link.store().set_component(b, Position { x: 9 });
    link.store().set_component(a, Speed(2));
    link.frame();
    assert!(!watched.apply_changes());
    assert_eq!(watched.get::<Position>(), Some(&Position { x: 1 }));
}

#[test]
fn released_watch_goes_quiet() {
    init();
    let mut link = Link::default();
    let a = link.store().create_entity();
    link.store().set_component(a, Position { x: 1 });

    let client = link.client.clone();
    let mut watched = pumped(&mut link, || {
        client.watch_entity(a, &[ComponentKind::of::<Position>()])
    })
    .unwrap();

    watched.release().unwrap();
    watched.release().unwrap();
    link.frame();
    link.store().set_component(a, Position { x: 7 });
    link.frame();
    assert!(!watched.apply_changes());
}

#[test]
fn get_component_round_trips_for_untracked_entities() {
    init();
    let mut link = Link::default();
    let a = link.store().create_entity();
    link.store().set_component(a, Position { x: 11 });

    let client = link.client.clone();
    let value = pumped(&mut link, || {
        client.get_component(a, ComponentKind::of::<Position>())
    })
    .unwrap();
    assert_eq!(
        value.as_ref().and_then(|v| v.downcast_ref::<Position>()),
        Some(&Position { x: 11 })
    );

    let missing = pumped(&mut link, || {
        client.get_component(a, ComponentKind::of::<Speed>())
    })
    .unwrap();
    assert!(missing.is_none());
}

#[test]
fn get_entity_returns_an_aligned_view() {
    init();
    let mut link = Link::default();
    let a = link.store().create_entity();
    link.store().set_component(a, Position { x: 2 });
    link.store().set_component(a, Label("rook"));

    let kinds = [ComponentKind::of::<Position>(), ComponentKind::of::<Label>()];
    let client = link.client.clone();
    let entity = pumped(&mut link, || client.get_entity(a, &kinds)).unwrap();
    assert!(entity.is_complete());
    assert_eq!(entity.get::<Position>(), Some(&Position { x: 2 }));
    assert_eq!(entity.get::<Label>(), Some(&Label("rook")));
}

#[test]
fn find_queries_consult_the_authoritative_store() {
    init();
    let mut link = Link::default();
    let a = link.store().create_entity();
    let b = link.store().create_entity();
    link.store().set_component(a, Position { x: 1 });
    link.store().set_component(b, Position { x: 2 });

    let criteria = EntityCriteria::new().with_filter(PredicateFilter::shared("east", east));
    let client = link.client.clone();
    let ids = pumped(&mut link, || client.find_entities(&criteria)).unwrap();
    assert_eq!(ids, vec![a, b]);

    let first = pumped(&mut link, || client.find_entity(&criteria)).unwrap();
    assert_eq!(first, Some(a));
}

#[test]
fn string_ids_resolve_remotely_and_never_intern() {
    init();
    let mut link = Link::default();
    let interned = link.store().string_index().string_id("faction", true).unwrap();

    let client = link.client.clone();
    let id = pumped(&mut link, || client.get_string_id("faction")).unwrap();
    assert_eq!(id, Some(interned));

    let text = pumped(&mut link, || client.get_string(interned)).unwrap();
    assert_eq!(text.as_deref(), Some("faction"));

    let unknown = pumped(&mut link, || client.get_string_id("never-seen")).unwrap();
    assert_eq!(unknown, None);
    assert_eq!(link.store().string_index().string_id("never-seen", false), None);
}
