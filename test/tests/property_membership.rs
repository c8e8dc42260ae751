//! Property: after any sequence of component writes and removals, with one
//! replication frame per operation, the client mirror's membership and
//! values match what the filter says about the authoritative store.

use std::collections::HashMap;

use proptest::prelude::*;

use syncra_shared::{ComponentKind, EntityCriteria, EntityId, PredicateFilter};
use syncra_test::{Link, Position};

fn east(p: &Position) -> bool {
    p.x > 0
}

#[derive(Clone, Debug)]
enum Op {
    Set { slot: u8, x: i32 },
    Remove { slot: u8 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..4, -20i32..=20).prop_map(|(slot, x)| Op::Set { slot, x }),
        1 => (0u8..4).prop_map(|slot| Op::Remove { slot }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn mirror_converges_to_filtered_store_state(ops in prop::collection::vec(op_strategy(), 1..24)) {
        let mut link = Link::default();
        let entities: Vec<EntityId> = (0..4).map(|_| link.store().create_entity()).collect();

        let criteria = EntityCriteria::new().with_filter(PredicateFilter::shared("east", east));
        let mut set = link.client.get_entities(criteria).unwrap();
        link.frame();
        set.apply_changes().unwrap();

        // Ground truth per slot, mirrored frame by frame.
        let mut truth: HashMap<u8, Position> = HashMap::new();
        for op in ops {
            match op {
                Op::Set { slot, x } => {
                    link.store().set_component(entities[slot as usize], Position { x });
                    truth.insert(slot, Position { x });
                }
                Op::Remove { slot } => {
                    link.store().remove_component(
                        entities[slot as usize],
                        ComponentKind::of::<Position>(),
                    );
                    truth.remove(&slot);
                }
            }
            link.frame();
            set.apply_changes().unwrap();
        }

        let expected: HashMap<EntityId, Position> = truth
            .iter()
            .filter(|(_, p)| east(p))
            .map(|(slot, p)| (entities[*slot as usize], p.clone()))
            .collect();

        prop_assert_eq!(set.len(), expected.len());
        for (entity_id, position) in &expected {
            let entity = set.entity(*entity_id);
            prop_assert!(entity.is_some());
            prop_assert_eq!(
                entity.and_then(|e| e.get::<Position>()),
                Some(position)
            );
        }
    }
}
