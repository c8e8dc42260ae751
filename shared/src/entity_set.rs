//! Live, self-updating view of "entities whose components currently satisfy
//! criteria C".
//!
//! Producers (any thread mutating the store) append raw [`EntityChange`]s to
//! the set's queue; one consumer thread drains the queue through
//! [`EntitySet::apply_changes`], which resolves the batch in two phases:
//!
//! 1. **Accumulate**: stage each raw change against a provisional view;
//!    non-members become provisional adds (gated by a minimal filter match on
//!    the incoming value), members become provisional modifies. Raw values
//!    are applied into the provisional slots regardless of filter match, with
//!    a distinguished removed marker, so that phase 2 can detect departures.
//! 2. **Resolve**: provisional adds are completed against the backing
//!    reader and either admitted or discarded; provisional modifies are
//!    re-tested for membership and classified as changed or removed.
//!
//! Between two `apply_changes` calls the added/changed/removed buckets hold
//! exactly what the last call decided, in stable input order, and are
//! mutually disjoint.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crossbeam_channel::{Receiver, Sender};

use crate::{
    change::EntityChange,
    component::component::ComponentValue,
    component::component_kind::ComponentKind,
    criteria::EntityCriteria,
    entity::entity::Entity,
    entity::entity_id::EntityId,
    error::SetError,
    store::ComponentReader,
};

/// Producer handle for injecting whole, already-complete entities into a
/// set, bypassing completion. Used by remote mirrors to feed server
/// snapshots in ahead of the set's next `apply_changes`.
#[derive(Clone)]
pub struct EntityInjector {
    sender: Sender<Entity>,
}

impl EntityInjector {
    /// Returns false if the set is gone.
    pub fn inject(&self, entity: Entity) -> bool {
        self.sender.send(entity).is_ok()
    }
}

pub struct EntitySet {
    criteria: EntityCriteria,
    kinds: Arc<[ComponentKind]>,
    reader: Arc<dyn ComponentReader>,
    changes: Receiver<EntityChange>,
    direct_tx: Sender<Entity>,
    direct_rx: Receiver<Entity>,
    entities: HashMap<EntityId, Entity>,
    added: Vec<Entity>,
    changed: Vec<Entity>,
    removed: Vec<Entity>,
    released: Arc<AtomicBool>,
    release_reported: bool,
    filters_dirty: bool,
}

impl EntitySet {
    /// Builds an empty set over `criteria`. The caller wires `changes` to a
    /// producer (store fanout or inbound message routing) and `released` to
    /// whatever owns the set's lifecycle.
    pub fn new(
        criteria: EntityCriteria,
        reader: Arc<dyn ComponentReader>,
        changes: Receiver<EntityChange>,
        released: Arc<AtomicBool>,
    ) -> Self {
        let kinds = criteria.kind_list();
        let (direct_tx, direct_rx) = crossbeam_channel::unbounded();
        Self {
            criteria,
            kinds,
            reader,
            changes,
            direct_tx,
            direct_rx,
            entities: HashMap::new(),
            added: Vec::new(),
            changed: Vec::new(),
            removed: Vec::new(),
            released,
            release_reported: false,
            filters_dirty: false,
        }
    }

    /// Populates the set from the backing reader without producing add
    /// events. Called once at creation by the authoritative store; remote
    /// mirrors skip it and rely on injection.
    pub fn load(&mut self) {
        for entity_id in self.reader.find_matching(&self.criteria) {
            if self.entities.contains_key(&entity_id) {
                continue;
            }
            if let Some(entity) = self.fetch_entity(entity_id) {
                self.entities.insert(entity_id, entity);
            }
        }
    }

    pub fn criteria(&self) -> &EntityCriteria {
        &self.criteria
    }

    pub fn kinds(&self) -> &Arc<[ComponentKind]> {
        &self.kinds
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, entity_id: EntityId) -> bool {
        self.entities.contains_key(&entity_id)
    }

    pub fn entity(&self, entity_id: EntityId) -> Option<&Entity> {
        self.entities.get(&entity_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Entities admitted by the last `apply_changes`, in input order.
    pub fn added_entities(&self) -> &[Entity] {
        &self.added
    }

    /// Members whose values changed during the last `apply_changes`.
    pub fn changed_entities(&self) -> &[Entity] {
        &self.changed
    }

    /// Entities evicted by the last `apply_changes`.
    pub fn removed_entities(&self) -> &[Entity] {
        &self.removed
    }

    /// Clears the transient diff buckets ahead of schedule.
    pub fn clear_change_sets(&mut self) {
        self.added.clear();
        self.changed.clear();
        self.removed.clear();
    }

    pub fn direct_injector(&self) -> EntityInjector {
        EntityInjector {
            sender: self.direct_tx.clone(),
        }
    }

    /// Replaces the criteria's filters. The ordered kind list must be
    /// unchanged; membership is re-evaluated on the next `apply_changes`.
    pub fn reset_criteria(&mut self, criteria: EntityCriteria) -> Result<(), SetError> {
        if !self.criteria.same_kinds(&criteria) {
            return Err(SetError::KindMismatch {
                expected: kind_names(&self.criteria),
                got: kind_names(&criteria),
            });
        }
        self.criteria = criteria;
        self.filters_dirty = true;
        Ok(())
    }

    /// Marks the set released. Idempotent; the next `apply_changes` reports
    /// every member removed and the set goes inert.
    pub fn release(&self) {
        self.released.store(true, Ordering::Release);
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Drains the pending queues and applies them through the two-phase
    /// transaction. Returns true iff membership or any member's values
    /// changed.
    ///
    /// Single-consumer: not safe for concurrent callers, safe against
    /// concurrent producers.
    pub fn apply_changes(&mut self) -> bool {
        self.clear_change_sets();

        if self.is_released() {
            return self.apply_release();
        }

        if self.filters_dirty {
            self.filters_dirty = false;
            self.refilter();
        }

        while let Ok(entity) = self.direct_rx.try_recv() {
            self.apply_direct(entity);
        }

        let mut transaction = Transaction::new();
        while let Ok(change) = self.changes.try_recv() {
            self.accumulate(&mut transaction, change);
        }
        self.resolve(transaction);

        !self.added.is_empty() || !self.changed.is_empty() || !self.removed.is_empty()
    }

    fn apply_release(&mut self) -> bool {
        // Unconsumed queue contents are meaningless once released.
        while self.direct_rx.try_recv().is_ok() {}
        while self.changes.try_recv().is_ok() {}

        if self.release_reported {
            return false;
        }
        self.release_reported = true;
        self.removed = self.entities.drain().map(|(_, e)| e).collect();
        !self.removed.is_empty()
    }

    /// Purges members failing the (new) filters, then reloads from the
    /// backing reader. Ids already present get no redundant add event.
    fn refilter(&mut self) {
        let purged: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, e)| !self.criteria.entity_matches(e))
            .map(|(id, _)| *id)
            .collect();
        for entity_id in purged {
            if let Some(entity) = self.entities.remove(&entity_id) {
                self.removed.push(entity);
            }
        }

        for entity_id in self.reader.find_matching(&self.criteria) {
            if self.entities.contains_key(&entity_id) {
                continue;
            }
            if let Some(entity) = self.fetch_entity(entity_id) {
                self.entities.insert(entity_id, entity.clone());
                self.added.push(entity);
            }
        }
    }

    fn apply_direct(&mut self, entity: Entity) {
        debug_assert_eq!(entity.kinds().len(), self.kinds.len());
        let entity_id = entity.id();
        if self.entities.contains_key(&entity_id) {
            self.entities.insert(entity_id, entity.clone());
            if let Some(slot) = self.added.iter_mut().find(|e| e.id() == entity_id) {
                *slot = entity;
            } else if let Some(slot) = self.changed.iter_mut().find(|e| e.id() == entity_id) {
                *slot = entity;
            } else {
                self.changed.push(entity);
            }
        } else {
            self.entities.insert(entity_id, entity.clone());
            self.added.push(entity);
        }
    }

    /// Phase 1: stage one raw change.
    fn accumulate(&mut self, transaction: &mut Transaction, change: EntityChange) {
        let Some(index) = self.criteria.index_of(change.kind) else {
            // Not one of ours; fanout pre-filters, but remote routing may not.
            return;
        };
        let entity_id = change.entity_id;

        if let Some(add) = transaction.adds.get_mut(&entity_id) {
            // Raw value applied regardless of filter match, so that a later
            // resolve can detect the component going away again.
            add.apply(index, change.value);
            return;
        }

        if self.entities.contains_key(&entity_id) || transaction.mods.contains_key(&entity_id) {
            let staged = transaction.mods.entry(entity_id).or_insert_with(|| {
                transaction.mods_order.push(entity_id);
                TxEntity::from_member(&self.entities[&entity_id])
            });
            staged.apply(index, change.value);
            return;
        }

        // First sight of a non-member. A removal can never begin membership,
        // and a value that already fails its own slot's filter is not worth
        // completion work.
        let Some(value) = change.value else {
            return;
        };
        if !self.criteria.slot_matches(index, &value) {
            return;
        }
        let mut add = TxEntity::empty(self.criteria.len());
        add.apply(index, Some(value));
        transaction.adds_order.push(entity_id);
        transaction.adds.insert(entity_id, add);
    }

    /// Phase 2: classify every staged entity.
    fn resolve(&mut self, transaction: Transaction) {
        let Transaction {
            mut adds,
            adds_order,
            mut mods,
            mods_order,
        } = transaction;

        for entity_id in adds_order {
            let Some(staged) = adds.remove(&entity_id) else {
                continue;
            };
            if let Some(entity) = self.complete(entity_id, staged) {
                self.entities.insert(entity_id, entity.clone());
                if let Some(pos) = self.removed.iter().position(|e| e.id() == entity_id) {
                    // Purged and re-admitted in the same cycle nets out to a
                    // value change, never add+remove of the same id.
                    self.removed.remove(pos);
                    self.changed.push(entity);
                } else {
                    self.added.push(entity);
                }
            }
        }

        for entity_id in mods_order {
            let Some(staged) = mods.remove(&entity_id) else {
                continue;
            };
            let entity = staged.into_entity(entity_id, &self.kinds);
            if self.criteria.entity_matches(&entity) {
                self.entities.insert(entity_id, entity.clone());
                if let Some(pos) = self.added.iter().position(|e| e.id() == entity_id) {
                    // Added earlier this cycle; fold the new values into the
                    // add record instead of double-reporting.
                    self.added[pos] = entity;
                } else if let Some(pos) = self.changed.iter().position(|e| e.id() == entity_id) {
                    self.changed[pos] = entity;
                } else {
                    self.changed.push(entity);
                }
            } else {
                self.entities.remove(&entity_id);
                if let Some(pos) = self.added.iter().position(|e| e.id() == entity_id) {
                    // Admitted and invalidated in one cycle: never happened.
                    self.added.remove(pos);
                } else {
                    if let Some(pos) = self.changed.iter().position(|e| e.id() == entity_id) {
                        self.changed.remove(pos);
                    }
                    self.removed.push(entity);
                }
            }
        }
    }

    /// Completes a provisional add by fetching still-missing kinds from the
    /// backing reader. A missing or filter-failing slot means "not yet
    /// add-worthy", not an error.
    fn complete(&self, entity_id: EntityId, staged: TxEntity) -> Option<Entity> {
        let mut values = Vec::with_capacity(staged.slots.len());
        for (index, slot) in staged.slots.into_iter().enumerate() {
            let value = match slot {
                TxSlot::Value(value) => value,
                TxSlot::Removed => return None,
                TxSlot::Unset => self
                    .reader
                    .read_component(entity_id, self.criteria.kind_at(index))?,
            };
            if !self.criteria.slot_matches(index, &value) {
                return None;
            }
            values.push(Some(value));
        }
        Some(Entity::with_values(entity_id, self.kinds.clone(), values))
    }

    fn fetch_entity(&self, entity_id: EntityId) -> Option<Entity> {
        let mut values = Vec::with_capacity(self.criteria.len());
        for index in 0..self.criteria.len() {
            let value = self
                .reader
                .read_component(entity_id, self.criteria.kind_at(index))?;
            if !self.criteria.slot_matches(index, &value) {
                return None;
            }
            values.push(Some(value));
        }
        Some(Entity::with_values(entity_id, self.kinds.clone(), values))
    }
}

// Transaction
//
// Staging area used once per apply_changes call; discarded after resolution.
// Order vectors keep classification deterministic in queue order.
struct Transaction {
    adds: HashMap<EntityId, TxEntity>,
    adds_order: Vec<EntityId>,
    mods: HashMap<EntityId, TxEntity>,
    mods_order: Vec<EntityId>,
}

impl Transaction {
    fn new() -> Self {
        Self {
            adds: HashMap::new(),
            adds_order: Vec::new(),
            mods: HashMap::new(),
            mods_order: Vec::new(),
        }
    }
}

struct TxEntity {
    slots: Vec<TxSlot>,
}

/// Provisional slot state. `Removed` is distinct from `Unset`: an explicit
/// removal must survive staging so that resolve can evict, while an unset
/// slot merely awaits completion.
enum TxSlot {
    Unset,
    Removed,
    Value(ComponentValue),
}

impl TxEntity {
    fn empty(slot_count: usize) -> Self {
        let mut slots = Vec::with_capacity(slot_count);
        slots.resize_with(slot_count, || TxSlot::Unset);
        Self { slots }
    }

    fn from_member(entity: &Entity) -> Self {
        let slots = entity
            .values()
            .iter()
            .map(|v| match v {
                Some(value) => TxSlot::Value(value.clone()),
                None => TxSlot::Unset,
            })
            .collect();
        Self { slots }
    }

    /// Last write wins per slot.
    fn apply(&mut self, index: usize, value: Option<ComponentValue>) {
        self.slots[index] = match value {
            Some(value) => TxSlot::Value(value),
            None => TxSlot::Removed,
        };
    }

    fn into_entity(self, entity_id: EntityId, kinds: &Arc<[ComponentKind]>) -> Entity {
        let values = self
            .slots
            .into_iter()
            .map(|slot| match slot {
                TxSlot::Value(value) => Some(value),
                TxSlot::Unset | TxSlot::Removed => None,
            })
            .collect();
        Entity::with_values(entity_id, kinds.clone(), values)
    }
}

fn kind_names(criteria: &EntityCriteria) -> String {
    criteria
        .kinds()
        .map(|k| k.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component;
    use crate::component::filter::PredicateFilter;

    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: i32,
        y: i32,
    }
    component!(Position);

    #[derive(Debug, Clone, PartialEq)]
    struct Tag(&'static str);
    component!(Tag);

    fn east(p: &Position) -> bool {
        p.x > 0
    }

    fn west(p: &Position) -> bool {
        p.x < 0
    }

    /// Test double for the backing store: a plain table of components.
    #[derive(Default)]
    struct TableReader {
        rows: Mutex<HashMap<(EntityId, ComponentKind), ComponentValue>>,
    }

    impl TableReader {
        fn put<T: crate::EntityComponent + Clone>(&self, entity_id: EntityId, component: T) {
            self.rows.lock().unwrap().insert(
                (entity_id, ComponentKind::of::<T>()),
                ComponentValue::new(component),
            );
        }
    }

    impl ComponentReader for TableReader {
        fn read_component(
            &self,
            entity_id: EntityId,
            kind: ComponentKind,
        ) -> Option<ComponentValue> {
            self.rows.lock().unwrap().get(&(entity_id, kind)).cloned()
        }

        fn find_matching(&self, criteria: &EntityCriteria) -> Vec<EntityId> {
            let rows = self.rows.lock().unwrap();
            let mut ids: Vec<EntityId> = rows.keys().map(|(id, _)| *id).collect();
            ids.sort_by_key(|id| id.value());
            ids.dedup();
            ids.retain(|id| {
                (0..criteria.len()).all(|index| {
                    rows.get(&(*id, criteria.kind_at(index)))
                        .map(|v| criteria.slot_matches(index, v))
                        .unwrap_or(false)
                })
            });
            ids
        }
    }

    struct Fixture {
        reader: Arc<TableReader>,
        sender: Sender<EntityChange>,
        set: EntitySet,
    }

    fn fixture(criteria: EntityCriteria) -> Fixture {
        let reader = Arc::new(TableReader::default());
        let (sender, receiver) = crossbeam_channel::unbounded();
        let set = EntitySet::new(
            criteria,
            reader.clone(),
            receiver,
            Arc::new(AtomicBool::new(false)),
        );
        Fixture {
            reader,
            sender,
            set,
        }
    }

    fn send_set<T: crate::EntityComponent + Clone>(fx: &Fixture, id: EntityId, component: T) {
        fx.reader.put(id, component.clone());
        fx.sender
            .send(EntityChange::set(id, ComponentValue::new(component)))
            .unwrap();
    }

    fn send_removed(fx: &Fixture, id: EntityId, kind: ComponentKind) {
        fx.reader.rows.lock().unwrap().remove(&(id, kind));
        fx.sender.send(EntityChange::removed(id, kind)).unwrap();
    }

    fn position_criteria() -> EntityCriteria {
        EntityCriteria::new().with_filter(PredicateFilter::shared("east", east))
    }

    #[test]
    fn filtered_membership_lifecycle() {
        let mut fx = fixture(position_criteria());
        let e1 = EntityId::new(1);

        send_set(&fx, e1, Position { x: 0, y: 0 });
        assert!(!fx.set.apply_changes());
        assert!(!fx.set.contains(e1));

        send_set(&fx, e1, Position { x: 5, y: 0 });
        assert!(fx.set.apply_changes());
        assert_eq!(fx.set.added_entities().len(), 1);
        assert!(fx.set.contains(e1));

        send_set(&fx, e1, Position { x: -1, y: 0 });
        assert!(fx.set.apply_changes());
        assert_eq!(fx.set.removed_entities().len(), 1);
        assert!(!fx.set.contains(e1));
    }

    #[test]
    fn release_reports_all_members_removed_once() {
        let mut fx = fixture(position_criteria());
        let e1 = EntityId::new(1);
        send_set(&fx, e1, Position { x: 5, y: 0 });
        fx.set.apply_changes();
        assert_eq!(fx.set.len(), 1);

        fx.set.release();
        fx.set.release();
        assert!(fx.set.apply_changes());
        assert_eq!(fx.set.removed_entities().len(), 1);
        assert_eq!(fx.set.len(), 0);

        // Inert afterwards, even with queued traffic.
        send_set(&fx, e1, Position { x: 9, y: 0 });
        assert!(!fx.set.apply_changes());
        assert!(fx.set.removed_entities().is_empty());
    }

    #[test]
    fn completion_fetches_missing_kinds_from_reader() {
        let criteria = EntityCriteria::new()
            .with_filter(PredicateFilter::shared("east", east))
            .with::<Tag>();
        let mut fx = fixture(criteria);
        let e1 = EntityId::new(1);

        // Tag present only in the backing store; the change stream delivers
        // just the Position.
        fx.reader.put(e1, Tag("npc"));
        send_set(&fx, e1, Position { x: 3, y: 1 });

        assert!(fx.set.apply_changes());
        let entity = fx.set.entity(e1).unwrap();
        assert_eq!(entity.get::<Tag>(), Some(&Tag("npc")));
        assert!(entity.is_complete());
    }

    #[test]
    fn incomplete_add_is_discarded() {
        let criteria = EntityCriteria::new().with::<Position>().with::<Tag>();
        let mut fx = fixture(criteria);
        let e1 = EntityId::new(1);

        // No Tag anywhere; completion must fail quietly.
        fx.sender
            .send(EntityChange::set(
                e1,
                ComponentValue::new(Position { x: 1, y: 1 }),
            ))
            .unwrap();
        assert!(!fx.set.apply_changes());
        assert!(!fx.set.contains(e1));
    }

    #[test]
    fn last_write_wins_within_one_drain() {
        let mut fx = fixture(position_criteria());
        let e1 = EntityId::new(1);

        send_set(&fx, e1, Position { x: 1, y: 0 });
        send_set(&fx, e1, Position { x: 2, y: 0 });
        send_set(&fx, e1, Position { x: 3, y: 0 });

        assert!(fx.set.apply_changes());
        assert_eq!(fx.set.added_entities().len(), 1);
        assert_eq!(
            fx.set.entity(e1).unwrap().get::<Position>(),
            Some(&Position { x: 3, y: 0 })
        );
    }

    #[test]
    fn add_then_invalidate_in_one_cycle_never_appears() {
        let mut fx = fixture(position_criteria());
        let e1 = EntityId::new(1);

        send_set(&fx, e1, Position { x: 5, y: 0 });
        send_set(&fx, e1, Position { x: -5, y: 0 });

        // The first change stages an add; the second change is applied into
        // the same provisional entry and fails completion.
        assert!(!fx.set.apply_changes());
        assert!(fx.set.added_entities().is_empty());
        assert!(fx.set.removed_entities().is_empty());
        assert!(!fx.set.contains(e1));
    }

    #[test]
    fn removal_change_evicts_member() {
        let mut fx = fixture(position_criteria());
        let e1 = EntityId::new(1);
        send_set(&fx, e1, Position { x: 5, y: 0 });
        fx.set.apply_changes();

        send_removed(&fx, e1, ComponentKind::of::<Position>());
        assert!(fx.set.apply_changes());
        assert_eq!(fx.set.removed_entities().len(), 1);
        assert!(!fx.set.contains(e1));
    }

    #[test]
    fn buckets_are_disjoint_and_cleared_each_cycle() {
        let mut fx = fixture(position_criteria());
        let e1 = EntityId::new(1);
        let e2 = EntityId::new(2);

        send_set(&fx, e1, Position { x: 5, y: 0 });
        send_set(&fx, e2, Position { x: 7, y: 0 });
        fx.set.apply_changes();
        assert_eq!(fx.set.added_entities().len(), 2);

        send_set(&fx, e1, Position { x: 6, y: 0 });
        send_set(&fx, e2, Position { x: -7, y: 0 });
        assert!(fx.set.apply_changes());

        let added: Vec<_> = fx.set.added_entities().iter().map(|e| e.id()).collect();
        let changed: Vec<_> = fx.set.changed_entities().iter().map(|e| e.id()).collect();
        let removed: Vec<_> = fx.set.removed_entities().iter().map(|e| e.id()).collect();
        assert!(added.is_empty());
        assert_eq!(changed, vec![e1]);
        assert_eq!(removed, vec![e2]);
        for id in &changed {
            assert!(!removed.contains(id));
        }

        // A quiet cycle leaves nothing behind.
        assert!(!fx.set.apply_changes());
        assert!(fx.set.changed_entities().is_empty());
        assert!(fx.set.removed_entities().is_empty());
    }

    #[test]
    fn filter_reset_purges_and_reloads() {
        let mut fx = fixture(position_criteria());
        let e1 = EntityId::new(1);
        let e2 = EntityId::new(2);
        send_set(&fx, e1, Position { x: 5, y: 0 });
        send_set(&fx, e2, Position { x: -5, y: 0 });
        fx.set.apply_changes();
        assert!(fx.set.contains(e1));
        assert!(!fx.set.contains(e2));

        // Invert the filter: e1 must leave, e2 must arrive via reload.
        fx.set
            .reset_criteria(
                EntityCriteria::new().with_filter(PredicateFilter::shared("west", west)),
            )
            .unwrap();
        assert!(fx.set.apply_changes());
        assert_eq!(
            fx.set.removed_entities().iter().map(|e| e.id()).collect::<Vec<_>>(),
            vec![e1]
        );
        assert_eq!(
            fx.set.added_entities().iter().map(|e| e.id()).collect::<Vec<_>>(),
            vec![e2]
        );
    }

    #[test]
    fn filter_reset_rejects_kind_change() {
        let mut fx = fixture(position_criteria());
        let result = fx
            .set
            .reset_criteria(EntityCriteria::new().with::<Tag>());
        assert!(matches!(result, Err(SetError::KindMismatch { .. })));
    }

    #[test]
    fn direct_injection_adds_and_updates() {
        let mut fx = fixture(EntityCriteria::new().with::<Position>());
        let e1 = EntityId::new(1);
        let injector = fx.set.direct_injector();

        let kinds = fx.set.kinds().clone();
        let entity = Entity::with_values(
            e1,
            kinds.clone(),
            vec![Some(ComponentValue::new(Position { x: 1, y: 1 }))],
        );
        assert!(injector.inject(entity));
        assert!(fx.set.apply_changes());
        assert_eq!(fx.set.added_entities().len(), 1);

        let update = Entity::with_values(
            e1,
            kinds,
            vec![Some(ComponentValue::new(Position { x: 2, y: 2 }))],
        );
        assert!(injector.inject(update));
        assert!(fx.set.apply_changes());
        assert!(fx.set.added_entities().is_empty());
        assert_eq!(fx.set.changed_entities().len(), 1);
        assert_eq!(
            fx.set.entity(e1).unwrap().get::<Position>(),
            Some(&Position { x: 2, y: 2 })
        );
    }

    #[test]
    fn initial_load_produces_no_events() {
        let mut fx = fixture(position_criteria());
        fx.reader.put(EntityId::new(1), Position { x: 4, y: 0 });
        fx.reader.put(EntityId::new(2), Position { x: -4, y: 0 });

        fx.set.load();
        assert_eq!(fx.set.len(), 1);
        assert!(fx.set.added_entities().is_empty());

        assert!(!fx.set.apply_changes());
    }
}
