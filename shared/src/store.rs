//! The authoritative, mutable entity-component store and its change fanout.
//!
//! Mutators post an [`EntityChange`] to every interested outlet (entity
//! sets, watched entities, whole-store subscribers) without blocking; each
//! outlet is a lock-free queue drained by its single consumer. Outlets are
//! tracked in an arena-style table keyed by integer handle; a set never
//! holds a reference back to the store, only a shared released flag, so
//! teardown is order-independent.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, RwLock,
    },
};

use crossbeam_channel::{Receiver, Sender};
use log::warn;

use crate::{
    change::EntityChange,
    component::component::{ComponentValue, EntityComponent},
    component::component_kind::ComponentKind,
    criteria::EntityCriteria,
    entity::entity::Entity,
    entity::entity_id::EntityId,
    entity_set::EntitySet,
    error::{SetError, StoreError},
    handler::{ComponentHandler, MapComponentHandler},
    string_index::{MemStringIndex, StringIndex},
    watched_entity::WatchedEntity,
};

use dashmap::DashMap;

/// Read-through backing used by entity sets for completion fetches and
/// criteria reloads.
pub trait ComponentReader: Send + Sync {
    fn read_component(&self, entity_id: EntityId, kind: ComponentKind) -> Option<ComponentValue>;

    /// Ids of every entity currently satisfying `criteria`.
    fn find_matching(&self, criteria: &EntityCriteria) -> Vec<EntityId>;
}

/// The read surface shared by the authoritative store and remote mirrors.
///
/// On the authoritative store these never fail; on a mirror they ride the
/// network and may time out or be rejected.
pub trait EntityData: Send + Sync {
    fn get_component(
        &self,
        entity_id: EntityId,
        kind: ComponentKind,
    ) -> Result<Option<ComponentValue>, StoreError>;

    fn get_entity(
        &self,
        entity_id: EntityId,
        kinds: &[ComponentKind],
    ) -> Result<Entity, StoreError>;

    fn find_entity(&self, criteria: &EntityCriteria) -> Result<Option<EntityId>, StoreError>;

    fn find_entities(&self, criteria: &EntityCriteria) -> Result<Vec<EntityId>, StoreError>;

    fn get_string_id(&self, text: &str) -> Result<Option<i32>, StoreError>;

    fn get_string(&self, id: i32) -> Result<Option<String>, StoreError>;
}

enum OutletInterest {
    /// Entity sets: any change to one of the criteria kinds.
    Kinds(HashSet<ComponentKind>),
    /// Watched entities: one id, a fixed kind subset.
    Watch {
        entity_id: EntityId,
        kinds: HashSet<ComponentKind>,
    },
    /// Session subscriptions: everything.
    All,
}

struct ChangeOutlet {
    interest: OutletInterest,
    sender: Sender<EntityChange>,
    released: Arc<AtomicBool>,
}

impl ChangeOutlet {
    fn wants(&self, change: &EntityChange) -> bool {
        match &self.interest {
            OutletInterest::Kinds(kinds) => kinds.contains(&change.kind),
            OutletInterest::Watch { entity_id, kinds } => {
                *entity_id == change.entity_id && kinds.contains(&change.kind)
            }
            OutletInterest::All => true,
        }
    }
}

/// One consumer's view of the whole change stream; held by hosted sessions.
/// Dropping it releases the outlet.
pub struct ChangeSubscription {
    receiver: Receiver<EntityChange>,
    released: Arc<AtomicBool>,
}

impl ChangeSubscription {
    pub fn drain(&self) -> Vec<EntityChange> {
        let mut changes = Vec::new();
        while let Ok(change) = self.receiver.try_recv() {
            changes.push(change);
        }
        changes
    }

    pub fn release(&self) {
        self.released.store(true, Ordering::Release);
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

// DefaultEntityData
//
// One handler per component kind (created lazily as in-memory maps unless a
// custom handler was registered), a per-store entity-id counter, and the
// outlet table.
pub struct DefaultEntityData {
    handlers: DashMap<ComponentKind, Arc<dyn ComponentHandler>>,
    outlets: RwLock<HashMap<u64, ChangeOutlet>>,
    next_entity_id: AtomicU64,
    next_outlet_id: AtomicU64,
    strings: MemStringIndex,
}

impl DefaultEntityData {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
            outlets: RwLock::new(HashMap::new()),
            next_entity_id: AtomicU64::new(1),
            next_outlet_id: AtomicU64::new(1),
            strings: MemStringIndex::new(),
        }
    }

    /// Plugs a custom storage backend in for component type `T`. Must happen
    /// before the first write of that kind, or the default map handler wins.
    pub fn register_handler<T: EntityComponent>(&self, handler: Arc<dyn ComponentHandler>) {
        self.handlers.insert(ComponentKind::of::<T>(), handler);
    }

    fn handler(&self, kind: ComponentKind) -> Arc<dyn ComponentHandler> {
        self.handlers
            .entry(kind)
            .or_insert_with(|| Arc::new(MapComponentHandler::new()))
            .clone()
    }

    pub fn create_entity(&self) -> EntityId {
        EntityId::new(self.next_entity_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Replaces (or first sets) one component of one entity. Safe from any
    /// thread; never blocks on consumers.
    pub fn set_component<T: EntityComponent>(&self, entity_id: EntityId, component: T) {
        self.set_component_value(entity_id, ComponentValue::new(component));
    }

    pub fn set_component_value(&self, entity_id: EntityId, value: ComponentValue) {
        self.handler(value.kind()).set(entity_id, value.clone());
        self.publish(EntityChange::set(entity_id, value));
    }

    /// Returns true if the component existed.
    pub fn remove_component(&self, entity_id: EntityId, kind: ComponentKind) -> bool {
        let Some(handler) = self.handlers.get(&kind).map(|h| h.clone()) else {
            return false;
        };
        if handler.remove(entity_id).is_none() {
            return false;
        }
        self.publish(EntityChange::removed(entity_id, kind));
        true
    }

    /// Removes every component of `entity_id`, emitting one removal change
    /// per component present.
    pub fn remove_entity(&self, entity_id: EntityId) {
        let handlers: Vec<(ComponentKind, Arc<dyn ComponentHandler>)> = self
            .handlers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        for (kind, handler) in handlers {
            if handler.remove(entity_id).is_some() {
                self.publish(EntityChange::removed(entity_id, kind));
            }
        }
    }

    /// Creates a live, auto-updating set of every entity matching
    /// `criteria`, pre-populated without add events.
    pub fn get_entities(self: &Arc<Self>, criteria: EntityCriteria) -> Result<EntitySet, SetError> {
        if criteria.is_empty() {
            return Err(SetError::EmptyCriteria);
        }
        let interest = OutletInterest::Kinds(criteria.kinds().collect());
        let (receiver, released) = self.register_outlet(interest);
        let reader: Arc<dyn ComponentReader> = self.clone();
        let mut set = EntitySet::new(criteria, reader, receiver, released);
        set.load();
        Ok(set)
    }

    /// Single-entity subscription over a fixed kind list. The returned view
    /// may be incomplete and stays subscribed until released.
    pub fn watch_entity(&self, entity_id: EntityId, kinds: &[ComponentKind]) -> WatchedEntity {
        let interest = OutletInterest::Watch {
            entity_id,
            kinds: kinds.iter().copied().collect(),
        };
        let (receiver, released) = self.register_outlet(interest);
        let entity = self.load_entity(entity_id, kinds);
        WatchedEntity::new(entity, receiver, released)
    }

    /// Firehose subscription delivering every change in the store.
    pub fn subscribe(&self) -> ChangeSubscription {
        let (receiver, released) = self.register_outlet(OutletInterest::All);
        ChangeSubscription { receiver, released }
    }

    pub fn string_index(&self) -> &MemStringIndex {
        &self.strings
    }

    fn load_entity(&self, entity_id: EntityId, kinds: &[ComponentKind]) -> Entity {
        let values = kinds
            .iter()
            .map(|kind| self.handlers.get(kind).and_then(|h| h.get(entity_id)))
            .collect();
        Entity::with_values(entity_id, Arc::from(kinds.to_vec()), values)
    }

    fn register_outlet(
        &self,
        interest: OutletInterest,
    ) -> (Receiver<EntityChange>, Arc<AtomicBool>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let released = Arc::new(AtomicBool::new(false));
        let outlet = ChangeOutlet {
            interest,
            sender,
            released: released.clone(),
        };
        let outlet_id = self.next_outlet_id.fetch_add(1, Ordering::Relaxed);
        let Ok(mut outlets) = self.outlets.write() else {
            panic!("outlet table lock poisoned");
        };
        outlets.insert(outlet_id, outlet);
        (receiver, released)
    }

    fn publish(&self, change: EntityChange) {
        let mut stale: Vec<u64> = Vec::new();
        {
            let Ok(outlets) = self.outlets.read() else {
                panic!("outlet table lock poisoned");
            };
            for (outlet_id, outlet) in outlets.iter() {
                if outlet.released.load(Ordering::Acquire) {
                    stale.push(*outlet_id);
                    continue;
                }
                if !outlet.wants(&change) {
                    continue;
                }
                if outlet.sender.send(change.clone()).is_err() {
                    // Consumer dropped without releasing; prune anyway.
                    stale.push(*outlet_id);
                }
            }
        }
        if !stale.is_empty() {
            let Ok(mut outlets) = self.outlets.write() else {
                panic!("outlet table lock poisoned");
            };
            for outlet_id in stale {
                outlets.remove(&outlet_id);
            }
        }
    }

    #[cfg(test)]
    fn outlet_count(&self) -> usize {
        self.outlets.read().unwrap().len()
    }
}

impl Default for DefaultEntityData {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentReader for DefaultEntityData {
    fn read_component(&self, entity_id: EntityId, kind: ComponentKind) -> Option<ComponentValue> {
        self.handlers.get(&kind).and_then(|h| h.get(entity_id))
    }

    fn find_matching(&self, criteria: &EntityCriteria) -> Vec<EntityId> {
        if criteria.is_empty() {
            warn!("find_matching called with empty criteria");
            return Vec::new();
        }
        let Some(first) = self.handlers.get(&criteria.kind_at(0)).map(|h| h.clone()) else {
            return Vec::new();
        };
        let mut ids = first.entity_ids(criteria.filter_at(0));
        ids.sort_by_key(|id| id.value());
        ids.retain(|id| {
            (1..criteria.len()).all(|index| {
                self.handlers
                    .get(&criteria.kind_at(index))
                    .and_then(|h| h.get(*id))
                    .map(|v| criteria.slot_matches(index, &v))
                    .unwrap_or(false)
            })
        });
        ids
    }
}

impl EntityData for DefaultEntityData {
    fn get_component(
        &self,
        entity_id: EntityId,
        kind: ComponentKind,
    ) -> Result<Option<ComponentValue>, StoreError> {
        Ok(self.read_component(entity_id, kind))
    }

    fn get_entity(
        &self,
        entity_id: EntityId,
        kinds: &[ComponentKind],
    ) -> Result<Entity, StoreError> {
        Ok(self.load_entity(entity_id, kinds))
    }

    fn find_entity(&self, criteria: &EntityCriteria) -> Result<Option<EntityId>, StoreError> {
        Ok(self.find_matching(criteria).into_iter().next())
    }

    fn find_entities(&self, criteria: &EntityCriteria) -> Result<Vec<EntityId>, StoreError> {
        Ok(self.find_matching(criteria))
    }

    fn get_string_id(&self, text: &str) -> Result<Option<i32>, StoreError> {
        Ok(self.strings.string_id(text, false))
    }

    fn get_string(&self, id: i32) -> Result<Option<String>, StoreError> {
        Ok(self.strings.string(id))
    }
}
