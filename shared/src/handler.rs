use dashmap::DashMap;

use crate::{
    component::component::ComponentValue,
    component::filter::ComponentFilter,
    entity::entity_id::EntityId,
};

/// Per-component-type storage.
///
/// The store keeps one handler per component kind. The default is the
/// in-memory map below; persistent handlers (SQL tables and the like) plug in
/// through this same seam and are otherwise outside this crate's concern.
pub trait ComponentHandler: Send + Sync {
    fn get(&self, entity_id: EntityId) -> Option<ComponentValue>;

    fn set(&self, entity_id: EntityId, value: ComponentValue);

    /// Returns the removed value, if any.
    fn remove(&self, entity_id: EntityId) -> Option<ComponentValue>;

    /// Ids of every entity holding this component, optionally narrowed by a
    /// filter. Order is unspecified.
    fn entity_ids(&self, filter: Option<&dyn ComponentFilter>) -> Vec<EntityId>;
}

// MapComponentHandler
//
// Concurrent in-memory table; safe for mutation from any thread.
#[derive(Default)]
pub struct MapComponentHandler {
    components: DashMap<EntityId, ComponentValue>,
}

impl MapComponentHandler {
    pub fn new() -> Self {
        Self {
            components: DashMap::new(),
        }
    }
}

impl ComponentHandler for MapComponentHandler {
    fn get(&self, entity_id: EntityId) -> Option<ComponentValue> {
        self.components.get(&entity_id).map(|v| v.clone())
    }

    fn set(&self, entity_id: EntityId, value: ComponentValue) {
        self.components.insert(entity_id, value);
    }

    fn remove(&self, entity_id: EntityId) -> Option<ComponentValue> {
        self.components.remove(&entity_id).map(|(_, v)| v)
    }

    fn entity_ids(&self, filter: Option<&dyn ComponentFilter>) -> Vec<EntityId> {
        self.components
            .iter()
            .filter(|entry| match filter {
                Some(f) => f.evaluate(entry.value().as_component()),
                None => true,
            })
            .map(|entry| *entry.key())
            .collect()
    }
}
