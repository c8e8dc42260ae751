use std::sync::Arc;

use crate::{
    component::component::{ComponentValue, EntityComponent},
    component::component_kind::ComponentKind,
    entity::entity_id::EntityId,
};

/// A materialized view of one entity: its id plus component values aligned to
/// a requested kind list.
///
/// Not a first-class stored object. A view is *complete* when no slot is
/// empty; entity sets only ever hold complete entities, while watched
/// entities may go incomplete when a component is removed out from under
/// them.
#[derive(Clone, Debug)]
pub struct Entity {
    id: EntityId,
    kinds: Arc<[ComponentKind]>,
    values: Vec<Option<ComponentValue>>,
}

impl Entity {
    pub fn new(id: EntityId, kinds: Arc<[ComponentKind]>) -> Self {
        let values = vec![None; kinds.len()];
        Self { id, kinds, values }
    }

    /// # Panics
    ///
    /// Panics if `values` is not aligned to `kinds`.
    pub fn with_values(
        id: EntityId,
        kinds: Arc<[ComponentKind]>,
        values: Vec<Option<ComponentValue>>,
    ) -> Self {
        if kinds.len() != values.len() {
            panic!(
                "entity {} built with {} values for {} kinds",
                id,
                values.len(),
                kinds.len()
            );
        }
        Self { id, kinds, values }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kinds(&self) -> &Arc<[ComponentKind]> {
        &self.kinds
    }

    pub fn values(&self) -> &[Option<ComponentValue>] {
        &self.values
    }

    pub fn index_of(&self, kind: ComponentKind) -> Option<usize> {
        self.kinds.iter().position(|k| *k == kind)
    }

    pub fn value(&self, kind: ComponentKind) -> Option<&ComponentValue> {
        self.index_of(kind).and_then(|i| self.values[i].as_ref())
    }

    pub fn value_at(&self, index: usize) -> Option<&ComponentValue> {
        self.values[index].as_ref()
    }

    pub fn set_value_at(&mut self, index: usize, value: Option<ComponentValue>) {
        self.values[index] = value;
    }

    pub fn get<T: EntityComponent>(&self) -> Option<&T> {
        self.value(ComponentKind::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    pub fn is_complete(&self) -> bool {
        self.values.iter().all(|v| v.is_some())
    }
}
