use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crossbeam_channel::Receiver;

use crate::{
    change::EntityChange,
    component::component::{ComponentValue, EntityComponent},
    component::component_kind::ComponentKind,
    entity::entity::Entity,
    entity::entity_id::EntityId,
};

/// A single-entity subscription: one id, a fixed kind subset, its own change
/// queue. The analogue of an [`EntitySet`](crate::EntitySet) of size one,
/// except the view is allowed to be incomplete.
pub struct WatchedEntity {
    entity: Entity,
    changes: Receiver<EntityChange>,
    released: Arc<AtomicBool>,
}

impl WatchedEntity {
    pub fn new(entity: Entity, changes: Receiver<EntityChange>, released: Arc<AtomicBool>) -> Self {
        Self {
            entity,
            changes,
            released,
        }
    }

    pub fn id(&self) -> EntityId {
        self.entity.id()
    }

    pub fn kinds(&self) -> &Arc<[ComponentKind]> {
        self.entity.kinds()
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn get<T: EntityComponent>(&self) -> Option<&T> {
        self.entity.get::<T>()
    }

    pub fn value(&self, kind: ComponentKind) -> Option<&ComponentValue> {
        self.entity.value(kind)
    }

    /// Drains the queue into the view, last write wins per slot. Returns
    /// true iff any slot changed.
    pub fn apply_changes(&mut self) -> bool {
        if self.is_released() {
            while self.changes.try_recv().is_ok() {}
            return false;
        }
        let mut changed = false;
        while let Ok(change) = self.changes.try_recv() {
            if change.entity_id != self.entity.id() {
                continue;
            }
            let Some(index) = self.entity.index_of(change.kind) else {
                continue;
            };
            self.entity.set_value_at(index, change.value);
            changed = true;
        }
        changed
    }

    /// Idempotent.
    pub fn release(&self) {
        self.released.store(true, Ordering::Release);
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component;
    use crossbeam_channel::unbounded;

    #[derive(Debug, Clone, PartialEq)]
    struct Fuel(u32);
    component!(Fuel);

    fn watched(id: EntityId) -> (crossbeam_channel::Sender<EntityChange>, WatchedEntity) {
        let (sender, receiver) = unbounded();
        let kinds: Arc<[ComponentKind]> = Arc::from(vec![ComponentKind::of::<Fuel>()]);
        let entity = Entity::new(id, kinds);
        (
            sender,
            WatchedEntity::new(entity, receiver, Arc::new(AtomicBool::new(false))),
        )
    }

    #[test]
    fn applies_sets_and_removals() {
        let id = EntityId::new(5);
        let (sender, mut watched) = watched(id);

        sender
            .send(EntityChange::set(id, ComponentValue::new(Fuel(10))))
            .unwrap();
        assert!(watched.apply_changes());
        assert_eq!(watched.get::<Fuel>(), Some(&Fuel(10)));

        sender
            .send(EntityChange::removed(id, ComponentKind::of::<Fuel>()))
            .unwrap();
        assert!(watched.apply_changes());
        assert!(watched.get::<Fuel>().is_none());
        assert!(!watched.entity().is_complete());
    }

    #[test]
    fn ignores_other_entities_and_kinds() {
        let id = EntityId::new(5);
        let (sender, mut watched) = watched(id);

        sender
            .send(EntityChange::set(
                EntityId::new(6),
                ComponentValue::new(Fuel(99)),
            ))
            .unwrap();
        assert!(!watched.apply_changes());
        assert!(watched.get::<Fuel>().is_none());
    }

    #[test]
    fn released_watch_is_inert() {
        let id = EntityId::new(5);
        let (sender, mut watched) = watched(id);

        watched.release();
        watched.release();
        sender
            .send(EntityChange::set(id, ComponentValue::new(Fuel(10))))
            .unwrap();
        assert!(!watched.apply_changes());
        assert!(watched.get::<Fuel>().is_none());
    }
}
