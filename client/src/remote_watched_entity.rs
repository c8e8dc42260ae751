//! Client-side mirror of a single watched entity.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crossbeam_channel::{Receiver, Sender};

use syncra_shared::{
    ComponentKind, ComponentValue, Entity, EntityChange, EntityComponent, EntityId, WatchId,
    WatchedEntity,
};

use crate::{error::RemoteError, remote_entity_data::RemoteEntityData};

/// Dispatch-side handle mirroring the watch's server-side interest: one id,
/// a fixed kind subset.
pub(crate) struct RemoteWatchHandle {
    entity_id: EntityId,
    kinds: Arc<[ComponentKind]>,
    changes: Sender<EntityChange>,
    released: Arc<AtomicBool>,
}

impl RemoteWatchHandle {
    pub(crate) fn create(
        entity_id: EntityId,
        kinds: Arc<[ComponentKind]>,
    ) -> (Arc<Self>, Receiver<EntityChange>) {
        let (changes, receiver) = crossbeam_channel::unbounded();
        let handle = Arc::new(Self {
            entity_id,
            kinds,
            changes,
            released: Arc::new(AtomicBool::new(false)),
        });
        (handle, receiver)
    }

    pub(crate) fn wants(&self, change: &EntityChange) -> bool {
        change.entity_id == self.entity_id && self.kinds.contains(&change.kind)
    }

    pub(crate) fn push_change(&self, change: EntityChange) {
        let _ = self.changes.send(change);
    }

    pub(crate) fn released_flag(&self) -> Arc<AtomicBool> {
        self.released.clone()
    }

    pub(crate) fn mark_released(&self) {
        self.released.store(true, Ordering::Release);
    }
}

/// User-facing watch. Starts from the server's initial component values and
/// folds deltas in on [`apply_changes`](Self::apply_changes); slots go empty
/// when the server reports a removal.
pub struct RemoteWatchedEntity {
    watch_id: WatchId,
    watched: WatchedEntity,
    client: Arc<RemoteEntityData>,
}

impl RemoteWatchedEntity {
    pub(crate) fn new(
        watch_id: WatchId,
        watched: WatchedEntity,
        client: Arc<RemoteEntityData>,
    ) -> Self {
        Self {
            watch_id,
            watched,
            client,
        }
    }

    pub fn watch_id(&self) -> WatchId {
        self.watch_id
    }

    pub fn id(&self) -> EntityId {
        self.watched.id()
    }

    pub fn kinds(&self) -> &Arc<[ComponentKind]> {
        self.watched.kinds()
    }

    pub fn entity(&self) -> &Entity {
        self.watched.entity()
    }

    pub fn get<T: EntityComponent>(&self) -> Option<&T> {
        self.watched.get::<T>()
    }

    pub fn value(&self, kind: ComponentKind) -> Option<&ComponentValue> {
        self.watched.value(kind)
    }

    /// Returns true iff any slot changed.
    pub fn apply_changes(&mut self) -> bool {
        self.watched.apply_changes()
    }

    /// Tells the server to stop streaming this watch. Idempotent.
    pub fn release(&mut self) -> Result<(), RemoteError> {
        if self.watched.is_released() {
            return Ok(());
        }
        self.watched.release();
        self.client.release_watch(self.watch_id)
    }

    pub fn is_released(&self) -> bool {
        self.watched.is_released()
    }
}
