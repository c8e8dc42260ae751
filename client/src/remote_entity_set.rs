//! Client-side mirror of a server-hosted entity set.
//!
//! The mirror reuses the same [`EntitySet`] resolution machinery the server
//! runs, with two differences: membership arrives as injected snapshots
//! instead of a local load, and completion fetches go to a null reader so an
//! incomplete provisional add simply waits for its snapshot.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use crossbeam_channel::Sender;
use log::warn;

use syncra_shared::{
    ComponentKind, ComponentReader, ComponentValue, Entity, EntityChange, EntityCriteria,
    EntityId, EntityInjector, EntitySet, EntitySnapshot, SetId, SyncMessage,
};

use crate::{error::RemoteError, remote_entity_data::RemoteEntityData};

/// A mirror has no local backing; anything not delivered by the server does
/// not exist yet.
pub(crate) struct NullReader;

impl ComponentReader for NullReader {
    fn read_component(&self, _: EntityId, _: ComponentKind) -> Option<ComponentValue> {
        None
    }

    fn find_matching(&self, _: &EntityCriteria) -> Vec<EntityId> {
        Vec::new()
    }
}

/// Dispatch-side handle. The inbound pump feeds snapshots and deltas through
/// the set's own queues; the user-held [`RemoteEntitySet`] never contends
/// with dispatch on a lock.
pub(crate) struct RemoteSetHandle {
    kinds: Arc<[ComponentKind]>,
    changes: Sender<EntityChange>,
    injector: EntityInjector,
    released: Arc<AtomicBool>,
    error: Mutex<Option<String>>,
}

impl RemoteSetHandle {
    pub(crate) fn create(criteria: EntityCriteria) -> (Arc<Self>, EntitySet) {
        let (changes, receiver) = crossbeam_channel::unbounded();
        let released = Arc::new(AtomicBool::new(false));
        let set = EntitySet::new(criteria, Arc::new(NullReader), receiver, released.clone());
        let handle = Arc::new(Self {
            kinds: set.kinds().clone(),
            changes,
            injector: set.direct_injector(),
            released,
            error: Mutex::new(None),
        });
        (handle, set)
    }

    pub(crate) fn kinds(&self) -> &Arc<[ComponentKind]> {
        &self.kinds
    }

    pub(crate) fn wants(&self, kind: ComponentKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Stages one server snapshot for the set's next `apply_changes`.
    pub(crate) fn inject_snapshot(&self, snapshot: EntitySnapshot) {
        if snapshot.values.len() != self.kinds.len() {
            warn!(
                "dropping misaligned snapshot for {}: {} values for {} kinds",
                snapshot.entity_id,
                snapshot.values.len(),
                self.kinds.len()
            );
            return;
        }
        let values = snapshot.values.into_iter().map(Some).collect();
        let entity = Entity::with_values(snapshot.entity_id, self.kinds.clone(), values);
        self.injector.inject(entity);
    }

    pub(crate) fn push_change(&self, change: EntityChange) {
        // A released set may have dropped its receiver already.
        let _ = self.changes.send(change);
    }

    pub(crate) fn set_error(&self, message: String) {
        let Ok(mut error) = self.error.lock() else {
            panic!("set error slot lock poisoned");
        };
        *error = Some(message);
    }

    fn take_error(&self) -> Option<String> {
        let Ok(mut error) = self.error.lock() else {
            panic!("set error slot lock poisoned");
        };
        error.take()
    }

    pub(crate) fn mark_released(&self) {
        self.released.store(true, Ordering::Release);
    }
}

/// The user-facing mirror. Same consumption contract as a local
/// [`EntitySet`]: one consumer thread calls [`apply_changes`]
/// (RemoteEntitySet::apply_changes) and reads the diff buckets between
/// calls.
pub struct RemoteEntitySet {
    set_id: SetId,
    set: EntitySet,
    handle: Arc<RemoteSetHandle>,
    client: Arc<RemoteEntityData>,
}

impl RemoteEntitySet {
    pub(crate) fn new(
        set_id: SetId,
        set: EntitySet,
        handle: Arc<RemoteSetHandle>,
        client: Arc<RemoteEntityData>,
    ) -> Self {
        Self {
            set_id,
            set,
            handle,
            client,
        }
    }

    pub fn set_id(&self) -> SetId {
        self.set_id
    }

    pub fn criteria(&self) -> &EntityCriteria {
        self.set.criteria()
    }

    pub fn kinds(&self) -> &Arc<[ComponentKind]> {
        self.set.kinds()
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn contains(&self, entity_id: EntityId) -> bool {
        self.set.contains(entity_id)
    }

    pub fn entity(&self, entity_id: EntityId) -> Option<&Entity> {
        self.set.entity(entity_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.set.iter()
    }

    pub fn added_entities(&self) -> &[Entity] {
        self.set.added_entities()
    }

    pub fn changed_entities(&self) -> &[Entity] {
        self.set.changed_entities()
    }

    pub fn removed_entities(&self) -> &[Entity] {
        self.set.removed_entities()
    }

    /// Folds everything the server delivered since the last call into the
    /// view. A set the server refused surfaces its rejection here, once.
    pub fn apply_changes(&mut self) -> Result<bool, RemoteError> {
        if let Some(message) = self.handle.take_error() {
            return Err(RemoteError::ServerRejection {
                set_id: self.set_id,
                message,
            });
        }
        Ok(self.set.apply_changes())
    }

    /// Swaps the criteria's filters locally and asks the server to do the
    /// same. The kind list is fixed; a mismatch fails before anything is
    /// sent.
    pub fn reset_criteria(&mut self, criteria: EntityCriteria) -> Result<(), RemoteError> {
        self.set.reset_criteria(criteria.clone())?;
        self.client.send_message(SyncMessage::ResetEntitySetFilter {
            set_id: self.set_id,
            criteria,
        })
    }

    /// Tells the server to stop serving this set. The next `apply_changes`
    /// reports every member removed. Idempotent.
    pub fn release(&mut self) -> Result<(), RemoteError> {
        if self.set.is_released() {
            return Ok(());
        }
        self.set.release();
        self.client.release_set(self.set_id)
    }

    pub fn is_released(&self) -> bool {
        self.set.is_released()
    }
}
