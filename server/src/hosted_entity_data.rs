//! Per-connection replication session.
//!
//! Owns the client's live entity sets and watched entities server-side; each
//! `send_updates` call computes the minimal message set to bring the client
//! up to date: full snapshots for entities newly admitted to a set, tracked
//! deltas for everything the client already knows. Interest is bookkept by
//! the mark/sweep [`ComponentUsageTracker`]: set membership and watches mark
//! pairs at the current frame, the sweep phase forwards only marked pairs
//! and expires the ones the client stopped caring about.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use log::{debug, warn};

use syncra_shared::{
    ChangeSubscription, ComponentKind, DefaultEntityData, Entity, EntityChange, EntityCriteria,
    EntityData, EntityId, EntitySet, EntitySnapshot, FrameId, MessageSender, RequestId, SetId,
    StringIdQuery, StringIndex, SyncMessage, WatchId, WatchedEntity,
};

use crate::{error::HostError, host_config::HostConfig, usage_tracker::ComponentUsageTracker};

struct SessionState {
    sets: HashMap<SetId, EntitySet>,
    /// Set whenever a set was created or had its filters reset since the
    /// last send cycle; forces a marking pass even on a quiet frame so that
    /// membership fallout is bookkept.
    sets_dirty: bool,
}

pub struct HostedEntityData {
    store: Arc<DefaultEntityData>,
    config: HostConfig,
    sender: Box<dyn MessageSender>,
    subscription: ChangeSubscription,
    state: Mutex<SessionState>,
    watched: Mutex<HashMap<WatchId, WatchedEntity>>,
    tracker: Mutex<ComponentUsageTracker>,
    frame: AtomicU64,
    closing: AtomicBool,
}

impl HostedEntityData {
    pub fn new(
        store: Arc<DefaultEntityData>,
        sender: Box<dyn MessageSender>,
        config: HostConfig,
    ) -> Self {
        let subscription = store.subscribe();
        Self {
            store,
            config,
            sender,
            subscription,
            state: Mutex::new(SessionState {
                sets: HashMap::new(),
                sets_dirty: false,
            }),
            watched: Mutex::new(HashMap::new()),
            tracker: Mutex::new(ComponentUsageTracker::new()),
            frame: AtomicU64::new(0),
            closing: AtomicBool::new(false),
        }
    }

    /// Dispatches one inbound client message. Unknown ids and stale releases
    /// are logged and dropped; only a dead outbound channel is an error.
    pub fn handle_message(&self, message: SyncMessage) -> Result<(), HostError> {
        if self.closing.load(Ordering::Acquire) {
            debug!("session closing, dropping {}", message.name());
            return Ok(());
        }
        match message {
            SyncMessage::GetEntitySet { set_id, criteria } => {
                self.on_get_entity_set(set_id, criteria)
            }
            SyncMessage::ResetEntitySetFilter { set_id, criteria } => {
                self.on_reset_entity_set_filter(set_id, criteria)
            }
            SyncMessage::ReleaseEntitySet { set_id } => {
                self.on_release_entity_set(set_id);
                Ok(())
            }
            SyncMessage::GetComponents {
                request_id,
                entity_id,
                kinds,
            } => self.on_get_components(request_id, entity_id, kinds),
            SyncMessage::FindEntity {
                request_id,
                criteria,
            } => {
                let ids = match self.store.find_entity(&criteria) {
                    Ok(Some(id)) => vec![id],
                    _ => Vec::new(),
                };
                self.sender
                    .send(SyncMessage::EntityIds { request_id, ids })?;
                Ok(())
            }
            SyncMessage::FindEntities {
                request_id,
                criteria,
            } => {
                let ids = self.store.find_entities(&criteria).unwrap_or_default();
                self.sender
                    .send(SyncMessage::EntityIds { request_id, ids })?;
                Ok(())
            }
            SyncMessage::WatchEntity {
                request_id,
                watch_id,
                entity_id,
                kinds,
            } => self.on_watch_entity(request_id, watch_id, entity_id, kinds),
            SyncMessage::ReleaseWatchedEntity { watch_id } => {
                self.on_release_watched_entity(watch_id);
                Ok(())
            }
            SyncMessage::StringId { request_id, query } => self.on_string_id(request_id, query),
            other => {
                warn!("protocol error: server received {}", other.name());
                Ok(())
            }
        }
    }

    fn on_get_entity_set(&self, set_id: SetId, criteria: EntityCriteria) -> Result<(), HostError> {
        let set = match self.store.get_entities(criteria) {
            Ok(set) => set,
            Err(error) => {
                self.sender.send(SyncMessage::EntitySetError {
                    set_id,
                    message: error.to_string(),
                })?;
                return Ok(());
            }
        };

        // Initial contents go out synchronously so the client never has to
        // round-trip for missing members.
        let mut members: Vec<&Entity> = set.iter().collect();
        members.sort_by_key(|e| e.id().value());
        let mut batch = Vec::new();
        for entity in members {
            batch.push(snapshot(entity));
            if batch.len() >= self.config.max_entity_batch {
                self.sender.send(SyncMessage::EntityDataBatch {
                    set_id,
                    entities: std::mem::take(&mut batch),
                })?;
            }
        }
        if !batch.is_empty() {
            self.sender.send(SyncMessage::EntityDataBatch {
                set_id,
                entities: batch,
            })?;
        }

        let Ok(mut state) = self.state.lock() else {
            panic!("session state lock poisoned");
        };
        if let Some(previous) = state.sets.insert(set_id, set) {
            warn!("set id {} reused by client, releasing previous set", set_id);
            previous.release();
        }
        state.sets_dirty = true;
        Ok(())
    }

    fn on_reset_entity_set_filter(
        &self,
        set_id: SetId,
        criteria: EntityCriteria,
    ) -> Result<(), HostError> {
        let Ok(mut state) = self.state.lock() else {
            panic!("session state lock poisoned");
        };
        let Some(set) = state.sets.get_mut(&set_id) else {
            warn!("filter reset for unknown set id {}", set_id);
            return Ok(());
        };
        if let Err(error) = set.reset_criteria(criteria) {
            self.sender.send(SyncMessage::EntitySetError {
                set_id,
                message: error.to_string(),
            })?;
            return Ok(());
        }
        state.sets_dirty = true;
        Ok(())
    }

    /// Stale releases are expected: client-driven release races connection
    /// teardown. Log and move on.
    fn on_release_entity_set(&self, set_id: SetId) {
        let Ok(mut state) = self.state.lock() else {
            panic!("session state lock poisoned");
        };
        match state.sets.remove(&set_id) {
            Some(set) => set.release(),
            None => debug!("release for unknown or already-released set {}", set_id),
        }
    }

    fn on_get_components(
        &self,
        request_id: RequestId,
        entity_id: EntityId,
        kinds: Vec<ComponentKind>,
    ) -> Result<(), HostError> {
        let entity = match self.store.get_entity(entity_id, &kinds) {
            Ok(entity) => entity,
            Err(error) => {
                warn!("get_components failed for {}: {}", entity_id, error);
                Entity::new(entity_id, Arc::from(kinds))
            }
        };
        self.sender.send(SyncMessage::ResultComponents {
            request_id,
            entity_id,
            values: entity.values().to_vec(),
        })?;
        Ok(())
    }

    fn on_watch_entity(
        &self,
        request_id: RequestId,
        watch_id: WatchId,
        entity_id: EntityId,
        kinds: Vec<ComponentKind>,
    ) -> Result<(), HostError> {
        let watch = self.store.watch_entity(entity_id, &kinds);
        self.sender.send(SyncMessage::ResultComponents {
            request_id,
            entity_id,
            values: watch.entity().values().to_vec(),
        })?;

        let Ok(mut watched) = self.watched.lock() else {
            panic!("watched table lock poisoned");
        };
        if let Some(previous) = watched.insert(watch_id, watch) {
            warn!("watch id {} reused by client, releasing previous", watch_id);
            previous.release();
        }
        Ok(())
    }

    fn on_release_watched_entity(&self, watch_id: WatchId) {
        let Ok(mut watched) = self.watched.lock() else {
            panic!("watched table lock poisoned");
        };
        match watched.remove(&watch_id) {
            Some(watch) => watch.release(),
            None => debug!("release for unknown or already-released watch {}", watch_id),
        }
    }

    /// Lookups only; a remote observer may never intern new strings.
    fn on_string_id(&self, request_id: RequestId, query: StringIdQuery) -> Result<(), HostError> {
        let (id, text) = match query {
            StringIdQuery::ByText(text) => {
                let id = self.store.string_index().string_id(&text, false);
                (id, Some(text))
            }
            StringIdQuery::ById(id) => (Some(id), self.store.string_index().string(id)),
        };
        self.sender
            .send(SyncMessage::StringIdResult { request_id, id, text })?;
        Ok(())
    }

    /// One send cycle. Single logical frame; intended to be driven by one
    /// periodic thread, concurrent with inbound message handling.
    pub fn send_updates(&self) -> Result<(), HostError> {
        if self.closing.load(Ordering::Acquire) {
            return Ok(());
        }
        let frame: FrameId = self.frame.fetch_add(1, Ordering::AcqRel) + 1;
        let changes = self.subscription.drain();

        {
            let Ok(mut state) = self.state.lock() else {
                panic!("session state lock poisoned");
            };
            let sets_dirty = state.sets_dirty;
            state.sets_dirty = false;
            if changes.is_empty() && !sets_dirty {
                return Ok(());
            }

            let Ok(mut tracker) = self.tracker.lock() else {
                panic!("usage tracker lock poisoned");
            };
            for (set_id, set) in state.sets.iter_mut() {
                set.apply_changes();

                let mut batch = Vec::new();
                for entity in set.added_entities() {
                    batch.push(snapshot(entity));
                    if batch.len() >= self.config.max_entity_batch {
                        self.sender.send(SyncMessage::EntityDataBatch {
                            set_id: *set_id,
                            entities: std::mem::take(&mut batch),
                        })?;
                    }
                }
                if !batch.is_empty() {
                    self.sender.send(SyncMessage::EntityDataBatch {
                        set_id: *set_id,
                        entities: batch,
                    })?;
                }

                // Every current member is something this client needs to
                // hear about, newly added or not.
                let ids: Vec<EntityId> = set.iter().map(|e| e.id()).collect();
                for kind in set.kinds().iter() {
                    tracker.set_all(ids.iter().copied(), *kind, frame);
                }
            }
        }

        // Watched entities are marked outside the structural lock; watch
        // handlers only contend on the watched table itself.
        {
            let Ok(mut watched) = self.watched.lock() else {
                panic!("watched table lock poisoned");
            };
            let Ok(mut tracker) = self.tracker.lock() else {
                panic!("usage tracker lock poisoned");
            };
            for watch in watched.values_mut() {
                watch.apply_changes();
                if watch.is_released() {
                    continue;
                }
                for kind in watch.kinds().iter() {
                    tracker.set(watch.id(), *kind, frame);
                }
            }
        }

        // Sweep phase: coalesce this frame's changes per (entity, kind) so a
        // fast-changing component costs one delta carrying its latest value,
        // then forward only the pairs the client tracks.
        let mut coalesced: Vec<EntityChange> = Vec::new();
        let mut seen: HashMap<(EntityId, ComponentKind), usize> = HashMap::new();
        for change in changes {
            match seen.get(&(change.entity_id, change.kind)) {
                Some(index) => coalesced[*index] = change,
                None => {
                    seen.insert((change.entity_id, change.kind), coalesced.len());
                    coalesced.push(change);
                }
            }
        }

        let Ok(mut tracker) = self.tracker.lock() else {
            panic!("usage tracker lock poisoned");
        };
        let mut batch = Vec::new();
        for change in coalesced {
            if tracker
                .get_and_expire(change.entity_id, change.kind, frame)
                .is_none()
            {
                continue;
            }
            batch.push(change);
            if batch.len() >= self.config.max_change_batch {
                self.sender.send(SyncMessage::ComponentChangeBatch {
                    changes: std::mem::take(&mut batch),
                })?;
            }
        }
        tracker.sweep();
        if !batch.is_empty() {
            self.sender
                .send(SyncMessage::ComponentChangeBatch { changes: batch })?;
        }
        Ok(())
    }

    /// Idempotent; safe to race with an in-flight `send_updates`.
    pub fn close(&self) {
        if self.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        self.subscription.release();
        let Ok(mut state) = self.state.lock() else {
            panic!("session state lock poisoned");
        };
        for set in state.sets.values() {
            set.release();
        }
        state.sets.clear();
        drop(state);

        let Ok(mut watched) = self.watched.lock() else {
            panic!("watched table lock poisoned");
        };
        for watch in watched.values() {
            watch.release();
        }
        watched.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }
}

/// # Panics
///
/// Panics on an incomplete entity; sets only admit complete members, so a
/// hole here means the entity view is corrupted.
fn snapshot(entity: &Entity) -> EntitySnapshot {
    let mut values = Vec::with_capacity(entity.values().len());
    for (index, value) in entity.values().iter().enumerate() {
        let Some(value) = value else {
            panic!(
                "snapshot of incomplete entity {} (missing {:?})",
                entity.id(),
                entity.kinds()[index]
            );
        };
        values.push(value.clone());
    }
    EntitySnapshot {
        entity_id: entity.id(),
        values,
    }
}
