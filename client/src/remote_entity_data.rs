//! The client's view of a server-hosted entity store.
//!
//! One [`RemoteEntityData`] per connection. Outbound requests go through the
//! [`MessageSender`] seam; the application's receive loop feeds every
//! inbound server message to [`handle_message`](RemoteEntityData::handle_message),
//! which routes replication traffic to the mirrors and completes blocking
//! point queries. Point queries block the calling thread until the reply
//! arrives, bounded by [`ClientConfig::request_timeout`] when one is set.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, Condvar, Mutex,
    },
    time::{Duration, Instant},
};

use log::{debug, warn};

use syncra_shared::{
    ComponentKind, ComponentValue, Entity, EntityChange, EntityCriteria, EntityData, EntityId,
    EntitySnapshot, MessageSender, RequestId, SetError, SetId, StoreError, StringIdQuery,
    SyncMessage, WatchId, WatchedEntity,
};

use crate::{
    config::ClientConfig,
    error::RemoteError,
    remote_entity_set::{RemoteEntitySet, RemoteSetHandle},
    remote_watched_entity::{RemoteWatchHandle, RemoteWatchedEntity},
};

enum Reply {
    Components {
        entity_id: EntityId,
        values: Vec<Option<ComponentValue>>,
    },
    Ids(Vec<EntityId>),
    StringId {
        id: Option<i32>,
        text: Option<String>,
    },
}

enum SlotState {
    Waiting,
    Done(Reply),
    Closed,
}

/// One pending point query: the requesting thread parks on the condvar, the
/// dispatch thread completes it.
struct ResponseSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl ResponseSlot {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Waiting),
            ready: Condvar::new(),
        }
    }

    fn complete(&self, reply: Reply) {
        let Ok(mut state) = self.state.lock() else {
            panic!("response slot lock poisoned");
        };
        *state = SlotState::Done(reply);
        self.ready.notify_one();
    }

    fn close(&self) {
        let Ok(mut state) = self.state.lock() else {
            panic!("response slot lock poisoned");
        };
        if matches!(*state, SlotState::Waiting) {
            *state = SlotState::Closed;
        }
        self.ready.notify_one();
    }

    fn wait(&self, timeout: Option<Duration>) -> Result<Reply, RemoteError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let Ok(mut state) = self.state.lock() else {
            panic!("response slot lock poisoned");
        };
        loop {
            match std::mem::replace(&mut *state, SlotState::Waiting) {
                SlotState::Done(reply) => return Ok(reply),
                SlotState::Closed => return Err(RemoteError::Disconnected),
                SlotState::Waiting => {}
            }
            state = match deadline {
                None => {
                    let Ok(guard) = self.ready.wait(state) else {
                        panic!("response slot lock poisoned");
                    };
                    guard
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(RemoteError::Timeout);
                    }
                    let Ok((guard, _)) = self.ready.wait_timeout(state, deadline - now) else {
                        panic!("response slot lock poisoned");
                    };
                    guard
                }
            };
        }
    }
}

/// A mismatched reply kind fails the one request it was correlated with;
/// the session stays up.
fn wrong_reply(operation: &str) -> RemoteError {
    warn!("protocol error: wrong reply kind for {}", operation);
    RemoteError::Protocol(format!("wrong reply kind for {}", operation))
}

#[derive(Default)]
struct StringCache {
    by_text: HashMap<String, i32>,
    by_id: HashMap<i32, String>,
}

pub struct RemoteEntityData {
    sender: Box<dyn MessageSender>,
    config: ClientConfig,
    requests: Mutex<HashMap<RequestId, Arc<ResponseSlot>>>,
    sets: Mutex<HashMap<SetId, Arc<RemoteSetHandle>>>,
    watches: Mutex<HashMap<WatchId, Arc<RemoteWatchHandle>>>,
    /// Last component value the server streamed per (entity, kind); `None`
    /// records a streamed removal. Populated by replication traffic only, so
    /// an entry can go stale once the server stops tracking the pair for
    /// this session.
    cache: Mutex<HashMap<(EntityId, ComponentKind), Option<ComponentValue>>>,
    strings: Mutex<StringCache>,
    next_request_id: AtomicU32,
    next_set_id: AtomicU32,
    next_watch_id: AtomicU32,
    closed: AtomicBool,
}

impl RemoteEntityData {
    pub fn new(sender: Box<dyn MessageSender>, config: ClientConfig) -> Self {
        Self {
            sender,
            config,
            requests: Mutex::new(HashMap::new()),
            sets: Mutex::new(HashMap::new()),
            watches: Mutex::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
            strings: Mutex::new(StringCache::default()),
            next_request_id: AtomicU32::new(1),
            next_set_id: AtomicU32::new(1),
            next_watch_id: AtomicU32::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Opens a live mirror of every entity matching `criteria`. Membership
    /// arrives asynchronously; the first `apply_changes` after the initial
    /// snapshot batches land reports them as added.
    pub fn get_entities(
        self: &Arc<Self>,
        criteria: EntityCriteria,
    ) -> Result<RemoteEntitySet, RemoteError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RemoteError::Disconnected);
        }
        // Same precondition the authoritative store enforces; fail before
        // anything is registered or sent.
        if criteria.is_empty() {
            return Err(SetError::EmptyCriteria.into());
        }
        let set_id = self.next_set_id.fetch_add(1, Ordering::Relaxed);
        let (handle, set) = RemoteSetHandle::create(criteria.clone());
        {
            let Ok(mut sets) = self.sets.lock() else {
                panic!("set table lock poisoned");
            };
            sets.insert(set_id, handle.clone());
        }
        if let Err(error) = self.sender.send(SyncMessage::GetEntitySet { set_id, criteria }) {
            self.drop_set_handle(set_id);
            return Err(error.into());
        }
        Ok(RemoteEntitySet::new(set_id, set, handle, self.clone()))
    }

    /// Watches one entity over a fixed kind list. Blocks for the server's
    /// initial component values; deltas stream in afterwards.
    pub fn watch_entity(
        self: &Arc<Self>,
        entity_id: EntityId,
        kinds: &[ComponentKind],
    ) -> Result<RemoteWatchedEntity, RemoteError> {
        let kind_list: Arc<[ComponentKind]> = Arc::from(kinds.to_vec());
        let watch_id = self.next_watch_id.fetch_add(1, Ordering::Relaxed);
        let (handle, receiver) = RemoteWatchHandle::create(entity_id, kind_list.clone());
        // Registered before the round trip so deltas racing the reply land
        // in the queue instead of being dropped.
        {
            let Ok(mut watches) = self.watches.lock() else {
                panic!("watch table lock poisoned");
            };
            watches.insert(watch_id, handle.clone());
        }

        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let reply = self.round_trip(
            request_id,
            SyncMessage::WatchEntity {
                request_id,
                watch_id,
                entity_id,
                kinds: kinds.to_vec(),
            },
        );
        let values = match reply {
            Ok(Reply::Components { values, .. }) => values,
            Ok(_) => {
                self.drop_watch_handle(watch_id);
                return Err(wrong_reply("WatchEntity"));
            }
            Err(error) => {
                self.drop_watch_handle(watch_id);
                return Err(error);
            }
        };

        let entity = Entity::with_values(entity_id, kind_list, values);
        let watched = WatchedEntity::new(entity, receiver, handle.released_flag());
        Ok(RemoteWatchedEntity::new(watch_id, watched, self.clone()))
    }

    /// Routes one inbound server message. Called from the application's
    /// receive loop; never blocks.
    pub fn handle_message(&self, message: SyncMessage) {
        match message {
            SyncMessage::EntityDataBatch { set_id, entities } => {
                let Some(handle) = self.set_handle(set_id) else {
                    debug!("snapshot batch for unknown or released set {}", set_id);
                    return;
                };
                for snapshot in entities {
                    self.cache_snapshot(&snapshot, handle.kinds());
                    handle.inject_snapshot(snapshot);
                }
            }
            SyncMessage::ComponentChangeBatch { changes } => {
                for change in changes {
                    self.route_change(change);
                }
            }
            SyncMessage::EntitySetError { set_id, message } => {
                match self.set_handle(set_id) {
                    Some(handle) => handle.set_error(message),
                    None => warn!("server error for unknown set {}: {}", set_id, message),
                }
            }
            SyncMessage::ResultComponents {
                request_id,
                entity_id,
                values,
            } => {
                self.complete(request_id, Reply::Components { entity_id, values });
            }
            SyncMessage::EntityIds { request_id, ids } => {
                self.complete(request_id, Reply::Ids(ids));
            }
            SyncMessage::StringIdResult {
                request_id,
                id,
                text,
            } => {
                if let (Some(id), Some(text)) = (id, &text) {
                    let Ok(mut strings) = self.strings.lock() else {
                        panic!("string cache lock poisoned");
                    };
                    strings.by_text.insert(text.clone(), id);
                    strings.by_id.insert(id, text.clone());
                }
                self.complete(request_id, Reply::StringId { id, text });
            }
            other => warn!("protocol error: client received {}", other.name()),
        }
    }

    /// Tears the mirror down: blocked queries fail with `Disconnected`, all
    /// sets and watches go released. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let slots: Vec<Arc<ResponseSlot>> = {
            let Ok(mut requests) = self.requests.lock() else {
                panic!("request table lock poisoned");
            };
            requests.drain().map(|(_, slot)| slot).collect()
        };
        for slot in slots {
            slot.close();
        }

        let Ok(mut sets) = self.sets.lock() else {
            panic!("set table lock poisoned");
        };
        for handle in sets.values() {
            handle.mark_released();
        }
        sets.clear();
        drop(sets);

        let Ok(mut watches) = self.watches.lock() else {
            panic!("watch table lock poisoned");
        };
        for handle in watches.values() {
            handle.mark_released();
        }
        watches.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn send_message(&self, message: SyncMessage) -> Result<(), RemoteError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RemoteError::Disconnected);
        }
        self.sender.send(message)?;
        Ok(())
    }

    pub(crate) fn release_set(&self, set_id: SetId) -> Result<(), RemoteError> {
        self.drop_set_handle(set_id);
        if self.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        self.sender.send(SyncMessage::ReleaseEntitySet { set_id })?;
        Ok(())
    }

    pub(crate) fn release_watch(&self, watch_id: WatchId) -> Result<(), RemoteError> {
        self.drop_watch_handle(watch_id);
        if self.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        self.sender
            .send(SyncMessage::ReleaseWatchedEntity { watch_id })?;
        Ok(())
    }

    fn set_handle(&self, set_id: SetId) -> Option<Arc<RemoteSetHandle>> {
        let Ok(sets) = self.sets.lock() else {
            panic!("set table lock poisoned");
        };
        sets.get(&set_id).cloned()
    }

    fn drop_set_handle(&self, set_id: SetId) {
        let Ok(mut sets) = self.sets.lock() else {
            panic!("set table lock poisoned");
        };
        sets.remove(&set_id);
    }

    fn drop_watch_handle(&self, watch_id: WatchId) {
        let Ok(mut watches) = self.watches.lock() else {
            panic!("watch table lock poisoned");
        };
        watches.remove(&watch_id);
    }

    fn route_change(&self, change: EntityChange) {
        {
            let Ok(mut cache) = self.cache.lock() else {
                panic!("component cache lock poisoned");
            };
            cache.insert((change.entity_id, change.kind), change.value.clone());
        }
        {
            let Ok(sets) = self.sets.lock() else {
                panic!("set table lock poisoned");
            };
            for handle in sets.values() {
                if handle.wants(change.kind) {
                    handle.push_change(change.clone());
                }
            }
        }
        let Ok(watches) = self.watches.lock() else {
            panic!("watch table lock poisoned");
        };
        for handle in watches.values() {
            if handle.wants(&change) {
                handle.push_change(change.clone());
            }
        }
    }

    fn cache_snapshot(&self, snapshot: &EntitySnapshot, kinds: &Arc<[ComponentKind]>) {
        if snapshot.values.len() != kinds.len() {
            return;
        }
        let Ok(mut cache) = self.cache.lock() else {
            panic!("component cache lock poisoned");
        };
        for (kind, value) in kinds.iter().zip(&snapshot.values) {
            cache.insert((snapshot.entity_id, *kind), Some(value.clone()));
        }
    }

    fn complete(&self, request_id: RequestId, reply: Reply) {
        let slot = {
            let Ok(mut requests) = self.requests.lock() else {
                panic!("request table lock poisoned");
            };
            requests.remove(&request_id)
        };
        match slot {
            Some(slot) => slot.complete(reply),
            // The waiter gave up (timeout) before the reply arrived.
            None => debug!("late reply for request {}", request_id),
        }
    }

    fn round_trip(&self, request_id: RequestId, message: SyncMessage) -> Result<Reply, RemoteError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RemoteError::Disconnected);
        }
        let slot = Arc::new(ResponseSlot::new());
        {
            let Ok(mut requests) = self.requests.lock() else {
                panic!("request table lock poisoned");
            };
            requests.insert(request_id, slot.clone());
        }
        if let Err(error) = self.sender.send(message) {
            self.forget(request_id);
            return Err(error.into());
        }
        let result = slot.wait(self.config.request_timeout);
        self.forget(request_id);
        result
    }

    fn forget(&self, request_id: RequestId) {
        let Ok(mut requests) = self.requests.lock() else {
            panic!("request table lock poisoned");
        };
        requests.remove(&request_id);
    }

    fn cached_component(
        &self,
        entity_id: EntityId,
        kind: ComponentKind,
    ) -> Option<Option<ComponentValue>> {
        let Ok(cache) = self.cache.lock() else {
            panic!("component cache lock poisoned");
        };
        cache.get(&(entity_id, kind)).cloned()
    }
}

impl EntityData for RemoteEntityData {
    /// Served from the replication cache when the session already streams
    /// this pair; otherwise one blocking round trip.
    fn get_component(
        &self,
        entity_id: EntityId,
        kind: ComponentKind,
    ) -> Result<Option<ComponentValue>, StoreError> {
        if let Some(value) = self.cached_component(entity_id, kind) {
            return Ok(value);
        }
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let reply = self
            .round_trip(
                request_id,
                SyncMessage::GetComponents {
                    request_id,
                    entity_id,
                    kinds: vec![kind],
                },
            )
            .map_err(StoreError::from)?;
        match reply {
            Reply::Components { values, .. } => Ok(values.into_iter().next().flatten()),
            _ => Err(wrong_reply("GetComponents").into()),
        }
    }

    fn get_entity(
        &self,
        entity_id: EntityId,
        kinds: &[ComponentKind],
    ) -> Result<Entity, StoreError> {
        let cached: Vec<Option<Option<ComponentValue>>> = kinds
            .iter()
            .map(|kind| self.cached_component(entity_id, *kind))
            .collect();
        if cached.iter().all(|slot| slot.is_some()) {
            let values = cached.into_iter().flatten().collect();
            return Ok(Entity::with_values(
                entity_id,
                Arc::from(kinds.to_vec()),
                values,
            ));
        }
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let reply = self
            .round_trip(
                request_id,
                SyncMessage::GetComponents {
                    request_id,
                    entity_id,
                    kinds: kinds.to_vec(),
                },
            )
            .map_err(StoreError::from)?;
        match reply {
            Reply::Components { values, .. } => Ok(Entity::with_values(
                entity_id,
                Arc::from(kinds.to_vec()),
                values,
            )),
            _ => Err(wrong_reply("GetComponents").into()),
        }
    }

    fn find_entity(&self, criteria: &EntityCriteria) -> Result<Option<EntityId>, StoreError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let reply = self
            .round_trip(
                request_id,
                SyncMessage::FindEntity {
                    request_id,
                    criteria: criteria.clone(),
                },
            )
            .map_err(StoreError::from)?;
        match reply {
            Reply::Ids(ids) => Ok(ids.into_iter().next()),
            _ => Err(wrong_reply("FindEntity").into()),
        }
    }

    fn find_entities(&self, criteria: &EntityCriteria) -> Result<Vec<EntityId>, StoreError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let reply = self
            .round_trip(
                request_id,
                SyncMessage::FindEntities {
                    request_id,
                    criteria: criteria.clone(),
                },
            )
            .map_err(StoreError::from)?;
        match reply {
            Reply::Ids(ids) => Ok(ids),
            _ => Err(wrong_reply("FindEntities").into()),
        }
    }

    fn get_string_id(&self, text: &str) -> Result<Option<i32>, StoreError> {
        {
            let Ok(strings) = self.strings.lock() else {
                panic!("string cache lock poisoned");
            };
            if let Some(id) = strings.by_text.get(text) {
                return Ok(Some(*id));
            }
        }
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let reply = self
            .round_trip(
                request_id,
                SyncMessage::StringId {
                    request_id,
                    query: StringIdQuery::ByText(text.to_string()),
                },
            )
            .map_err(StoreError::from)?;
        match reply {
            Reply::StringId { id, .. } => Ok(id),
            _ => Err(wrong_reply("StringId").into()),
        }
    }

    fn get_string(&self, id: i32) -> Result<Option<String>, StoreError> {
        {
            let Ok(strings) = self.strings.lock() else {
                panic!("string cache lock poisoned");
            };
            if let Some(text) = strings.by_id.get(&id) {
                return Ok(Some(text.clone()));
            }
        }
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let reply = self
            .round_trip(
                request_id,
                SyncMessage::StringId {
                    request_id,
                    query: StringIdQuery::ById(id),
                },
            )
            .map_err(StoreError::from)?;
        match reply {
            Reply::StringId { text, .. } => Ok(text),
            _ => Err(wrong_reply("StringId").into()),
        }
    }
}
