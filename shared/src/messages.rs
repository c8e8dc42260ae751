use crate::{
    change::EntityChange,
    component::component::ComponentValue,
    component::component_kind::ComponentKind,
    criteria::EntityCriteria,
    entity::entity_id::EntityId,
    types::{RequestId, SetId, WatchId},
};

/// Wire form of one complete entity, values aligned to the owning set's
/// criteria kind list.
#[derive(Clone, Debug)]
pub struct EntitySnapshot {
    pub entity_id: EntityId,
    pub values: Vec<ComponentValue>,
}

#[derive(Clone, Debug)]
pub enum StringIdQuery {
    ById(i32),
    ByText(String),
}

/// The closed message set of the replication protocol.
///
/// Handlers dispatch by matching this enum once per message; there is no
/// reflective delegation. Marshalling is the transport's concern: messages
/// cross the [`MessageSender`](crate::MessageSender) seam as plain values and
/// must travel on a reliable, ordered channel (except where a deployment
/// explicitly opts a message onto a best-effort channel, which none of these
/// state-defining messages may use).
#[derive(Clone, Debug)]
pub enum SyncMessage {
    // client -> server
    GetEntitySet {
        set_id: SetId,
        criteria: EntityCriteria,
    },
    ResetEntitySetFilter {
        set_id: SetId,
        criteria: EntityCriteria,
    },
    ReleaseEntitySet {
        set_id: SetId,
    },
    GetComponents {
        request_id: RequestId,
        entity_id: EntityId,
        kinds: Vec<ComponentKind>,
    },
    FindEntity {
        request_id: RequestId,
        criteria: EntityCriteria,
    },
    FindEntities {
        request_id: RequestId,
        criteria: EntityCriteria,
    },
    WatchEntity {
        request_id: RequestId,
        watch_id: WatchId,
        entity_id: EntityId,
        kinds: Vec<ComponentKind>,
    },
    ReleaseWatchedEntity {
        watch_id: WatchId,
    },
    StringId {
        request_id: RequestId,
        query: StringIdQuery,
    },

    // server -> client
    EntityDataBatch {
        set_id: SetId,
        entities: Vec<EntitySnapshot>,
    },
    ComponentChangeBatch {
        changes: Vec<EntityChange>,
    },
    EntitySetError {
        set_id: SetId,
        message: String,
    },
    ResultComponents {
        request_id: RequestId,
        entity_id: EntityId,
        values: Vec<Option<ComponentValue>>,
    },
    EntityIds {
        request_id: RequestId,
        ids: Vec<EntityId>,
    },
    StringIdResult {
        request_id: RequestId,
        id: Option<i32>,
        text: Option<String>,
    },
}

impl SyncMessage {
    /// Message name for protocol-error logs.
    pub fn name(&self) -> &'static str {
        match self {
            SyncMessage::GetEntitySet { .. } => "GetEntitySet",
            SyncMessage::ResetEntitySetFilter { .. } => "ResetEntitySetFilter",
            SyncMessage::ReleaseEntitySet { .. } => "ReleaseEntitySet",
            SyncMessage::GetComponents { .. } => "GetComponents",
            SyncMessage::FindEntity { .. } => "FindEntity",
            SyncMessage::FindEntities { .. } => "FindEntities",
            SyncMessage::WatchEntity { .. } => "WatchEntity",
            SyncMessage::ReleaseWatchedEntity { .. } => "ReleaseWatchedEntity",
            SyncMessage::StringId { .. } => "StringId",
            SyncMessage::EntityDataBatch { .. } => "EntityDataBatch",
            SyncMessage::ComponentChangeBatch { .. } => "ComponentChangeBatch",
            SyncMessage::EntitySetError { .. } => "EntitySetError",
            SyncMessage::ResultComponents { .. } => "ResultComponents",
            SyncMessage::EntityIds { .. } => "EntityIds",
            SyncMessage::StringIdResult { .. } => "StringIdResult",
        }
    }
}
