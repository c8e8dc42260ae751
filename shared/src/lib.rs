//! # Syncra Shared
//! The entity-component data store and the pieces common to syncra-server &
//! syncra-client: typed components, criteria-filtered live entity sets,
//! watched entities, the replication message set, and the transport seam.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod change;
mod component;
mod criteria;
mod entity;
mod entity_set;
mod error;
mod handler;
mod messages;
mod store;
mod string_index;
mod transport;
mod types;
mod watched_entity;

pub use change::EntityChange;
pub use component::{
    component::{ComponentValue, EntityComponent},
    component_kind::ComponentKind,
    filter::{AndFilter, ComponentFilter, OrFilter, PredicateFilter},
};
pub use criteria::EntityCriteria;
pub use entity::{entity::Entity, entity_id::EntityId};
pub use entity_set::{EntityInjector, EntitySet};
pub use error::{SetError, StoreError};
pub use handler::{ComponentHandler, MapComponentHandler};
pub use messages::{EntitySnapshot, StringIdQuery, SyncMessage};
pub use store::{ChangeSubscription, ComponentReader, DefaultEntityData, EntityData};
pub use string_index::{MemStringIndex, StringIndex};
pub use transport::{MessageChannel, MessageReceiver, MessageSender, RecvError, SendError};
pub use types::{FrameId, RequestId, SetId, WatchId};
pub use watched_entity::WatchedEntity;
