//! # Syncra Client
//! Mirrors a server-hosted entity store over the message seam: live entity
//! sets and watched entities fed by replication traffic, plus blocking point
//! queries for everything else. The mirror is read-only; mutation happens on
//! the authoritative side.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod config;
mod error;
mod remote_entity_data;
mod remote_entity_set;
mod remote_watched_entity;

pub use config::ClientConfig;
pub use error::RemoteError;
pub use remote_entity_data::RemoteEntityData;
pub use remote_entity_set::RemoteEntitySet;
pub use remote_watched_entity::RemoteWatchedEntity;
