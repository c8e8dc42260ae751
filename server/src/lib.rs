//! # Syncra Server
//! Hosts an authoritative [`DefaultEntityData`](syncra_shared::DefaultEntityData)
//! for remote clients: one replication session per connection, snapshotting
//! set members in and streaming tracked component deltas after.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod error;
mod host;
mod host_config;
mod hosted_entity_data;
mod usage_tracker;

pub use error::HostError;
pub use host::{ConnectionId, EntityHost};
pub use host_config::HostConfig;
pub use hosted_entity_data::HostedEntityData;
pub use usage_tracker::ComponentUsageTracker;
