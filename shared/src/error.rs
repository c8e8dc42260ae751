use thiserror::Error;

use crate::types::SetId;

/// Errors surfaced by entity-set lifecycle operations.
#[derive(Debug, Clone, Error)]
pub enum SetError {
    /// Criteria must name at least one component type; an empty criteria has
    /// no membership test and no retrieval list.
    #[error("criteria must name at least one component type")]
    EmptyCriteria,

    /// A filter reset may only swap filter values; the ordered kind list is
    /// fixed at set creation.
    #[error("filter reset changed the set's component types (expected [{expected}], got [{got}])")]
    KindMismatch { expected: String, got: String },
}

/// Errors surfaced by the read side of an entity-data facade.
///
/// The authoritative in-process store never fails; every variant here exists
/// for remote mirrors, where reads ride on the network.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("request timed out waiting for the server")]
    Timeout,

    #[error("transport to the server is closed")]
    Disconnected,

    #[error("server rejected the request: {0}")]
    Rejected(String),
}
