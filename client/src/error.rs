use thiserror::Error;

use syncra_shared::{SendError, SetError, SetId, StoreError};

/// Failure modes of the remote mirror. Everything here is an I/O or protocol
/// outcome; local misuse (wrong component type, misaligned values) fails
/// fast instead.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// A blocking query exceeded the configured request timeout.
    #[error("request timed out")]
    Timeout,
    /// The connection is closed; no further replies will arrive.
    #[error("connection closed")]
    Disconnected,
    /// The server refused a set request or filter reset.
    #[error("server rejected set {set_id}: {message}")]
    ServerRejection { set_id: SetId, message: String },
    #[error(transparent)]
    Set(#[from] SetError),
    #[error("send failed: {0}")]
    Send(#[from] SendError),
    /// The server answered a correlated request with the wrong reply kind.
    /// Fatal to that request only, never to the session.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<RemoteError> for StoreError {
    fn from(error: RemoteError) -> Self {
        match error {
            RemoteError::Timeout => StoreError::Timeout,
            RemoteError::Disconnected | RemoteError::Send(_) => StoreError::Disconnected,
            RemoteError::ServerRejection { message, .. } => StoreError::Rejected(message),
            RemoteError::Set(error) => StoreError::Rejected(error.to_string()),
            RemoteError::Protocol(message) => StoreError::Rejected(message),
        }
    }
}
