use thiserror::Error;

use syncra_shared::SendError;

/// Errors surfaced by the hosting layer. Anything not listed here is either
/// tolerated (stale releases, unknown ids: logged and dropped) or a
/// programmer error (fails fast).
#[derive(Debug, Clone, Error)]
pub enum HostError {
    /// The session's outbound channel is gone; the connection is dead.
    #[error("session transport closed: {0}")]
    Transport(#[from] SendError),
}
