use std::time::Duration;

/// Client-side tuning.
#[derive(Clone, Debug, Default)]
pub struct ClientConfig {
    /// Upper bound on how long a blocking point query waits for its reply.
    /// `None` blocks until the reply arrives or the connection closes.
    pub request_timeout: Option<Duration>,
}
