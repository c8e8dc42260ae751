/// Tuning knobs for a hosted session's outbound batching.
#[derive(Clone, Debug)]
pub struct HostConfig {
    /// Max entity snapshots per `EntityDataBatch` message.
    pub max_entity_batch: usize,
    /// Max deltas per `ComponentChangeBatch` message.
    pub max_change_batch: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_entity_batch: 20,
            max_change_batch: 20,
        }
    }
}
