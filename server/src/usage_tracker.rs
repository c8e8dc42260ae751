use std::collections::HashMap;

use syncra_shared::{ComponentKind, EntityId, FrameId};

/// Mark/sweep bookkeeping of which (entity, component kind) pairs a remote
/// observer currently cares about.
///
/// `set` marks a pair as needed at a frame; `get_and_expire` answers "was the
/// observer told about this pair this frame?" and schedules stale entries
/// for removal on a deferred pending-clean list instead of deleting them
/// inline, since a second change to the same pair within one sweep cycle must
/// still find the entry. `sweep` commits the deferred removals and must run
/// before the next round of marking.
pub struct ComponentUsageTracker {
    usage: HashMap<ComponentKind, HashMap<EntityId, FrameId>>,
    pending_clean: Vec<(ComponentKind, EntityId)>,
}

impl ComponentUsageTracker {
    pub fn new() -> Self {
        Self {
            usage: HashMap::new(),
            pending_clean: Vec::new(),
        }
    }

    /// Records "observer needs this pair as of `frame`".
    ///
    /// # Panics
    ///
    /// Panics if cleans are pending; the caller must `sweep` between a
    /// `get_and_expire` pass and the next marking pass.
    pub fn set(&mut self, entity_id: EntityId, kind: ComponentKind, frame: FrameId) {
        self.assert_swept("set");
        self.usage.entry(kind).or_default().insert(entity_id, frame);
    }

    /// Bulk form of [`set`](Self::set) for one kind.
    ///
    /// # Panics
    ///
    /// Panics if cleans are pending.
    pub fn set_all<I>(&mut self, entity_ids: I, kind: ComponentKind, frame: FrameId)
    where
        I: IntoIterator<Item = EntityId>,
    {
        self.assert_swept("set_all");
        let entries = self.usage.entry(kind).or_default();
        for entity_id in entity_ids {
            entries.insert(entity_id, frame);
        }
    }

    /// `None`: the pair is untracked, the observer never asked; skip it.
    /// `Some(frame)`: deliver the change. When the stored frame is not
    /// `current_frame` the entry is stale and gets scheduled for removal,
    /// but the change is still worth one last delivery.
    pub fn get_and_expire(
        &mut self,
        entity_id: EntityId,
        kind: ComponentKind,
        current_frame: FrameId,
    ) -> Option<FrameId> {
        let entries = self.usage.get(&kind)?;
        let frame = *entries.get(&entity_id)?;
        if frame != current_frame {
            self.pending_clean.push((kind, entity_id));
        }
        Some(frame)
    }

    /// Commits deferred removals, dropping a kind's submap entirely once
    /// empty. Safe to call with nothing pending.
    pub fn sweep(&mut self) {
        for (kind, entity_id) in self.pending_clean.drain(..) {
            if let Some(entries) = self.usage.get_mut(&kind) {
                entries.remove(&entity_id);
                if entries.is_empty() {
                    self.usage.remove(&kind);
                }
            }
        }
    }

    pub fn is_tracked(&self, entity_id: EntityId, kind: ComponentKind) -> bool {
        self.usage
            .get(&kind)
            .map(|entries| entries.contains_key(&entity_id))
            .unwrap_or(false)
    }

    fn assert_swept(&self, operation: &str) {
        if !self.pending_clean.is_empty() {
            panic!(
                "ComponentUsageTracker::{} called with {} pending cleans; sweep() first",
                operation,
                self.pending_clean.len()
            );
        }
    }
}

impl Default for ComponentUsageTracker {
    fn default() -> Self {
        Self::new()
    }
}
