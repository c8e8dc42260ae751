use std::fmt;

/// Opaque 64-bit entity identifier, globally unique within one store.
///
/// Carries no ordering semantics beyond equality/hash; ids are allocated by
/// the owning store's counter and never reused.
#[derive(PartialEq, Eq, Hash, Clone, Copy)]
pub struct EntityId(u64);

impl EntityId {
    pub fn new(value: u64) -> Self {
        EntityId(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
