use std::sync::atomic::{AtomicI32, Ordering};

use dashmap::DashMap;

/// Two-way string ⇄ integer interning, used to keep repeated strings off the
/// wire. Registration happens server-side only; remote mirrors resolve but
/// never intern.
pub trait StringIndex: Send + Sync {
    /// Looks up the id for `text`, interning a fresh one when `create` is
    /// true and the string is unknown.
    fn string_id(&self, text: &str, create: bool) -> Option<i32>;

    fn string(&self, id: i32) -> Option<String>;
}

// MemStringIndex
//
// Concurrent in-memory index with a per-index id counter (never a
// process-wide static).
#[derive(Default)]
pub struct MemStringIndex {
    ids: DashMap<String, i32>,
    strings: DashMap<i32, String>,
    next_id: AtomicI32,
}

impl MemStringIndex {
    pub fn new() -> Self {
        Self {
            ids: DashMap::new(),
            strings: DashMap::new(),
            next_id: AtomicI32::new(0),
        }
    }
}

impl StringIndex for MemStringIndex {
    fn string_id(&self, text: &str, create: bool) -> Option<i32> {
        if let Some(id) = self.ids.get(text) {
            return Some(*id);
        }
        if !create {
            return None;
        }
        // The entry guard arbitrates racing creates for the same string.
        let id = *self
            .ids
            .entry(text.to_string())
            .or_insert_with(|| self.next_id.fetch_add(1, Ordering::Relaxed));
        self.strings.entry(id).or_insert_with(|| text.to_string());
        Some(id)
    }

    fn string(&self, id: i32) -> Option<String> {
        self.strings.get(&id).map(|s| s.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let index = MemStringIndex::new();
        let id = index.string_id("warrior", true).unwrap();
        assert_eq!(index.string_id("warrior", false), Some(id));
        assert_eq!(index.string(id), Some("warrior".to_string()));
    }

    #[test]
    fn lookup_without_create_is_readonly() {
        let index = MemStringIndex::new();
        assert_eq!(index.string_id("ghost", false), None);
        assert_eq!(index.string(42), None);
        assert!(index.string_id("ghost", false).is_none());
    }

    #[test]
    fn ids_are_stable_per_string() {
        let index = MemStringIndex::new();
        let a = index.string_id("a", true).unwrap();
        let b = index.string_id("b", true).unwrap();
        assert_ne!(a, b);
        assert_eq!(index.string_id("a", true), Some(a));
    }
}
