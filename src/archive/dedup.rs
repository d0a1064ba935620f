//! Dedup index
//!
//! Identity keys written during this process run. Nothing is persisted and
//! nothing is evicted: a restart starts from an empty index.

use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct DedupIndex {
    seen: HashSet<String>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    /// Record a key; returns `false` if it was already present
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        self.seen.insert(key.into())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let mut index = DedupIndex::new();
        assert!(index.is_empty());
        assert!(!index.contains("C1|1700000000.000100|U1"));

        assert!(index.insert("C1|1700000000.000100|U1"));
        assert!(index.contains("C1|1700000000.000100|U1"));
        assert!(!index.contains("C1|1700000000.000100|U2"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_reinsert_is_reported() {
        let mut index = DedupIndex::new();
        assert!(index.insert("key"));
        assert!(!index.insert("key".to_string()));
        assert_eq!(index.len(), 1);
    }
}
