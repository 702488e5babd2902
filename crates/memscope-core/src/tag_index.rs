//! Secondary index from tag to the keys carrying it, for one namespace.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::entry::MemoryEntry;

/// Tag → keys index, maintained incrementally on every mutation.
///
/// Tags with no remaining keys are pruned, so two indexes describing the
/// same entries always compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagIndex {
    tags: BTreeMap<String, BTreeSet<String>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the index from a full namespace.
    pub fn rebuild<'a>(entries: impl IntoIterator<Item = &'a MemoryEntry>) -> Self {
        let mut index = Self::new();
        for entry in entries {
            index.insert(&entry.key, &entry.tags);
        }
        index
    }

    /// Register `key` under every tag in `tags`.
    pub fn insert(&mut self, key: &str, tags: &BTreeSet<String>) {
        for tag in tags {
            self.tags
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
    }

    /// Apply an upsert: drop `key` from tags it lost, add it to tags it gained.
    pub fn update(&mut self, key: &str, previous: Option<&BTreeSet<String>>, next: &BTreeSet<String>) {
        if let Some(previous) = previous {
            let dropped: Vec<&String> = previous.difference(next).collect();
            for tag in dropped {
                self.detach(tag, key);
            }
        }
        self.insert(key, next);
    }

    /// Remove `key` from every tag in `tags`.
    pub fn remove(&mut self, key: &str, tags: &BTreeSet<String>) {
        for tag in tags {
            self.detach(tag, key);
        }
    }

    pub fn clear(&mut self) {
        self.tags.clear();
    }

    /// Keys carrying `tag`, in ascending order.
    pub fn keys_for(&self, tag: &str) -> impl Iterator<Item = &String> {
        self.tags.get(tag).into_iter().flatten()
    }

    pub fn contains(&self, tag: &str, key: &str) -> bool {
        self.tags.get(tag).is_some_and(|keys| keys.contains(key))
    }

    /// Number of distinct tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Whether this index matches the tag sets of `entries` exactly.
    pub fn is_consistent_with<'a>(&self, entries: impl IntoIterator<Item = &'a MemoryEntry>) -> bool {
        *self == Self::rebuild(entries)
    }

    fn detach(&mut self, tag: &str, key: &str) {
        if let Some(keys) = self.tags.get_mut(tag) {
            keys.remove(key);
            if keys.is_empty() {
                self.tags.remove(tag);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::SetOptions;
    use crate::scope::Scope;

    fn tags(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn entry(key: &str, t: &[&str]) -> MemoryEntry {
        MemoryEntry::new(key, "v", Scope::Project, SetOptions::new().tags(t.iter().copied()))
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut idx = TagIndex::new();
        idx.insert("key1", &tags(&["tag1", "tag2"]));
        idx.insert("key2", &tags(&["tag2"]));
        let keys: Vec<&String> = idx.keys_for("tag2").collect();
        assert_eq!(keys, ["key1", "key2"]);
        assert_eq!(idx.keys_for("missing").count(), 0);
    }

    #[test]
    fn test_update_drops_stale_tags() {
        let mut idx = TagIndex::new();
        idx.insert("k", &tags(&["old", "kept"]));
        idx.update("k", Some(&tags(&["old", "kept"])), &tags(&["kept", "new"]));
        assert!(!idx.contains("old", "k"));
        assert!(idx.contains("kept", "k"));
        assert!(idx.contains("new", "k"));
        assert_eq!(idx.len(), 2, "empty tag sets are pruned");
    }

    #[test]
    fn test_remove_prunes_empty_tags() {
        let mut idx = TagIndex::new();
        idx.insert("a", &tags(&["x"]));
        idx.insert("b", &tags(&["x", "y"]));
        idx.remove("b", &tags(&["x", "y"]));
        assert!(idx.contains("x", "a"));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn test_rebuild_matches_incremental() {
        let entries = vec![entry("a", &["t1"]), entry("b", &["t1", "t2"]), entry("c", &[])];
        let mut incremental = TagIndex::new();
        for e in &entries {
            incremental.update(&e.key, None, &e.tags);
        }
        assert_eq!(incremental, TagIndex::rebuild(&entries));
        assert!(incremental.is_consistent_with(&entries));
    }

    #[test]
    fn test_detects_inconsistency() {
        let entries = vec![entry("a", &["t1"])];
        let mut idx = TagIndex::rebuild(&entries);
        idx.insert("ghost", &tags(&["t1"]));
        assert!(!idx.is_consistent_with(&entries));
    }

    #[test]
    fn test_serde_roundtrip() {
        let idx = TagIndex::rebuild(&[entry("a", &["t"])]);
        let json = serde_json::to_string(&idx).unwrap();
        let back: TagIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(back, idx);
    }
}
