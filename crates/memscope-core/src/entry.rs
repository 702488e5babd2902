//! The stored record and the optional arguments of `set`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scope::Scope;

/// Opaque caller metadata attached to an entry.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A single stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub key: String,
    pub value: String,
    pub scope: Scope,
    /// Creation or last-write instant
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl MemoryEntry {
    /// Build an entry stamped with the current time.
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        scope: Scope,
        options: SetOptions,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            scope,
            timestamp: Utc::now(),
            tags: options.tags,
            metadata: options.metadata,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Optional `tags` and `metadata` arguments of `set`.
///
/// An upsert replaces both wholesale, so passing `SetOptions::default()`
/// clears any tags or metadata a previous write attached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetOptions {
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A `search` hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntry {
    pub entry: MemoryEntry,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_builder_deduplicates_tags() {
        let opts = SetOptions::new()
            .tag("principle")
            .tags(["principle", "tool"])
            .meta("source", "loader")
            .meta("weight", 3);
        assert_eq!(opts.tags.len(), 2);
        assert_eq!(opts.metadata["weight"], serde_json::json!(3));
    }

    #[test]
    fn test_entry_record_fields_on_disk() {
        let entry = MemoryEntry::new(
            "agent:planner",
            "plans things",
            Scope::Project,
            SetOptions::new().tag("agent"),
        );
        let json = serde_json::to_value(&entry).unwrap();
        for field in ["key", "value", "scope", "timestamp", "tags", "metadata"] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(json["scope"], "project");
        assert!(entry.has_tag("agent"));
    }

    #[test]
    fn test_missing_tags_and_metadata_default_to_empty() {
        let raw = r#"{"key":"k","value":"v","scope":"global","timestamp":"2024-05-01T10:00:00Z"}"#;
        let entry: MemoryEntry = serde_json::from_str(raw).unwrap();
        assert!(entry.tags.is_empty());
        assert!(entry.metadata.is_empty());
    }
}
