//! SurrealDB row types for the graph backend
//!
//! Tables:
//! - memory_entries: one row per (ns, key)
//! - memory_edges: directed typed relations between keys of one namespace

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use memscope_core::{MemoryEntry, MemoryError, MemoryResult};

use crate::embedding;

/// Serialize chrono timestamps as native SurrealDB datetimes.
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde::Serialize::serialize(&SurrealDatetime::from(*date), serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

pub(crate) const ENTRIES_TABLE: &str = "memory_entries";
pub(crate) const EDGES_TABLE: &str = "memory_edges";

/// Entry row stored in SurrealDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct EntryRecord {
    /// SurrealDB record ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<surrealdb::sql::Thing>,
    /// Namespace label (`project`, `global`, `session/<id>`)
    pub ns: String,
    pub key: String,
    pub value: String,
    pub scope: String,
    #[serde(with = "surreal_datetime")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Hashed term vector used by `search`
    #[serde(default)]
    pub embedding: Vec<f64>,
}

impl EntryRecord {
    pub fn from_entry(ns: &str, entry: &MemoryEntry) -> Self {
        Self {
            id: None,
            ns: ns.to_string(),
            key: entry.key.clone(),
            value: entry.value.clone(),
            scope: entry.scope.as_str().to_string(),
            timestamp: entry.timestamp,
            tags: entry.tags.iter().cloned().collect(),
            metadata: entry.metadata.clone(),
            embedding: embedding::embed_entry(entry),
        }
    }

    pub fn into_entry(self) -> MemoryResult<MemoryEntry> {
        let scope = self
            .scope
            .parse()
            .map_err(|e| MemoryError::serialization(ENTRIES_TABLE, e))?;
        Ok(MemoryEntry {
            key: self.key,
            value: self.value,
            scope,
            timestamp: self.timestamp,
            tags: self.tags.into_iter().collect(),
            metadata: self.metadata,
        })
    }
}

/// Edge row stored in SurrealDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct EdgeRecord {
    /// SurrealDB record ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<surrealdb::sql::Thing>,
    pub ns: String,
    pub from_key: String,
    pub to_key: String,
    pub relation: String,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
}

impl EdgeRecord {
    pub fn new(ns: &str, from_key: &str, to_key: &str, relation: &str) -> Self {
        Self {
            id: None,
            ns: ns.to_string(),
            from_key: from_key.to_string(),
            to_key: to_key.to_string(),
            relation: relation.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memscope_core::{Scope, SetOptions};

    #[test]
    fn test_entry_record_roundtrip_keeps_fields() {
        let entry = MemoryEntry::new(
            "pref.theme",
            "dark",
            Scope::Global,
            SetOptions::new().tag("ui").meta("source", "settings"),
        );
        let record = EntryRecord::from_entry("global", &entry);
        assert_eq!(record.scope, "global");
        assert_eq!(record.embedding.len(), embedding::EMBEDDING_DIM);

        let back = record.into_entry().unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_unknown_scope_is_serialization_error() {
        let entry = MemoryEntry::new("k", "v", Scope::Project, SetOptions::new());
        let mut record = EntryRecord::from_entry("project", &entry);
        record.scope = "team".to_string();
        assert!(matches!(
            record.into_entry(),
            Err(MemoryError::Serialization { .. })
        ));
    }
}
