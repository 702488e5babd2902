//! Pattern queries over one namespace.
//!
//! Four shapes, each mapping to exactly one [`QueryPattern`] variant:
//!
//! | Pattern       | Variant             |
//! |---------------|---------------------|
//! | `tag:NAME`    | `Tag(NAME)`         |
//! | `PREFIX*`     | `Prefix(PREFIX)`    |
//! | `*SUFFIX`     | `Suffix(SUFFIX)`    |
//! | anything else | `Exact(pattern)`    |
//!
//! Only one leading or trailing `*` is a wildcard. Any other `*` is a
//! literal character, so `a*b` is an exact key and `*a*` is a prefix match
//! on `*a`.

use std::collections::BTreeMap;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use crate::entry::MemoryEntry;
use crate::tag_index::TagIndex;

const TAG_PREFIX: &str = "tag:";
const WILDCARD: char = '*';

/// Parsed query pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "needle", rename_all = "snake_case")]
pub enum QueryPattern {
    Exact(String),
    Prefix(String),
    Suffix(String),
    Tag(String),
}

impl QueryPattern {
    pub fn parse(raw: &str) -> Self {
        if let Some(tag) = raw.strip_prefix(TAG_PREFIX) {
            return Self::Tag(tag.to_string());
        }
        if let Some(prefix) = raw.strip_suffix(WILDCARD) {
            return Self::Prefix(prefix.to_string());
        }
        if let Some(suffix) = raw.strip_prefix(WILDCARD) {
            return Self::Suffix(suffix.to_string());
        }
        Self::Exact(raw.to_string())
    }

    /// The literal text the pattern compares against.
    pub fn needle(&self) -> &str {
        match self {
            Self::Exact(s) | Self::Prefix(s) | Self::Suffix(s) | Self::Tag(s) => s,
        }
    }

    pub fn matches(&self, entry: &MemoryEntry) -> bool {
        match self {
            Self::Exact(key) => entry.key == *key,
            Self::Prefix(prefix) => entry.key.starts_with(prefix.as_str()),
            Self::Suffix(suffix) => entry.key.ends_with(suffix.as_str()),
            Self::Tag(tag) => entry.has_tag(tag),
        }
    }
}

impl std::fmt::Display for QueryPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(key) => write!(f, "{key}"),
            Self::Prefix(prefix) => write!(f, "{prefix}*"),
            Self::Suffix(suffix) => write!(f, "*{suffix}"),
            Self::Tag(tag) => write!(f, "tag:{tag}"),
        }
    }
}

/// A parsed query plus its optional result limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub pattern: QueryPattern,
    pub limit: Option<usize>,
}

impl QuerySpec {
    pub fn parse(raw: &str, limit: Option<usize>) -> Self {
        Self {
            pattern: QueryPattern::parse(raw),
            limit,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Evaluate `spec` against a namespace's entries and tag index.
///
/// Results are sorted by key ascending, then truncated to the limit.
pub fn evaluate(
    spec: &QuerySpec,
    entries: &BTreeMap<String, MemoryEntry>,
    tags: &TagIndex,
) -> Vec<MemoryEntry> {
    let limit = spec.limit.unwrap_or(usize::MAX);
    match &spec.pattern {
        QueryPattern::Exact(key) => entries.get(key).cloned().into_iter().take(limit).collect(),
        QueryPattern::Prefix(prefix) => entries
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix.as_str()))
            .map(|(_, entry)| entry.clone())
            .take(limit)
            .collect(),
        QueryPattern::Suffix(suffix) => entries
            .values()
            .filter(|entry| entry.key.ends_with(suffix.as_str()))
            .take(limit)
            .cloned()
            .collect(),
        // The index yields keys in ascending order already.
        QueryPattern::Tag(tag) => tags
            .keys_for(tag)
            .filter_map(|key| entries.get(key))
            .take(limit)
            .cloned()
            .collect(),
    }
}
