//! Provider trait definitions for memscope
//!
//! These traits define the store's two-level contract:
//! - `MemoryProvider`: the required surface every backend implements
//!   (`get`, `set`, `query`, `search`, `delete`, `clear`, `close`)
//! - `AdvancedCapabilities`: optional relationships, traversal,
//!   transactions, and explicit indexing for graph/transactional backends
//!
//! Callers negotiate the extension at runtime through
//! [`MemoryProvider::advanced`] or [`MemoryProvider::require_advanced`]
//! rather than through a type hierarchy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::MemoryConfig;
use crate::entry::{MemoryEntry, ScoredEntry, SetOptions};
use crate::error::{MemoryError, MemoryResult};
use crate::lifecycle::ProviderState;
use crate::scope::Scope;
use crate::transaction::MemoryTransaction;

/// Default number of `search` hits when the caller passes no limit.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Optional operations a backend may or may not offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Search,
    Relate,
    Traverse,
    Transaction,
    Index,
}

impl Capability {
    /// The capabilities that make up [`AdvancedCapabilities`].
    pub const ADVANCED: [Capability; 4] = [
        Capability::Relate,
        Capability::Traverse,
        Capability::Transaction,
        Capability::Index,
    ];
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Search => write!(f, "search"),
            Self::Relate => write!(f, "relate"),
            Self::Traverse => write!(f, "traverse"),
            Self::Transaction => write!(f, "transaction"),
            Self::Index => write!(f, "index"),
        }
    }
}

/// Scoped key-value memory store.
///
/// Guarantees:
/// - Scopes are isolated namespaces; a key set in one scope is invisible in
///   the others.
/// - `set` on an existing key is an upsert that refreshes the timestamp.
/// - `get` on a missing key returns `Ok(None)`.
/// - `delete`/`clear` on empty state return `false`/`0`, never an error.
/// - `query` results are sorted by key ascending before `limit` applies.
/// - Operations outside the `Ready` state fail with `NotInitialized` or
///   `ProviderClosed`.
#[async_trait]
pub trait MemoryProvider: Send + Sync {
    /// Short backend name used in capability errors and logs.
    fn backend_name(&self) -> &'static str;

    /// Bind the provider to `config` and move it to `Ready`.
    async fn initialize(&self, config: MemoryConfig) -> MemoryResult<()>;

    async fn state(&self) -> ProviderState;

    async fn get(&self, key: &str, scope: Scope) -> MemoryResult<Option<MemoryEntry>>;

    /// Insert or replace `key` in `scope`.
    async fn set(&self, key: &str, value: &str, scope: Scope, options: SetOptions)
        -> MemoryResult<()>;

    /// Run a pattern query (`tag:NAME`, `PREFIX*`, `*SUFFIX`, or exact key).
    async fn query(
        &self,
        pattern: &str,
        scope: Scope,
        limit: Option<usize>,
    ) -> MemoryResult<Vec<MemoryEntry>>;

    /// Similarity search. Returns hits with `score >= threshold`, best first.
    async fn search(
        &self,
        semantic: &str,
        scope: Scope,
        limit: Option<usize>,
        threshold: Option<f64>,
    ) -> MemoryResult<Vec<ScoredEntry>> {
        let _ = (semantic, scope, limit, threshold);
        Err(MemoryError::CapabilityNotSupported {
            capability: Capability::Search,
            backend: self.backend_name(),
        })
    }

    /// Remove `key`; true iff an entry was removed.
    async fn delete(&self, key: &str, scope: Scope) -> MemoryResult<bool>;

    /// Remove every entry in `scope`; returns how many were removed.
    async fn clear(&self, scope: Scope) -> MemoryResult<usize>;

    /// Release resources and move to `Closed`. Persisted scopes are kept.
    async fn close(&self) -> MemoryResult<()>;

    /// The advanced extension, if this backend implements it.
    fn advanced(&self) -> Option<&dyn AdvancedCapabilities> {
        None
    }

    fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Search => false,
            _ => self.advanced().is_some(),
        }
    }

    /// The advanced extension, or `CapabilityNotSupported` naming the
    /// capability the caller was after.
    fn require_advanced(&self, wanted: Capability) -> MemoryResult<&dyn AdvancedCapabilities> {
        self.advanced()
            .ok_or_else(|| MemoryError::CapabilityNotSupported {
                capability: wanted,
                backend: self.backend_name(),
            })
    }
}

/// One node on a traversal path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathNode {
    pub key: String,
    /// `None` for placeholder nodes that only exist as edge endpoints.
    pub entry: Option<MemoryEntry>,
}

/// An ordered walk from the traversal start, one node per hop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraversalPath {
    pub nodes: Vec<PathNode>,
}

impl TraversalPath {
    /// Number of edges followed.
    pub fn hops(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.key.as_str()).collect()
    }

    pub fn end(&self) -> Option<&PathNode> {
        self.nodes.last()
    }
}

/// Relationship, traversal, transaction and indexing support.
///
/// Semantics:
/// - `relate` records a directed typed edge; neither endpoint has to exist
///   as an entry.
/// - `traverse` walks breadth-first along edges of one relation type and
///   returns every path of `1..=max_depth` hops. A path never revisits a
///   node already on it, so cycles terminate.
/// - `transaction` stages operations that are applied all-or-nothing on
///   commit; aborting leaves the store untouched.
/// - `index` hints a secondary index on `field`; a no-op when lookups on
///   that field are already indexed.
#[async_trait]
pub trait AdvancedCapabilities: Send + Sync {
    async fn relate(
        &self,
        from_key: &str,
        to_key: &str,
        relation_type: &str,
        scope: Scope,
    ) -> MemoryResult<()>;

    async fn traverse(
        &self,
        start_key: &str,
        relation_type: &str,
        scope: Scope,
        max_depth: usize,
    ) -> MemoryResult<Vec<TraversalPath>>;

    async fn transaction(&self) -> MemoryResult<MemoryTransaction>;

    async fn index(&self, field: &str, scope: Scope) -> MemoryResult<()>;
}
