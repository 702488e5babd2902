//! SurrealDB-backed provider with relationships, traversal, transactions,
//! explicit indexing and similarity search.
//!
//! All scopes live in two tables partitioned by the namespace label. Writes
//! to one namespace are serialized by a per-namespace async mutex; a
//! transaction takes the mutexes of every namespace it touches, in sorted
//! order, and applies its batch inside a single `BEGIN`/`COMMIT`.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use memscope_core::obs::{
    emit_entry_deleted, emit_entry_written, emit_namespace_cleared, emit_provider_closed,
    emit_transaction_committed,
};
use memscope_core::{
    evaluate, AdvancedCapabilities, Capability, Lifecycle, MemoryConfig, MemoryEntry,
    MemoryError, MemoryProvider, MemoryResult, MemoryTransaction, PathNode, ProviderState,
    QueryPattern, QuerySpec, Scope, ScopeResolver, ScoredEntry, SetOptions, TagIndex,
    TransactionSink, TraversalPath, TxOp, DEFAULT_SEARCH_LIMIT,
};

use crate::embedding;
use crate::migrations;
use crate::schema::{EdgeRecord, EntryRecord, EDGES_TABLE, ENTRIES_TABLE};

const DB_NAMESPACE: &str = "memscope";
const DB_DATABASE: &str = "main";

/// Fields with an index defined by the schema.
const SCHEMA_INDEXED_FIELDS: [&str; 3] = ["key", "tags", "scope"];

fn backend_err(e: surrealdb::Error) -> MemoryError {
    MemoryError::Backend(e.to_string())
}

fn tx_err(e: surrealdb::Error) -> MemoryError {
    MemoryError::Transaction(e.to_string())
}

fn require_non_empty(what: &str, value: &str) -> MemoryResult<()> {
    if value.trim().is_empty() {
        return Err(MemoryError::InvalidArgument(format!("{what} must not be empty")));
    }
    Ok(())
}

/// Column an `index(field)` request maps onto. Top-level record fields are
/// used as-is; anything else names a metadata key.
fn index_column(field: &str) -> MemoryResult<String> {
    let valid = !field.is_empty()
        && field.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if !valid {
        return Err(MemoryError::InvalidArgument(format!(
            "cannot index field '{field}': expected [A-Za-z0-9_] segments separated by '.'"
        )));
    }
    Ok(match field {
        "value" | "timestamp" => field.to_string(),
        f if f.starts_with("metadata.") => f.to_string(),
        f => format!("metadata.{f}"),
    })
}

/// One async mutex per namespace label.
#[derive(Debug, Default)]
struct NamespaceLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl NamespaceLocks {
    async fn lock(&self, ns: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(ns.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Lock every namespace in `namespaces`, in their sorted order.
    async fn lock_all(&self, namespaces: &BTreeSet<String>) -> Vec<OwnedMutexGuard<()>> {
        let mut guards = Vec::with_capacity(namespaces.len());
        for ns in namespaces {
            guards.push(self.lock(ns).await);
        }
        guards
    }
}

/// Connection plus the per-provider state the backend needs.
struct GraphStore {
    db: Surreal<Any>,
    resolver: ScopeResolver,
    locks: NamespaceLocks,
    defined_indexes: Mutex<HashSet<String>>,
    closed: AtomicBool,
}

impl GraphStore {
    async fn connect(config: &MemoryConfig) -> MemoryResult<Self> {
        config.validate()?;
        let db = surrealdb::engine::any::connect(&config.endpoint)
            .await
            .map_err(backend_err)?;
        db.use_ns(DB_NAMESPACE)
            .use_db(DB_DATABASE)
            .await
            .map_err(backend_err)?;
        migrations::init_schema(&db).await?;

        let store = Self {
            db,
            resolver: ScopeResolver::new(config),
            locks: NamespaceLocks::default(),
            defined_indexes: Mutex::new(HashSet::new()),
            closed: AtomicBool::new(false),
        };

        // A previous provider with this session id may not have closed cleanly.
        let session_ns = store.ns(Scope::Session);
        let stale = store.purge(&session_ns).await?;
        if stale > 0 {
            debug!(namespace = %session_ns, stale, "Purged leftover session entries");
        }
        info!(endpoint = %config.endpoint, "SurrealMemoryProvider connected");
        Ok(store)
    }

    fn ns(&self, scope: Scope) -> String {
        self.resolver.resolve(scope).label()
    }

    /// Fail writes that were already in flight when `close` ran. Call with
    /// the namespace lock held.
    fn ensure_open(&self) -> MemoryResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(MemoryError::ProviderClosed);
        }
        Ok(())
    }

    /// Drop every entry and edge of `ns`; returns the number of entries removed.
    async fn purge(&self, ns: &str) -> MemoryResult<usize> {
        let mut res = self
            .db
            .query("DELETE FROM memory_entries WHERE ns = $ns RETURN BEFORE")
            .query("DELETE FROM memory_edges WHERE ns = $ns")
            .bind(("ns", ns.to_string()))
            .await
            .map_err(backend_err)?;
        let removed: Vec<EntryRecord> = res.take(0).map_err(backend_err)?;
        Ok(removed.len())
    }

    async fn select_entries(&self, sql: &str, ns: &str, needle: &str) -> MemoryResult<Vec<EntryRecord>> {
        let mut res = self
            .db
            .query(sql)
            .bind(("ns", ns.to_string()))
            .bind(("needle", needle.to_string()))
            .await
            .map_err(backend_err)?;
        res.take(0).map_err(backend_err)
    }

    async fn get(&self, scope: Scope, key: &str) -> MemoryResult<Option<MemoryEntry>> {
        let ns = self.ns(scope);
        let rows = self
            .select_entries(
                "SELECT * FROM memory_entries WHERE ns = $ns AND key = $needle",
                &ns,
                key,
            )
            .await?;
        rows.into_iter().next().map(EntryRecord::into_entry).transpose()
    }

    async fn set(&self, scope: Scope, key: &str, value: &str, options: SetOptions) -> MemoryResult<()> {
        let ns = self.ns(scope);
        let entry = MemoryEntry::new(key, value, scope, options);
        let row = EntryRecord::from_entry(&ns, &entry);

        let _guard = self.locks.lock(&ns).await;
        self.ensure_open()?;
        let mut res = self
            .db
            .query("UPDATE memory_entries CONTENT $row WHERE ns = $ns AND key = $key RETURN BEFORE")
            .bind(("row", row.clone()))
            .bind(("ns", ns.clone()))
            .bind(("key", key.to_string()))
            .await
            .map_err(backend_err)?;
        let previous: Vec<EntryRecord> = res.take(0).map_err(backend_err)?;

        if previous.is_empty() {
            let _created: Option<EntryRecord> = self
                .db
                .create(ENTRIES_TABLE)
                .content(row)
                .await
                .map_err(backend_err)?;
        }
        emit_entry_written(&ns, key, entry.tags.len(), !previous.is_empty());
        Ok(())
    }

    async fn delete(&self, scope: Scope, key: &str) -> MemoryResult<bool> {
        let ns = self.ns(scope);
        let _guard = self.locks.lock(&ns).await;
        self.ensure_open()?;
        let removed = self
            .select_entries(
                "DELETE FROM memory_entries WHERE ns = $ns AND key = $needle RETURN BEFORE",
                &ns,
                key,
            )
            .await?;
        let removed = !removed.is_empty();
        if removed {
            emit_entry_deleted(&ns, key);
        }
        Ok(removed)
    }

    async fn clear(&self, scope: Scope) -> MemoryResult<usize> {
        let ns = self.ns(scope);
        let _guard = self.locks.lock(&ns).await;
        self.ensure_open()?;
        let mut res = self
            .db
            .query("DELETE FROM memory_entries WHERE ns = $ns RETURN BEFORE")
            .bind(("ns", ns.clone()))
            .await
            .map_err(backend_err)?;
        let removed: Vec<EntryRecord> = res.take(0).map_err(backend_err)?;
        emit_namespace_cleared(&ns, removed.len());
        Ok(removed.len())
    }

    async fn query(&self, scope: Scope, spec: &QuerySpec) -> MemoryResult<Vec<MemoryEntry>> {
        let ns = self.ns(scope);
        let clause = match &spec.pattern {
            QueryPattern::Exact(_) => "key = $needle",
            QueryPattern::Prefix(_) => "string::starts_with(key, $needle)",
            QueryPattern::Suffix(_) => "string::ends_with(key, $needle)",
            QueryPattern::Tag(_) => "tags CONTAINS $needle",
        };
        let sql = format!("SELECT * FROM memory_entries WHERE ns = $ns AND {clause} ORDER BY key ASC");
        let rows = self
            .select_entries(&sql, &ns, spec.pattern.needle())
            .await?;

        // The database narrows the candidates; ordering and limit follow the
        // same evaluation as every other backend.
        let entries = rows
            .into_iter()
            .map(|row| row.into_entry().map(|e| (e.key.clone(), e)))
            .collect::<MemoryResult<BTreeMap<_, _>>>()?;
        let tags = TagIndex::rebuild(entries.values());
        Ok(evaluate(spec, &entries, &tags))
    }

    async fn search(
        &self,
        scope: Scope,
        semantic: &str,
        limit: usize,
        threshold: f64,
    ) -> MemoryResult<Vec<ScoredEntry>> {
        let ns = self.ns(scope);
        let query_vector = embedding::embed(semantic);
        let rows = self
            .select_entries("SELECT * FROM memory_entries WHERE ns = $ns", &ns, "")
            .await?;

        let mut hits = Vec::new();
        for row in rows {
            let score = embedding::cosine(&query_vector, &row.embedding);
            if score > 0.0 && score >= threshold {
                hits.push(ScoredEntry {
                    entry: row.into_entry()?,
                    score,
                });
            }
        }
        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.entry.key.cmp(&b.entry.key))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn relate(&self, scope: Scope, from_key: &str, to_key: &str, relation: &str) -> MemoryResult<()> {
        let ns = self.ns(scope);
        let _guard = self.locks.lock(&ns).await;
        self.ensure_open()?;

        let mut res = self
            .db
            .query(
                "SELECT * FROM memory_edges WHERE ns = $ns AND from_key = $from \
                 AND to_key = $to AND relation = $rel",
            )
            .bind(("ns", ns.clone()))
            .bind(("from", from_key.to_string()))
            .bind(("to", to_key.to_string()))
            .bind(("rel", relation.to_string()))
            .await
            .map_err(backend_err)?;
        let existing: Vec<EdgeRecord> = res.take(0).map_err(backend_err)?;
        if !existing.is_empty() {
            debug!(namespace = %ns, from_key, to_key, relation, "Edge already present");
            return Ok(());
        }

        let _created: Option<EdgeRecord> = self
            .db
            .create(EDGES_TABLE)
            .content(EdgeRecord::new(&ns, from_key, to_key, relation))
            .await
            .map_err(backend_err)?;
        debug!(namespace = %ns, from_key, to_key, relation, "Edge created");
        Ok(())
    }

    async fn traverse(
        &self,
        scope: Scope,
        start_key: &str,
        relation: &str,
        max_depth: usize,
    ) -> MemoryResult<Vec<TraversalPath>> {
        if max_depth == 0 {
            return Ok(Vec::new());
        }
        let ns = self.ns(scope);

        let mut res = self
            .db
            .query("SELECT * FROM memory_edges WHERE ns = $ns AND relation = $rel")
            .bind(("ns", ns.clone()))
            .bind(("rel", relation.to_string()))
            .await
            .map_err(backend_err)?;
        let edges: Vec<EdgeRecord> = res.take(0).map_err(backend_err)?;

        let mut adjacency: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for edge in edges {
            adjacency.entry(edge.from_key).or_default().insert(edge.to_key);
        }

        // Breadth-first over paths. Parents are dequeued in order and
        // neighbours are visited sorted, so paths come out ordered by length
        // and then by their key sequence.
        let mut found: Vec<Vec<String>> = Vec::new();
        let mut queue: VecDeque<Vec<String>> = VecDeque::from([vec![start_key.to_string()]]);
        while let Some(path) = queue.pop_front() {
            if path.len() > max_depth {
                continue;
            }
            let Some(neighbours) = path.last().and_then(|tail| adjacency.get(tail)) else {
                continue;
            };
            for next in neighbours {
                if path.contains(next) {
                    continue;
                }
                let mut extended = path.clone();
                extended.push(next.clone());
                found.push(extended.clone());
                queue.push_back(extended);
            }
        }

        let keys: Vec<String> = found
            .iter()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut res = self
            .db
            .query("SELECT * FROM memory_entries WHERE ns = $ns AND key INSIDE $keys")
            .bind(("ns", ns.clone()))
            .bind(("keys", keys))
            .await
            .map_err(backend_err)?;
        let rows: Vec<EntryRecord> = res.take(0).map_err(backend_err)?;
        let entries = rows
            .into_iter()
            .map(|row| row.into_entry().map(|e| (e.key.clone(), e)))
            .collect::<MemoryResult<HashMap<_, _>>>()?;

        debug!(namespace = %ns, start_key, relation, paths = found.len(), "Traversal complete");
        Ok(found
            .into_iter()
            .map(|keys| TraversalPath {
                nodes: keys
                    .into_iter()
                    .map(|key| PathNode {
                        entry: entries.get(&key).cloned(),
                        key,
                    })
                    .collect(),
            })
            .collect())
    }

    async fn index(&self, scope: Scope, field: &str) -> MemoryResult<()> {
        if SCHEMA_INDEXED_FIELDS.contains(&field) {
            debug!(field, "Field already indexed by schema");
            return Ok(());
        }
        let column = index_column(field)?;
        let name = format!("idx_entries_{}", column.replace('.', "_"));

        let mut defined = self.defined_indexes.lock().await;
        if defined.contains(&name) {
            return Ok(());
        }
        // Index definitions are idempotent; the response is not inspected.
        self.db
            .query(format!(
                "DEFINE INDEX {name} ON TABLE memory_entries COLUMNS ns, {column}"
            ))
            .await
            .map_err(backend_err)?;
        defined.insert(name.clone());
        info!(index = %name, column = %column, scope = %scope, "Secondary index defined");
        Ok(())
    }
}

/// Statements and bound values for one transaction batch.
#[derive(Default)]
struct Batch {
    statements: Vec<String>,
    strings: Vec<(String, String)>,
    entries: Vec<(String, EntryRecord)>,
    edges: Vec<(String, EdgeRecord)>,
}

impl Batch {
    fn bind_str(&mut self, name: String, value: &str) -> String {
        self.strings.push((name.clone(), value.to_string()));
        name
    }
}

#[async_trait]
impl TransactionSink for GraphStore {
    async fn apply(&self, tx_id: Uuid, ops: Vec<TxOp>) -> MemoryResult<()> {
        for op in &ops {
            if let TxOp::Relate { relation_type, .. } = op {
                require_non_empty("relation_type", relation_type)?;
            }
        }

        let namespaces: BTreeSet<String> = ops.iter().map(|op| self.ns(op.scope())).collect();
        let _guards = self.locks.lock_all(&namespaces).await;
        self.ensure_open()?;

        let mut batch = Batch::default();
        batch.statements.push("BEGIN TRANSACTION".to_string());
        for (i, op) in ops.iter().enumerate() {
            let ns = self.ns(op.scope());
            let ns_param = batch.bind_str(format!("ns{i}"), &ns);
            match op {
                TxOp::Set {
                    key,
                    value,
                    scope,
                    options,
                } => {
                    let key_param = batch.bind_str(format!("key{i}"), key);
                    let entry = MemoryEntry::new(key.as_str(), value.as_str(), *scope, options.clone());
                    batch
                        .entries
                        .push((format!("entry{i}"), EntryRecord::from_entry(&ns, &entry)));
                    batch.statements.push(format!(
                        "DELETE FROM memory_entries WHERE ns = ${ns_param} AND key = ${key_param}"
                    ));
                    batch
                        .statements
                        .push(format!("CREATE memory_entries CONTENT $entry{i}"));
                }
                TxOp::Delete { key, .. } => {
                    let key_param = batch.bind_str(format!("key{i}"), key);
                    batch.statements.push(format!(
                        "DELETE FROM memory_entries WHERE ns = ${ns_param} AND key = ${key_param}"
                    ));
                }
                TxOp::Clear { .. } => {
                    batch
                        .statements
                        .push(format!("DELETE FROM memory_entries WHERE ns = ${ns_param}"));
                }
                TxOp::Relate {
                    from_key,
                    to_key,
                    relation_type,
                    ..
                } => {
                    let from_param = batch.bind_str(format!("from{i}"), from_key);
                    let to_param = batch.bind_str(format!("to{i}"), to_key);
                    let rel_param = batch.bind_str(format!("rel{i}"), relation_type);
                    batch.edges.push((
                        format!("edge{i}"),
                        EdgeRecord::new(&ns, from_key, to_key, relation_type),
                    ));
                    batch.statements.push(format!(
                        "DELETE FROM memory_edges WHERE ns = ${ns_param} AND from_key = ${from_param} \
                         AND to_key = ${to_param} AND relation = ${rel_param}"
                    ));
                    batch
                        .statements
                        .push(format!("CREATE memory_edges CONTENT $edge{i}"));
                }
            }
        }
        batch.statements.push("COMMIT TRANSACTION".to_string());

        let sql = batch.statements.join(";\n");
        let mut query = self.db.query(sql);
        for binding in batch.strings {
            query = query.bind(binding);
        }
        for binding in batch.entries {
            query = query.bind(binding);
        }
        for binding in batch.edges {
            query = query.bind(binding);
        }
        query.await.map_err(tx_err)?.check().map_err(tx_err)?;

        emit_transaction_committed(&tx_id.to_string(), ops.len());
        Ok(())
    }
}

/// SurrealDB-backed [`MemoryProvider`] implementing [`AdvancedCapabilities`].
///
/// `MemoryConfig::endpoint` selects the engine: `mem://` for an in-process
/// store, `surrealkv://<path>` for an embedded on-disk store, `ws://` for a
/// server.
///
/// Each provider owns the `session/<id>` partition of its session id and
/// purges it on `initialize` and `close`. Two providers sharing a
/// `surrealkv://` or `ws://` endpoint must use distinct session ids, or the
/// second one to initialize wipes the first one's live session entries.
#[derive(Debug, Default)]
pub struct SurrealMemoryProvider {
    lifecycle: Lifecycle<GraphStore>,
}

impl SurrealMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryProvider for SurrealMemoryProvider {
    fn backend_name(&self) -> &'static str {
        "surreal"
    }

    #[instrument(skip(self, config), fields(endpoint = %config.endpoint, session_id = %config.session_id))]
    async fn initialize(&self, config: MemoryConfig) -> MemoryResult<()> {
        self.lifecycle
            .start(GraphStore::connect(&config))
            .await
            .map(|_| ())
    }

    async fn state(&self) -> ProviderState {
        self.lifecycle.state().await
    }

    async fn get(&self, key: &str, scope: Scope) -> MemoryResult<Option<MemoryEntry>> {
        self.lifecycle.ready().await?.get(scope, key).await
    }

    #[instrument(skip(self, value, options), fields(scope = %scope))]
    async fn set(
        &self,
        key: &str,
        value: &str,
        scope: Scope,
        options: SetOptions,
    ) -> MemoryResult<()> {
        self.lifecycle
            .ready()
            .await?
            .set(scope, key, value, options)
            .await
    }

    #[instrument(skip(self), fields(scope = %scope))]
    async fn query(
        &self,
        pattern: &str,
        scope: Scope,
        limit: Option<usize>,
    ) -> MemoryResult<Vec<MemoryEntry>> {
        let store = self.lifecycle.ready().await?;
        store.query(scope, &QuerySpec::parse(pattern, limit)).await
    }

    #[instrument(skip(self), fields(scope = %scope))]
    async fn search(
        &self,
        semantic: &str,
        scope: Scope,
        limit: Option<usize>,
        threshold: Option<f64>,
    ) -> MemoryResult<Vec<ScoredEntry>> {
        let store = self.lifecycle.ready().await?;
        let threshold = threshold.unwrap_or(0.0);
        if !threshold.is_finite() {
            return Err(MemoryError::InvalidArgument(format!(
                "search threshold must be finite, got {threshold}"
            )));
        }
        store
            .search(scope, semantic, limit.unwrap_or(DEFAULT_SEARCH_LIMIT), threshold)
            .await
    }

    #[instrument(skip(self), fields(scope = %scope))]
    async fn delete(&self, key: &str, scope: Scope) -> MemoryResult<bool> {
        self.lifecycle.ready().await?.delete(scope, key).await
    }

    #[instrument(skip(self), fields(scope = %scope))]
    async fn clear(&self, scope: Scope) -> MemoryResult<usize> {
        self.lifecycle.ready().await?.clear(scope).await
    }

    #[instrument(skip(self))]
    async fn close(&self) -> MemoryResult<()> {
        let store = self.lifecycle.shutdown().await?;
        store.closed.store(true, Ordering::SeqCst);

        let session_ns = store.ns(Scope::Session);
        let _guard = store.locks.lock(&session_ns).await;
        let dropped = store.purge(&session_ns).await?;
        emit_provider_closed(self.backend_name(), store.resolver.session_id(), dropped);
        Ok(())
    }

    fn advanced(&self) -> Option<&dyn AdvancedCapabilities> {
        Some(self)
    }

    fn supports(&self, _capability: Capability) -> bool {
        true
    }
}

#[async_trait]
impl AdvancedCapabilities for SurrealMemoryProvider {
    #[instrument(skip(self), fields(scope = %scope))]
    async fn relate(
        &self,
        from_key: &str,
        to_key: &str,
        relation_type: &str,
        scope: Scope,
    ) -> MemoryResult<()> {
        let store = self.lifecycle.ready().await?;
        require_non_empty("relation_type", relation_type)?;
        store.relate(scope, from_key, to_key, relation_type).await
    }

    #[instrument(skip(self), fields(scope = %scope))]
    async fn traverse(
        &self,
        start_key: &str,
        relation_type: &str,
        scope: Scope,
        max_depth: usize,
    ) -> MemoryResult<Vec<TraversalPath>> {
        let store = self.lifecycle.ready().await?;
        store.traverse(scope, start_key, relation_type, max_depth).await
    }

    async fn transaction(&self) -> MemoryResult<MemoryTransaction> {
        let store = self.lifecycle.ready().await?;
        Ok(MemoryTransaction::new(store))
    }

    #[instrument(skip(self), fields(scope = %scope))]
    async fn index(&self, field: &str, scope: Scope) -> MemoryResult<()> {
        self.lifecycle.ready().await?.index(scope, field).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_column_mapping() {
        assert_eq!(index_column("value").unwrap(), "value");
        assert_eq!(index_column("owner").unwrap(), "metadata.owner");
        assert_eq!(index_column("metadata.owner").unwrap(), "metadata.owner");
        assert_eq!(index_column("a.b_c").unwrap(), "metadata.a.b_c");
    }

    #[test]
    fn test_index_column_rejects_injection() {
        for bad in ["", "a b", "x;DROP", "a..b", ".a", "a.", "owner-id"] {
            assert!(
                matches!(index_column(bad), Err(MemoryError::InvalidArgument(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_namespace_locks_are_per_label() {
        let locks = NamespaceLocks::default();
        let held = locks.lock("project").await;
        // A different namespace is not blocked.
        let other = tokio::time::timeout(std::time::Duration::from_millis(50), locks.lock("global")).await;
        assert!(other.is_ok());
        // The same namespace is.
        let same = tokio::time::timeout(std::time::Duration::from_millis(50), locks.lock("project")).await;
        assert!(same.is_err());
        drop(held);
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(50), locks.lock("project"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_writes_after_close_flag_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::connect(&MemoryConfig::new(dir.path(), "unit"))
            .await
            .unwrap();
        store
            .set(Scope::Session, "before", "v", SetOptions::new())
            .await
            .unwrap();

        store.closed.store(true, Ordering::SeqCst);
        assert!(matches!(
            store.set(Scope::Session, "late", "v", SetOptions::new()).await,
            Err(MemoryError::ProviderClosed)
        ));
        assert!(matches!(
            store.delete(Scope::Session, "before").await,
            Err(MemoryError::ProviderClosed)
        ));
        assert!(matches!(
            store.clear(Scope::Session).await,
            Err(MemoryError::ProviderClosed)
        ));
        assert!(matches!(
            store.relate(Scope::Session, "before", "late", "depends_on").await,
            Err(MemoryError::ProviderClosed)
        ));
        assert!(store.get(Scope::Session, "late").await.unwrap().is_none());
        assert!(store.get(Scope::Session, "before").await.unwrap().is_some());
    }
}
