//! SurrealDB schema initialization for the graph backend
//!
//! Safe to call on every connect; `DEFINE` statements are idempotent.

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use memscope_core::{MemoryError, MemoryResult};

/// Define the entry and edge tables with their lookup indexes.
pub async fn init_schema(db: &Surreal<Any>) -> MemoryResult<()> {
    info!("Initializing memscope SurrealDB schema");
    init_entries_table(db).await?;
    init_edges_table(db).await?;
    info!("memscope schema initialization complete");
    Ok(())
}

/// Initialize `memory_entries`
///
/// Schema:
/// ```text
/// TABLE memory_entries {
///   ns:        STRING (namespace label, indexed with key)
///   key:       STRING
///   value:     STRING
///   scope:     STRING (session | project | global)
///   timestamp: DATETIME
///   tags:      ARRAY<STRING> (indexed)
///   metadata:  OBJECT
///   embedding: ARRAY<FLOAT>
/// }
/// ```
///
/// `(ns, key)` uniqueness is enforced by the provider, which serializes
/// writes per namespace.
async fn init_entries_table(db: &Surreal<Any>) -> MemoryResult<()> {
    debug!("Initializing memory_entries table");

    let sql = r#"
        DEFINE TABLE memory_entries SCHEMALESS;

        DEFINE INDEX idx_entries_ns_key ON TABLE memory_entries COLUMNS ns, key;
        DEFINE INDEX idx_entries_tags ON TABLE memory_entries COLUMNS tags;
        DEFINE INDEX idx_entries_scope ON TABLE memory_entries COLUMNS scope;
    "#;

    db.query(sql)
        .await
        .map_err(|e| MemoryError::Backend(e.to_string()))?;
    Ok(())
}

/// Initialize `memory_edges`
///
/// Schema:
/// ```text
/// TABLE memory_edges {
///   ns:         STRING
///   from_key:   STRING
///   to_key:     STRING
///   relation:   STRING
///   created_at: DATETIME
/// }
/// ```
async fn init_edges_table(db: &Surreal<Any>) -> MemoryResult<()> {
    debug!("Initializing memory_edges table");

    let sql = r#"
        DEFINE TABLE memory_edges SCHEMALESS;

        -- Outgoing edges of one relation type, the traversal access path
        DEFINE INDEX idx_edges_ns_from_rel ON TABLE memory_edges COLUMNS ns, from_key, relation;
    "#;

    db.query(sql)
        .await
        .map_err(|e| MemoryError::Backend(e.to_string()))?;
    Ok(())
}
