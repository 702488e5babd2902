//! Advanced capability tests for the SurrealDB backend: relationships,
//! traversal, transactions, indexing and similarity search.

use memscope_core::{
    AdvancedCapabilities, Capability, MemoryConfig, MemoryError, MemoryProvider, Scope,
    SetOptions, TraversalPath,
};
use memscope_state::SurrealMemoryProvider;
use tracing_test::traced_test;

async fn provider() -> SurrealMemoryProvider {
    let p = SurrealMemoryProvider::new();
    p.initialize(MemoryConfig::new("/tmp/memscope-graph-tests", "graph"))
        .await
        .unwrap();
    p
}

fn key_paths(paths: &[TraversalPath]) -> Vec<Vec<&str>> {
    paths.iter().map(|p| p.keys()).collect()
}

// ===========================================================================
// Capability negotiation
// ===========================================================================

#[tokio::test]
async fn advertises_every_capability() {
    let p = provider().await;
    assert!(p.advanced().is_some());
    assert!(p.supports(Capability::Search));
    for cap in Capability::ADVANCED {
        assert!(p.supports(cap), "{cap}");
        assert!(p.require_advanced(cap).is_ok());
    }
}

#[tokio::test]
async fn advanced_ops_respect_lifecycle() {
    let p = SurrealMemoryProvider::new();
    assert!(matches!(
        p.relate("a", "b", "r", Scope::Project).await,
        Err(MemoryError::NotInitialized)
    ));
    p.initialize(MemoryConfig::new("/tmp/memscope-graph-tests", "lc"))
        .await
        .unwrap();
    p.close().await.unwrap();
    assert!(matches!(
        p.traverse("a", "r", Scope::Project, 1).await,
        Err(MemoryError::ProviderClosed)
    ));
    assert!(matches!(
        p.transaction().await,
        Err(MemoryError::ProviderClosed)
    ));
}

// ===========================================================================
// relate / traverse
// ===========================================================================

#[tokio::test]
async fn traverse_follows_chain_up_to_depth() -> anyhow::Result<()> {
    let p = provider().await;
    for k in ["a", "b", "c", "d"] {
        p.set(k, &format!("node {k}"), Scope::Project, SetOptions::new())
            .await?;
    }
    p.relate("a", "b", "depends_on", Scope::Project).await?;
    p.relate("b", "c", "depends_on", Scope::Project).await?;
    p.relate("c", "d", "depends_on", Scope::Project).await?;

    let one = p.traverse("a", "depends_on", Scope::Project, 1).await?;
    assert_eq!(key_paths(&one), [vec!["a", "b"]]);

    let two = p.traverse("a", "depends_on", Scope::Project, 2).await?;
    assert_eq!(key_paths(&two), [vec!["a", "b"], vec!["a", "b", "c"]]);
    assert_eq!(two[1].hops(), 2);
    assert_eq!(
        two[1].end().and_then(|n| n.entry.as_ref()).map(|e| e.value.as_str()),
        Some("node c")
    );

    assert!(p
        .traverse("a", "depends_on", Scope::Project, 0)
        .await?
        .is_empty());
    Ok(())
}

#[tokio::test]
async fn traverse_orders_by_length_then_keys() -> anyhow::Result<()> {
    let p = provider().await;
    p.relate("root", "z", "link", Scope::Global).await?;
    p.relate("root", "m", "link", Scope::Global).await?;
    p.relate("m", "b", "link", Scope::Global).await?;
    p.relate("z", "a", "link", Scope::Global).await?;

    let paths = p.traverse("root", "link", Scope::Global, 3).await?;
    assert_eq!(
        key_paths(&paths),
        [
            vec!["root", "m"],
            vec!["root", "z"],
            vec!["root", "m", "b"],
            vec!["root", "z", "a"],
        ]
    );
    Ok(())
}

#[tokio::test]
async fn traverse_terminates_on_cycles() -> anyhow::Result<()> {
    let p = provider().await;
    p.relate("a", "b", "next", Scope::Project).await?;
    p.relate("b", "c", "next", Scope::Project).await?;
    p.relate("c", "a", "next", Scope::Project).await?;
    p.relate("a", "a", "next", Scope::Project).await?;

    let paths = p.traverse("a", "next", Scope::Project, 10).await?;
    assert_eq!(key_paths(&paths), [vec!["a", "b"], vec!["a", "b", "c"]]);
    Ok(())
}

#[tokio::test]
async fn traverse_filters_relation_and_scope() -> anyhow::Result<()> {
    let p = provider().await;
    p.relate("a", "b", "depends_on", Scope::Project).await?;
    p.relate("a", "c", "mentions", Scope::Project).await?;
    p.relate("a", "d", "depends_on", Scope::Global).await?;

    let paths = p.traverse("a", "depends_on", Scope::Project, 3).await?;
    assert_eq!(key_paths(&paths), [vec!["a", "b"]]);
    Ok(())
}

#[tokio::test]
async fn placeholder_nodes_have_no_entry() -> anyhow::Result<()> {
    let p = provider().await;
    p.set("known", "v", Scope::Project, SetOptions::new()).await?;
    p.relate("known", "ghost", "refers_to", Scope::Project).await?;

    let paths = p.traverse("known", "refers_to", Scope::Project, 1).await?;
    assert_eq!(paths.len(), 1);
    assert!(paths[0].nodes[0].entry.is_some());
    assert_eq!(paths[0].nodes[1].key, "ghost");
    assert!(paths[0].nodes[1].entry.is_none());
    Ok(())
}

#[tokio::test]
async fn relate_is_idempotent_and_survives_clear() -> anyhow::Result<()> {
    let p = provider().await;
    p.set("a", "v", Scope::Project, SetOptions::new()).await?;
    p.set("b", "v", Scope::Project, SetOptions::new()).await?;
    p.relate("a", "b", "r", Scope::Project).await?;
    p.relate("a", "b", "r", Scope::Project).await?;
    assert_eq!(p.traverse("a", "r", Scope::Project, 1).await?.len(), 1);

    assert_eq!(p.clear(Scope::Project).await?, 2);
    let paths = p.traverse("a", "r", Scope::Project, 1).await?;
    assert_eq!(key_paths(&paths), [vec!["a", "b"]]);
    assert!(paths[0].nodes.iter().all(|n| n.entry.is_none()));
    Ok(())
}

#[tokio::test]
async fn relate_rejects_blank_relation() {
    let p = provider().await;
    assert!(matches!(
        p.relate("a", "b", "  ", Scope::Project).await,
        Err(MemoryError::InvalidArgument(_))
    ));
}

// ===========================================================================
// transactions
// ===========================================================================

#[tokio::test]
#[traced_test]
async fn transaction_commit_applies_every_op() -> anyhow::Result<()> {
    let p = provider().await;
    p.set("stale", "v", Scope::Global, SetOptions::new()).await?;

    let mut tx = p.transaction().await?;
    tx.set("a", "1", Scope::Project, SetOptions::new().tag("batch"))
        .set("b", "2", Scope::Project, SetOptions::new().tag("batch"))
        .relate("a", "b", "then", Scope::Project)
        .delete("stale", Scope::Global)
        .set("s", "3", Scope::Session, SetOptions::new());
    assert_eq!(tx.commit().await?, 5);

    assert_eq!(p.query("tag:batch", Scope::Project, None).await?.len(), 2);
    assert!(p.get("stale", Scope::Global).await?.is_none());
    assert_eq!(p.get("s", Scope::Session).await?.map(|e| e.value), Some("3".into()));
    assert_eq!(
        key_paths(&p.traverse("a", "then", Scope::Project, 1).await?),
        [vec!["a", "b"]]
    );
    assert!(logs_contain("memory.transaction_committed"));
    Ok(())
}

#[tokio::test]
async fn transaction_set_replaces_existing_entry() -> anyhow::Result<()> {
    let p = provider().await;
    p.set("k", "old", Scope::Project, SetOptions::new().tag("x"))
        .await?;

    let mut tx = p.transaction().await?;
    tx.set("k", "new", Scope::Project, SetOptions::new());
    tx.commit().await?;

    let all = p.query("*", Scope::Project, None).await?;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].value, "new");
    assert!(p.query("tag:x", Scope::Project, None).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn transaction_clear_inside_batch() -> anyhow::Result<()> {
    let p = provider().await;
    for k in ["x", "y"] {
        p.set(k, "v", Scope::Global, SetOptions::new()).await?;
    }
    let mut tx = p.transaction().await?;
    tx.clear(Scope::Global).set("z", "v", Scope::Global, SetOptions::new());
    tx.commit().await?;

    let keys: Vec<String> = p
        .query("*", Scope::Global, None)
        .await?
        .into_iter()
        .map(|e| e.key)
        .collect();
    assert_eq!(keys, ["z"]);
    Ok(())
}

#[tokio::test]
async fn transaction_abort_leaves_store_untouched() -> anyhow::Result<()> {
    let p = provider().await;
    p.set("keep", "v", Scope::Project, SetOptions::new()).await?;

    let mut tx = p.transaction().await?;
    tx.set("new", "v", Scope::Project, SetOptions::new())
        .delete("keep", Scope::Project)
        .clear(Scope::Global);
    tx.abort();

    assert!(p.get("new", Scope::Project).await?.is_none());
    assert!(p.get("keep", Scope::Project).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn transaction_with_invalid_op_applies_nothing() -> anyhow::Result<()> {
    let p = provider().await;
    let mut tx = p.transaction().await?;
    tx.set("a", "v", Scope::Project, SetOptions::new())
        .relate("a", "b", "", Scope::Project);

    let err = tx.commit().await.unwrap_err();
    assert!(matches!(err, MemoryError::InvalidArgument(_)));
    assert!(p.get("a", Scope::Project).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn commit_after_close_fails() -> anyhow::Result<()> {
    let p = provider().await;
    let mut tx = p.transaction().await?;
    tx.set("late", "v", Scope::Project, SetOptions::new());
    p.close().await?;

    assert!(matches!(tx.commit().await, Err(MemoryError::ProviderClosed)));
    Ok(())
}

// ===========================================================================
// index
// ===========================================================================

#[tokio::test]
async fn index_accepts_known_and_metadata_fields() -> anyhow::Result<()> {
    let p = provider().await;
    p.index("key", Scope::Project).await?;
    p.index("tags", Scope::Project).await?;
    p.index("owner", Scope::Project).await?;
    // Repeating a definition is harmless.
    p.index("owner", Scope::Global).await?;
    p.index("metadata.team.lead", Scope::Global).await?;

    p.set("k", "v", Scope::Project, SetOptions::new().meta("owner", "ops"))
        .await?;
    assert!(p.get("k", Scope::Project).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn index_rejects_unsafe_field_names() {
    let p = provider().await;
    for bad in ["", "owner; REMOVE TABLE memory_entries", "a..b", "näme"] {
        assert!(
            matches!(
                p.index(bad, Scope::Project).await,
                Err(MemoryError::InvalidArgument(_))
            ),
            "{bad:?}"
        );
    }
}

// ===========================================================================
// search
// ===========================================================================

async fn seeded() -> SurrealMemoryProvider {
    let p = provider().await;
    let rows = [
        ("db.migrate", "run the database migration before deploy", &["ops"][..]),
        ("db.backup", "nightly database backup to cold storage", &["ops"][..]),
        ("ui.theme", "dark theme with high contrast", &["ui"][..]),
        ("lunch", "tacos on friday", &[][..]),
    ];
    for (key, value, tags) in rows {
        p.set(key, value, Scope::Project, SetOptions::new().tags(tags.iter().copied()))
            .await
            .unwrap();
    }
    p
}

#[tokio::test]
async fn search_ranks_best_match_first() -> anyhow::Result<()> {
    let p = seeded().await;
    let hits = p
        .search("database migration", Scope::Project, None, None)
        .await?;

    assert_eq!(hits[0].entry.key, "db.migrate");
    assert!(hits.iter().all(|h| h.score > 0.0));
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(!hits.iter().any(|h| h.entry.key == "lunch"));
    Ok(())
}

#[tokio::test]
async fn search_honours_limit_and_threshold() -> anyhow::Result<()> {
    let p = seeded().await;
    let limited = p.search("database", Scope::Project, Some(1), None).await?;
    assert_eq!(limited.len(), 1);

    let strict = p
        .search("database", Scope::Project, None, Some(0.99))
        .await?;
    assert!(strict.is_empty());

    assert!(matches!(
        p.search("database", Scope::Project, None, Some(f64::NAN)).await,
        Err(MemoryError::InvalidArgument(_))
    ));
    Ok(())
}

#[tokio::test]
async fn search_is_scoped() -> anyhow::Result<()> {
    let p = seeded().await;
    assert!(p
        .search("database migration", Scope::Global, None, None)
        .await?
        .is_empty());
    Ok(())
}
