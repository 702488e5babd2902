//! Structured observability events for memory store mutations.
//!
//! Events are emitted at `info!` level (warnings for index rebuilds and
//! quarantines) with an `event` field so log pipelines can filter on it.

use tracing::{info, warn};

/// RAII guard that enters a namespace-scoped tracing span.
///
/// Not `Send`: hold it only in synchronous code, such as the blocking file
/// work of a durable namespace.
///
/// ```ignore
/// let _span = NamespaceSpan::enter("project");
/// // events emitted while the guard lives are nested under memscope.namespace
/// ```
pub struct NamespaceSpan {
    _span: tracing::span::EnteredSpan,
}

impl NamespaceSpan {
    pub fn enter(namespace: &str) -> Self {
        let span = tracing::info_span!("memscope.namespace", namespace = %namespace);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: an entry was inserted or replaced.
pub fn emit_entry_written(namespace: &str, key: &str, tag_count: usize, replaced: bool) {
    info!(
        event = "memory.entry_written",
        namespace = %namespace,
        key = %key,
        tag_count = tag_count,
        replaced = replaced,
    );
}

/// Emit event: an entry was deleted.
pub fn emit_entry_deleted(namespace: &str, key: &str) {
    info!(event = "memory.entry_deleted", namespace = %namespace, key = %key);
}

/// Emit event: a namespace was cleared.
pub fn emit_namespace_cleared(namespace: &str, removed: usize) {
    info!(event = "memory.namespace_cleared", namespace = %namespace, removed = removed);
}

/// Emit event: the tag index was rebuilt from the namespace contents.
pub fn emit_index_rebuilt(namespace: &str, reason: &str, tags: usize) {
    warn!(event = "memory.index_rebuilt", namespace = %namespace, reason = %reason, tags = tags);
}

/// Emit event: a corrupt namespace file was moved aside.
pub fn emit_namespace_quarantined(namespace: &str, moved_to: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "memory.namespace_quarantined",
        namespace = %namespace,
        moved_to = %moved_to,
        error = %error,
    );
}

/// Emit event: a transaction batch was committed.
pub fn emit_transaction_committed(tx_id: &str, ops: usize) {
    info!(event = "memory.transaction_committed", tx_id = %tx_id, ops = ops);
}

/// Emit event: a provider was closed.
pub fn emit_provider_closed(backend: &str, session_id: &str, session_entries_dropped: usize) {
    info!(
        event = "memory.provider_closed",
        backend = %backend,
        session_id = %session_id,
        session_entries_dropped = session_entries_dropped,
    );
}
