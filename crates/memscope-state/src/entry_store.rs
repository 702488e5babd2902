//! Create/read/update/delete of entries within one namespace.
//!
//! Every namespace owns one `tokio::sync::RwLock`. Mutations hold the write
//! half for their full duration, reads share the read half, and different
//! namespaces never contend. Durable namespaces stage the mutation on a
//! copy, persist the copy, and only then publish it, so a failed write
//! leaves both disk and memory as they were.

use std::collections::BTreeMap;

use tokio::sync::RwLock;
use tracing::{debug, instrument, Span};

use memscope_core::obs::{
    emit_entry_deleted, emit_entry_written, emit_namespace_cleared, NamespaceSpan,
};
use memscope_core::{
    evaluate, MemoryEntry, MemoryError, MemoryResult, Namespace, QuerySpec, SetOptions, TagIndex,
};

use crate::namespace_file;

#[derive(Debug, Clone, Default)]
struct NamespaceState {
    entries: BTreeMap<String, MemoryEntry>,
    tags: TagIndex,
}

/// Entries of a single scope namespace plus their tag index.
#[derive(Debug)]
pub struct EntryStore {
    namespace: Namespace,
    label: String,
    state: RwLock<NamespaceState>,
}

impl EntryStore {
    /// An in-process namespace that is never written to disk.
    pub fn volatile(namespace: Namespace) -> Self {
        Self {
            label: namespace.label(),
            namespace,
            state: RwLock::new(NamespaceState::default()),
        }
    }

    /// Open a namespace, loading its persisted contents if it has a directory.
    #[instrument(skip_all, fields(namespace = %namespace))]
    pub async fn open(namespace: Namespace, quarantine_corrupt: bool) -> MemoryResult<Self> {
        let Some(dir) = namespace.dir().map(|d| d.to_path_buf()) else {
            return Ok(Self::volatile(namespace));
        };

        let label = namespace.label();
        let scope = namespace.scope();
        let task_label = label.clone();
        let task_dir = dir.clone();
        let span = Span::current();
        let loaded = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let _ns_span = NamespaceSpan::enter(&task_label);
            std::fs::create_dir_all(&task_dir).map_err(|e| MemoryError::io(&task_dir, e))?;
            namespace_file::load_blocking(&task_label, &task_dir, scope, quarantine_corrupt)
        })
        .await
        .map_err(|e| MemoryError::io(&dir, std::io::Error::other(e)))??;

        debug!(entries = loaded.entries.len(), tags = loaded.tags.len(), "Namespace opened");
        Ok(Self {
            namespace,
            label,
            state: RwLock::new(NamespaceState {
                entries: loaded.entries,
                tags: loaded.tags,
            }),
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub async fn get(&self, key: &str) -> Option<MemoryEntry> {
        self.state.read().await.entries.get(key).cloned()
    }

    /// Insert or replace `key`. Returns true if an existing entry was replaced.
    #[instrument(skip(self, value, options), fields(namespace = %self.label))]
    pub async fn set(&self, key: &str, value: &str, options: SetOptions) -> MemoryResult<bool> {
        let entry = MemoryEntry::new(key, value, self.namespace.scope(), options);
        let tag_count = entry.tags.len();
        let replaced = self
            .mutate(|state| {
                let previous = state.entries.insert(entry.key.clone(), entry.clone());
                state
                    .tags
                    .update(&entry.key, previous.as_ref().map(|p| &p.tags), &entry.tags);
                (previous.is_some(), true)
            })
            .await?;
        emit_entry_written(&self.label, key, tag_count, replaced);
        Ok(replaced)
    }

    /// Remove `key`; true iff it existed.
    #[instrument(skip(self), fields(namespace = %self.label))]
    pub async fn delete(&self, key: &str) -> MemoryResult<bool> {
        let removed = self
            .mutate(|state| match state.entries.remove(key) {
                Some(previous) => {
                    state.tags.remove(key, &previous.tags);
                    (true, true)
                }
                None => (false, false),
            })
            .await?;
        if removed {
            emit_entry_deleted(&self.label, key);
        }
        Ok(removed)
    }

    /// Remove every entry; returns how many were removed.
    #[instrument(skip(self), fields(namespace = %self.label))]
    pub async fn clear(&self) -> MemoryResult<usize> {
        let removed = self
            .mutate(|state| {
                let count = state.entries.len();
                state.entries.clear();
                state.tags.clear();
                (count, count > 0)
            })
            .await?;
        emit_namespace_cleared(&self.label, removed);
        Ok(removed)
    }

    pub async fn query(&self, spec: &QuerySpec) -> Vec<MemoryEntry> {
        let state = self.state.read().await;
        evaluate(spec, &state.entries, &state.tags)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of every entry, sorted by key.
    pub async fn entries(&self) -> Vec<MemoryEntry> {
        self.state.read().await.entries.values().cloned().collect()
    }

    /// Snapshot of the current tag index.
    pub async fn tag_index(&self) -> TagIndex {
        self.state.read().await.tags.clone()
    }

    /// Apply `f` under the namespace write lock.
    ///
    /// `f` returns its result and whether it changed anything; unchanged
    /// durable namespaces skip the disk write.
    async fn mutate<R, F>(&self, f: F) -> MemoryResult<R>
    where
        F: FnOnce(&mut NamespaceState) -> (R, bool),
    {
        let mut state = self.state.write().await;
        let Some(dir) = self.namespace.dir().map(|d| d.to_path_buf()) else {
            let (result, _) = f(&mut state);
            return Ok(result);
        };

        let mut staged = state.clone();
        let (result, changed) = f(&mut staged);
        if !changed {
            return Ok(result);
        }

        let task_dir = dir.clone();
        let task_label = self.label.clone();
        let span = Span::current();
        let staged = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let _ns_span = NamespaceSpan::enter(&task_label);
            namespace_file::save_blocking(&task_dir, &staged.entries, &staged.tags).map(|_| staged)
        })
        .await
        .map_err(|e| MemoryError::io(&dir, std::io::Error::other(e)))??;

        *state = staged;
        Ok(result)
    }
}
