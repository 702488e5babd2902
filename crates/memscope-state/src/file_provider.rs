//! Reference backend: project and global scopes as JSON files on disk,
//! session scope in process memory.
//!
//! Only one process should open a given `base_path` at a time; nothing
//! guards against a second writer.

use async_trait::async_trait;
use tracing::instrument;

use memscope_core::obs::emit_provider_closed;
use memscope_core::{
    Lifecycle, MemoryConfig, MemoryEntry, MemoryError, MemoryProvider, MemoryResult,
    ProviderState, QuerySpec, Scope, ScopeResolver, SetOptions,
};

use crate::entry_store::EntryStore;

/// The three namespaces a file provider is bound to.
#[derive(Debug)]
struct FileNamespaces {
    resolver: ScopeResolver,
    session: EntryStore,
    project: EntryStore,
    global: EntryStore,
}

impl FileNamespaces {
    async fn open(config: &MemoryConfig) -> MemoryResult<Self> {
        config.validate()?;
        let resolver = ScopeResolver::new(config);
        tokio::fs::create_dir_all(resolver.base_path())
            .await
            .map_err(|e| MemoryError::io(resolver.base_path(), e))?;

        let session = EntryStore::volatile(resolver.resolve(Scope::Session));
        let project =
            EntryStore::open(resolver.resolve(Scope::Project), config.quarantine_corrupt).await?;
        let global =
            EntryStore::open(resolver.resolve(Scope::Global), config.quarantine_corrupt).await?;

        Ok(Self {
            resolver,
            session,
            project,
            global,
        })
    }

    fn store(&self, scope: Scope) -> &EntryStore {
        match scope {
            Scope::Session => &self.session,
            Scope::Project => &self.project,
            Scope::Global => &self.global,
        }
    }
}

/// File-backed [`MemoryProvider`].
///
/// ```no_run
/// # async fn demo() -> memscope_core::MemoryResult<()> {
/// use memscope_core::{MemoryConfig, MemoryProvider, Scope, SetOptions};
/// use memscope_state::FileMemoryProvider;
///
/// let provider = FileMemoryProvider::new();
/// provider
///     .initialize(MemoryConfig::new("/var/lib/memscope", "sess-1"))
///     .await?;
/// provider
///     .set("pref.theme", "dark", Scope::Global, SetOptions::new().tag("ui"))
///     .await?;
/// let hits = provider.query("tag:ui", Scope::Global, None).await?;
/// assert_eq!(hits.len(), 1);
/// provider.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct FileMemoryProvider {
    lifecycle: Lifecycle<FileNamespaces>,
}

impl FileMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryProvider for FileMemoryProvider {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    #[instrument(skip(self, config), fields(base_path = %config.base_path.display(), session_id = %config.session_id))]
    async fn initialize(&self, config: MemoryConfig) -> MemoryResult<()> {
        self.lifecycle
            .start(FileNamespaces::open(&config))
            .await
            .map(|_| ())
    }

    async fn state(&self) -> ProviderState {
        self.lifecycle.state().await
    }

    async fn get(&self, key: &str, scope: Scope) -> MemoryResult<Option<MemoryEntry>> {
        let ns = self.lifecycle.ready().await?;
        Ok(ns.store(scope).get(key).await)
    }

    #[instrument(skip(self, value, options), fields(scope = %scope))]
    async fn set(
        &self,
        key: &str,
        value: &str,
        scope: Scope,
        options: SetOptions,
    ) -> MemoryResult<()> {
        let ns = self.lifecycle.ready().await?;
        ns.store(scope).set(key, value, options).await.map(|_| ())
    }

    #[instrument(skip(self), fields(scope = %scope))]
    async fn query(
        &self,
        pattern: &str,
        scope: Scope,
        limit: Option<usize>,
    ) -> MemoryResult<Vec<MemoryEntry>> {
        let ns = self.lifecycle.ready().await?;
        let spec = QuerySpec::parse(pattern, limit);
        Ok(ns.store(scope).query(&spec).await)
    }

    #[instrument(skip(self), fields(scope = %scope))]
    async fn delete(&self, key: &str, scope: Scope) -> MemoryResult<bool> {
        let ns = self.lifecycle.ready().await?;
        ns.store(scope).delete(key).await
    }

    #[instrument(skip(self), fields(scope = %scope))]
    async fn clear(&self, scope: Scope) -> MemoryResult<usize> {
        let ns = self.lifecycle.ready().await?;
        ns.store(scope).clear().await
    }

    #[instrument(skip(self))]
    async fn close(&self) -> MemoryResult<()> {
        let ns = self.lifecycle.shutdown().await?;
        // Durable scopes are already on disk; only the session is dropped.
        let dropped = ns.session.len().await;
        emit_provider_closed(self.backend_name(), ns.resolver.session_id(), dropped);
        Ok(())
    }
}
