//! Staged, all-or-nothing write batches.
//!
//! A [`MemoryTransaction`] only records operations. Nothing touches the
//! store until [`MemoryTransaction::commit`] hands the whole batch to the
//! backend's [`TransactionSink`], which must apply every operation or none
//! of them. Dropping or aborting a transaction discards the batch.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::entry::SetOptions;
use crate::error::MemoryResult;
use crate::scope::Scope;

/// A single staged operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TxOp {
    Set {
        key: String,
        value: String,
        scope: Scope,
        options: SetOptions,
    },
    Delete {
        key: String,
        scope: Scope,
    },
    Clear {
        scope: Scope,
    },
    Relate {
        from_key: String,
        to_key: String,
        relation_type: String,
        scope: Scope,
    },
}

impl TxOp {
    pub fn scope(&self) -> Scope {
        match self {
            Self::Set { scope, .. }
            | Self::Delete { scope, .. }
            | Self::Clear { scope }
            | Self::Relate { scope, .. } => *scope,
        }
    }
}

/// Backend side of a transaction: applies a whole batch atomically.
#[async_trait]
pub trait TransactionSink: Send + Sync {
    async fn apply(&self, tx_id: Uuid, ops: Vec<TxOp>) -> MemoryResult<()>;
}

/// A batch of operations awaiting commit.
pub struct MemoryTransaction {
    id: Uuid,
    ops: Vec<TxOp>,
    sink: Arc<dyn TransactionSink>,
}

impl MemoryTransaction {
    pub fn new(sink: Arc<dyn TransactionSink>) -> Self {
        Self {
            id: Uuid::new_v4(),
            ops: Vec::new(),
            sink,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Scopes touched by the staged operations.
    pub fn scopes(&self) -> BTreeSet<Scope> {
        self.ops.iter().map(TxOp::scope).collect()
    }

    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        scope: Scope,
        options: SetOptions,
    ) -> &mut Self {
        self.ops.push(TxOp::Set {
            key: key.into(),
            value: value.into(),
            scope,
            options,
        });
        self
    }

    pub fn delete(&mut self, key: impl Into<String>, scope: Scope) -> &mut Self {
        self.ops.push(TxOp::Delete {
            key: key.into(),
            scope,
        });
        self
    }

    pub fn clear(&mut self, scope: Scope) -> &mut Self {
        self.ops.push(TxOp::Clear { scope });
        self
    }

    pub fn relate(
        &mut self,
        from_key: impl Into<String>,
        to_key: impl Into<String>,
        relation_type: impl Into<String>,
        scope: Scope,
    ) -> &mut Self {
        self.ops.push(TxOp::Relate {
            from_key: from_key.into(),
            to_key: to_key.into(),
            relation_type: relation_type.into(),
            scope,
        });
        self
    }

    /// Apply every staged operation, or none. Returns the number applied.
    pub async fn commit(self) -> MemoryResult<usize> {
        let count = self.ops.len();
        if count == 0 {
            debug!(tx_id = %self.id, "Committing empty transaction");
            return Ok(0);
        }
        debug!(tx_id = %self.id, ops = count, scopes = ?self.scopes(), "Committing transaction");
        self.sink.apply(self.id, self.ops).await?;
        Ok(count)
    }

    /// Discard the staged operations.
    pub fn abort(self) {
        debug!(tx_id = %self.id, discarded = self.ops.len(), "Transaction aborted");
    }
}

impl std::fmt::Debug for MemoryTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransaction")
            .field("id", &self.id)
            .field("ops", &self.ops)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<(Uuid, Vec<TxOp>)>>,
    }

    #[async_trait]
    impl TransactionSink for RecordingSink {
        async fn apply(&self, tx_id: Uuid, ops: Vec<TxOp>) -> MemoryResult<()> {
            self.batches.lock().unwrap().push((tx_id, ops));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_commit_hands_whole_batch_to_sink() {
        let sink = Arc::new(RecordingSink::default());
        let mut tx = MemoryTransaction::new(sink.clone());
        let id = tx.id();
        tx.set("a", "1", Scope::Project, SetOptions::new())
            .delete("b", Scope::Global)
            .relate("a", "c", "depends_on", Scope::Project);
        assert_eq!(
            tx.scopes().into_iter().collect::<Vec<_>>(),
            [Scope::Project, Scope::Global]
        );

        assert_eq!(tx.commit().await.unwrap(), 3);
        let batches = sink.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].0, id);
        assert_eq!(batches[0].1.len(), 3);
    }

    #[tokio::test]
    async fn test_abort_never_reaches_sink() {
        let sink = Arc::new(RecordingSink::default());
        let mut tx = MemoryTransaction::new(sink.clone());
        tx.clear(Scope::Session);
        tx.abort();
        assert!(sink.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_commit_skips_sink() {
        let sink = Arc::new(RecordingSink::default());
        let tx = MemoryTransaction::new(sink.clone());
        assert!(tx.is_empty());
        assert_eq!(tx.commit().await.unwrap(), 0);
        assert!(sink.batches.lock().unwrap().is_empty());
    }
}
