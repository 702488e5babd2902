//! Provider lifecycle: `Uninitialized → Ready → Closed`.
//!
//! Backends wrap their live resources in a [`Lifecycle`]; every operation
//! obtains them through [`Lifecycle::ready`], which fails with
//! `NotInitialized` or `ProviderClosed` outside the `Ready` state. There is
//! no transition out of `Closed`.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{MemoryError, MemoryResult};

/// Observable provider state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderState {
    Uninitialized,
    Ready,
    Closed,
}

impl std::fmt::Display for ProviderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Ready => write!(f, "ready"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

enum Phase<T> {
    Uninitialized,
    Ready(Arc<T>),
    Closed,
}

/// Lifecycle guard around a backend's live resources `T`.
pub struct Lifecycle<T> {
    phase: RwLock<Phase<T>>,
}

impl<T> Lifecycle<T> {
    pub fn new() -> Self {
        Self {
            phase: RwLock::new(Phase::Uninitialized),
        }
    }

    pub async fn state(&self) -> ProviderState {
        match &*self.phase.read().await {
            Phase::Uninitialized => ProviderState::Uninitialized,
            Phase::Ready(_) => ProviderState::Ready,
            Phase::Closed => ProviderState::Closed,
        }
    }

    /// Run `init` and move to `Ready` with its output.
    ///
    /// The write lock is held while `init` runs, so concurrent callers
    /// observe either the old state or the finished transition. `init` is
    /// never polled unless the provider is `Uninitialized`; a failing `init`
    /// leaves the provider `Uninitialized`.
    pub async fn start<F>(&self, init: F) -> MemoryResult<Arc<T>>
    where
        F: Future<Output = MemoryResult<T>>,
    {
        let mut phase = self.phase.write().await;
        match &*phase {
            Phase::Uninitialized => {}
            Phase::Ready(_) => {
                return Err(MemoryError::Configuration(
                    "provider already initialized".to_string(),
                ))
            }
            Phase::Closed => return Err(MemoryError::ProviderClosed),
        }
        let resources = Arc::new(init.await?);
        *phase = Phase::Ready(Arc::clone(&resources));
        Ok(resources)
    }

    /// Live resources, or the lifecycle error for the current state.
    pub async fn ready(&self) -> MemoryResult<Arc<T>> {
        match &*self.phase.read().await {
            Phase::Ready(resources) => Ok(Arc::clone(resources)),
            Phase::Uninitialized => Err(MemoryError::NotInitialized),
            Phase::Closed => Err(MemoryError::ProviderClosed),
        }
    }

    /// Move to `Closed`, handing back the resources for teardown.
    pub async fn shutdown(&self) -> MemoryResult<Arc<T>> {
        let mut phase = self.phase.write().await;
        match std::mem::replace(&mut *phase, Phase::Closed) {
            Phase::Ready(resources) => Ok(resources),
            Phase::Uninitialized => {
                *phase = Phase::Uninitialized;
                Err(MemoryError::NotInitialized)
            }
            Phase::Closed => Err(MemoryError::ProviderClosed),
        }
    }
}

impl<T> Default for Lifecycle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Lifecycle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.phase.try_read() {
            Ok(phase) => match &*phase {
                Phase::Uninitialized => "uninitialized",
                Phase::Ready(_) => "ready",
                Phase::Closed => "closed",
            },
            Err(_) => "locked",
        };
        f.debug_struct("Lifecycle").field("state", &state).finish()
    }
}
