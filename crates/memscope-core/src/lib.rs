//! memscope-core: contract for the scoped memory store
//!
//! This crate defines what every memscope backend agrees on: the entry
//! record, the three lifetime scopes, the pattern query language, the tag
//! index, and the provider traits. It performs no I/O.
//!
//! ## Key Components
//!
//! - `ScopeResolver`: maps `Session | Project | Global` to a namespace
//! - `TagIndex`: tag → keys secondary index kept consistent on every write
//! - `QueryPattern` / `evaluate`: `tag:NAME`, `PREFIX*`, `*SUFFIX`, exact key
//! - `MemoryProvider`: required surface (`get`, `set`, `query`, `search`,
//!   `delete`, `clear`, `close`)
//! - `AdvancedCapabilities`: optional relate/traverse/transaction/index
//! - `Lifecycle`: `Uninitialized → Ready → Closed` state machine

pub mod config;
pub mod entry;
mod error;
pub mod lifecycle;
pub mod obs;
pub mod provider;
pub mod query;
pub mod scope;
pub mod tag_index;
pub mod telemetry;
pub mod transaction;

pub use config::{MemoryConfig, ProviderOptions, DEFAULT_ENDPOINT};
pub use entry::{MemoryEntry, Metadata, ScoredEntry, SetOptions};
pub use error::{MemoryError, MemoryResult};
pub use lifecycle::{Lifecycle, ProviderState};
pub use provider::{
    AdvancedCapabilities, Capability, MemoryProvider, PathNode, TraversalPath,
    DEFAULT_SEARCH_LIMIT,
};
pub use query::{evaluate, QueryPattern, QuerySpec};
pub use scope::{Namespace, Scope, ScopeResolver};
pub use tag_index::TagIndex;
pub use telemetry::init_tracing;
pub use transaction::{MemoryTransaction, TransactionSink, TxOp};
