//! memscope-state: storage backends for the memscope scoped memory store
//!
//! This crate owns all I/O. It provides two `MemoryProvider`
//! implementations over the contract defined in `memscope-core`.
//!
//! ## Key Components
//!
//! - `EntryStore`: per-namespace CRUD with atomic file replacement
//! - `FileMemoryProvider`: reference backend, JSON files per durable scope
//! - `SurrealMemoryProvider`: SurrealDB backend implementing
//!   `AdvancedCapabilities` (relate, traverse, transaction, index) and
//!   similarity `search`

pub mod embedding;
pub mod entry_store;
pub mod file_provider;
pub mod migrations;
mod namespace_file;
mod schema;
pub mod surreal_provider;

pub use entry_store::EntryStore;
pub use file_provider::FileMemoryProvider;
pub use surreal_provider::SurrealMemoryProvider;
