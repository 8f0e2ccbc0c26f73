//! Shard document storage for the sharded message log.
//!
//! A conversation's messages live in bounded shard documents keyed by
//! `"{conversation}:{ordinal}"`. This crate stores those documents and applies
//! in-place updates to individual slots; it knows nothing about sequence
//! numbers beyond the keys it is handed.
//!
//! # Storage Backends
//!
//! All backends implement the [`ShardStore`] trait:
//!
//! - [`InMemoryShardStore`] -- ordered-map store for tests and embedding
//! - [`DirShardStore`] -- one JSON file per shard, for single-process use
//!
//! # Design Rules
//!
//! 1. Each call is atomic for the one document it touches.
//! 2. Appends land at the true array length at execution time.
//! 3. Slots are never removed; deletion is tombstoning or hiding.
//! 4. Whole shards disappear only through `purge`.
//! 5. Updates past the populated range match nothing and do not error.
//! 6. Read projections drop hide-lists before returning slots.

mod document;

pub mod dir;
pub mod error;
pub mod memory;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use dir::DirShardStore;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryShardStore;
pub use traits::{CreateMode, ShardStore, UpdateOutcome};
