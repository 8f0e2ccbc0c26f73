//! Sharded, append-only message log for conversations.
//!
//! This crate ties the address mapping and shard store together. It provides:
//! - `LogWriter` / `LogReader` trait boundaries
//! - `MessageLog`, the implementation over any [`ShardStore`](shardlog_store::ShardStore)
//! - Viewer-aware batch reads and bounded newest/oldest scans
//! - Per-operation deadlines and operation-tagged errors
//! - `LogConfig`, loaded from TOML

pub mod config;
pub mod error;
pub mod log;
pub mod scan;
pub mod traits;

pub use config::{ConfigError, LogConfig};
pub use error::{ErrorKind, LogError, LogResult, Operation};
pub use log::MessageLog;
pub use scan::OrdinalScan;
pub use traits::{LogReader, LogWriter};
