//! 谓词缓存模块：会话内存缓存与可选的磁盘持久化。
//!
//! # Predicate Caching Module
//!
//! Modeldef lookups are memoized per request class for the lifetime of a
//! session. A disk cache can additionally carry the raw modeldef payloads
//! between sessions.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`SchemaCache`] | In-memory, append-only predicate sets with hit statistics |
//! | [`DiskCache`] | Versioned JSON files under a cache directory, one day freshness |
//!
//! Query results are never cached.

mod disk;
mod memory;

pub use disk::DiskCache;
pub use memory::{SchemaCache, SchemaCacheStats};
