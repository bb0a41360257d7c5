//! Schema metadata cache
//!
//! A process-local cache of schema names and per-schema entry metadata that
//! sits in front of an object store. Reads are served from memory while the
//! cached data is younger than the configured lifetime; mutations pass
//! through to the store and keep the cache coherent by additive updates or
//! invalidation.
//!
//! # Example
//!
//! ```no_run
//! use schema_metadata_cache::{CacheConfig, MemoryObjectStore, MetadataCache, ObjectStore};
//!
//! # async fn example() -> schema_metadata_cache::Result<()> {
//! let cache = MetadataCache::new(MemoryObjectStore::new(), CacheConfig::from_env());
//!
//! cache.create_schema("users").await?;
//! cache.create_entry("users", "u1", b"hello").await?;
//!
//! // First call goes to the store, the second is served from memory
//! let names = cache.get_schema_names().await?;
//! let names_again = cache.get_schema_names().await?;
//! assert_eq!(names, names_again);
//! # Ok(())
//! # }
//! ```

mod cache;
mod config;
mod error;
mod memory;
mod store;
mod types;

pub use cache::MetadataCache;
pub use config::{CacheConfig, CacheLifetime, LIFETIME_ENV_VAR};
pub use error::{Result, StoreError};
pub use memory::MemoryObjectStore;
pub use store::ObjectStore;
pub use types::{
    CacheStats, EntryMetadata, EntryMetadataEntry, EntrySummary, SchemaNameSet, SchemaNames,
};
