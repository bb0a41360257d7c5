//! Cache types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Every schema name known to the store
pub type SchemaNames = BTreeSet<String>;

/// Entry summaries for one schema, keyed by user id
pub type EntryMetadata = BTreeMap<String, EntrySummary>;

/// What the store reports about a single entry.
///
/// A default summary is a bare presence marker: the entry exists but its
/// size and modification time are not known yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySummary {
    pub size: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Cached set of schema names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaNameSet {
    pub schemas: SchemaNames,
    pub fetched_at: DateTime<Utc>,
}

/// Cached entry metadata for a single schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadataEntry {
    pub schema_name: String,
    pub metadata: EntryMetadata,
    pub fetched_at: DateTime<Utc>,
}

impl EntryMetadataEntry {
    /// Record `user_id` as present without touching what is already known about it
    pub fn mark_present(&mut self, user_id: &str) {
        self.metadata.entry(user_id.to_string()).or_default();
    }
}

/// Statistics about the cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub schema_names_cached: bool,
    pub entry_metadata_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub discarded_refreshes: u64,
}
