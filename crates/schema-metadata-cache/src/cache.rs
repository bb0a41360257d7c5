//! Read-through metadata cache in front of an object store

use crate::config::{CacheConfig, CacheLifetime};
use crate::error::Result;
use crate::store::ObjectStore;
use crate::types::{CacheStats, EntryMetadata, EntryMetadataEntry, SchemaNameSet, SchemaNames};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::io::AsyncWrite;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Mutable cache state, always accessed under one lock.
///
/// Every mutation of a slot stamps it with the next value of `clock`. A
/// refresh remembers the clock when it starts and installs its result only
/// if its slot has not been stamped since, so data fetched before an
/// invalidation can never overwrite it.
///
/// Per-schema stamps only matter while some refresh is in flight, so they
/// are recorded only then and dropped once no refresh is running.
#[derive(Debug, Default)]
struct CacheState {
    clock: u64,
    cleared_at: u64,
    schema_names: Option<SchemaNameSet>,
    schema_names_mutated_at: u64,
    entries: HashMap<String, EntryMetadataEntry>,
    entries_mutated_at: HashMap<String, u64>,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn touch_schema_names(&mut self) {
        self.schema_names_mutated_at = self.tick();
    }

    fn touch_entry(&mut self, schema: &str, refreshes_in_flight: usize) {
        let now = self.tick();
        if refreshes_in_flight == 0 {
            self.entries_mutated_at.clear();
        } else {
            self.entries_mutated_at.insert(schema.to_string(), now);
        }
    }

    fn schema_names_changed_since(&self, started: u64) -> bool {
        self.schema_names_mutated_at > started
    }

    fn entry_changed_since(&self, schema: &str, started: u64) -> bool {
        self.cleared_at > started
            || self
                .entries_mutated_at
                .get(schema)
                .is_some_and(|&mutated| mutated > started)
    }

    /// Drop the cached entry metadata for `schema`, returning whether one existed
    fn invalidate_entry(&mut self, schema: &str, refreshes_in_flight: usize) -> bool {
        self.touch_entry(schema, refreshes_in_flight);
        self.entries.remove(schema).is_some()
    }
}

/// Counts a refresh as in flight until dropped, including when the
/// refreshing future is cancelled mid-fetch
struct RefreshGuard<'a>(&'a AtomicUsize);

impl<'a> RefreshGuard<'a> {
    /// Must be called while holding the state lock, so no mutation can see a
    /// stale count
    fn register(in_flight: &'a AtomicUsize) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self(in_flight)
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A cache of schema names and per-schema entry metadata fronting an [`ObjectStore`].
///
/// `MetadataCache` implements [`ObjectStore`] itself, so callers use it exactly
/// like the store it wraps. Entry payloads are never cached.
pub struct MetadataCache<S> {
    store: S,
    config: CacheConfig,
    state: RwLock<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
    discarded_refreshes: AtomicU64,
    refreshes_in_flight: AtomicUsize,
}

impl<S: ObjectStore> MetadataCache<S> {
    /// Create a new cache around `store`
    pub fn new(store: S, config: CacheConfig) -> Self {
        debug!(lifetime = %config.lifetime, "Metadata cache created");
        Self {
            store,
            config,
            state: RwLock::new(CacheState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
            discarded_refreshes: AtomicU64::new(0),
            refreshes_in_flight: AtomicUsize::new(0),
        }
    }

    /// Create a new cache around `store` with only the lifetime configured
    pub fn with_lifetime(store: S, lifetime: CacheLifetime) -> Self {
        Self::new(store, CacheConfig { lifetime })
    }

    /// The wrapped store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The configuration the cache was built with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The cached schema names, valid or not, without going to the store
    pub async fn cached_schema_names(&self) -> Option<SchemaNameSet> {
        self.state.read().await.schema_names.clone()
    }

    /// The cached entry metadata for `schema`, valid or not, without going to the store
    pub async fn cached_entry_metadata(&self, schema: &str) -> Option<EntryMetadataEntry> {
        self.state.read().await.entries.get(schema).cloned()
    }

    /// Drop the cached schema names so the next read goes to the store
    pub async fn invalidate_schema_names(&self) {
        let mut state = self.state.write().await;
        state.touch_schema_names();
        if state.schema_names.take().is_some() {
            self.invalidations.fetch_add(1, Ordering::Relaxed);
            debug!("Invalidated schema names");
        }
    }

    /// Drop the cached entry metadata for `schema` so the next read goes to the store
    pub async fn invalidate_entry_metadata(&self, schema: &str) {
        let mut state = self.state.write().await;
        self.invalidate_entry_locked(&mut state, schema);
    }

    /// Drop everything, including the results of refreshes still in flight
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        let now = state.tick();
        state.cleared_at = now;
        state.schema_names_mutated_at = now;
        state.schema_names = None;
        state.entries.clear();
        state.entries_mutated_at.clear();
        info!("Metadata cache cleared");
    }

    /// Get current cache statistics
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        CacheStats {
            schema_names_cached: state.schema_names.is_some(),
            entry_metadata_entries: state.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            discarded_refreshes: self.discarded_refreshes.load(Ordering::Relaxed),
        }
    }

    fn invalidate_entry_locked(&self, state: &mut CacheState, schema: &str) {
        if state.invalidate_entry(schema, self.refreshes_in_flight()) {
            self.invalidations.fetch_add(1, Ordering::Relaxed);
            debug!(schema, "Invalidated entry metadata");
        }
    }

    fn refreshes_in_flight(&self) -> usize {
        self.refreshes_in_flight.load(Ordering::SeqCst)
    }

    /// Release a finished refresh and drop the stamps once none is left
    fn finish_refresh(&self, state: &mut CacheState, guard: RefreshGuard<'_>) {
        drop(guard);
        if self.refreshes_in_flight() == 0 {
            state.entries_mutated_at.clear();
        }
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for MetadataCache<S> {
    async fn create_schema(&self, schema: &str) -> Result<()> {
        if let Err(e) = self.store.create_schema(schema).await {
            warn!(schema, error = %e, "Failed to create schema");
            return Err(e);
        }

        let mut state = self.state.write().await;
        state.touch_schema_names();
        if let Some(cached) = state.schema_names.as_mut() {
            cached.schemas.insert(schema.to_string());
        }
        info!(schema, "Created schema");
        Ok(())
    }

    async fn create_entry(&self, schema: &str, user_id: &str, data: &[u8]) -> Result<()> {
        if let Err(e) = self.store.create_entry(schema, user_id, data).await {
            warn!(schema, user_id, error = %e, "Failed to create entry");
            return Err(e);
        }

        let mut state = self.state.write().await;
        // Stamp even when nothing is cached: a refresh already in flight may
        // have listed the schema before `user_id` existed.
        state.touch_entry(schema, self.refreshes_in_flight());
        if let Some(cached) = state.entries.get_mut(schema) {
            cached.mark_present(user_id);
        }
        Ok(())
    }

    async fn get_schema_names(&self) -> Result<SchemaNames> {
        let (started, guard) = {
            let state = self.state.read().await;
            if let Some(cached) = &state.schema_names {
                if self.config.lifetime.is_fresh(cached.fetched_at, Utc::now()) {
                    self.record_hit();
                    debug!("Schema names cache hit");
                    return Ok(cached.schemas.clone());
                }
            }
            (state.clock, RefreshGuard::register(&self.refreshes_in_flight))
        };

        self.record_miss();
        debug!("Schema names cache miss");

        let schemas = match self.store.get_schema_names().await {
            Ok(schemas) => schemas,
            Err(e) => {
                warn!(error = %e, "Failed to fetch schema names");
                return Err(e);
            }
        };

        let mut state = self.state.write().await;
        if state.schema_names_changed_since(started) {
            self.discarded_refreshes.fetch_add(1, Ordering::Relaxed);
            debug!("Schema names changed during fetch, not caching result");
        } else {
            state.schema_names = Some(SchemaNameSet {
                schemas: schemas.clone(),
                fetched_at: Utc::now(),
            });
            debug!(count = schemas.len(), "Cached schema names");
        }
        self.finish_refresh(&mut state, guard);

        Ok(schemas)
    }

    async fn get_data(
        &self,
        schema: &str,
        user_id: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64> {
        self.store.get_data(schema, user_id, sink).await
    }

    async fn get_entries_metadata_for_schema(&self, schema: &str) -> Result<EntryMetadata> {
        let (started, guard) = {
            let state = self.state.read().await;
            if let Some(cached) = state.entries.get(schema) {
                if self.config.lifetime.is_fresh(cached.fetched_at, Utc::now()) {
                    self.record_hit();
                    debug!(schema, "Entry metadata cache hit");
                    return Ok(cached.metadata.clone());
                }
            }
            (state.clock, RefreshGuard::register(&self.refreshes_in_flight))
        };

        self.record_miss();
        debug!(schema, "Entry metadata cache miss");

        let metadata = match self.store.get_entries_metadata_for_schema(schema).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(schema, error = %e, "Failed to fetch entry metadata");
                return Err(e);
            }
        };

        let mut state = self.state.write().await;
        if state.entry_changed_since(schema, started) {
            self.discarded_refreshes.fetch_add(1, Ordering::Relaxed);
            debug!(schema, "Entry metadata changed during fetch, not caching result");
        } else {
            state.entries.insert(
                schema.to_string(),
                EntryMetadataEntry {
                    schema_name: schema.to_string(),
                    metadata: metadata.clone(),
                    fetched_at: Utc::now(),
                },
            );
            debug!(schema, entries = metadata.len(), "Cached entry metadata");
        }
        self.finish_refresh(&mut state, guard);

        Ok(metadata)
    }

    async fn append_entry(&self, schema: &str, user_id: &str, data: &[u8]) -> Result<()> {
        let result = self.store.append_entry(schema, user_id, data).await;

        // A failed append may still have written part of the data
        {
            let mut state = self.state.write().await;
            self.invalidate_entry_locked(&mut state, schema);
        }

        if let Err(e) = &result {
            warn!(schema, user_id, error = %e, "Failed to append entry");
        }
        result
    }

    async fn delete_schema(&self, schema: &str) -> Result<()> {
        if let Err(e) = self.store.delete_schema(schema).await {
            warn!(schema, error = %e, "Failed to delete schema");
            return Err(e);
        }

        let mut state = self.state.write().await;
        state.touch_schema_names();
        if let Some(cached) = state.schema_names.as_mut() {
            cached.schemas.remove(schema);
        }
        self.invalidate_entry_locked(&mut state, schema);
        info!(schema, "Deleted schema");
        Ok(())
    }

    async fn delete_entry(&self, schema: &str, user_id: &str) -> Result<()> {
        let result = self.store.delete_entry(schema, user_id).await;

        {
            let mut state = self.state.write().await;
            self.invalidate_entry_locked(&mut state, schema);
        }

        if let Err(e) = &result {
            warn!(schema, user_id, error = %e, "Failed to delete entry");
        }
        result
    }
}
