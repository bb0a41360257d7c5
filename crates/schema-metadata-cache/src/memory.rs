//! In-process object store

use crate::error::{Result, StoreError};
use crate::store::ObjectStore;
use crate::types::{EntryMetadata, EntrySummary, SchemaNames};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredEntry {
    data: Vec<u8>,
    last_modified: DateTime<Utc>,
}

impl StoredEntry {
    fn new(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            last_modified: Utc::now(),
        }
    }
}

/// An [`ObjectStore`] kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    schemas: RwLock<HashMap<String, HashMap<String, StoredEntry>>>,
}

impl MemoryObjectStore {
    /// Create an empty store with no schemas
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn create_schema(&self, schema: &str) -> Result<()> {
        let mut schemas = self.schemas.write().await;
        schemas.entry(schema.to_string()).or_default();
        debug!(schema, "Created schema");
        Ok(())
    }

    async fn create_entry(&self, schema: &str, user_id: &str, data: &[u8]) -> Result<()> {
        let mut schemas = self.schemas.write().await;
        let entries = schemas
            .get_mut(schema)
            .ok_or_else(|| StoreError::schema_not_found(schema))?;
        entries.insert(user_id.to_string(), StoredEntry::new(data));
        Ok(())
    }

    async fn get_schema_names(&self) -> Result<SchemaNames> {
        let schemas = self.schemas.read().await;
        Ok(schemas.keys().cloned().collect())
    }

    async fn get_data(
        &self,
        schema: &str,
        user_id: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64> {
        // Copy out so the lock is not held while the sink applies backpressure
        let data = {
            let schemas = self.schemas.read().await;
            let entries = schemas
                .get(schema)
                .ok_or_else(|| StoreError::schema_not_found(schema))?;
            entries
                .get(user_id)
                .map(|e| e.data.clone())
                .ok_or_else(|| StoreError::entry_not_found(schema, user_id))?
        };

        sink.write_all(&data).await?;
        sink.flush().await?;
        Ok(data.len() as u64)
    }

    async fn get_entries_metadata_for_schema(&self, schema: &str) -> Result<EntryMetadata> {
        let schemas = self.schemas.read().await;
        let entries = schemas
            .get(schema)
            .ok_or_else(|| StoreError::schema_not_found(schema))?;

        Ok(entries
            .iter()
            .map(|(user_id, e)| {
                let summary = EntrySummary {
                    size: Some(e.data.len() as u64),
                    last_modified: Some(e.last_modified),
                };
                (user_id.clone(), summary)
            })
            .collect())
    }

    async fn append_entry(&self, schema: &str, user_id: &str, data: &[u8]) -> Result<()> {
        let mut schemas = self.schemas.write().await;
        let entries = schemas
            .get_mut(schema)
            .ok_or_else(|| StoreError::schema_not_found(schema))?;

        match entries.get_mut(user_id) {
            Some(entry) => {
                entry.data.extend_from_slice(data);
                entry.last_modified = Utc::now();
            }
            None => {
                entries.insert(user_id.to_string(), StoredEntry::new(data));
            }
        }
        Ok(())
    }

    async fn delete_schema(&self, schema: &str) -> Result<()> {
        let mut schemas = self.schemas.write().await;
        let entries = schemas
            .remove(schema)
            .ok_or_else(|| StoreError::schema_not_found(schema))?;
        debug!(schema, entries = entries.len(), "Deleted schema");
        Ok(())
    }

    async fn delete_entry(&self, schema: &str, user_id: &str) -> Result<()> {
        let mut schemas = self.schemas.write().await;
        let entries = schemas
            .get_mut(schema)
            .ok_or_else(|| StoreError::schema_not_found(schema))?;
        // Deleting an absent object is not an error, matching S3
        entries.remove(user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_lifecycle() {
        let store = MemoryObjectStore::new();
        store.create_schema("users").await.unwrap();
        store.create_schema("orders").await.unwrap();
        // Idempotent
        store.create_schema("users").await.unwrap();

        let names = store.get_schema_names().await.unwrap();
        assert_eq!(names.len(), 2);
        assert!(names.contains("users"));

        store.delete_schema("users").await.unwrap();
        let names = store.get_schema_names().await.unwrap();
        assert!(!names.contains("users"));

        let err = store.delete_schema("users").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { user_id: None, .. }));
    }

    #[tokio::test]
    async fn test_entry_requires_schema() {
        let store = MemoryObjectStore::new();
        let err = store.create_entry("missing", "u1", b"x").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));

        let err = store.append_entry("missing", "u1", b"x").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_append_and_get_data() {
        let store = MemoryObjectStore::new();
        store.create_schema("users").await.unwrap();
        store.create_entry("users", "u1", b"Hello").await.unwrap();
        store.append_entry("users", "u1", b", world!").await.unwrap();
        store.append_entry("users", "u2", b"new").await.unwrap();

        let mut sink = Vec::new();
        let written = store.get_data("users", "u1", &mut sink).await.unwrap();
        assert_eq!(written, 13);
        assert_eq!(sink, b"Hello, world!");

        let metadata = store.get_entries_metadata_for_schema("users").await.unwrap();
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata["u1"].size, Some(13));
        assert_eq!(metadata["u2"].size, Some(3));
        assert!(metadata["u1"].last_modified.is_some());
    }

    #[tokio::test]
    async fn test_get_data_missing_entry() {
        let store = MemoryObjectStore::new();
        store.create_schema("users").await.unwrap();

        let mut sink = Vec::new();
        let err = store.get_data("users", "ghost", &mut sink).await.unwrap_err();
        assert_eq!(format!("{}", err), "Entry not found: users/ghost");
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let store = MemoryObjectStore::new();
        store.create_schema("users").await.unwrap();
        store.create_entry("users", "u1", b"data").await.unwrap();

        store.delete_entry("users", "u1").await.unwrap();
        store.delete_entry("users", "u1").await.unwrap();

        let metadata = store.get_entries_metadata_for_schema("users").await.unwrap();
        assert!(metadata.is_empty());
    }
}
