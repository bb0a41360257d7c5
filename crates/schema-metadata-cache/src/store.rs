//! Object store contract

use crate::error::Result;
use crate::types::{EntryMetadata, SchemaNames};
use async_trait::async_trait;
use tokio::io::AsyncWrite;

/// CRUD primitives of an object store, keyed by schema name and user id.
///
/// A schema maps to a bucket-like namespace and each entry to one object
/// inside it.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn create_schema(&self, schema: &str) -> Result<()>;

    async fn create_entry(&self, schema: &str, user_id: &str, data: &[u8]) -> Result<()>;

    async fn get_schema_names(&self) -> Result<SchemaNames>;

    /// Stream the entry payload into `sink`, returning the number of bytes written
    async fn get_data(
        &self,
        schema: &str,
        user_id: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64>;

    async fn get_entries_metadata_for_schema(&self, schema: &str) -> Result<EntryMetadata>;

    /// Append `data` to the entry, creating it if needed
    async fn append_entry(&self, schema: &str, user_id: &str, data: &[u8]) -> Result<()>;

    async fn delete_schema(&self, schema: &str) -> Result<()>;

    async fn delete_entry(&self, schema: &str, user_id: &str) -> Result<()>;
}
