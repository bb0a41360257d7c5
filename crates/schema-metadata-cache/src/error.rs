//! Error types for object store access

use std::fmt;

/// Errors reported by an [`ObjectStore`](crate::ObjectStore).
///
/// The cache passes these through unchanged and never creates one itself.
#[derive(Debug)]
pub enum StoreError {
    /// The schema, or the entry within it, does not exist
    NotFound {
        schema: String,
        user_id: Option<String>,
    },
    /// Writing entry data to the caller's sink failed
    Io(Box<std::io::Error>),
    /// Backend-specific failure
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// The schema itself is missing
    pub fn schema_not_found(schema: &str) -> Self {
        Self::NotFound {
            schema: schema.to_string(),
            user_id: None,
        }
    }

    /// The schema exists but has no entry for `user_id`
    pub fn entry_not_found(schema: &str, user_id: &str) -> Self {
        Self::NotFound {
            schema: schema.to_string(),
            user_id: Some(user_id.to_string()),
        }
    }

    /// Wrap a backend-specific error
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Backend(err.into())
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound {
                schema,
                user_id: None,
            } => write!(f, "Schema not found: {schema}"),
            Self::NotFound {
                schema,
                user_id: Some(user_id),
            } => write!(f, "Entry not found: {schema}/{user_id}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Backend(e) => write!(f, "Store error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e.as_ref()),
            Self::Backend(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
