//! Store error types.
//!
//! [`StoreError`] is what callers of [`crate::MessageRepository`] see;
//! [`BackendError`] is what a [`crate::KvBackend`] or the SQLite pool reports.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when using store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("message {0} does not exist")]
    NotFound(Uuid),

    /// Insert hit an existing id. Callers that only care about success can
    /// treat this like any other failure.
    #[error("message {0} already exists")]
    AlreadyExists(Uuid),

    #[error("error decoding {key}: {reason}")]
    Decode { key: String, reason: String },

    #[error("error encoding message {id}: {source}")]
    Encode {
        id: Uuid,
        #[source]
        source: serde_json::Error,
    },

    #[error("{operation} failed for {target}: {source}")]
    Backend {
        operation: &'static str,
        target: String,
        #[source]
        source: BackendError,
    },

    /// The grouped write of Insert/Delete failed as a unit. The record and its
    /// index entry may or may not have been written; `get` tells which.
    #[error("{operation} outcome unknown for message {id}: {source}")]
    Indeterminate {
        operation: &'static str,
        id: Uuid,
        #[source]
        source: BackendError,
    },

    #[error("{operation} timed out after {limit:?}")]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },

    #[error("store is closed")]
    Closed,
}

impl StoreError {
    /// Wraps a backend failure with the operation name and the key or id it touched.
    pub fn backend(operation: &'static str, target: impl ToString, source: BackendError) -> Self {
        match source {
            BackendError::Closed => StoreError::Closed,
            source => StoreError::Backend {
                operation,
                target: target.to_string(),
                source,
            },
        }
    }

    /// Like [`StoreError::backend`], for the grouped two-command writes.
    pub fn indeterminate(operation: &'static str, id: Uuid, source: BackendError) -> Self {
        match source {
            BackendError::Closed => StoreError::Closed,
            source => StoreError::Indeterminate {
                operation,
                id,
                source,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Errors reported by a storage backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("backend connection is closed")]
    Closed,

    #[error("invalid backend address: {0}")]
    Address(String),

    #[error("unexpected backend reply: {0}")]
    Protocol(String),
}
