//! Key-value persistence: the [`KvBackend`] seam, its Redis and in-memory
//! implementations, and [`KvMessageStore`], which keeps every message under
//! `message:<id>` plus an index set (`messages`) used for enumeration.

mod batch;
mod memory;
mod reconcile;
mod redis_backend;
mod store;

#[cfg(test)]
mod store_test;

use async_trait::async_trait;

use crate::error::BackendError;

pub use batch::{Batch, Command};
pub use memory::MemoryBackend;
pub use reconcile::ReconcileReport;
pub use redis_backend::{RedisBackend, RedisConfig};
pub use store::{KvMessageStore, StoreOptions};

/// The primitives a key-value backend must offer. Implementations must be safe
/// for concurrent use by many callers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Returns the value or `None` if the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError>;
    /// Writes only if the key is absent; returns whether it was written.
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, BackendError>;
    /// Writes only if the key exists; returns whether it was written.
    async fn set_if_present(&self, key: &str, value: &str) -> Result<bool, BackendError>;
    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, BackendError>;
    /// Positional values for `keys`; absent keys yield `None`.
    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, BackendError>;
    /// Returns whether the member was newly added.
    async fn set_add(&self, set: &str, member: &str) -> Result<bool, BackendError>;
    /// Returns whether the member was present.
    async fn set_remove(&self, set: &str, member: &str) -> Result<bool, BackendError>;
    /// Incremental scan of a set: members matching `pattern` among roughly
    /// `count` examined, and the next cursor (0 once the scan is complete).
    async fn set_scan(
        &self,
        set: &str,
        cursor: u64,
        pattern: &str,
        count: u64,
    ) -> Result<(Vec<String>, u64), BackendError>;
    /// Incremental scan of the string keyspace, same cursor contract as `set_scan`.
    async fn scan_keys(
        &self,
        cursor: u64,
        pattern: &str,
        count: u64,
    ) -> Result<(Vec<String>, u64), BackendError>;
    /// Runs the batch as one unit and returns, per command, whether it took effect.
    async fn exec_atomic(&self, batch: &Batch) -> Result<Vec<bool>, BackendError>;
    async fn ping(&self) -> Result<(), BackendError>;
    /// Releases the connection; later calls fail with [`BackendError::Closed`].
    async fn close(&self) -> Result<(), BackendError>;
}
