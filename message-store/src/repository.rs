//! Repository trait for message persistence. Implementations:
//! [`crate::KvMessageStore`] (key-value backend with a set index) and
//! [`crate::SqliteMessageStore`].
//!
//! One instance is shared by all request handlers; implementations hold no
//! in-process locks and leave write serialization to the backend.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{FindAllPage, FindResult, Message};

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Creates the record. Fails with [`StoreError::AlreadyExists`] if the id is taken.
    async fn insert(&self, message: &Message) -> Result<(), StoreError>;
    /// Returns the record or [`StoreError::NotFound`].
    async fn get(&self, id: Uuid) -> Result<Message, StoreError>;
    /// Replaces the whole record keyed by `message.id`; [`StoreError::NotFound`] if absent.
    /// Concurrent updates are last-writer-wins.
    async fn update(&self, message: &Message) -> Result<(), StoreError>;
    /// Removes the record; [`StoreError::NotFound`] if it was already absent.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
    /// Returns one page and the cursor for the next; cursor 0 ends the traversal.
    async fn find_all(&self, page: FindAllPage) -> Result<FindResult, StoreError>;
    /// Liveness probe of the backend.
    async fn ping(&self) -> Result<(), StoreError>;
    /// Releases the backend. Call exactly once, at shutdown.
    async fn close(&self) -> Result<(), StoreError>;
}
