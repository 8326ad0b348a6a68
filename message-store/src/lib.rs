//! Message store crate: message persistence and repository abstractions.
//!
//! ## Modules
//!
//! - [`error`] – Store and backend error types
//! - [`models`] – Message, FindAllPage, FindResult, key layout
//! - [`repository`] – MessageRepository trait
//! - [`kv`] – KvBackend seam (Redis, in-memory) and KvMessageStore
//! - [`sqlite_store`] – SqliteMessageStore (relational variant)
//! - [`sqlite_pool`] – SqlitePoolManager

mod deadline;
mod error;
pub mod kv;
mod models;
mod repository;
mod sqlite_pool;
mod sqlite_store;


pub use error::{BackendError, StoreError};
pub use kv::{
    Batch, Command, KvBackend, KvMessageStore, MemoryBackend, ReconcileReport, RedisBackend,
    RedisConfig, StoreOptions,
};
pub use models::{message_key, FindAllPage, FindResult, Message, MESSAGES_SET, MESSAGE_KEY_PREFIX};
pub use repository::MessageRepository;
pub use sqlite_pool::SqlitePoolManager;
pub use sqlite_store::SqliteMessageStore;
