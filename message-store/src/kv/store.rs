//! Message store over a [`KvBackend`].
//!
//! Layout: each message is JSON under `message:<id>`, and the key is a member
//! of the `messages` set. Insert and Delete touch both in one grouped write so
//! the record and its index entry are created and removed together.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{Batch, KvBackend};
use crate::deadline::with_deadline;
use crate::error::{BackendError, StoreError};
use crate::models::{message_key, FindAllPage, FindResult, Message, MESSAGES_SET};
use crate::repository::MessageRepository;

/// Tuning for [`KvMessageStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Deadline for each backend call. `None` waits as long as the backend does.
    pub operation_timeout: Option<Duration>,
}

pub struct KvMessageStore<B> {
    backend: B,
    options: StoreOptions,
}

impl<B: KvBackend> KvMessageStore<B> {
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, StoreOptions::default())
    }

    pub fn with_options(backend: B, options: StoreOptions) -> Self {
        Self { backend, options }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub(super) async fn call<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = T>,
    ) -> Result<T, StoreError> {
        with_deadline(operation, self.options.operation_timeout, fut).await
    }
}

fn encode(message: &Message) -> Result<String, StoreError> {
    serde_json::to_string(message).map_err(|source| StoreError::Encode {
        id: message.id,
        source,
    })
}

fn decode(key: &str, raw: &str) -> Result<Message, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Decode {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl<B: KvBackend> MessageRepository for KvMessageStore<B> {
    #[instrument(skip(self, message), fields(id = %message.id))]
    async fn insert(&self, message: &Message) -> Result<(), StoreError> {
        let data = encode(message)?;
        let key = message.key();
        let batch = Batch::new()
            .set_if_absent(key.as_str(), data)
            .set_add(MESSAGES_SET, key.as_str());

        let applied = self
            .call("insert", self.backend.exec_atomic(&batch))
            .await?
            .map_err(|e| StoreError::indeterminate("insert", message.id, e))?;

        match applied.first() {
            Some(true) => {
                debug!(key = %key, "Message inserted");
                Ok(())
            }
            Some(false) => {
                warn!(key = %key, "Insert rejected, key already exists");
                Err(StoreError::AlreadyExists(message.id))
            }
            None => Err(StoreError::backend(
                "insert",
                key,
                BackendError::Protocol("empty reply to grouped write".to_string()),
            )),
        }
    }

    #[instrument(skip(self))]
    async fn get(&self, id: Uuid) -> Result<Message, StoreError> {
        let key = message_key(id);
        let value = self
            .call("get", self.backend.get(&key))
            .await?
            .map_err(|e| StoreError::backend("get", &key, e))?;

        match value {
            Some(raw) => decode(&key, &raw),
            None => Err(StoreError::NotFound(id)),
        }
    }

    #[instrument(skip(self, message), fields(id = %message.id))]
    async fn update(&self, message: &Message) -> Result<(), StoreError> {
        let data = encode(message)?;
        let key = message.key();
        let written = self
            .call("update", self.backend.set_if_present(&key, &data))
            .await?
            .map_err(|e| StoreError::backend("update", &key, e))?;

        if !written {
            return Err(StoreError::NotFound(message.id));
        }
        debug!(key = %key, "Message updated");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let key = message_key(id);
        let batch = Batch::new()
            .delete(key.as_str())
            .set_remove(MESSAGES_SET, key.as_str());

        let applied = self
            .call("delete", self.backend.exec_atomic(&batch))
            .await?
            .map_err(|e| StoreError::indeterminate("delete", id, e))?;

        match applied.first() {
            Some(true) => {
                debug!(key = %key, "Message deleted");
                Ok(())
            }
            Some(false) => Err(StoreError::NotFound(id)),
            None => Err(StoreError::backend(
                "delete",
                key,
                BackendError::Protocol("empty reply to grouped write".to_string()),
            )),
        }
    }

    #[instrument(skip(self))]
    async fn find_all(&self, page: FindAllPage) -> Result<FindResult, StoreError> {
        let (keys, cursor) = self
            .call(
                "find_all",
                self.backend
                    .set_scan(MESSAGES_SET, page.offset, "*", page.size.max(1)),
            )
            .await?
            .map_err(|e| StoreError::backend("find_all", MESSAGES_SET, e))?;

        if keys.is_empty() {
            return Ok(FindResult {
                messages: Vec::new(),
                cursor,
            });
        }

        let values = self
            .call("find_all", self.backend.multi_get(&keys))
            .await?
            .map_err(|e| StoreError::backend("find_all", MESSAGES_SET, e))?;
        if values.len() != keys.len() {
            return Err(StoreError::backend(
                "find_all",
                MESSAGES_SET,
                BackendError::Protocol(format!(
                    "requested {} keys, got {} values",
                    keys.len(),
                    values.len()
                )),
            ));
        }

        let mut messages = Vec::with_capacity(keys.len());
        for (key, value) in keys.iter().zip(values) {
            match value {
                Some(raw) => messages.push(decode(key, &raw)?),
                // Deleted between the scan and the fetch.
                None => debug!(key = %key, "Indexed message vanished, skipping"),
            }
        }

        debug!(count = messages.len(), cursor, "Page fetched");
        Ok(FindResult { messages, cursor })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.call("ping", self.backend.ping())
            .await?
            .map_err(|e| StoreError::backend("ping", "backend", e))
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.backend
            .close()
            .await
            .map_err(|e| StoreError::backend("close", "backend", e))
    }
}
