//! Relational message store on SQLite.
//!
//! Same contract as the key-value store, but pagination is keyset-based on an
//! autoincrement `seq` column, so pages come back in creation order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::deadline::with_deadline;
use crate::error::{BackendError, StoreError};
use crate::kv::StoreOptions;
use crate::models::{FindAllPage, FindResult, Message};
use crate::repository::MessageRepository;
use crate::sqlite_pool::SqlitePoolManager;

#[derive(Clone)]
pub struct SqliteMessageStore {
    pool_manager: SqlitePoolManager,
    options: StoreOptions,
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    seq: i64,
    id: String,
    user_id: String,
    text: String,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl MessageRow {
    fn into_message(self) -> Result<Message, StoreError> {
        let seq = self.seq;
        let parse = |value: &str| {
            Uuid::parse_str(value).map_err(|e| StoreError::Decode {
                key: format!("messages/{seq}"),
                reason: e.to_string(),
            })
        };
        Ok(Message {
            id: parse(&self.id)?,
            user_id: parse(&self.user_id)?,
            text: self.text,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn sql_error(operation: &'static str, target: impl ToString, e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolClosed => StoreError::Closed,
        e => StoreError::backend(operation, target, BackendError::Sqlite(e)),
    }
}

impl SqliteMessageStore {
    pub async fn new(database_path: &str) -> Result<Self, StoreError> {
        Self::with_options(database_path, StoreOptions::default()).await
    }

    pub async fn with_options(
        database_path: &str,
        options: StoreOptions,
    ) -> Result<Self, StoreError> {
        let pool_manager = SqlitePoolManager::new(database_path)
            .await
            .map_err(|e| sql_error("connect", database_path, e))?;
        let store = Self {
            pool_manager,
            options,
        };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<(), StoreError> {
        info!("Creating messages table if not exists");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                user_id TEXT NOT NULL,
                text TEXT NOT NULL,
                created_at TEXT,
                updated_at TEXT
            )
            "#,
        )
        .execute(self.pool_manager.pool())
        .await
        .map_err(|e| sql_error("init", "messages", e))?;

        Ok(())
    }
}

#[async_trait]
impl MessageRepository for SqliteMessageStore {
    #[instrument(skip(self, message), fields(id = %message.id))]
    async fn insert(&self, message: &Message) -> Result<(), StoreError> {
        let query = sqlx::query(
            r#"
            INSERT OR IGNORE INTO messages (id, user_id, text, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(message.id.to_string())
        .bind(message.user_id.to_string())
        .bind(&message.text)
        .bind(message.created_at)
        .bind(message.updated_at)
        .execute(self.pool_manager.pool());

        let result = with_deadline("insert", self.options.operation_timeout, query)
            .await?
            .map_err(|e| sql_error("insert", message.id, e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists(message.id));
        }
        debug!("Message inserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, id: Uuid) -> Result<Message, StoreError> {
        let query = sqlx::query_as::<_, MessageRow>(
            "SELECT seq, id, user_id, text, created_at, updated_at FROM messages WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool_manager.pool());

        let row = with_deadline("get", self.options.operation_timeout, query)
            .await?
            .map_err(|e| sql_error("get", id, e))?;

        match row {
            Some(row) => row.into_message(),
            None => Err(StoreError::NotFound(id)),
        }
    }

    #[instrument(skip(self, message), fields(id = %message.id))]
    async fn update(&self, message: &Message) -> Result<(), StoreError> {
        let query = sqlx::query(
            r#"
            UPDATE messages
            SET user_id = ?, text = ?, created_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(message.user_id.to_string())
        .bind(&message.text)
        .bind(message.created_at)
        .bind(message.updated_at)
        .bind(message.id.to_string())
        .execute(self.pool_manager.pool());

        let result = with_deadline("update", self.options.operation_timeout, query)
            .await?
            .map_err(|e| sql_error("update", message.id, e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(message.id));
        }
        debug!("Message updated");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let query = sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool_manager.pool());

        let result = with_deadline("delete", self.options.operation_timeout, query)
            .await?
            .map_err(|e| sql_error("delete", id, e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        debug!("Message deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_all(&self, page: FindAllPage) -> Result<FindResult, StoreError> {
        let after = i64::try_from(page.offset).unwrap_or(i64::MAX);
        let limit = i64::try_from(page.size.max(1)).unwrap_or(i64::MAX);

        let query = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT seq, id, user_id, text, created_at, updated_at
            FROM messages
            WHERE seq > ?
            ORDER BY seq
            LIMIT ?
            "#,
        )
        .bind(after)
        .bind(limit)
        .fetch_all(self.pool_manager.pool());

        let rows = with_deadline("find_all", self.options.operation_timeout, query)
            .await?
            .map_err(|e| sql_error("find_all", "messages", e))?;

        // A short page is the last one.
        let cursor = match rows.last() {
            Some(last) if rows.len() as i64 == limit => last.seq as u64,
            _ => 0,
        };
        let messages = rows
            .into_iter()
            .map(MessageRow::into_message)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = messages.len(), cursor, "Page fetched");
        Ok(FindResult { messages, cursor })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let query = sqlx::query("SELECT 1").execute(self.pool_manager.pool());
        with_deadline("ping", self.options.operation_timeout, query)
            .await?
            .map_err(|e| sql_error("ping", "sqlite", e))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.pool_manager.is_closed() {
            return Err(StoreError::Closed);
        }
        self.pool_manager.close().await;
        info!("SQLite pool closed");
        Ok(())
    }
}
