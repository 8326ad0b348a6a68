//! Redis implementation of [`KvBackend`] over an async [`ConnectionManager`].

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo, Value};
use tokio::sync::RwLock;
use tracing::info;

use super::{Batch, Command, KvBackend};
use crate::error::BackendError;

/// Connection settings, supplied by the caller (usually loaded from env at startup).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    /// `host:port`
    pub address: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: i64,
}

impl RedisConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            username: None,
            password: None,
            database: 0,
        }
    }

    fn connection_info(&self) -> Result<ConnectionInfo, BackendError> {
        let invalid = || BackendError::Address(self.address.clone());
        let (host, port) = self.address.rsplit_once(':').ok_or_else(invalid)?;
        let port: u16 = port.parse().map_err(|_| invalid())?;
        if host.is_empty() {
            return Err(invalid());
        }

        Ok(ConnectionInfo {
            addr: ConnectionAddr::Tcp(host.to_string(), port),
            redis: RedisConnectionInfo {
                db: self.database,
                username: self.username.clone(),
                password: self.password.clone(),
                ..Default::default()
            },
        })
    }
}

/// Redis backend. The connection manager reconnects on its own and is cloned
/// per command, so one instance serves all concurrent callers.
pub struct RedisBackend {
    conn: RwLock<Option<ConnectionManager>>,
}

impl RedisBackend {
    pub async fn connect(config: &RedisConfig) -> Result<Self, BackendError> {
        info!(address = %config.address, database = config.database, "Connecting to redis");

        let client = redis::Client::open(config.connection_info()?)?;
        let manager = ConnectionManager::new(client).await?;

        Ok(Self {
            conn: RwLock::new(Some(manager)),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, BackendError> {
        self.conn.read().await.clone().ok_or(BackendError::Closed)
    }
}

/// Whether a reply inside an EXEC result means the command changed something:
/// nil for a refused `SET NX`, 0 for a no-op `DEL`/`SADD`/`SREM`.
fn took_effect(reply: &Value) -> bool {
    match reply {
        Value::Nil => false,
        Value::Int(n) => *n > 0,
        _ => true,
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, BackendError> {
        let mut conn = self.connection().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn set_if_present(&self, key: &str, value: &str) -> Result<bool, BackendError> {
        let mut conn = self.connection().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("XX")
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, BackendError> {
        let mut conn = self.connection().await?;
        let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed > 0)
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, BackendError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("MGET");
        for key in keys {
            cmd.arg(key);
        }
        let values: Vec<Option<String>> = cmd.query_async(&mut conn).await?;
        Ok(values)
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<bool, BackendError> {
        let mut conn = self.connection().await?;
        let added: i64 = redis::cmd("SADD")
            .arg(set)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(added > 0)
    }

    async fn set_remove(&self, set: &str, member: &str) -> Result<bool, BackendError> {
        let mut conn = self.connection().await?;
        let removed: i64 = redis::cmd("SREM")
            .arg(set)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn set_scan(
        &self,
        set: &str,
        cursor: u64,
        pattern: &str,
        count: u64,
    ) -> Result<(Vec<String>, u64), BackendError> {
        let mut conn = self.connection().await?;
        let (next, members): (u64, Vec<String>) = redis::cmd("SSCAN")
            .arg(set)
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;
        Ok((members, next))
    }

    async fn scan_keys(
        &self,
        cursor: u64,
        pattern: &str,
        count: u64,
    ) -> Result<(Vec<String>, u64), BackendError> {
        let mut conn = self.connection().await?;
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;
        Ok((keys, next))
    }

    async fn exec_atomic(&self, batch: &Batch) -> Result<Vec<bool>, BackendError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;

        // MULTI/EXEC: no other client's command runs between ours.
        let mut pipe = redis::pipe();
        pipe.atomic();
        for command in batch.commands() {
            match command {
                Command::SetIfAbsent { key, value } => {
                    pipe.cmd("SET").arg(key).arg(value).arg("NX");
                }
                Command::Delete { key } => {
                    pipe.cmd("DEL").arg(key);
                }
                Command::SetAdd { set, member } => {
                    pipe.cmd("SADD").arg(set).arg(member);
                }
                Command::SetRemove { set, member } => {
                    pipe.cmd("SREM").arg(set).arg(member);
                }
            }
        }

        let replies: Vec<Value> = pipe.query_async(&mut conn).await?;
        if replies.len() != batch.len() {
            return Err(BackendError::Protocol(format!(
                "expected {} replies from EXEC, got {}",
                batch.len(),
                replies.len()
            )));
        }
        Ok(replies.iter().map(took_effect).collect())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), BackendError> {
        match self.conn.write().await.take() {
            Some(_) => {
                info!("Redis connection closed");
                Ok(())
            }
            None => Err(BackendError::Closed),
        }
    }
}
