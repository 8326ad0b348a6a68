//! Service config: HTTP listener, store backend and its connection, logging. Loaded from env.

use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use message_store::{RedisConfig, StoreOptions};

/// Which store the service runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    /// Process-local key-value store; data is lost on exit.
    Memory,
    Sqlite,
}

impl StoreBackend {
    /// Whether the backend keeps a separate index that `reconcile` can repair.
    pub fn is_key_value(self) -> bool {
        matches!(self, StoreBackend::Redis | StoreBackend::Memory)
    }
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => anyhow::bail!(
                "STORE_BACKEND must be one of redis, memory, sqlite; got {:?}",
                other
            ),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreBackend::Redis => "redis",
            StoreBackend::Memory => "memory",
            StoreBackend::Sqlite => "sqlite",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// LISTEN_ADDR
    pub listen_addr: String,
    /// SERVER_PORT
    pub server_port: u16,
    /// STORE_BACKEND
    pub store_backend: StoreBackend,
    /// REDIS_ADDR, REDIS_USERNAME, REDIS_PASSWORD, REDIS_DB
    pub redis: RedisConfig,
    /// SQLite file path, used when the backend is sqlite
    pub database_url: String,
    /// Page size hint for GET /messages
    pub page_size: u64,
    /// STORE_TIMEOUT_MS; unset means no per-operation deadline
    pub store_timeout: Option<Duration>,
    /// LOG_FILE; unset or empty logs to stdout only
    pub log_file: Option<String>,
}

/// Reads `name`, falling back to `default` when unset. A set but unparsable value is an error.
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} is not valid: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

impl ServiceConfig {
    /// Load from environment variables. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn load() -> Result<Self> {
        let listen_addr = env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = parse_var("SERVER_PORT", 8080u16)?;
        let store_backend = match env::var("STORE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => StoreBackend::Redis,
        };

        let redis = RedisConfig {
            address: env::var("REDIS_ADDR").unwrap_or_else(|_| "localhost:6379".to_string()),
            username: optional_var("REDIS_USERNAME"),
            password: optional_var("REDIS_PASSWORD"),
            database: parse_var("REDIS_DB", 0i64)?,
        };

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "./messages.db".to_string());
        let page_size = parse_var("PAGE_SIZE", 50u64)?;
        let store_timeout = match optional_var("STORE_TIMEOUT_MS") {
            Some(raw) => Some(Duration::from_millis(
                raw.trim()
                    .parse()
                    .with_context(|| format!("STORE_TIMEOUT_MS is not valid: {:?}", raw))?,
            )),
            None => None,
        };
        let log_file = optional_var("LOG_FILE");

        Ok(Self {
            listen_addr,
            server_port,
            store_backend,
            redis,
            database_url,
            page_size,
            store_timeout,
            log_file,
        })
    }

    /// Validate config (listen address must be an IP, page size and timeout non-zero).
    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.parse::<IpAddr>().is_err() {
            anyhow::bail!("LISTEN_ADDR is not a valid IP address: {}", self.listen_addr);
        }
        if self.page_size == 0 {
            anyhow::bail!("PAGE_SIZE must be greater than 0");
        }
        if self.store_timeout == Some(Duration::ZERO) {
            anyhow::bail!("STORE_TIMEOUT_MS must be greater than 0 when set");
        }
        if self.store_backend == StoreBackend::Redis && self.redis.address.is_empty() {
            anyhow::bail!("REDIS_ADDR must be set when STORE_BACKEND=redis");
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .listen_addr
            .parse()
            .with_context(|| format!("LISTEN_ADDR is not a valid IP address: {}", self.listen_addr))?;
        Ok(SocketAddr::new(ip, self.server_port))
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            operation_timeout: self.store_timeout,
        }
    }
}
