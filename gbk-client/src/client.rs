//! # Synchronous Store Client
//!
//! Purpose: Expose the handful of list and server commands the guestbook
//! front-end issues, on top of a shared connection pool.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `StoreClient` hides pooling and protocol details.
//! 2. **Cheap Clones**: Clones share one pool, so handlers can each own one.
//! 3. **Fail Fast**: Protocol violations surface immediately as errors.

use std::time::Duration;

use crate::pool::{ConnectionPool, PoolConfig};
use crate::resp::RespValue;

/// Result type for the sync client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the sync client and pool.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Network or IO failure while connecting, reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// RESP2 framing or parse error.
    #[error("protocol error: {0}")]
    Protocol(&'static str),
    /// Server returned an error reply.
    #[error("server error: {}", String::from_utf8_lossy(.message))]
    Server { message: Vec<u8> },
    /// Reply type did not match the command.
    #[error("unexpected response")]
    UnexpectedResponse,
    /// Pool is at capacity and no idle connections are available.
    #[error("connection pool exhausted")]
    PoolExhausted,
    /// Pool was closed during shutdown.
    #[error("connection pool closed")]
    PoolClosed,
    /// Address is empty or does not resolve to a socket address.
    #[error("invalid address: {0:?}")]
    InvalidAddress(String),
}

/// Configuration for a store client and its pool.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Pool address in `[password@]host:port` form.
    pub addr: String,
    /// Maximum idle connections kept in the pool.
    pub max_idle: usize,
    /// Maximum total connections (idle + in-use).
    pub max_total: usize,
    /// Optional TCP read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            addr: "127.0.0.1:6379".to_string(),
            max_idle: 8,
            max_total: 64,
            read_timeout: Some(Duration::from_secs(10)),
            write_timeout: Some(Duration::from_secs(10)),
            connect_timeout: Some(Duration::from_secs(10)),
        }
    }
}

/// Pooled client for one store endpoint.
///
/// Each call acquires a connection, runs one command and hands the connection
/// back to the pool.
#[derive(Clone)]
pub struct StoreClient {
    pool: ConnectionPool,
}

impl StoreClient {
    /// Builds a client with default pool settings for a `[password@]host:port`
    /// address. Never dials; connection errors show up on first use.
    pub fn connect(addr: impl Into<String>) -> Self {
        Self::with_config(ClientConfig {
            addr: addr.into(),
            ..ClientConfig::default()
        })
    }

    /// Builds a client with a custom configuration.
    pub fn with_config(config: ClientConfig) -> Self {
        let mut pool_config = PoolConfig::from_address(&config.addr);
        pool_config.max_idle = config.max_idle;
        pool_config.max_total = config.max_total;
        pool_config.read_timeout = config.read_timeout;
        pool_config.write_timeout = config.write_timeout;
        pool_config.connect_timeout = config.connect_timeout;
        StoreClient {
            pool: ConnectionPool::new(pool_config),
        }
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Returns every member of the list at `key`, oldest first.
    ///
    /// A missing key reads as an empty list.
    pub fn lrange_all(&self, key: &str) -> ClientResult<Vec<String>> {
        let mut conn = self.pool.acquire()?;
        conn.exec(&[b"LRANGE", key.as_bytes(), b"0", b"-1"])?
            .into_strings()
    }

    /// Appends `value` to the list at `key`. Returns the new list length.
    pub fn rpush(&self, key: &str, value: &str) -> ClientResult<i64> {
        let mut conn = self.pool.acquire()?;
        match conn.exec(&[b"RPUSH", key.as_bytes(), value.as_bytes()])? {
            RespValue::Integer(len) => Ok(len),
            RespValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Fetches raw `INFO` output.
    pub fn info(&self) -> ClientResult<Vec<u8>> {
        let mut conn = self.pool.acquire()?;
        match conn.exec(&[b"INFO"])? {
            RespValue::Bulk(Some(data)) => Ok(data),
            RespValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Pings the server. Returns the raw reply payload.
    pub fn ping(&self) -> ClientResult<Vec<u8>> {
        let mut conn = self.pool.acquire()?;
        match conn.exec(&[b"PING"])? {
            RespValue::Simple(text) | RespValue::Bulk(Some(text)) => Ok(text),
            RespValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}
