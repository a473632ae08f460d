//! # Connection Pool
//!
//! Purpose: Turn a `[password@]host:port` pool address into a bounded set of
//! reusable, authenticated TCP connections.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Keep a bounded set of reusable connections.
//! 2. **Lazy Dialing**: Construction never touches the network, so a pool
//!    built from an unresolved (empty) address is still a valid handle.
//! 3. **Minimal Locking**: Hold the mutex only while moving idle connections.
//! 4. **Fail Fast**: Exceeding the pool limit returns an error immediately.

use std::collections::VecDeque;
use std::io::{BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::client::{ClientError, ClientResult};
use crate::resp::{encode_command, read_response, RespValue};

/// Pool configuration.
#[derive(Clone)]
pub struct PoolConfig {
    /// Server address, e.g. "10.0.0.1:6379". May be empty.
    pub addr: String,
    /// Password sent with `AUTH` on every new connection.
    pub password: Option<String>,
    /// Maximum number of idle connections to keep.
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

impl PoolConfig {
    /// Parses a pool address of the form `[password@]host:port`.
    ///
    /// The password ends at the last `@`, so passwords may contain `@`
    /// themselves. An empty password is treated as none.
    pub fn from_address(address: &str) -> Self {
        let (password, addr) = match address.rsplit_once('@') {
            Some((password, addr)) if !password.is_empty() => {
                (Some(password.to_string()), addr.to_string())
            }
            Some((_, addr)) => (None, addr.to_string()),
            None => (None, address.to_string()),
        };
        PoolConfig {
            addr,
            password,
            max_idle: 8,
            max_total: 64,
            read_timeout: None,
            write_timeout: None,
            connect_timeout: None,
        }
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: self.connect_timeout,
            read: self.read_timeout,
            write: self.write_timeout,
        }
    }
}

impl std::fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConfig")
            .field("addr", &self.addr)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("max_idle", &self.max_idle)
            .field("max_total", &self.max_total)
            .finish_non_exhaustive()
    }
}

struct PoolState {
    idle: VecDeque<Connection>,
    total: usize,
    closed: bool,
}

struct PoolInner {
    config: PoolConfig,
    state: Mutex<PoolState>,
}

/// Connection pool handle. Clones share the same pool.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Creates a pool. Does not dial.
    pub fn new(config: PoolConfig) -> Self {
        let state = PoolState {
            idle: VecDeque::with_capacity(config.max_idle),
            total: 0,
            closed: false,
        };
        ConnectionPool {
            inner: Arc::new(PoolInner {
                config,
                state: Mutex::new(state),
            }),
        }
    }

    /// Server address this pool dials, without credentials.
    pub fn addr(&self) -> &str {
        &self.inner.config.addr
    }

    /// Acquires a connection, reusing an idle one when available.
    pub fn acquire(&self) -> ClientResult<PooledConnection> {
        if let Some(conn) = self.pop_idle()? {
            return Ok(PooledConnection::new(self.clone(), conn));
        }

        self.try_reserve()?;
        match self.dial() {
            Ok(conn) => Ok(PooledConnection::new(self.clone(), conn)),
            Err(err) => {
                self.release_slot();
                Err(err)
            }
        }
    }

    /// Drops every idle connection and refuses further acquires.
    ///
    /// Connections currently checked out are closed when they are dropped.
    pub fn close_all(&self) {
        let drained = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            let drained: Vec<Connection> = state.idle.drain(..).collect();
            state.total = state.total.saturating_sub(drained.len());
            drained
        };
        debug!(addr = %self.inner.config.addr, closed = drained.len(), "pool closed");
    }

    /// Number of idle connections currently held.
    pub fn idle_count(&self) -> usize {
        self.inner.state.lock().idle.len()
    }

    fn dial(&self) -> ClientResult<Connection> {
        let config = &self.inner.config;
        let mut conn = Connection::open(&config.addr, config.timeouts())?;
        if let Some(password) = &config.password {
            conn.authenticate(password)?;
        }
        Ok(conn)
    }

    fn pop_idle(&self) -> ClientResult<Option<Connection>> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(ClientError::PoolClosed);
        }
        Ok(state.idle.pop_front())
    }

    fn try_reserve(&self) -> ClientResult<()> {
        let mut state = self.inner.state.lock();
        if state.total >= self.inner.config.max_total {
            return Err(ClientError::PoolExhausted);
        }
        state.total += 1;
        Ok(())
    }

    fn release_slot(&self) {
        let mut state = self.inner.state.lock();
        state.total = state.total.saturating_sub(1);
    }

    fn return_connection(&self, conn: Connection) {
        let mut state = self.inner.state.lock();
        if !state.closed && state.idle.len() < self.inner.config.max_idle {
            state.idle.push_back(conn);
        } else {
            state.total = state.total.saturating_sub(1);
        }
    }
}

/// RAII wrapper returning a connection to the pool on drop.
pub struct PooledConnection {
    pool: ConnectionPool,
    conn: Option<Connection>,
    valid: bool,
}

impl PooledConnection {
    fn new(pool: ConnectionPool, conn: Connection) -> Self {
        PooledConnection {
            pool,
            conn: Some(conn),
            valid: true,
        }
    }

    /// Executes a command and returns the decoded reply.
    pub fn exec(&mut self, args: &[&[u8]]) -> ClientResult<RespValue> {
        let conn = self.conn.as_mut().ok_or(ClientError::PoolClosed)?;
        let response = conn.exec(args);
        if response.is_err() {
            // The stream may be mid-frame; never hand it to another caller.
            self.valid = false;
        }
        response
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if self.valid {
            self.pool.return_connection(conn);
        } else {
            self.pool.release_slot();
        }
    }
}

/// Socket timeouts applied when dialing.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Timeouts {
    pub connect: Option<Duration>,
    pub read: Option<Duration>,
    pub write: Option<Duration>,
}

/// Single TCP connection with reusable buffers. Closed on drop.
pub(crate) struct Connection {
    reader: BufReader<TcpStream>,
    line_buf: Vec<u8>,
    write_buf: Vec<u8>,
}

impl Connection {
    pub(crate) fn open(addr: &str, timeouts: Timeouts) -> ClientResult<Self> {
        let stream = connect_stream(addr, timeouts.connect)?;
        stream.set_read_timeout(timeouts.read)?;
        stream.set_write_timeout(timeouts.write)?;
        stream.set_nodelay(true)?;

        Ok(Connection {
            reader: BufReader::new(stream),
            line_buf: Vec::with_capacity(128),
            write_buf: Vec::with_capacity(256),
        })
    }

    pub(crate) fn exec(&mut self, args: &[&[u8]]) -> ClientResult<RespValue> {
        self.write_buf.clear();
        encode_command(args, &mut self.write_buf);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;

        read_response(&mut self.reader, &mut self.line_buf)
    }

    fn authenticate(&mut self, password: &str) -> ClientResult<()> {
        match self.exec(&[b"AUTH", password.as_bytes()])? {
            RespValue::Simple(_) => Ok(()),
            RespValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

/// Dials the first reachable address `addr` resolves to.
///
/// Name resolution goes through the blocking system resolver; `timeout`
/// only bounds each TCP connect attempt.
fn connect_stream(addr: &str, timeout: Option<Duration>) -> ClientResult<TcpStream> {
    let invalid = || ClientError::InvalidAddress(addr.to_string());
    if addr.is_empty() {
        return Err(invalid());
    }

    let candidates = addr.to_socket_addrs().map_err(|_| invalid())?;
    let mut last_err = None;
    for candidate in candidates {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
            None => TcpStream::connect(candidate),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }

    Err(last_err.map(ClientError::Io).unwrap_or_else(invalid))
}
