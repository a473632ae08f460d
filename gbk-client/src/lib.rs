//! # Guestbook Store Client
//!
//! Purpose: Provide a synchronous Redis-compatible client with connection
//! pooling, plus sentinel-based discovery of the master and replica endpoints
//! the pools should point at.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Reuse TCP connections to avoid repeated connects.
//! 2. **Scoped Discovery**: Each sentinel query owns one connection for the
//!    duration of the call and closes it on every exit path.
//! 3. **Degrade, Don't Crash**: Resolution failures collapse to an empty
//!    endpoint for callers that want lenient startup.
//! 4. **Protocol Clarity**: Encode/parse RESP2 explicitly for correctness.

mod client;
mod endpoint;
mod pool;
mod resp;
mod sentinel;

pub use client::{ClientConfig, ClientError, ClientResult, StoreClient};
pub use endpoint::{pool_address, with_password, Endpoint};
pub use pool::{ConnectionPool, PoolConfig, PooledConnection};
pub use resp::RespValue;
pub use sentinel::{
    resolve_master, resolve_slave, Resolution, ResolveError, SentinelResolver,
    DEFAULT_SENTINEL_TIMEOUT,
};
