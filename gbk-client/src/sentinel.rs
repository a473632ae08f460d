//! # Sentinel Endpoint Resolution
//!
//! Purpose: Ask a sentinel which node currently holds the master role for a
//! named replica set, and which replica can serve reads.
//!
//! ## Design Principles
//! 1. **One Query, One Connection**: Every resolution dials the sentinel once,
//!    sends one command and drops the connection before returning.
//! 2. **Tagged Outcome**: [`Resolution`] keeps the reason a lookup failed;
//!    [`resolve_master`] / [`resolve_slave`] collapse it to the empty endpoint.
//! 3. **Named Fields**: Replica records are read by field name (`ip`, `port`),
//!    never by position.
//!
//! ## Wire Exchange
//!
//! ```text
//! > SENTINEL get-master-addr-by-name mymaster
//! < *2  $12 192.168.1.10  $4 6379
//!
//! > SENTINEL slaves mymaster
//! < *N  (*M name slave1 ip 192.168.1.11 port 6379 flags slave ...) ...
//! ```

use std::time::Duration;

use tracing::{debug, warn};

use crate::client::ClientError;
use crate::endpoint::Endpoint;
use crate::pool::{Connection, Timeouts};
use crate::resp::RespValue;

/// Connect, read and write timeout used for sentinel queries.
pub const DEFAULT_SENTINEL_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a sentinel lookup did not produce an endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The sentinel could not be dialed.
    #[error("sentinel {addr} unreachable: {source}")]
    Unreachable {
        addr: String,
        #[source]
        source: ClientError,
    },
    /// The command failed in flight or the sentinel answered with an error.
    #[error("sentinel command failed: {0}")]
    Command(#[source] ClientError),
    /// The reply did not have the expected shape.
    #[error("malformed sentinel reply: {0}")]
    Malformed(String),
    /// The sentinel knows no replicas for the cluster.
    #[error("sentinel reported no replicas")]
    NoReplicas,
}

/// Outcome of one resolution attempt.
#[derive(Debug)]
pub enum Resolution {
    /// The sentinel named an endpoint.
    Resolved(Endpoint),
    /// No sentinel address was configured; nothing was dialed.
    Unconfigured,
    /// The lookup was attempted and failed.
    Failed(ResolveError),
}

impl Resolution {
    /// Collapses every non-resolved outcome to the empty endpoint.
    pub fn into_endpoint(self) -> Endpoint {
        match self {
            Resolution::Resolved(endpoint) => endpoint,
            Resolution::Unconfigured | Resolution::Failed(_) => Endpoint::empty(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

/// Resolver bound to one sentinel address.
#[derive(Debug, Clone)]
pub struct SentinelResolver {
    addr: String,
    timeouts: Timeouts,
}

impl SentinelResolver {
    /// Creates a resolver with the default 10 second timeouts.
    ///
    /// An empty `addr` means no sentinel is configured.
    ///
    /// A hostname in `addr` is resolved through the system resolver on every
    /// lookup. That step blocks and is not bounded by the connect timeout, so
    /// pass an IP address when startup latency matters.
    pub fn new(addr: impl Into<String>) -> Self {
        SentinelResolver {
            addr: addr.into(),
            timeouts: Timeouts {
                connect: Some(DEFAULT_SENTINEL_TIMEOUT),
                read: Some(DEFAULT_SENTINEL_TIMEOUT),
                write: Some(DEFAULT_SENTINEL_TIMEOUT),
            },
        }
    }

    /// Overrides the connect, read and write timeouts.
    pub fn with_timeouts(mut self, connect: Duration, read: Duration, write: Duration) -> Self {
        self.timeouts = Timeouts {
            connect: Some(connect),
            read: Some(read),
            write: Some(write),
        };
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.addr.is_empty()
    }

    /// Looks up the current master of `cluster`.
    ///
    /// The reply must be exactly `[host, port]`.
    pub fn master(&self, cluster: &str) -> Resolution {
        self.query(
            &[b"SENTINEL", b"get-master-addr-by-name", cluster.as_bytes()],
            |reply| {
                let mut pair = decode_strings(reply)?;
                if pair.len() != 2 {
                    return Err(ResolveError::Malformed(format!(
                        "expected [host, port], got {} element(s)",
                        pair.len()
                    )));
                }
                let port = pair.pop().unwrap_or_default();
                let host = pair.pop().unwrap_or_default();
                Ok(Endpoint::new(host, port))
            },
        )
    }

    /// Looks up a replica of `cluster`.
    ///
    /// Only the first record the sentinel lists is considered; its flags are
    /// not inspected.
    pub fn slave(&self, cluster: &str) -> Resolution {
        self.query(&[b"SENTINEL", b"slaves", cluster.as_bytes()], |reply| {
            let records = match reply {
                RespValue::Array(records) => records,
                RespValue::Error(message) => {
                    return Err(ResolveError::Command(ClientError::Server { message }))
                }
                other => {
                    return Err(ResolveError::Malformed(format!(
                        "expected replica list, got {:?}",
                        other
                    )))
                }
            };
            let first = records.into_iter().next().ok_or(ResolveError::NoReplicas)?;
            endpoint_from_record(&decode_strings(first)?)
        })
    }

    /// Dials the sentinel, runs one command and decodes the reply.
    ///
    /// The connection lives only inside this call and is closed when it goes
    /// out of scope, on success and on every early return.
    fn query<F>(&self, args: &[&[u8]], decode: F) -> Resolution
    where
        F: FnOnce(RespValue) -> Result<Endpoint, ResolveError>,
    {
        if !self.is_configured() {
            debug!("no sentinel configured, skipping lookup");
            return Resolution::Unconfigured;
        }

        let result = Connection::open(&self.addr, self.timeouts)
            .map_err(|source| ResolveError::Unreachable {
                addr: self.addr.clone(),
                source,
            })
            .and_then(|mut conn| conn.exec(args).map_err(ResolveError::Command))
            .and_then(decode);

        match result {
            Ok(endpoint) => {
                debug!(sentinel = %self.addr, %endpoint, "sentinel lookup resolved");
                Resolution::Resolved(endpoint)
            }
            Err(err) => {
                warn!(sentinel = %self.addr, error = %err, "sentinel lookup failed");
                Resolution::Failed(err)
            }
        }
    }
}

/// Resolves the master of `cluster` via the sentinel at `sentinel_addr`.
///
/// Returns the empty endpoint when no sentinel is configured or the lookup
/// fails for any reason.
pub fn resolve_master(sentinel_addr: &str, cluster: &str) -> Endpoint {
    SentinelResolver::new(sentinel_addr).master(cluster).into_endpoint()
}

/// Resolves a replica of `cluster` via the sentinel at `sentinel_addr`.
///
/// Returns the empty endpoint when no sentinel is configured or the lookup
/// fails for any reason.
pub fn resolve_slave(sentinel_addr: &str, cluster: &str) -> Endpoint {
    SentinelResolver::new(sentinel_addr).slave(cluster).into_endpoint()
}

fn decode_strings(reply: RespValue) -> Result<Vec<String>, ResolveError> {
    reply.into_strings().map_err(|err| match err {
        ClientError::Server { .. } => ResolveError::Command(err),
        other => ResolveError::Malformed(other.to_string()),
    })
}

fn endpoint_from_record(fields: &[String]) -> Result<Endpoint, ResolveError> {
    if fields.len() % 2 != 0 {
        return Err(ResolveError::Malformed(format!(
            "replica record has odd field count {}",
            fields.len()
        )));
    }

    let lookup = |name: &str| {
        fields
            .chunks_exact(2)
            .find(|pair| pair[0] == name)
            .map(|pair| pair[1].clone())
            .ok_or_else(|| ResolveError::Malformed(format!("replica record has no {name:?} field")))
    };

    Ok(Endpoint::new(lookup("ip")?, lookup("port")?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn record_fields_are_found_by_name() {
        let fields = record(&["flags", "slave", "port", "6380", "name", "r1", "ip", "10.0.0.9"]);
        assert_eq!(
            endpoint_from_record(&fields).unwrap(),
            Endpoint::new("10.0.0.9", "6380")
        );
    }

    #[test]
    fn record_without_port_is_malformed() {
        let fields = record(&["name", "r1", "ip", "10.0.0.9"]);
        assert!(matches!(
            endpoint_from_record(&fields),
            Err(ResolveError::Malformed(_))
        ));
    }

    #[test]
    fn record_with_odd_length_is_malformed() {
        let fields = record(&["name", "r1", "ip"]);
        assert!(matches!(
            endpoint_from_record(&fields),
            Err(ResolveError::Malformed(_))
        ));
    }

    #[test]
    fn unconfigured_resolver_skips_network() {
        let resolver = SentinelResolver::new("");
        assert!(!resolver.is_configured());
        assert!(matches!(resolver.master("any"), Resolution::Unconfigured));
        assert!(matches!(resolver.slave("any"), Resolution::Unconfigured));
    }

    #[test]
    fn failures_collapse_to_empty_endpoint() {
        assert!(Resolution::Failed(ResolveError::NoReplicas)
            .into_endpoint()
            .is_empty());
        assert!(Resolution::Unconfigured.into_endpoint().is_empty());
        let endpoint = Endpoint::new("10.0.0.1", "6379");
        assert_eq!(
            Resolution::Resolved(endpoint.clone()).into_endpoint(),
            endpoint
        );
    }
}
