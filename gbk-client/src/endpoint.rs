//! Resolved store endpoints and the pool addresses built from them.

use std::fmt;

/// A `(host, port)` pair as reported by the sentinel.
///
/// Both parts are kept as strings exactly as the sentinel sent them. The empty
/// endpoint (both parts empty) means "not resolved".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Endpoint {
            host: host.into(),
            port: port.into(),
        }
    }

    /// The "unresolved" endpoint.
    pub fn empty() -> Self {
        Endpoint::default()
    }

    pub fn is_empty(&self) -> bool {
        self.host.is_empty() && self.port.is_empty()
    }
}

/// Renders as `host:port`, or as an empty string for the empty endpoint.
impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Builds the `[password@]host:port` string a pool is provisioned from.
///
/// Same rules as [`with_password`]; the empty endpoint stays empty.
pub fn pool_address(endpoint: &Endpoint, password: &str) -> String {
    with_password(&endpoint.to_string(), password)
}

/// Prefixes `addr` with `password@`.
///
/// The password is trimmed first. A blank password or an empty address leaves
/// the address as is, so an unresolved address never turns into `password@`.
pub fn with_password(addr: &str, password: &str) -> String {
    let password = password.trim();
    if addr.is_empty() || password.is_empty() {
        addr.to_string()
    } else {
        format!("{}@{}", password, addr)
    }
}
