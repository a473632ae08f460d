//! # Configuration
//!
//! Two layers:
//!
//! - [`Cli`]: process options, from flags or `GBK_*` variables.
//! - [`SentinelSettings`]: sentinel coordinates read through one level of
//!   indirection. `EnvName_SentinelHost` holds the *name* of the variable
//!   carrying the host, and so on. Deployment templates that inject
//!   service-discovery variables under generated names rely on this.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Points at the variable holding the sentinel host.
pub const SENTINEL_HOST_POINTER: &str = "EnvName_SentinelHost";
/// Points at the variable holding the sentinel port.
pub const SENTINEL_PORT_POINTER: &str = "EnvName_SentinelPort";
/// Points at the variable holding the cluster name.
pub const CLUSTER_NAME_POINTER: &str = "EnvName_ClusterName";
/// Points at the variable holding the store password.
pub const PASSWORD_POINTER: &str = "EnvName_Password";

/// Port assumed when a sentinel host is given without one.
pub const DEFAULT_SENTINEL_PORT: &str = "26379";

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Address the HTTP server listens on.
    #[arg(long, env = "GBK_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Default log filter; `RUST_LOG` takes precedence.
    #[arg(long, env = "GBK_LOG", default_value = "info")]
    pub log_level: String,

    /// Connect, read and write timeout for sentinel queries.
    #[arg(long, env = "GBK_SENTINEL_TIMEOUT_SECS", default_value_t = 10)]
    pub sentinel_timeout_secs: u64,

    /// Master address used when no sentinel is configured.
    #[arg(long, env = "GBK_MASTER_ADDR")]
    pub master_addr: Option<String>,

    /// Replica address used when no sentinel is configured.
    #[arg(long, env = "GBK_SLAVE_ADDR")]
    pub slave_addr: Option<String>,

    /// Directory served for any path no API route matches.
    #[arg(long, env = "GBK_STATIC_DIR", default_value = "public")]
    pub static_dir: PathBuf,
}

impl Cli {
    pub fn sentinel_timeout(&self) -> Duration {
        Duration::from_secs(self.sentinel_timeout_secs)
    }
}

/// Sentinel coordinates and store credentials.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SentinelSettings {
    /// `host:port` of the sentinel, empty when none is configured.
    pub sentinel_addr: String,
    /// Replica set name the sentinel monitors.
    pub cluster: String,
    /// Store password, trimmed. Empty means no AUTH.
    pub password: String,
}

impl SentinelSettings {
    /// Reads the settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the settings through `lookup`. Unset variables read as empty.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let indirect = |pointer: &str| {
            lookup(pointer)
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .and_then(|name| lookup(&name))
                .unwrap_or_default()
        };

        let host = indirect(SENTINEL_HOST_POINTER);
        let port = indirect(SENTINEL_PORT_POINTER);
        SentinelSettings {
            sentinel_addr: sentinel_addr(host.trim(), port.trim()),
            cluster: indirect(CLUSTER_NAME_POINTER),
            password: indirect(PASSWORD_POINTER).trim().to_string(),
        }
    }

    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }
}

impl fmt::Debug for SentinelSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentinelSettings")
            .field("sentinel_addr", &self.sentinel_addr)
            .field("cluster", &self.cluster)
            .field("password", &if self.has_password() { "<redacted>" } else { "" })
            .finish()
    }
}

fn sentinel_addr(host: &str, port: &str) -> String {
    match (host, port) {
        ("", _) => String::new(),
        (host, "") => format!("{}:{}", host, DEFAULT_SENTINEL_PORT),
        (host, port) => format!("{}:{}", host, port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> SentinelSettings {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SentinelSettings::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn resolves_through_pointer_variables() {
        let settings = settings(&[
            ("EnvName_SentinelHost", "REDIS_SENTINEL_SERVICE_HOST"),
            ("EnvName_SentinelPort", "REDIS_SENTINEL_SERVICE_PORT"),
            ("EnvName_ClusterName", "REDIS_CLUSTER"),
            ("EnvName_Password", "REDIS_PASSWORD"),
            ("REDIS_SENTINEL_SERVICE_HOST", "10.0.0.5"),
            ("REDIS_SENTINEL_SERVICE_PORT", "26379"),
            ("REDIS_CLUSTER", "mymaster"),
            ("REDIS_PASSWORD", "  secret\n"),
        ]);
        assert_eq!(settings.sentinel_addr, "10.0.0.5:26379");
        assert_eq!(settings.cluster, "mymaster");
        assert_eq!(settings.password, "secret");
    }

    #[test]
    fn missing_pointers_leave_sentinel_unconfigured() {
        let settings = settings(&[]);
        assert_eq!(settings, SentinelSettings::default());
        assert!(settings.sentinel_addr.is_empty());
        assert!(!settings.has_password());
    }

    #[test]
    fn pointer_to_unset_variable_reads_as_empty() {
        let settings = settings(&[
            ("EnvName_SentinelHost", "NOT_SET"),
            ("EnvName_SentinelPort", "ALSO_NOT_SET"),
        ]);
        assert!(settings.sentinel_addr.is_empty());
    }

    #[test]
    fn host_without_port_uses_sentinel_default() {
        let settings = settings(&[
            ("EnvName_SentinelHost", "HOST"),
            ("HOST", "sentinel.local"),
        ]);
        assert_eq!(settings.sentinel_addr, "sentinel.local:26379");
    }

    #[test]
    fn debug_output_redacts_password() {
        let settings = settings(&[("EnvName_Password", "PW"), ("PW", "hunter2")]);
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["gbk-server"]).expect("parse");
        assert_eq!(cli.listen, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(cli.sentinel_timeout(), Duration::from_secs(10));
        assert!(cli.master_addr.is_none());
        assert_eq!(cli.static_dir, PathBuf::from("public"));
    }
}
