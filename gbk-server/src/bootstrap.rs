//! # Startup Provisioning
//!
//! Resolve the master and replica endpoints once, turn them into pool
//! addresses, then build the two store clients the router runs on.
//!
//! ```text
//! SentinelSettings ──▶ resolve_plan ──▶ ProvisionPlan ──▶ provision ──▶ AppState
//!                      (master ∥ slave)  (pool addresses)   (two pools)
//! ```

use std::fmt;
use std::time::Duration;

use anyhow::{bail, Context};
use gbk_client::{pool_address, with_password, Resolution, SentinelResolver, StoreClient};
use tracing::{info, warn};

use crate::config::SentinelSettings;
use crate::state::AppState;

/// Addresses used when no sentinel is configured.
#[derive(Debug, Clone, Default)]
pub struct StaticAddrs {
    pub master: Option<String>,
    pub slave: Option<String>,
}

/// The two `[password@]host:port` strings the pools are built from.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProvisionPlan {
    pub master_addr: String,
    pub slave_addr: String,
}

impl fmt::Debug for ProvisionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionPlan")
            .field("master_addr", &redact(&self.master_addr))
            .field("slave_addr", &redact(&self.slave_addr))
            .finish()
    }
}

/// Works out both pool addresses.
///
/// With a sentinel configured, master and replica are looked up concurrently.
/// One failed lookup is logged and leaves that pool on the empty address;
/// both failing aborts startup, since nothing could be served.
pub async fn resolve_plan(
    settings: &SentinelSettings,
    timeout: Duration,
    fallback: StaticAddrs,
) -> anyhow::Result<ProvisionPlan> {
    let resolver =
        SentinelResolver::new(settings.sentinel_addr.clone()).with_timeouts(timeout, timeout, timeout);

    if !resolver.is_configured() {
        info!("no sentinel configured, using static store addresses");
        return Ok(ProvisionPlan {
            master_addr: with_password(&fallback.master.unwrap_or_default(), &settings.password),
            slave_addr: with_password(&fallback.slave.unwrap_or_default(), &settings.password),
        });
    }

    let master_task = {
        let resolver = resolver.clone();
        let cluster = settings.cluster.clone();
        tokio::task::spawn_blocking(move || resolver.master(&cluster))
    };
    let slave_task = {
        let resolver = resolver.clone();
        let cluster = settings.cluster.clone();
        tokio::task::spawn_blocking(move || resolver.slave(&cluster))
    };
    let (master, slave) = tokio::try_join!(master_task, slave_task)
        .context("sentinel lookup task panicked")?;

    if !master.is_resolved() && !slave.is_resolved() {
        bail!(
            "sentinel {} resolved neither master ({}) nor replica ({}) for cluster {:?}",
            settings.sentinel_addr,
            describe(&master),
            describe(&slave),
            settings.cluster,
        );
    }
    for (role, outcome) in [("master", &master), ("slave", &slave)] {
        if !outcome.is_resolved() {
            warn!(role, reason = %describe(outcome), "continuing with unresolved endpoint");
        }
    }

    let master = master.into_endpoint();
    let slave = slave.into_endpoint();
    info!(%master, %slave, cluster = %settings.cluster, "resolved store endpoints");

    Ok(ProvisionPlan {
        master_addr: pool_address(&master, &settings.password),
        slave_addr: pool_address(&slave, &settings.password),
    })
}

/// Builds the master and replica pools. Never dials.
pub fn provision(plan: &ProvisionPlan) -> AppState {
    AppState::new(
        StoreClient::connect(plan.master_addr.clone()),
        StoreClient::connect(plan.slave_addr.clone()),
    )
}

fn describe(outcome: &Resolution) -> String {
    match outcome {
        Resolution::Resolved(endpoint) => endpoint.to_string(),
        Resolution::Unconfigured => "no sentinel configured".to_string(),
        Resolution::Failed(err) => err.to_string(),
    }
}

fn redact(addr: &str) -> String {
    match addr.rsplit_once('@') {
        Some((_, host)) => format!("<redacted>@{}", host),
        None => addr.to_string(),
    }
}
