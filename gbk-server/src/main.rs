use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gbk_server::{build_router, provision, resolve_plan, Cli, SentinelSettings, StaticAddrs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let settings = SentinelSettings::from_env();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        sentinel = %settings.sentinel_addr,
        cluster = %settings.cluster,
        password_set = settings.has_password(),
        "starting gbk-server"
    );

    let fallback = StaticAddrs {
        master: cli.master_addr.clone(),
        slave: cli.slave_addr.clone(),
    };
    let plan = resolve_plan(&settings, cli.sentinel_timeout(), fallback).await?;
    info!(?plan, "provisioning store pools");
    let state = provision(&plan);

    let listener = TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("failed to bind {}", cli.listen))?;
    info!(addr = %cli.listen, static_dir = %cli.static_dir.display(), "http front-end listening");

    axum::serve(listener, build_router(state.clone(), &cli.static_dir))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    state.close();
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    match ctrl_c().await {
        Ok(()) => info!("received shutdown signal"),
        Err(e) => error!("error receiving Ctrl-C: {e}"),
    }
}
