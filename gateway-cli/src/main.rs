//! Binary entry point (spec §2 ambient supplement): loads a TOML config,
//! registers the configured endpoints, and serves the admin + client
//! surface over HTTP. Grounded on `adk-studio`'s `main.rs` — `tokio::main`
//! plus a plain `tokio::net::TcpListener` bound to an `axum::serve` call —
//! with `clap::Parser` in place of that file's hand-rolled flag scanner,
//! since this workspace already depends on `clap` with the `derive`
//! feature the way `adk-cli`'s own `Cargo.toml` does.

mod config;
mod endpoints;

use clap::Parser;
use config::AppConfig;
use omnigate_admin::{build_router, AppState};
use omnigate_cache::{Cache, CacheConfig};
use omnigate_core::SystemClock;
use omnigate_orchestrator::{Gateway, OrchestratorConfig};
use omnigate_router::Router;
use omnigate_state::inprocess::InProcessStateStore;
use omnigate_state::StateStore;
use omnigate_telemetry::TelemetryConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Command-line launcher for the Omnigate request-routing fabric.
#[derive(Debug, Parser)]
#[command(name = "omnigate", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "omnigate.toml")]
    config: PathBuf,

    /// Overrides the config file's `listen` address.
    #[arg(long)]
    listen: Option<String>,

    /// Redis connection string for the shared state backend. When unset,
    /// state lives in-process and is lost on restart (spec §4.B: "two
    /// backends ... executing the same semantics").
    #[arg(long, env = "OMNIGATE_REDIS_URL")]
    redis_url: Option<String>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    omnigate_telemetry::init_telemetry(
        TelemetryConfig::from_env().with_log_level(args.log_level.clone()),
    );

    // The one well-known environment variable spec §6 names: the home
    // region, logged for operational context. No strategy in this fabric
    // currently scores on it; see DESIGN.md's Open Question decisions.
    if let Ok(region) = std::env::var("OMNIGATE_REGION") {
        tracing::info!(home_region = %region, "deployment region configured");
    }

    let app_config = AppConfig::from_file(&args.config)?;
    let listen = args.listen.unwrap_or_else(|| app_config.listen.clone());

    let router = Arc::new(Router::new(Arc::new(SystemClock), app_config.routing.clone()));
    for endpoint_config in &app_config.endpoints {
        let endpoint = endpoints::build_endpoint(endpoint_config)?;
        let status = router.register(endpoint);
        tracing::info!(endpoint = %status.key(), "endpoint registered");
    }

    // Periodic health-check ping, refreshing each endpoint's last measured
    // latency (spec §3) independent of real traffic. Grounded on
    // `adk-studio`'s background `tokio::spawn` + `tokio::time::sleep` loop.
    let ping_router = router.clone();
    tokio::spawn(async move {
        let ping_interval = std::time::Duration::from_secs(30);
        loop {
            tokio::time::sleep(ping_interval).await;
            for key in ping_router.keys() {
                if let Err(error) = ping_router.refresh_ping(&key).await {
                    tracing::warn!(endpoint = %key, %error, "ping failed");
                }
            }
        }
    });

    let state: Arc<dyn StateStore> = match &args.redis_url {
        Some(url) => Arc::new(omnigate_state::remote::RemoteStateStore::new(url)?),
        None => {
            tracing::warn!("no OMNIGATE_REDIS_URL set, using in-process state (not shared across replicas)");
            Arc::new(InProcessStateStore::new(256 * 1024 * 1024))
        }
    };

    let cache = Arc::new(Cache::new(state.clone(), CacheConfig::default()));
    let gateway = Arc::new(Gateway::new(router.clone(), state, cache, OrchestratorConfig::default()));

    let app = build_router(Arc::new(AppState { router, gateway }));

    let addr: SocketAddr = listen
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen address '{listen}': {e}"))?;
    tracing::info!(%addr, "omnigate listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
