//! Pingwatch - HTTP endpoint uptime monitor.
//!
//! Polls registered targets on per-target intervals, keeps a capped history
//! of results, and serves uptime statistics over a small REST API with an
//! embedded dashboard.

mod config;
mod db;
mod probe;
mod scheduler;
mod stats;
mod web;

use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use config::ServerConfig;
use db::Store;
use probe::ProbeExecutor;
use scheduler::Scheduler;
use web::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pingwatch=info".parse()?),
        )
        .init();

    let cfg = ServerConfig::load();
    tracing::info!("Starting Pingwatch on port {}", cfg.http_port);

    let store = Store::new(&cfg.db_path)?;
    tracing::info!("Database ready at {}", cfg.db_path);

    let executor = ProbeExecutor::new()?;
    Arc::new(Scheduler::new(store.clone(), executor)).start();

    let server = Server::new(cfg, store);
    server.start().await?;

    Ok(())
}
