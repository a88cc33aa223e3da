//! `hdrp-engine-server` binary: parses environment configuration, opens the
//! SQLite storage backend, wires up the HTTP worker dispatcher, and serves
//! the HTTP control surface.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use hdrp_orchestrator::api::{create_router, AppState};
use hdrp_orchestrator::config::Config;
use hdrp_orchestrator::dispatch::http::{HttpDispatcher, WorkerAddrs};
use hdrp_orchestrator::dispatch::Dispatcher;
use hdrp_orchestrator::executor::{Executor, ExecutorConfig};
use hdrp_orchestrator::storage::{SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    let filter = tracing_subscriber::EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(db_path = %config.db_path, "opening storage");
    if let Some(parent) = std::path::Path::new(&config.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let database_url = format!("sqlite://{}?mode=rwc", config.db_path);
    let storage = SqliteStorage::connect(&database_url).await?;
    storage.health_check().await?;
    let storage: Arc<dyn Storage> = Arc::new(storage);

    let dispatcher: Arc<dyn Dispatcher> = Arc::new(HttpDispatcher::new(
        WorkerAddrs {
            principal: config.principal_addr.clone(),
            researcher: config.researcher_addr.clone(),
            critic: config.critic_addr.clone(),
            synthesizer: config.synthesizer_addr.clone(),
        },
        config.node_execution_timeout(),
    ));

    let executor_config = ExecutorConfig {
        max_workers: config.max_workers,
        rate_limits: config.rate_limits(),
        node_execution_timeout: config.node_execution_timeout(),
        lock_timeout: config.lock_timeout(),
        ..ExecutorConfig::default()
    };
    if config.lock_provider != "memory" && config.lock_provider != "none" {
        tracing::warn!(
            provider = %config.lock_provider,
            "external lock backends are not implemented; falling back to the in-memory lock manager"
        );
    }
    let executor = Arc::new(Executor::new(dispatcher.clone(), executor_config).with_storage(storage.clone()));

    let state = AppState::new(storage, executor, dispatcher);
    let router = create_router(state);

    let addr: SocketAddr = config.http_addr.parse()?;
    tracing::info!(%addr, "starting hdrp-engine-server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
