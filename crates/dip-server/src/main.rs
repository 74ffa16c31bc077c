//! Process entrypoint (`aion-server::main`'s shape: init tracing, load
//! config, build state, assemble the router, serve). `spec.md` §6's exit
//! model — "process exits with non-zero on unrecoverable startup errors
//! (store unreachable, catalog malformed)" — is exactly what the `?` on
//! each startup step below gives us, propagated out of `main`.

mod api;
mod config;
mod errors;
mod state;

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use dip_catalog::Catalog;
use dip_orchestrator::{Deps, RealKubeConnector, RealProviderFactory, WorkerRegistry};
use dip_store::{MigrationRunner, Store};
use dip_templates::Renderer;

use config::AppConfig;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| config.logging.level.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting datainfrapilot control plane");

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    MigrationRunner::new(pool.clone()).run().await?;
    info!("migrations applied");

    let store = Store::new(pool);
    let catalog = Catalog::load()?;
    info!(applications = catalog.list().len(), "catalog loaded");
    let renderer = Renderer::new()?;

    let deps = Arc::new(Deps::new(
        store.clone(),
        Arc::new(RealProviderFactory),
        Arc::new(dip_helm::ProcessHelmEngine::default()),
        Arc::new(RealKubeConnector),
        renderer,
        catalog.clone(),
    ));
    let registry = Arc::new(WorkerRegistry::new(deps));

    let state = AppState {
        store,
        catalog,
        registry,
        http_client: reqwest::Client::new(),
        health_check_proxy_timeout: Duration::from_secs(config.server.health_check_proxy_timeout_seconds),
    };

    let app = api::build_router(state, Duration::from_secs(config.server.request_timeout_seconds));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
