//! Central application state (`aion-server::state::AppState`'s pattern of
//! one `Clone` struct holding `Arc`-wrapped collaborators, passed to every
//! handler via axum's `State` extractor).

use std::sync::Arc;
use std::time::Duration;

use dip_catalog::Catalog;
use dip_orchestrator::WorkerRegistry;
use dip_store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub catalog: Catalog,
    pub registry: Arc<WorkerRegistry>,
    pub http_client: reqwest::Client,
    pub health_check_proxy_timeout: Duration,
}
