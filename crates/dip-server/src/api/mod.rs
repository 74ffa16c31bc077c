//! Router assembly, grounded directly on `aion-server::main`'s
//! `build_api_router(...).layer(ServiceBuilder::new()...)` wiring: the same
//! four middleware layers (`TraceLayer`, `CompressionLayer`,
//! `TimeoutLayer`, `CorsLayer`), applied to the whole router rather than
//! per-route.

pub mod applications;
pub mod clusters;
pub mod deployments;
pub mod volumes;

use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/clusters/", get(clusters::list).post(clusters::create))
        .route("/clusters/:id", get(clusters::get).delete(clusters::delete))
        .route("/clusters/:id/kubeconfig", get(clusters::kubeconfig))
        .route("/clusters/:id/deployments", post(deployments::create))
        .route("/clusters/:id/deployments/check-endpoint-existence", post(clusters::check_endpoint_existence))
        .route("/clusters/:id/deployments/:did", post(deployments::update).delete(deployments::delete))
        .route("/clusters/:id/deployments/:did/credentials", get(deployments::credentials))
        .route("/applications/:id/versions", get(applications::versions))
        .route("/applications/:id/access_endpoints", get(applications::access_endpoints))
        .route("/volumes/", get(volumes::list).post(volumes::create))
        .route("/volumes/:id", axum::routing::delete(volumes::delete))
        .route("/deployments/proxy-health-check", get(deployments::proxy_health_check))
        .fallback(clusters::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
