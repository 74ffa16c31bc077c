//! `/clusters/*` handlers (`spec.md` §6). Mirrors
//! `aion-web-api::handlers::deployments`'s one-file-per-resource shape, but
//! with `tracing::info!`/`Result<_, AppError>` in place of the teacher's
//! `println!`/bare `StatusCode`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use dip_core::{Error, Status};
use dip_orchestrator::{admission, Command};

use crate::errors::{AppError, Result};
use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<dip_core::domain::Cluster>>> {
    let clusters = state.store.list_clusters().await?;
    Ok(Json(clusters))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<dip_core::domain::Cluster>> {
    let cluster = state.store.get_cluster(id).await?;
    Ok(Json(cluster))
}

#[derive(Debug, Serialize)]
pub struct ClusterCreateResponse {
    pub name: String,
    pub status: Status,
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<dip_orchestrator::ClusterCreateRequest>,
) -> Result<impl IntoResponse> {
    admission::admit_cluster_create(&request)?;

    let dashboard = &request.additional_components.traefik_dashboard;
    let password_hash = if dashboard.enabled {
        let password = dashboard.password.as_deref().ok_or_else(|| Error::validation("dashboard password missing"))?;
        Some(bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| Error::Internal(format!("failed to hash dashboard password: {e}")))?)
    } else {
        None
    };

    let cluster_id = Uuid::new_v4();
    let cluster = state
        .store
        .create_cluster(
            cluster_id,
            &request.name,
            request.provider,
            &request.provider_config.api_token,
            &request.k3s_version,
            request.domain.as_deref(),
            dashboard.enabled,
            password_hash.as_deref(),
        )
        .await?;

    tracing::info!(cluster_id = %cluster_id, name = %request.name, "cluster create admitted");
    state.registry.enqueue(Command::CreateCluster { cluster_id, request: Box::new(request) }).await?;

    Ok((StatusCode::CREATED, Json(ClusterCreateResponse { name: cluster.name, status: cluster.status })))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse> {
    // Deleting a cluster already in `deleting` is the idempotent-after-failure
    // case §6 names: the row still exists (delete only removes it once the
    // worker finishes), so this simply re-enqueues rather than erroring.
    let cluster = state.store.get_cluster(id).await?;
    tracing::info!(cluster_id = %id, status = %cluster.status, "cluster delete requested");
    state.registry.enqueue(Command::DeleteCluster { cluster_id: id }).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn kubeconfig(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse> {
    let row = state.store.get_cluster_row(id).await?;
    if row.status != Status::Running {
        return Err(AppError(Error::conflict("cluster is not running")));
    }
    let kubeconfig = row.kubeconfig.ok_or_else(|| Error::conflict("cluster is not running"))?;
    Ok(([(axum::http::header::CONTENT_TYPE, "application/yaml")], kubeconfig))
}

#[derive(Debug, Deserialize)]
pub struct EndpointExistenceRequest {
    pub access_type: dip_core::AccessType,
    pub value: String,
}

/// `spec.md` §9: the client-side check is advisory; this route and
/// admission both call the same `normalize_endpoint_value` so neither can
/// disagree about what "the same endpoint" means.
pub async fn check_endpoint_existence(
    State(state): State<AppState>,
    Path(cluster_id): Path<Uuid>,
    Json(request): Json<EndpointExistenceRequest>,
) -> Result<Json<bool>> {
    let normalized = dip_core::normalize_endpoint_value(request.access_type, &request.value);
    let in_use = state.store.endpoint_value_in_use(cluster_id, request.access_type, &normalized).await?;
    Ok(Json(in_use))
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "route not found" })))
}
