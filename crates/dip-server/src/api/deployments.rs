//! `/clusters/{id}/deployments/*` and `/deployments/*` handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dip_core::{Error, Status};
use dip_orchestrator::{admission, Command, DeploymentCreateRequest};

use crate::errors::{AppError, Result};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DeploymentWriteResponse {
    pub id: Uuid,
    pub status: Status,
}

pub async fn create(
    State(state): State<AppState>,
    Path(cluster_id): Path<Uuid>,
    Json(request): Json<DeploymentCreateRequest>,
) -> Result<impl IntoResponse> {
    admission::admit_deployment_write(&state.store, &state.catalog, cluster_id, &request).await?;

    let deployment_id = Uuid::new_v4();
    tracing::info!(cluster_id = %cluster_id, deployment_id = %deployment_id, application = %request.application, "deployment create admitted");
    state
        .registry
        .enqueue(Command::CreateDeployment { cluster_id, deployment_id, request: Box::new(request) })
        .await?;

    Ok((StatusCode::CREATED, Json(DeploymentWriteResponse { id: deployment_id, status: Status::Pending })))
}

pub async fn update(
    State(state): State<AppState>,
    Path((cluster_id, deployment_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<DeploymentCreateRequest>,
) -> Result<impl IntoResponse> {
    admission::admit_deployment_update(&state.store, &state.catalog, cluster_id, &request).await?;
    let existing = state.store.get_deployment(deployment_id).await?;
    if existing.cluster_id != cluster_id {
        return Err(AppError(Error::not_found("deployment")));
    }

    tracing::info!(cluster_id = %cluster_id, deployment_id = %deployment_id, "deployment update admitted");
    state
        .registry
        .enqueue(Command::UpdateDeployment { cluster_id, deployment_id, request: Box::new(request) })
        .await?;

    Ok(Json(DeploymentWriteResponse { id: deployment_id, status: Status::Updating }))
}

pub async fn delete(State(state): State<AppState>, Path((cluster_id, deployment_id)): Path<(Uuid, Uuid)>) -> Result<impl IntoResponse> {
    let existing = state.store.get_deployment(deployment_id).await?;
    if existing.cluster_id != cluster_id {
        return Err(AppError(Error::not_found("deployment")));
    }
    tracing::info!(cluster_id = %cluster_id, deployment_id = %deployment_id, "deployment delete requested");
    state.registry.enqueue(Command::DeleteDeployment { cluster_id, deployment_id }).await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Serialize)]
pub struct CredentialsResponse {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Delegates to `dip_orchestrator::deployment::read_credentials`, the same
/// seam the worker uses, so this route goes through the testable
/// `KubeConnector` trait rather than building a `KubeClientGateway`
/// directly (§4.9: "separate from the mutating pipeline", not a second
/// implementation of it).
pub async fn credentials(
    State(state): State<AppState>,
    Path((cluster_id, deployment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CredentialsResponse>> {
    let data = dip_orchestrator::deployment::read_credentials(state.registry.deps(), cluster_id, deployment_id)
        .await?
        .unwrap_or_default();
    Ok(Json(CredentialsResponse { username: data.get("username").cloned(), password: data.get("password").cloned() }))
}

#[derive(Debug, Deserialize)]
pub struct ProxyHealthCheckQuery {
    pub target_url: String,
}

/// Same-process pass-through proxy for the UI's health check polling
/// (`spec.md` §6): relays only the upstream status code, under its own
/// request timeout so a hung target can't hang this request indefinitely.
pub async fn proxy_health_check(State(state): State<AppState>, Query(query): Query<ProxyHealthCheckQuery>) -> Result<StatusCode> {
    let response = state
        .http_client
        .get(&query.target_url)
        .timeout(state.health_check_proxy_timeout)
        .send()
        .await
        .map_err(|e| Error::Internal(format!("health check proxy request failed: {e}")))?;
    StatusCode::from_u16(response.status().as_u16()).map_err(|e| AppError(Error::Internal(e.to_string())))
}
