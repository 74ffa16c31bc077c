//! `/volumes/*` handlers. Volumes are listed cluster-wide (`spec.md` §6's
//! `GET /volumes/` has no cluster path segment), so the cluster a new
//! volume belongs to is supplied in the request body rather than the path.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dip_core::domain::Volume;
use dip_core::{Error, Status};
use dip_orchestrator::{admission, Command, VolumeCreateRequest as OrchestratorVolumeCreateRequest};

use crate::errors::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VolumeCreateRequest {
    pub cluster_id: Uuid,
    pub name: String,
    pub size_gb: u32,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VolumeCreateResponse {
    pub name: String,
    pub status: Status,
}

#[derive(Debug, Deserialize)]
pub struct VolumeListQuery {
    pub cluster_id: Uuid,
}

pub async fn list(State(state): State<AppState>, axum::extract::Query(query): axum::extract::Query<VolumeListQuery>) -> Result<Json<Vec<Volume>>> {
    let volumes = state.store.list_volumes(query.cluster_id).await?;
    Ok(Json(volumes))
}

pub async fn create(State(state): State<AppState>, Json(request): Json<VolumeCreateRequest>) -> Result<impl IntoResponse> {
    let orchestrator_request =
        OrchestratorVolumeCreateRequest { name: request.name.clone(), size_gb: request.size_gb, description: request.description.clone() };
    admission::admit_volume_create(&orchestrator_request)?;

    let volume_id = Uuid::new_v4();
    let volume = state
        .store
        .create_volume(volume_id, request.cluster_id, &request.name, request.size_gb, request.description.as_deref())
        .await?;

    tracing::info!(volume_id = %volume_id, cluster_id = %request.cluster_id, "volume create admitted");
    state
        .registry
        .enqueue(Command::CreateVolume { cluster_id: request.cluster_id, volume_id, request: Box::new(orchestrator_request) })
        .await?;

    Ok((StatusCode::CREATED, Json(VolumeCreateResponse { name: volume.name, status: volume.status })))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse> {
    let volume = state.store.get_volume(id).await?;
    // §8's concrete scenario 5 expects 409 synchronously on the request that
    // attempts to delete an in-use volume, not after a worker round-trip.
    if volume.in_use {
        return Err(crate::errors::AppError(Error::conflict("volume is in use")));
    }
    tracing::info!(volume_id = %id, cluster_id = %volume.cluster_id, "volume delete requested");
    state.registry.enqueue(Command::DeleteVolume { cluster_id: volume.cluster_id, volume_id: id }).await?;
    Ok(StatusCode::ACCEPTED)
}
