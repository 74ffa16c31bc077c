//! `/applications/*` handlers: catalog reads only, no store or worker
//! involvement.

use axum::extract::{Path, State};
use axum::Json;

use dip_catalog::AccessEndpointDescriptor;

use crate::errors::Result;
use crate::state::AppState;

pub async fn versions(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Vec<String>>> {
    let versions = state.catalog.list_versions(&id).await?;
    Ok(Json((*versions).clone()))
}

pub async fn access_endpoints(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Vec<AccessEndpointDescriptor>>> {
    let app = state.catalog.get(&id)?;
    Ok(Json(app.access_endpoints.clone()))
}
