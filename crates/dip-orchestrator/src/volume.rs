//! Volume lifecycle, driven by the same per-cluster worker as the cluster
//! and its deployments (`spec.md` §3: a volume belongs to exactly one
//! cluster, and its backing block-storage resource is created/destroyed
//! through that cluster's provider credentials). Binding a volume to a
//! deployment is handled in [`crate::deployment`]; this module only owns
//! the volume row's own `pending -> running` / `deleting -> (removed)`
//! transitions.

use std::sync::Arc;
use uuid::Uuid;

use dip_core::{Error, Result, Status};
use dip_provider::{labels, VolumeSpec};

use crate::context::Deps;
use crate::requests::VolumeCreateRequest;

pub async fn create(deps: &Arc<Deps>, cluster_id: Uuid, volume_id: Uuid, request: &VolumeCreateRequest) -> Result<()> {
    let cluster_row = deps.store.get_cluster_row(cluster_id).await?;
    let pools = deps.store.list_pools(cluster_id).await?;
    let region = pools
        .first()
        .map(|p| p.region.clone())
        .ok_or_else(|| Error::Internal("cluster has no pools to derive a region from".to_string()))?;

    let driver = deps.provider_factory.build(cluster_row.provider, &cluster_row.provider_credentials).await?;
    deps.store.update_volume_status(volume_id, Status::Creating).await?;

    let spec = VolumeSpec {
        name: &request.name,
        size_gb: request.size_gb,
        region: &region,
        labels: labels::server_labels(&cluster_id.to_string(), "volume", "standalone"),
    };

    match driver.create_volume(spec).await {
        Ok(handle) => {
            deps.store.set_volume_provider_id(volume_id, &handle.provider_id).await?;
            deps.store.update_volume_status(volume_id, Status::Running).await?;
            Ok(())
        }
        Err(e) => {
            deps.store.update_volume_status(volume_id, Status::Failed).await?;
            tracing::error!(%volume_id, error = %e, "volume creation failed");
            Err(e)
        }
    }
}

/// Teardown for a standalone volume delete (`DELETE /volumes/{id}`). The
/// store's own `delete_volume` already refuses an in-use volume (§8's
/// in-use invariant), so by the time this command reaches the worker the
/// only remaining failure mode is the provider call itself.
pub async fn delete(deps: &Arc<Deps>, cluster_id: Uuid, volume_id: Uuid) -> Result<()> {
    let cluster_row = deps.store.get_cluster_row(cluster_id).await?;
    let volume_row = deps.store.get_volume_row(volume_id).await?;
    let driver = deps.provider_factory.build(cluster_row.provider, &cluster_row.provider_credentials).await?;

    if let Some(provider_id) = &volume_row.provider_volume_id {
        driver.delete_volume(provider_id).await?;
    }
    deps.store.delete_volume(volume_id).await
}
