//! The per-cluster worker loop: pulls [`Command`]s off its queue strictly
//! sequentially and drives them through [`crate::cluster`] or
//! [`crate::deployment`]. A failure in one command never kills the task —
//! it's recorded on the affected row's `status`/`error_message` and the
//! worker moves on to the next queued command, the same way
//! `aion-enterprise`'s `DeploymentOrchestrator::deploy_to_production`
//! records a failed status rather than propagating a panic out of its own
//! background task.

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::cluster;
use crate::commands::Command;
use crate::context::Deps;
use crate::deployment;
use crate::volume;

pub async fn run(cluster_id: Uuid, deps: Arc<Deps>, mut rx: mpsc::Receiver<Command>) {
    tracing::info!(%cluster_id, "cluster worker started");
    while let Some(command) = rx.recv().await {
        if let Err(e) = dispatch(&deps, command).await {
            tracing::error!(%cluster_id, error = %e, "cluster worker command failed");
        }
    }
    tracing::info!(%cluster_id, "cluster worker stopped (no more senders)");
}

async fn dispatch(deps: &Arc<Deps>, command: Command) -> dip_core::Result<()> {
    match command {
        Command::CreateCluster { cluster_id, request } => cluster::create(deps, cluster_id, &request).await,
        Command::DeleteCluster { cluster_id } => cluster::delete(deps, cluster_id).await,
        Command::CreateDeployment { cluster_id, deployment_id, request } => {
            deployment::create(deps, cluster_id, deployment_id, &request).await
        }
        Command::UpdateDeployment { cluster_id, deployment_id, request } => {
            deployment::update(deps, cluster_id, deployment_id, &request).await
        }
        Command::DeleteDeployment { cluster_id, deployment_id } => {
            deployment::delete(deps, cluster_id, deployment_id).await
        }
        Command::CreateVolume { cluster_id, volume_id, request } => {
            volume::create(deps, cluster_id, volume_id, &request).await
        }
        Command::DeleteVolume { cluster_id, volume_id } => volume::delete(deps, cluster_id, volume_id).await,
    }
}
