//! The work items a per-cluster worker processes, one at a time, in the
//! order they were enqueued (`spec.md` §4.8/§5: "sequential within a
//! cluster, parallel across clusters"). Each variant carries everything
//! the worker needs beyond what's already on disk — the worker re-reads
//! current state from the store itself rather than trusting a stale
//! snapshot enqueued earlier.

use uuid::Uuid;

use crate::requests::{ClusterCreateRequest, DeploymentCreateRequest, VolumeCreateRequest};

#[derive(Debug)]
pub enum Command {
    CreateCluster { cluster_id: Uuid, request: Box<ClusterCreateRequest> },
    DeleteCluster { cluster_id: Uuid },
    CreateDeployment { cluster_id: Uuid, deployment_id: Uuid, request: Box<DeploymentCreateRequest> },
    UpdateDeployment { cluster_id: Uuid, deployment_id: Uuid, request: Box<DeploymentCreateRequest> },
    DeleteDeployment { cluster_id: Uuid, deployment_id: Uuid },
    /// Volumes belong to a cluster (`spec.md` §3) and their backing
    /// provider resource is created/destroyed through that cluster's
    /// driver, so their lifecycle is serialized on the same per-cluster
    /// worker as everything else touching that cluster's provider account.
    CreateVolume { cluster_id: Uuid, volume_id: Uuid, request: Box<VolumeCreateRequest> },
    DeleteVolume { cluster_id: Uuid, volume_id: Uuid },
}

impl Command {
    pub fn cluster_id(&self) -> Uuid {
        match self {
            Command::CreateCluster { cluster_id, .. }
            | Command::DeleteCluster { cluster_id }
            | Command::CreateDeployment { cluster_id, .. }
            | Command::UpdateDeployment { cluster_id, .. }
            | Command::DeleteDeployment { cluster_id, .. }
            | Command::CreateVolume { cluster_id, .. }
            | Command::DeleteVolume { cluster_id, .. } => *cluster_id,
        }
    }
}
