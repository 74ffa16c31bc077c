use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::AccessType;
use crate::config_value::ConfigMap;
use crate::provider::Provider;
use crate::status::Status;

pub type ClusterId = Uuid;
pub type PoolId = Uuid;
pub type DeploymentId = Uuid;
pub type VolumeId = Uuid;

/// Either a fixed node count or an autoscaling range, per spec.md §3's Pool
/// invariant ("either a fixed count ... or an autoscaling range").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolSize {
    Fixed { count: u32 },
    Autoscaling { min: u32, max: u32 },
}

/// A single Hetzner server pool within a cluster — either the control-plane
/// pool (always exactly one node) or a worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub id: PoolId,
    pub cluster_id: ClusterId,
    pub name: String,
    pub node_type: String,
    pub region: String,
    pub size: PoolSize,
    pub is_control_plane: bool,
}

/// A provisioned k3s cluster and its control-plane connection details.
/// Provider credentials are intentionally absent from this type: they live
/// only on the persistence-layer row (`dip_store::ClusterRow`) and are never
/// constructed as part of a query response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub name: String,
    pub provider: Provider,
    pub k3s_version: String,
    pub domain: Option<String>,
    pub access_ip: Option<String>,
    pub status: Status,
    pub error_message: Option<String>,
    pub traefik_dashboard_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where a deployed application is reachable from outside the cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessEndpoint {
    pub name: String,
    pub access_type: AccessType,
    pub value: String,
}

impl AccessEndpoint {
    pub fn normalized(name: impl Into<String>, access_type: AccessType, value: &str) -> Self {
        Self {
            name: name.into(),
            access_type,
            value: crate::access::normalize_endpoint_value(access_type, value),
        }
    }
}

/// A block volume available for binding to deployments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub id: VolumeId,
    pub cluster_id: ClusterId,
    pub name: String,
    pub size_gb: u32,
    pub description: Option<String>,
    pub status: Status,
    pub in_use: bool,
    pub created_at: DateTime<Utc>,
}

/// How a deployment mounts a [`Volume`] — a named reference, not ownership
/// (spec.md §3: "Deployments do not own Volumes; they hold a named
/// reference").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeBinding {
    pub volume_name: String,
    pub mount_path: String,
}

/// A single application instance (Airflow, Spark, Grafana, Prefect, ...)
/// installed into a cluster via Helm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub cluster_id: ClusterId,
    pub name: String,
    pub application: String,
    pub namespace: String,
    pub helm_release_name: String,
    pub bound_pool: Option<String>,
    pub status: Status,
    pub error_message: Option<String>,
    pub config: ConfigMap,
    pub endpoints: Vec<AccessEndpoint>,
    pub volumes: Vec<VolumeBinding>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
