use chrono::{DateTime, Utc};
use dip_core::domain::{AccessEndpoint, Cluster, Deployment, Pool, PoolSize, Volume, VolumeBinding};
use dip_core::{AccessType, Provider, Status};
use uuid::Uuid;

/// Internal row for the `clusters` table. Carries fields
/// (`provider_credentials`, `ssh_private_key`, `kubeconfig`,
/// `traefik_dashboard_password_hash`) that `dip_core::domain::Cluster`
/// deliberately omits — spec.md §3: "never returned on reads".
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClusterRow {
    pub id: Uuid,
    pub name: String,
    pub provider: Provider,
    pub provider_credentials: String,
    pub k3s_version: String,
    pub domain: Option<String>,
    pub access_ip: Option<String>,
    pub status: Status,
    pub error_message: Option<String>,
    pub traefik_dashboard_enabled: bool,
    pub traefik_dashboard_password_hash: Option<String>,
    pub kubeconfig: Option<String>,
    pub ssh_private_key: Option<String>,
    pub ssh_key_provider_id: Option<String>,
    pub firewall_provider_id: Option<String>,
    pub network_provider_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClusterRow {
    pub fn into_domain(self) -> Cluster {
        Cluster {
            id: self.id,
            name: self.name,
            provider: self.provider,
            k3s_version: self.k3s_version,
            domain: self.domain,
            access_ip: self.access_ip,
            status: self.status,
            error_message: self.error_message,
            traefik_dashboard_enabled: self.traefik_dashboard_enabled,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PoolRow {
    pub id: Uuid,
    pub cluster_id: Uuid,
    pub name: String,
    pub node_type: String,
    pub region: String,
    pub is_control_plane: bool,
    pub fixed_count: Option<i32>,
    pub autoscale_min: Option<i32>,
    pub autoscale_max: Option<i32>,
}

impl PoolRow {
    pub fn into_domain(self) -> Pool {
        let size = match (self.fixed_count, self.autoscale_min, self.autoscale_max) {
            (Some(count), _, _) => PoolSize::Fixed { count: count as u32 },
            (None, Some(min), Some(max)) => PoolSize::Autoscaling { min: min as u32, max: max as u32 },
            _ => PoolSize::Fixed { count: 1 },
        };
        Pool {
            id: self.id,
            cluster_id: self.cluster_id,
            name: self.name,
            node_type: self.node_type,
            region: self.region,
            size,
            is_control_plane: self.is_control_plane,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VolumeRow {
    pub id: Uuid,
    pub cluster_id: Uuid,
    pub name: String,
    pub size_gb: i32,
    pub description: Option<String>,
    pub status: Status,
    pub provider_volume_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Computed, not stored: `EXISTS (SELECT 1 FROM deployment_volume_bindings ...)`.
    pub in_use: bool,
}

impl VolumeRow {
    pub fn into_domain(self) -> Volume {
        Volume {
            id: self.id,
            cluster_id: self.cluster_id,
            name: self.name,
            size_gb: self.size_gb as u32,
            description: self.description,
            status: self.status,
            in_use: self.in_use,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeploymentRow {
    pub id: Uuid,
    pub cluster_id: Uuid,
    pub name: String,
    pub application: String,
    pub namespace: String,
    pub helm_release_name: String,
    pub bound_pool: Option<String>,
    pub status: Status,
    pub error_message: Option<String>,
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccessEndpointRow {
    pub id: Uuid,
    pub deployment_id: Uuid,
    pub name: String,
    pub access_type: AccessType,
    pub value: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VolumeBindingRow {
    pub deployment_id: Uuid,
    pub volume_name: String,
    pub mount_path: String,
}

impl DeploymentRow {
    pub fn into_domain(self, endpoints: Vec<AccessEndpointRow>, bindings: Vec<VolumeBindingRow>) -> Deployment {
        Deployment {
            id: self.id,
            cluster_id: self.cluster_id,
            name: self.name,
            application: self.application,
            namespace: self.namespace,
            helm_release_name: self.helm_release_name,
            bound_pool: self.bound_pool,
            status: self.status,
            error_message: self.error_message,
            config: serde_json::from_value(self.config).unwrap_or_default(),
            endpoints: endpoints
                .into_iter()
                .filter(|e| e.enabled)
                .map(|e| AccessEndpoint { name: e.name, access_type: e.access_type, value: e.value })
                .collect(),
            volumes: bindings
                .into_iter()
                .map(|b| VolumeBinding { volume_name: b.volume_name, mount_path: b.mount_path })
                .collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
