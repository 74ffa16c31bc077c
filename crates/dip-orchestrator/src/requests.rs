//! Wire-shaped request DTOs (§6's request bodies, snake_case on the wire).
//! `dip-server` deserializes HTTP bodies directly into these; keeping them
//! here (rather than in `dip-server`) lets the orchestrator's admission
//! logic be exercised without an HTTP layer, mirroring the teacher's own
//! split between `aion-server::api` request structs and the services they
//! call straight through to.

use dip_core::{AccessType, ConfigMap};
use serde::Deserialize;
use uuid::Uuid;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutoscalingRequest {
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolRequest {
    pub name: String,
    pub node_type: String,
    pub region: String,
    /// Mirrors the source UI's wire shape, which sends this as a string.
    pub number_of_nodes: Option<String>,
    pub autoscaling: Option<AutoscalingRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfigRequest {
    pub api_token: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TraefikDashboardRequest {
    #[serde(default)]
    pub enabled: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AdditionalComponentsRequest {
    #[serde(default)]
    pub traefik_dashboard: TraefikDashboardRequest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterCreateRequest {
    pub name: String,
    pub provider: dip_core::Provider,
    pub provider_config: ProviderConfigRequest,
    pub k3s_version: String,
    pub domain: Option<String>,
    pub pools: Vec<PoolRequest>,
    #[serde(default)]
    pub additional_components: AdditionalComponentsRequest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointRequest {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub access_type: AccessType,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeBindingRequest {
    pub requirement_name: String,
    pub mount_path: String,
    pub existing_volume_id: Option<Uuid>,
    pub new_volume_size_gb: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentCreateRequest {
    pub name: String,
    pub application: String,
    pub bound_pool: Option<String>,
    #[serde(default)]
    pub config: ConfigMap,
    #[serde(default)]
    pub endpoints: Vec<EndpointRequest>,
    #[serde(default)]
    pub volumes: Vec<VolumeBindingRequest>,
}

pub type DeploymentUpdateRequest = DeploymentCreateRequest;

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeCreateRequest {
    pub name: String,
    pub size_gb: u32,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointExistenceCheckRequest {
    pub access_type: AccessType,
    pub value: String,
}
