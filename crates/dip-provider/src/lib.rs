//! Provider driver (C2): a capability trait with one implementation per
//! IaaS (`spec.md` §4.2, §9's "polymorphism over providers" design note).
//! Hetzner Cloud is the sole implementation; selecting `DigitalOcean` is
//! rejected at admission by `dip-orchestrator` before any call here is made.

pub mod hetzner;
pub mod labels;

use async_trait::async_trait;
use dip_core::Result;

/// A server created by a [`ProviderDriver`]. `public_ip` is `None` until
/// the provider reports the instance has one assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerHandle {
    pub provider_id: String,
    pub name: String,
    pub public_ip: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Initializing,
    Running,
    Off,
    Deleting,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeHandle {
    pub provider_id: String,
    pub name: String,
    pub size_gb: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkHandle {
    pub provider_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FirewallHandle {
    pub provider_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SshKeyHandle {
    pub provider_id: String,
}

/// Parameters for creating one server. `labels` always includes the
/// `dip/cluster`, `dip/role`, `dip/pool` triple (`spec.md` §4.2); teardown
/// walks resources by these labels rather than by locally stored IDs.
#[derive(Debug, Clone)]
pub struct ServerSpec<'a> {
    pub name: &'a str,
    pub server_type: &'a str,
    pub region: &'a str,
    pub user_data: &'a str,
    pub ssh_key_id: &'a str,
    pub network_id: Option<&'a str>,
    pub labels: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct VolumeSpec<'a> {
    pub name: &'a str,
    pub size_gb: u32,
    pub region: &'a str,
    pub labels: Vec<(String, String)>,
}

/// One implementation per IaaS (`spec.md` §9: "the provider driver is a
/// capability interface; each IaaS is a separate implementation selected
/// by the cluster's `provider` field"). Every method call is expected to
/// retry transient failures internally per `spec.md` §4.2's backoff policy
/// and to adopt an already-existing resource as success rather than error.
#[async_trait]
pub trait ProviderDriver: Send + Sync {
    async fn ensure_ssh_key(&self, cluster_id: &str, name: &str, public_key: &str) -> Result<SshKeyHandle>;
    async fn delete_ssh_key(&self, provider_id: &str) -> Result<()>;
    async fn ensure_firewall(&self, cluster_id: &str, name: &str) -> Result<FirewallHandle>;
    async fn create_network(&self, cluster_id: &str, name: &str) -> Result<NetworkHandle>;
    async fn create_server(&self, spec: ServerSpec<'_>) -> Result<ServerHandle>;
    async fn delete_server(&self, provider_id: &str) -> Result<()>;
    async fn list_servers_by_label(&self, cluster_id: &str) -> Result<Vec<ServerHandle>>;
    async fn server_status(&self, provider_id: &str) -> Result<ServerState>;
    async fn create_volume(&self, spec: VolumeSpec<'_>) -> Result<VolumeHandle>;
    async fn delete_volume(&self, provider_id: &str) -> Result<()>;
    async fn attach_volume(&self, volume_id: &str, server_id: &str) -> Result<()>;
    async fn detach_volume(&self, volume_id: &str) -> Result<()>;
    async fn delete_network(&self, provider_id: &str) -> Result<()>;
    async fn delete_firewall(&self, provider_id: &str) -> Result<()>;
}
