//! Wiring for everything a worker needs to drive a cluster or deployment
//! through its state machine. One [`Deps`] is shared (via `Arc`) across
//! every per-cluster worker task, mirroring `aion-enterprise`'s
//! `DeploymentOrchestrator` holding its collaborators as `Arc<...>` fields
//! rather than constructing them per call.

use std::sync::Arc;

use async_trait::async_trait;
use dip_catalog::Catalog;
use dip_core::{Error, Provider, Result};
use dip_helm::HelmEngine;
use dip_kube::{KubeClientGateway, KubeGateway};
use dip_provider::hetzner::HetznerDriver;
use dip_provider::ProviderDriver;
use dip_store::Store;
use dip_templates::Renderer;

/// Builds a [`KubeGateway`] from a kubeconfig. A trait (rather than calling
/// `KubeClientGateway::connect` directly) so tests can substitute a fake
/// gateway without a real API server (`spec.md` §8).
#[async_trait]
pub trait KubeConnector: Send + Sync {
    async fn connect(&self, kubeconfig_yaml: &str) -> Result<Arc<dyn KubeGateway>>;
}

pub struct RealKubeConnector;

#[async_trait]
impl KubeConnector for RealKubeConnector {
    async fn connect(&self, kubeconfig_yaml: &str) -> Result<Arc<dyn KubeGateway>> {
        let gateway = KubeClientGateway::connect(kubeconfig_yaml).await?;
        Ok(Arc::new(gateway))
    }
}

/// Builds a [`ProviderDriver`] from a cluster's stored credentials. Each
/// cluster supplies its own Hetzner API token at creation time (`spec.md`
/// §4.2), so the orchestrator can't share one driver instance across
/// clusters the way it shares `helm`/`kube` — a driver is built fresh per
/// cluster operation from the token on that cluster's row.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    async fn build(&self, provider: Provider, credentials: &str) -> Result<Arc<dyn ProviderDriver>>;
}

pub struct RealProviderFactory;

#[async_trait]
impl ProviderFactory for RealProviderFactory {
    async fn build(&self, provider: Provider, credentials: &str) -> Result<Arc<dyn ProviderDriver>> {
        match provider {
            Provider::Hetzner => Ok(Arc::new(HetznerDriver::new(credentials.to_string()))),
            Provider::DigitalOcean => Err(Error::validation("digitalocean has no provider driver implemented")),
        }
    }
}

/// Every collaborator a cluster or deployment worker needs. Held behind an
/// `Arc` by [`crate::registry::WorkerRegistry`] and cloned cheaply into each
/// spawned worker task.
pub struct Deps {
    pub store: Store,
    pub provider_factory: Arc<dyn ProviderFactory>,
    pub helm: Arc<dyn HelmEngine>,
    pub kube: Arc<dyn KubeConnector>,
    pub renderer: Renderer,
    pub catalog: Catalog,
}

impl Deps {
    pub fn new(
        store: Store,
        provider_factory: Arc<dyn ProviderFactory>,
        helm: Arc<dyn HelmEngine>,
        kube: Arc<dyn KubeConnector>,
        renderer: Renderer,
        catalog: Catalog,
    ) -> Self {
        Self { store, provider_factory, helm, kube, renderer, catalog }
    }
}
