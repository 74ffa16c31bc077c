use std::collections::BTreeMap;

use async_trait::async_trait;
use dip_core::{Error, Result};
use k8s_openapi::api::core::v1::{
    CSIPersistentVolumeSource, Namespace, PersistentVolume, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeSpec, Pod, ResourceRequirements, Secret,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::{Api, DeleteParams, ListParams, ObjectMeta, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

use crate::manifests;
use crate::FIELD_MANAGER;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PodReadiness {
    pub ready: u32,
    pub total: u32,
}

impl PodReadiness {
    pub fn is_fully_ready(&self) -> bool {
        self.total > 0 && self.ready == self.total
    }
}

/// Typed Kubernetes operations C8/C9 drive a cluster or deployment's
/// lifecycle through. A trait rather than a bare struct so
/// `dip-orchestrator`'s state machine tests can drive a fake
/// implementation instead of a real cluster (`spec.md` §8).
#[async_trait]
pub trait KubeGateway: Send + Sync {
    async fn ensure_namespace(&self, name: &str) -> Result<()>;
    async fn delete_namespace(&self, name: &str) -> Result<()>;

    async fn put_secret(&self, namespace: &str, name: &str, data: BTreeMap<String, String>) -> Result<()>;
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<BTreeMap<String, String>>>;
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<()>;

    /// Statically binds a pre-existing Hetzner volume into the cluster so
    /// it survives any one deployment's lifecycle (`spec.md` §3: a volume
    /// outlives the deployments that bind it). `pv_name` is derived from
    /// the volume's own name, not the deployment's, so the same volume can
    /// be rebound to a different deployment's namespace later.
    async fn ensure_volume_pv(&self, pv_name: &str, provider_volume_id: &str, size_gb: u32) -> Result<()>;
    async fn delete_volume_pv(&self, pv_name: &str) -> Result<()>;

    /// `bind_to_pv` pins the claim to a PV created by [`Self::ensure_volume_pv`]
    /// instead of letting the storage class dynamically provision a new disk.
    async fn ensure_pvc(
        &self,
        namespace: &str,
        name: &str,
        storage_class: &str,
        size_gb: u32,
        bind_to_pv: Option<&str>,
    ) -> Result<()>;
    async fn delete_pvc(&self, namespace: &str, name: &str) -> Result<()>;

    async fn pod_readiness(&self, namespace: &str, label_selector: &str) -> Result<PodReadiness>;

    /// Applies a multi-document manifest bundle (CSI driver, Traefik
    /// dashboard IngressRoute/Middleware, cert-manager ClusterIssuer).
    async fn apply_bundle(&self, manifest: &str, default_namespace: Option<&str>) -> Result<()>;
}

pub struct KubeClientGateway {
    client: Client,
}

impl KubeClientGateway {
    /// Builds a client from the kubeconfig text read back over SSH in C3.
    pub async fn connect(kubeconfig_yaml: &str) -> Result<Self> {
        let kubeconfig = Kubeconfig::from_yaml(kubeconfig_yaml)
            .map_err(|e| Error::Kube(format!("invalid kubeconfig: {e}")))?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| Error::Kube(format!("failed to build kube config: {e}")))?;
        let client = Client::try_from(config).map_err(|e| Error::Kube(format!("failed to build kube client: {e}")))?;
        Ok(Self { client })
    }
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}

#[async_trait]
impl KubeGateway for KubeClientGateway {
    async fn ensure_namespace(&self, name: &str) -> Result<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let ns = Namespace {
            metadata: ObjectMeta { name: Some(name.to_string()), ..Default::default() },
            ..Default::default()
        };
        api.patch(name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&ns))
            .await
            .map_err(|e| Error::Kube(format!("failed to ensure namespace '{name}': {e}")))?;
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(Error::Kube(format!("failed to delete namespace '{name}': {e}"))),
        }
    }

    async fn put_secret(&self, namespace: &str, name: &str, data: BTreeMap<String, String>) -> Result<()> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = Secret {
            metadata: ObjectMeta { name: Some(name.to_string()), namespace: Some(namespace.to_string()), ..Default::default() },
            string_data: Some(data),
            type_: Some("Opaque".to_string()),
            ..Default::default()
        };
        api.patch(name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&secret))
            .await
            .map_err(|e| Error::Kube(format!("failed to put secret '{namespace}/{name}': {e}")))?;
        Ok(())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<BTreeMap<String, String>>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(secret) => {
                let data = secret
                    .data
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(k, v)| (k, String::from_utf8_lossy(&v.0).into_owned()))
                    .collect();
                Ok(Some(data))
            }
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(Error::Kube(format!("failed to get secret '{namespace}/{name}': {e}"))),
        }
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(Error::Kube(format!("failed to delete secret '{namespace}/{name}': {e}"))),
        }
    }

    async fn ensure_volume_pv(&self, pv_name: &str, provider_volume_id: &str, size_gb: u32) -> Result<()> {
        let api: Api<PersistentVolume> = Api::all(self.client.clone());
        let mut capacity = BTreeMap::new();
        capacity.insert("storage".to_string(), Quantity(format!("{size_gb}Gi")));
        let pv = PersistentVolume {
            metadata: ObjectMeta { name: Some(pv_name.to_string()), ..Default::default() },
            spec: Some(PersistentVolumeSpec {
                capacity: Some(capacity),
                access_modes: Some(vec!["ReadWriteOnce".to_string()]),
                persistent_volume_reclaim_policy: Some("Retain".to_string()),
                storage_class_name: Some(String::new()),
                csi: Some(CSIPersistentVolumeSource {
                    driver: "csi.hetzner.cloud".to_string(),
                    volume_handle: provider_volume_id.to_string(),
                    fs_type: Some("ext4".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        api.patch(pv_name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&pv))
            .await
            .map_err(|e| Error::Kube(format!("failed to ensure pv '{pv_name}': {e}")))?;
        Ok(())
    }

    async fn delete_volume_pv(&self, pv_name: &str) -> Result<()> {
        let api: Api<PersistentVolume> = Api::all(self.client.clone());
        match api.delete(pv_name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(Error::Kube(format!("failed to delete pv '{pv_name}': {e}"))),
        }
    }

    async fn ensure_pvc(
        &self,
        namespace: &str,
        name: &str,
        storage_class: &str,
        size_gb: u32,
        bind_to_pv: Option<&str>,
    ) -> Result<()> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        let mut requests = BTreeMap::new();
        requests.insert("storage".to_string(), Quantity(format!("{size_gb}Gi")));
        let storage_class_name = if bind_to_pv.is_some() { String::new() } else { storage_class.to_string() };
        let pvc = PersistentVolumeClaim {
            metadata: ObjectMeta { name: Some(name.to_string()), namespace: Some(namespace.to_string()), ..Default::default() },
            spec: Some(PersistentVolumeClaimSpec {
                access_modes: Some(vec!["ReadWriteOnce".to_string()]),
                storage_class_name: Some(storage_class_name),
                volume_name: bind_to_pv.map(|s| s.to_string()),
                resources: Some(ResourceRequirements { requests: Some(requests), ..Default::default() }),
                ..Default::default()
            }),
            ..Default::default()
        };
        api.patch(name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&pvc))
            .await
            .map_err(|e| Error::Kube(format!("failed to ensure pvc '{namespace}/{name}': {e}")))?;
        Ok(())
    }

    async fn delete_pvc(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(Error::Kube(format!("failed to delete pvc '{namespace}/{name}': {e}"))),
        }
    }

    async fn pod_readiness(&self, namespace: &str, label_selector: &str) -> Result<PodReadiness> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pods = api
            .list(&ListParams::default().labels(label_selector))
            .await
            .map_err(|e| Error::Kube(format!("failed to list pods '{namespace}' ({label_selector}): {e}")))?;

        let total = pods.items.len() as u32;
        let ready = pods
            .items
            .iter()
            .filter(|pod| {
                pod.status
                    .as_ref()
                    .and_then(|s| s.conditions.as_ref())
                    .map(|conditions| conditions.iter().any(|c| c.type_ == "Ready" && c.status == "True"))
                    .unwrap_or(false)
            })
            .count() as u32;
        Ok(PodReadiness { ready, total })
    }

    async fn apply_bundle(&self, manifest: &str, default_namespace: Option<&str>) -> Result<()> {
        manifests::apply_bundle(&self.client, manifest, default_namespace).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_is_fully_ready_requires_nonzero_total() {
        assert!(!PodReadiness { ready: 0, total: 0 }.is_fully_ready());
        assert!(PodReadiness { ready: 3, total: 3 }.is_fully_ready());
        assert!(!PodReadiness { ready: 2, total: 3 }.is_fully_ready());
    }
}
