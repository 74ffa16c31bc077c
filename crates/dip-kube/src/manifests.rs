//! Applies a multi-document YAML bundle (the Hetzner CSI manifest, the
//! Traefik dashboard IngressRoute + Middleware, the cert-manager
//! `ClusterIssuer`) against whatever GroupVersionKind each document
//! declares, server-side-apply, the same shape
//! `cluster_manager.rs::execute_apply` uses for applying arbitrary
//! manifests across a cluster fleet.

use dip_core::{Error, Result};
use kube::api::{Api, Patch, PatchParams};
use kube::core::{DynamicObject, GroupVersionKind, TypeMeta};
use kube::{discovery, Client, ResourceExt};

use crate::FIELD_MANAGER;

/// Applies every YAML document in `manifest`, in order. `default_namespace`
/// is used for documents that don't set their own `metadata.namespace`
/// (cluster-scoped kinds ignore it).
pub async fn apply_bundle(client: &Client, manifest: &str, default_namespace: Option<&str>) -> Result<()> {
    let pp = PatchParams::apply(FIELD_MANAGER).force();

    for doc in serde_yaml::Deserializer::from_str(manifest) {
        let obj: DynamicObject = match serde::Deserialize::deserialize(doc) {
            Ok(obj) => obj,
            Err(e) => return Err(Error::Kube(format!("invalid manifest document: {e}"))),
        };

        let type_meta: &TypeMeta = obj
            .types
            .as_ref()
            .ok_or_else(|| Error::Kube(format!("document for '{}' is missing apiVersion/kind", obj.name_any())))?;
        let gvk = GroupVersionKind::try_from(type_meta)
            .map_err(|e| Error::Kube(format!("invalid apiVersion/kind on '{}': {e}", obj.name_any())))?;

        let (api_resource, _caps) = discovery::pinned_kind(client, &gvk)
            .await
            .map_err(|e| Error::Kube(format!("could not discover API resource for {gvk:?}: {e}")))?;

        let name = obj.name_any();
        let namespace = obj.namespace().or_else(|| default_namespace.map(str::to_string));
        let api: Api<DynamicObject> = match &namespace {
            Some(ns) => Api::namespaced_with(client.clone(), ns, &api_resource),
            None => Api::all_with(client.clone(), &api_resource),
        };

        api.patch(&name, &pp, &Patch::Apply(&obj))
            .await
            .map_err(|e| Error::Kube(format!("failed to apply {gvk:?} '{name}': {e}")))?;
    }
    Ok(())
}
