//! Deployment lifecycle (C9): install/upgrade/uninstall an application into
//! an already-running cluster. Runs on the same per-cluster worker as C8
//! (`spec.md` §4.8), so every store read in here sees a consistent view of
//! the cluster's pools and volumes without any locking of its own.

use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use dip_catalog::{validate_config, ApplicationDescriptor};
use dip_core::domain::{AccessEndpoint, VolumeBinding};
use dip_core::{Error, Result, Status};
use dip_helm::HelmFailure;
use dip_kube::KubeGateway;
use dip_store::rows::VolumeRow;

use crate::apps::{self, InstallPlan, RenderInputs};
use crate::context::Deps;
use crate::requests::{DeploymentCreateRequest, VolumeCreateRequest};
use crate::{validation, volume};

const STORAGE_CLASS: &str = "hcloud-volumes";

fn slug(deployment_id: Uuid) -> String {
    format!("dip-{}", deployment_id.simple())
}

async fn fail(deps: &Arc<Deps>, deployment_id: Uuid, step: &str, err: Error) -> Error {
    tracing::error!(%deployment_id, step, error = %err, "deployment operation failed");
    // The row may not exist yet if the failure happened before `create_deployment`
    // ran (pure validation error on a brand-new deployment).
    let _ = deps.store.update_deployment_status(deployment_id, Status::Failed, Some(&err.to_string())).await;
    err
}

pub async fn create(deps: &Arc<Deps>, cluster_id: Uuid, deployment_id: Uuid, request: &DeploymentCreateRequest) -> Result<()> {
    if let Err(e) = create_inner(deps, cluster_id, deployment_id, request).await {
        return Err(fail(deps, deployment_id, "create", e).await);
    }
    Ok(())
}

async fn create_inner(deps: &Arc<Deps>, cluster_id: Uuid, deployment_id: Uuid, request: &DeploymentCreateRequest) -> Result<()> {
    validation::validate_dns_label("name", &request.name)?;
    let app = deps.catalog.get(&request.application)?;
    validate_config(app, &request.config).map_err(|errs| Error::validation(errs.join("; ")))?;

    let cluster = deps.store.get_cluster(cluster_id).await?;
    let cluster_row = deps.store.get_cluster_row(cluster_id).await?;
    let kubeconfig = cluster_row
        .kubeconfig
        .ok_or_else(|| Error::validation("cluster is not ready to accept deployments"))?;

    if let Some(pool_name) = &request.bound_pool {
        deps.store.get_pool_by_name(cluster_id, pool_name).await?;
    }

    let endpoints = resolve_endpoints(app, &cluster, request)?;
    for ep in &endpoints {
        if deps.store.endpoint_value_in_use(cluster_id, ep.access_type, &ep.value).await? {
            return Err(Error::conflict(format!("endpoint value '{}' is already in use on this cluster", ep.value)));
        }
    }

    let namespace = slug(deployment_id);
    let helm_release_name = slug(deployment_id);

    deps.store
        .create_deployment(deployment_id, cluster_id, &request.name, &request.application, &namespace, &helm_release_name, request.bound_pool.as_deref(), &request.config)
        .await?;
    deps.store.update_deployment_status(deployment_id, Status::Deploying, None).await?;

    let kube = deps.kube.connect(&kubeconfig).await?;
    kube.ensure_namespace(&namespace).await?;

    let (bindings, pvc_names) = resolve_volumes(deps, cluster_id, deployment_id, &namespace, app, request, kube.as_ref()).await?;

    let dags_ssh_secret_name = dags_ssh_secret_name(app, request, &namespace);
    let pull_secret_name = pull_secret_name(app, request, &namespace);

    let inputs = RenderInputs {
        release_name: &helm_release_name,
        namespace: &namespace,
        cluster: &cluster,
        config: &request.config,
        endpoints: &endpoints,
        volume_pvc_names: &pvc_names,
        dags_ssh_secret_name: dags_ssh_secret_name.as_deref(),
        pull_secret_name: pull_secret_name.as_deref(),
    };
    let plan = apps::build_plan(&deps.renderer, &request.application, &inputs)?;
    install(deps, &helm_release_name, &namespace, &plan, &kubeconfig, kube.as_ref()).await?;

    for ep in &endpoints {
        deps.store.add_endpoint(deployment_id, ep).await?;
    }
    for binding in &bindings {
        deps.store.add_volume_binding(deployment_id, binding).await?;
    }

    deps.store.update_deployment_status(deployment_id, Status::Running, None).await?;
    Ok(())
}

pub async fn update(deps: &Arc<Deps>, cluster_id: Uuid, deployment_id: Uuid, request: &DeploymentCreateRequest) -> Result<()> {
    if let Err(e) = update_inner(deps, cluster_id, deployment_id, request).await {
        return Err(fail(deps, deployment_id, "update", e).await);
    }
    Ok(())
}

async fn update_inner(deps: &Arc<Deps>, cluster_id: Uuid, deployment_id: Uuid, request: &DeploymentCreateRequest) -> Result<()> {
    validation::validate_dns_label("name", &request.name)?;
    let existing = deps.store.get_deployment(deployment_id).await?;
    if existing.application != request.application {
        return Err(Error::validation("a deployment's application cannot be changed after creation"));
    }

    let app = deps.catalog.get(&request.application)?;
    validate_config(app, &request.config).map_err(|errs| Error::validation(errs.join("; ")))?;

    let cluster = deps.store.get_cluster(cluster_id).await?;
    let cluster_row = deps.store.get_cluster_row(cluster_id).await?;
    let kubeconfig = cluster_row
        .kubeconfig
        .ok_or_else(|| Error::validation("cluster is not ready to accept deployments"))?;

    if let Some(pool_name) = &request.bound_pool {
        deps.store.get_pool_by_name(cluster_id, pool_name).await?;
    }

    deps.store.update_deployment_status(deployment_id, Status::Updating, None).await?;

    // Clear first so re-binding a value/volume this same deployment already
    // held doesn't trip the uniqueness/in-use checks below.
    deps.store.clear_endpoints(deployment_id).await?;
    deps.store.clear_volume_bindings(deployment_id).await?;

    let endpoints = resolve_endpoints(app, &cluster, request)?;
    for ep in &endpoints {
        if deps.store.endpoint_value_in_use(cluster_id, ep.access_type, &ep.value).await? {
            return Err(Error::conflict(format!("endpoint value '{}' is already in use on this cluster", ep.value)));
        }
    }

    let kube = deps.kube.connect(&kubeconfig).await?;
    kube.ensure_namespace(&existing.namespace).await?;

    let (bindings, pvc_names) =
        resolve_volumes(deps, cluster_id, deployment_id, &existing.namespace, app, request, kube.as_ref()).await?;

    let dags_ssh_secret_name = dags_ssh_secret_name(app, request, &existing.namespace);
    let pull_secret_name = pull_secret_name(app, request, &existing.namespace);

    let inputs = RenderInputs {
        release_name: &existing.helm_release_name,
        namespace: &existing.namespace,
        cluster: &cluster,
        config: &request.config,
        endpoints: &endpoints,
        volume_pvc_names: &pvc_names,
        dags_ssh_secret_name: dags_ssh_secret_name.as_deref(),
        pull_secret_name: pull_secret_name.as_deref(),
    };
    let plan = apps::build_plan(&deps.renderer, &request.application, &inputs)?;
    install(deps, &existing.helm_release_name, &existing.namespace, &plan, &kubeconfig, kube.as_ref()).await?;

    deps.store.update_deployment_fields(deployment_id, &request.name, &request.config).await?;
    for ep in &endpoints {
        deps.store.add_endpoint(deployment_id, ep).await?;
    }
    for binding in &bindings {
        deps.store.add_volume_binding(deployment_id, binding).await?;
    }

    deps.store.update_deployment_status(deployment_id, Status::Running, None).await?;
    Ok(())
}

pub async fn delete(deps: &Arc<Deps>, cluster_id: Uuid, deployment_id: Uuid) -> Result<()> {
    let existing = deps.store.get_deployment(deployment_id).await?;
    deps.store.update_deployment_status(deployment_id, Status::Deleting, None).await?;

    let cluster_row = deps.store.get_cluster_row(cluster_id).await?;
    if let Some(kubeconfig) = cluster_row.kubeconfig {
        if existing.application != "spark" {
            if let Err(e) = deps.helm.uninstall(&existing.helm_release_name, &existing.namespace, &kubeconfig).await {
                tracing::warn!(%deployment_id, error = %e, "helm uninstall failed, deleting namespace anyway");
            }
        }
        let kube = deps.kube.connect(&kubeconfig).await?;
        if let Err(e) = kube.delete_namespace(&existing.namespace).await {
            tracing::warn!(%deployment_id, error = %e, "failed to delete deployment namespace");
        }
        for binding in &existing.volumes {
            let pv_name = format!("pv-{}", binding.volume_name);
            if let Err(e) = kube.delete_volume_pv(&pv_name).await {
                tracing::warn!(%deployment_id, pv_name, error = %e, "failed to delete static pv");
            }
        }
    }

    deps.store.delete_deployment(deployment_id).await
}

/// §4.7/§4.9: every descriptor endpoint is included unless the caller
/// explicitly disabled it, using the descriptor's default access type/value
/// when the caller didn't override it. A required endpoint cannot be
/// disabled.
fn resolve_endpoints(
    app: &ApplicationDescriptor,
    cluster: &dip_core::domain::Cluster,
    request: &DeploymentCreateRequest,
) -> Result<Vec<AccessEndpoint>> {
    let mut resolved = Vec::with_capacity(app.access_endpoints.len());
    for descriptor_ep in &app.access_endpoints {
        let override_req = request.endpoints.iter().find(|e| e.name == descriptor_ep.name);
        let (access_type, value, enabled) = match override_req {
            Some(r) => (r.access_type, r.value.clone(), r.enabled),
            None => (descriptor_ep.default_access_type, descriptor_ep.default_value.clone(), true),
        };
        if !enabled {
            if descriptor_ep.required {
                return Err(Error::validation(format!("endpoint '{}' is required and cannot be disabled", descriptor_ep.name)));
            }
            continue;
        }
        validation::validate_endpoint_access_type(access_type, cluster.domain.as_deref())?;
        resolved.push(AccessEndpoint::normalized(descriptor_ep.name.clone(), access_type, &value));
    }
    Ok(resolved)
}

/// Resolves every volume requirement the application descriptor lists into
/// a bound, backing Hetzner volume and its static PV/PVC pair (`spec.md`
/// §3: "Deployments do not own Volumes; they hold a named reference", so an
/// existing volume is statically bound rather than re-provisioned).
async fn resolve_volumes(
    deps: &Arc<Deps>,
    cluster_id: Uuid,
    deployment_id: Uuid,
    namespace: &str,
    app: &ApplicationDescriptor,
    request: &DeploymentCreateRequest,
    kube: &dyn KubeGateway,
) -> Result<(Vec<VolumeBinding>, BTreeMap<String, String>)> {
    let mut bindings = Vec::with_capacity(app.volume_requirements.len());
    let mut pvc_names = BTreeMap::new();

    for req_def in &app.volume_requirements {
        let binding_req = request
            .volumes
            .iter()
            .find(|v| v.requirement_name == req_def.name)
            .ok_or_else(|| Error::validation(format!("volume requirement '{}' must be bound", req_def.name)))?;

        let volume_row: VolumeRow = if let Some(existing_id) = binding_req.existing_volume_id {
            let row = deps.store.get_volume_row(existing_id).await?;
            if row.cluster_id != cluster_id {
                return Err(Error::validation("existing_volume_id does not belong to this cluster"));
            }
            if row.in_use {
                return Err(Error::conflict(format!("volume '{}' is already bound to a deployment", row.name)));
            }
            row
        } else {
            let size_gb = binding_req.new_volume_size_gb.unwrap_or(req_def.default_size_gb);
            validation::validate_volume_size(size_gb)?;
            let volume_id = Uuid::new_v4();
            let name = format!("{}-{}", slug(deployment_id), req_def.name);
            let create_request = VolumeCreateRequest { name, size_gb, description: None };
            volume::create(deps, cluster_id, volume_id, &create_request).await?;
            deps.store.get_volume_row(volume_id).await?
        };

        let provider_volume_id = volume_row
            .provider_volume_id
            .as_deref()
            .ok_or_else(|| Error::Internal(format!("volume '{}' has no provider id", volume_row.name)))?;
        let pv_name = format!("pv-{}", volume_row.name);
        kube.ensure_volume_pv(&pv_name, provider_volume_id, volume_row.size_gb as u32).await?;
        kube.ensure_pvc(namespace, &volume_row.name, STORAGE_CLASS, volume_row.size_gb as u32, Some(&pv_name)).await?;

        bindings.push(VolumeBinding { volume_name: volume_row.name.clone(), mount_path: binding_req.mount_path.clone() });
        pvc_names.insert(req_def.name.clone(), volume_row.name.clone());
    }

    Ok((bindings, pvc_names))
}

/// §4.9: a private DAG repository needs an ssh secret for git-sync to read.
/// No credential transport exists in the config schema for its contents, so
/// the orchestrator only references a deterministic secret name; the
/// operator is expected to have pre-populated it in the deployment's
/// namespace (see `DESIGN.md`'s Open Question entry).
fn dags_ssh_secret_name(app: &ApplicationDescriptor, request: &DeploymentCreateRequest, namespace: &str) -> Option<String> {
    if app.short_name != "airflow" {
        return None;
    }
    let private = matches!(request.config.get("dags_repository_private"), Some(v) if v.to_string().eq_ignore_ascii_case("true"));
    private.then(|| format!("{namespace}-dags-ssh"))
}

/// Same reasoning as [`dags_ssh_secret_name`] for a private custom image
/// registry's pull secret.
fn pull_secret_name(app: &ApplicationDescriptor, request: &DeploymentCreateRequest, namespace: &str) -> Option<String> {
    if app.short_name != "airflow" {
        return None;
    }
    let custom_image = matches!(request.config.get("custom_image_enabled"), Some(v) if v.to_string().eq_ignore_ascii_case("true"));
    custom_image.then(|| format!("{namespace}-pull-secret"))
}

async fn install(
    deps: &Arc<Deps>,
    release: &str,
    namespace: &str,
    plan: &InstallPlan,
    kubeconfig: &str,
    kube: &dyn KubeGateway,
) -> Result<()> {
    match plan {
        InstallPlan::Helm { chart_repo, chart_name, values_yaml } => {
            let chart = apps::chart_ref(chart_repo, chart_name);
            deps.helm.install_or_upgrade(release, namespace, &chart, values_yaml, kubeconfig).await.map_err(helm_err)?;
        }
        InstallPlan::ApplyManifest { manifest } => {
            kube.apply_bundle(manifest, Some(namespace)).await?;
        }
    }
    Ok(())
}

fn helm_err(f: HelmFailure) -> Error {
    f.into()
}

/// Reads the credentials secret an application's Helm chart produced for
/// it, if the chart conventionally writes one (§6's deployment credentials
/// route). Returns `None` rather than an error when no such secret exists,
/// since not every application exposes generated credentials. Serialized
/// only through a read of the deployment row (§4.9: "separate from the
/// mutating pipeline"), not through the per-cluster worker queue, so it
/// goes through `deps.kube` directly rather than via `Command`/`enqueue`.
pub async fn read_credentials(
    deps: &Arc<Deps>,
    cluster_id: Uuid,
    deployment_id: Uuid,
) -> Result<Option<BTreeMap<String, String>>> {
    let deployment = deps.store.get_deployment(deployment_id).await?;
    if deployment.cluster_id != cluster_id {
        return Err(Error::not_found("deployment"));
    }
    if deployment.status != Status::Running {
        return Err(Error::conflict("deployment is not running"));
    }
    let cluster_row = deps.store.get_cluster_row(cluster_id).await?;
    let kubeconfig = cluster_row
        .kubeconfig
        .ok_or_else(|| Error::conflict("cluster is not running"))?;
    let kube = deps.kube.connect(&kubeconfig).await?;
    let secret_name = format!("{}-credentials", deployment.helm_release_name);
    kube.get_secret(&deployment.namespace, &secret_name).await
}
