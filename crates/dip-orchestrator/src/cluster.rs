//! C8: the cluster lifecycle state machine. `create` drives a cluster from
//! `pending` through every provisioning step to `running` (or `failed`);
//! `delete` tears one down again. Both run on the cluster's own worker task
//! (`spec.md` §4.8), so nothing here needs its own locking.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use uuid::Uuid;

use dip_core::domain::PoolSize;
use dip_core::{Error, Result, Status};
use dip_provider::{labels, ProviderDriver, ServerSpec};
use dip_remote::RemoteSession;
use dip_templates::TemplateId;

use crate::context::Deps;
use crate::requests::{ClusterCreateRequest, PoolRequest};
use crate::{keypair, validation};

const CONTROL_PLANE_POOL_NAME: &str = "control-plane";
const HETZNER_CSI_VERSION: &str = "2.6.0";
const CERT_MANAGER_CHART_REPO: &str = "https://charts.jetstack.io";
const CERT_MANAGER_CHART_NAME: &str = "cert-manager";
const CERT_MANAGER_NAMESPACE: &str = "cert-manager";
/// Nodes are bootstrapped 4-at-a-time within a pool (`spec.md` §5): enough
/// parallelism to not serialize an entire pool's SSH round-trips, while
/// bounding how many cloud-init/k3s joins hit the control plane at once.
const POOL_BOOTSTRAP_CONCURRENCY: usize = 4;

async fn fail(deps: &Arc<Deps>, cluster_id: Uuid, step: &str, err: Error) -> Error {
    tracing::error!(%cluster_id, step, error = %err, "cluster create/delete step failed");
    let message = format!("{step}: {err}");
    if let Err(e) = deps.store.update_cluster_status(cluster_id, Status::Failed, Some(&message), None).await {
        tracing::error!(%cluster_id, error = %e, "failed to record cluster failure status");
    }
    err
}

pub async fn create(deps: &Arc<Deps>, cluster_id: Uuid, request: &ClusterCreateRequest) -> Result<()> {
    if let Err(e) = create_inner(deps, cluster_id, request).await {
        return Err(fail(deps, cluster_id, "create", e).await);
    }
    Ok(())
}

async fn create_inner(deps: &Arc<Deps>, cluster_id: Uuid, request: &ClusterCreateRequest) -> Result<()> {
    deps.store.update_cluster_status(cluster_id, Status::Creating, None, None).await?;
    let cluster_row = deps.store.get_cluster_row(cluster_id).await?;
    let driver = deps.provider_factory.build(cluster_row.provider, &cluster_row.provider_credentials).await?;

    let control_plane_request = request
        .pools
        .iter()
        .find(|p| p.name == CONTROL_PLANE_POOL_NAME)
        .ok_or_else(|| Error::validation("cluster requires a pool named 'control-plane'"))?;

    let resource_name = format!("dip-{cluster_id}");
    let keys = keypair::generate()?;
    let ssh_key = driver.ensure_ssh_key(&cluster_id.to_string(), &resource_name, &keys.public_key_openssh).await?;
    let firewall = driver.ensure_firewall(&cluster_id.to_string(), &resource_name).await?;
    let network = driver.create_network(&cluster_id.to_string(), &resource_name).await?;
    deps.store.set_cluster_ssh_key(cluster_id, &keys.private_key_pem).await?;
    deps.store
        .set_cluster_shared_resource_ids(
            cluster_id,
            Some(&ssh_key.provider_id),
            Some(&firewall.provider_id),
            Some(&network.provider_id),
        )
        .await?;

    let keyfile = tempfile::Builder::new()
        .tempfile()
        .map_err(|e| Error::Internal(format!("failed to create temp file for ssh key: {e}")))?;
    write_private_key(&keyfile, &keys.private_key_pem)?;

    let control_plane_size = validation::validate_pool_size(
        control_plane_request.number_of_nodes.as_deref(),
        control_plane_request.autoscaling.as_ref().map(|a| a.min),
        control_plane_request.autoscaling.as_ref().map(|a| a.max),
    )?;
    if control_plane_size != (PoolSize::Fixed { count: 1 }) {
        return Err(Error::validation("the control-plane pool must be a fixed size of exactly 1 node"));
    }
    deps.store
        .create_pool(
            Uuid::new_v4(),
            cluster_id,
            CONTROL_PLANE_POOL_NAME,
            &control_plane_request.node_type,
            &control_plane_request.region,
            true,
            control_plane_size,
        )
        .await?;

    let control_plane_server_name = format!("dip-{cluster_id}-{CONTROL_PLANE_POOL_NAME}-0");
    let cloud_init = deps.renderer.render(
        TemplateId::CloudInitControlPlane,
        &serde_json::json!({
            "server_name": control_plane_server_name,
            "k3s_version": request.k3s_version,
            "pool_name": CONTROL_PLANE_POOL_NAME,
            "cluster_id": cluster_id,
        }),
    )?;
    let control_plane_server = driver
        .create_server(ServerSpec {
            name: &control_plane_server_name,
            server_type: &control_plane_request.node_type,
            region: &control_plane_request.region,
            user_data: &cloud_init,
            ssh_key_id: &ssh_key.provider_id,
            network_id: Some(&network.provider_id),
            labels: labels::server_labels(&cluster_id.to_string(), labels::ROLE_CONTROL_PLANE, CONTROL_PLANE_POOL_NAME),
        })
        .await?;
    let control_plane_ip = control_plane_server
        .public_ip
        .ok_or_else(|| Error::Provider("control-plane server has no public IPv4 address".to_string()))?;

    let session = RemoteSession::connect(&control_plane_ip, keyfile.path()).await?;
    dip_remote::wait_for_cloud_init(&session).await?;
    dip_remote::install_control_plane(&session, &request.k3s_version, CONTROL_PLANE_POOL_NAME).await?;
    if !dip_remote::wait_for_k3s_ready(&session, "k3s").await? {
        return Err(Error::Provider("k3s server did not become ready within the readiness budget".to_string()));
    }
    let node_token = dip_remote::fetch_node_token(&session).await?;
    let raw_kubeconfig = dip_remote::fetch_kubeconfig(&session).await?;
    session.close().await?;

    let kubeconfig = raw_kubeconfig.replace("127.0.0.1", &control_plane_ip);
    deps.store.set_cluster_kubeconfig(cluster_id, &kubeconfig).await?;
    deps.store.update_cluster_status(cluster_id, Status::Creating, None, Some(&control_plane_ip)).await?;

    create_worker_pools(
        deps,
        cluster_id,
        request,
        &control_plane_ip,
        &node_token,
        &network.provider_id,
        &ssh_key.provider_id,
        keyfile.path(),
        driver.as_ref(),
    )
    .await?;

    let kube = deps.kube.connect(&kubeconfig).await?;
    let csi_manifest = deps.renderer.render(
        TemplateId::HetznerCsi,
        &serde_json::json!({
            "cluster_id": cluster_id,
            "hcloud_token": cluster_row.provider_credentials,
            "csi_version": HETZNER_CSI_VERSION,
        }),
    )?;
    kube.apply_bundle(&csi_manifest, Some("kube-system")).await?;

    if request.additional_components.traefik_dashboard.enabled {
        install_traefik_dashboard(deps, cluster_id, request, &kubeconfig, kube.as_ref()).await?;
    }

    if let Some(domain) = &request.domain {
        install_cert_manager(deps, cluster_id, domain, &kubeconfig).await?;
    }

    deps.store.update_cluster_status(cluster_id, Status::Running, None, Some(&control_plane_ip)).await?;
    Ok(())
}

fn write_private_key(file: &tempfile::NamedTempFile, private_key_pem: &str) -> Result<()> {
    use std::io::Write as _;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = file.as_file().metadata().map_err(|e| Error::Internal(e.to_string()))?.permissions();
        perms.set_mode(0o600);
        file.as_file().set_permissions(perms).map_err(|e| Error::Internal(e.to_string()))?;
    }
    file.as_file()
        .write_all(private_key_pem.as_bytes())
        .map_err(|e| Error::Internal(format!("failed to write ssh private key to temp file: {e}")))
}

#[allow(clippy::too_many_arguments)]
async fn create_worker_pools(
    deps: &Arc<Deps>,
    cluster_id: Uuid,
    request: &ClusterCreateRequest,
    control_plane_ip: &str,
    node_token: &str,
    network_provider_id: &str,
    ssh_key_provider_id: &str,
    keyfile_path: &std::path::Path,
    driver: &dyn ProviderDriver,
) -> Result<()> {
    for pool in request.pools.iter().filter(|p| p.name != CONTROL_PLANE_POOL_NAME) {
        let size = validation::validate_pool_size(
            pool.number_of_nodes.as_deref(),
            pool.autoscaling.as_ref().map(|a| a.min),
            pool.autoscaling.as_ref().map(|a| a.max),
        )?;
        deps.store
            .create_pool(Uuid::new_v4(), cluster_id, &pool.name, &pool.node_type, &pool.region, false, size)
            .await?;

        let initial_count = match size {
            PoolSize::Fixed { count } => count,
            PoolSize::Autoscaling { min, .. } => min.max(1),
        };

        let results: Vec<Result<()>> = stream::iter(0..initial_count)
            .map(|idx| {
                let pool = pool.clone();
                let request = request.clone();
                async move {
                    bootstrap_worker_node(
                        deps,
                        cluster_id,
                        &request,
                        &pool,
                        idx,
                        control_plane_ip,
                        node_token,
                        network_provider_id,
                        ssh_key_provider_id,
                        keyfile_path,
                        driver,
                    )
                    .await
                }
            })
            .buffer_unordered(POOL_BOOTSTRAP_CONCURRENCY)
            .collect()
            .await;
        for r in results {
            r?;
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn bootstrap_worker_node(
    deps: &Arc<Deps>,
    cluster_id: Uuid,
    request: &ClusterCreateRequest,
    pool: &PoolRequest,
    idx: u32,
    control_plane_ip: &str,
    node_token: &str,
    network_provider_id: &str,
    ssh_key_provider_id: &str,
    keyfile_path: &std::path::Path,
    driver: &dyn ProviderDriver,
) -> Result<()> {
    let server_name = format!("dip-{cluster_id}-{}-{idx}", pool.name);
    let cloud_init = deps.renderer.render(
        TemplateId::CloudInitWorker,
        &serde_json::json!({
            "server_name": server_name,
            "k3s_version": request.k3s_version,
            "control_plane_ip": control_plane_ip,
            "join_token": node_token,
            "pool_name": pool.name,
            "cluster_id": cluster_id,
        }),
    )?;
    let server = driver
        .create_server(ServerSpec {
            name: &server_name,
            server_type: &pool.node_type,
            region: &pool.region,
            user_data: &cloud_init,
            ssh_key_id: ssh_key_provider_id,
            network_id: Some(network_provider_id),
            labels: labels::server_labels(&cluster_id.to_string(), labels::ROLE_WORKER, &pool.name),
        })
        .await?;
    let ip = server
        .public_ip
        .ok_or_else(|| Error::Provider(format!("worker server '{server_name}' has no public IPv4 address")))?;

    let session = RemoteSession::connect(&ip, keyfile_path).await?;
    dip_remote::wait_for_cloud_init(&session).await?;
    dip_remote::install_worker(&session, &request.k3s_version, &pool.name, control_plane_ip, node_token).await?;
    if !dip_remote::wait_for_k3s_ready(&session, "k3s-agent").await? {
        return Err(Error::Provider(format!("worker '{server_name}' did not become ready within the readiness budget")));
    }
    session.close().await?;
    Ok(())
}

async fn install_traefik_dashboard(
    deps: &Arc<Deps>,
    cluster_id: Uuid,
    request: &ClusterCreateRequest,
    _kubeconfig: &str,
    kube: &dyn dip_kube::KubeGateway,
) -> Result<()> {
    let dashboard = &request.additional_components.traefik_dashboard;
    let username = dashboard
        .username
        .as_deref()
        .ok_or_else(|| Error::validation("traefik dashboard requires a username"))?;
    let password = dashboard
        .password
        .as_deref()
        .ok_or_else(|| Error::validation("traefik dashboard requires a password"))?;
    let domain = request
        .domain
        .as_deref()
        .ok_or_else(|| Error::validation("traefik dashboard requires the cluster to have a domain"))?;

    let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| Error::Internal(format!("failed to hash traefik dashboard password: {e}")))?;
    let secret_name = "dip-traefik-dashboard-auth".to_string();
    let mut data = std::collections::BTreeMap::new();
    data.insert("users".to_string(), format!("{username}:{hash}"));
    kube.put_secret("kube-system", &secret_name, data).await?;

    let middleware = deps.renderer.render(
        TemplateId::TraefikDashboardMiddleware,
        &serde_json::json!({ "cluster_id": cluster_id, "basic_auth_secret_name": secret_name }),
    )?;
    kube.apply_bundle(&middleware, Some("kube-system")).await?;

    let ingressroute = deps.renderer.render(
        TemplateId::TraefikDashboardIngressRoute,
        &serde_json::json!({
            "cluster_id": cluster_id,
            "dashboard_host": format!("traefik.{domain}"),
            "tls_enabled": true,
        }),
    )?;
    kube.apply_bundle(&ingressroute, Some("kube-system")).await?;
    Ok(())
}

async fn install_cert_manager(deps: &Arc<Deps>, cluster_id: Uuid, domain: &str, kubeconfig: &str) -> Result<()> {
    let chart = dip_helm::ChartRef::Remote { repo: CERT_MANAGER_CHART_REPO, chart: CERT_MANAGER_CHART_NAME, version: None };
    let values_yaml = "installCRDs: true\n";
    deps.helm
        .install_or_upgrade(CERT_MANAGER_CHART_NAME, CERT_MANAGER_NAMESPACE, &chart, values_yaml, kubeconfig)
        .await?;

    let kube = deps.kube.connect(kubeconfig).await?;
    let issuer = deps.renderer.render(
        TemplateId::ClusterIssuer,
        &serde_json::json!({ "cluster_id": cluster_id, "acme_email": format!("admin@{domain}") }),
    )?;
    kube.apply_bundle(&issuer, Some(CERT_MANAGER_NAMESPACE)).await?;
    Ok(())
}

/// Teardown (`spec.md` §4.2's "resources are discovered by label, not by
/// locally stored IDs" — applied here to the servers; the cluster-shared
/// ssh key/firewall/network use the provider IDs recorded at creation,
/// since those three have no per-resource label to discover them by).
pub async fn delete(deps: &Arc<Deps>, cluster_id: Uuid) -> Result<()> {
    deps.store.update_cluster_status(cluster_id, Status::Deleting, None, None).await?;
    let cluster_row = deps.store.get_cluster_row(cluster_id).await?;
    let driver = deps.provider_factory.build(cluster_row.provider, &cluster_row.provider_credentials).await?;

    match driver.list_servers_by_label(&cluster_id.to_string()).await {
        Ok(servers) => {
            for server in servers {
                if let Err(e) = driver.delete_server(&server.provider_id).await {
                    tracing::warn!(%cluster_id, server = %server.name, error = %e, "failed to delete server during teardown");
                }
            }
        }
        Err(e) => tracing::warn!(%cluster_id, error = %e, "failed to list servers for teardown"),
    }

    if let Ok(volumes) = deps.store.list_volumes(cluster_id).await {
        for volume in volumes {
            if let Ok(row) = deps.store.get_volume_row(volume.id).await {
                if let Some(provider_id) = &row.provider_volume_id {
                    if let Err(e) = driver.delete_volume(provider_id).await {
                        tracing::warn!(%cluster_id, volume = %volume.name, error = %e, "failed to delete volume during teardown");
                    }
                }
            }
        }
    }

    if let Some(firewall_id) = &cluster_row.firewall_provider_id {
        if let Err(e) = driver.delete_firewall(firewall_id).await {
            tracing::warn!(%cluster_id, error = %e, "failed to delete firewall during teardown");
        }
    }
    if let Some(network_id) = &cluster_row.network_provider_id {
        if let Err(e) = driver.delete_network(network_id).await {
            tracing::warn!(%cluster_id, error = %e, "failed to delete network during teardown");
        }
    }
    if let Some(ssh_key_id) = &cluster_row.ssh_key_provider_id {
        if let Err(e) = driver.delete_ssh_key(ssh_key_id).await {
            tracing::warn!(%cluster_id, error = %e, "failed to delete ssh key during teardown");
        }
    }

    deps.store.delete_cluster(cluster_id).await
}
