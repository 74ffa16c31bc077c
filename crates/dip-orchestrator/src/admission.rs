//! Synchronous pre-enqueue validation (`spec.md` §4.8: admission runs before
//! a command ever reaches a per-cluster worker, so a request that is
//! rejected here never shows up as a `failed` cluster/deployment). Every
//! check duplicated by the worker itself (`crate::cluster`,
//! `crate::deployment`) is intentional defense in depth, not redundancy to
//! trim — the worker is also exercised directly in tests without going
//! through this module.

use uuid::Uuid;

use dip_catalog::{validate_config, Catalog};
use dip_core::domain::{AccessEndpoint, PoolSize};
use dip_core::{Error, Result};
use dip_store::Store;

use crate::requests::{ClusterCreateRequest, DeploymentCreateRequest, VolumeCreateRequest};
use crate::validation;

/// `spec.md` §3's Pool invariant requires exactly one control-plane node;
/// since `PoolRequest` carries no `is_control_plane` flag, the wire
/// contract is that the caller names that pool `"control-plane"`.
pub const CONTROL_PLANE_POOL_NAME: &str = "control-plane";

pub fn admit_cluster_create(request: &ClusterCreateRequest) -> Result<()> {
    validation::validate_dns_label("name", &request.name)?;

    if !request.provider.is_implemented() {
        return Err(Error::validation(format!("provider '{}' has no driver implemented", request.provider)));
    }

    let mut saw_control_plane = false;
    for pool in &request.pools {
        validation::validate_dns_label("pool name", &pool.name)?;
        let size = validation::validate_pool_size(
            pool.number_of_nodes.as_deref(),
            pool.autoscaling.as_ref().map(|a| a.min),
            pool.autoscaling.as_ref().map(|a| a.max),
        )?;
        if pool.name == CONTROL_PLANE_POOL_NAME {
            saw_control_plane = true;
            if size != (PoolSize::Fixed { count: 1 }) {
                return Err(Error::validation("the 'control-plane' pool must be a fixed pool of exactly one node"));
            }
        }
    }
    if !saw_control_plane {
        return Err(Error::validation("pools must include exactly one pool named 'control-plane'"));
    }

    let dashboard = &request.additional_components.traefik_dashboard;
    if dashboard.enabled {
        if dashboard.username.is_none() || dashboard.password.is_none() {
            return Err(Error::validation("traefik_dashboard requires a username and password when enabled"));
        }
        if request.domain.is_none() {
            return Err(Error::validation("traefik_dashboard requires the cluster to have a domain configured"));
        }
    }

    Ok(())
}

pub async fn admit_deployment_write(
    store: &Store,
    catalog: &Catalog,
    cluster_id: Uuid,
    request: &DeploymentCreateRequest,
) -> Result<()> {
    validation::validate_dns_label("name", &request.name)?;
    let app = catalog.get(&request.application)?;
    validate_config(app, &request.config).map_err(|errs| Error::validation(errs.join("; ")))?;

    let cluster = store.get_cluster(cluster_id).await?;
    if let Some(pool_name) = &request.bound_pool {
        store.get_pool_by_name(cluster_id, pool_name).await?;
    }

    for descriptor_ep in &app.access_endpoints {
        let override_req = request.endpoints.iter().find(|e| e.name == descriptor_ep.name);
        let (access_type, value, enabled) = match override_req {
            Some(r) => (r.access_type, r.value.clone(), r.enabled),
            None => (descriptor_ep.default_access_type, descriptor_ep.default_value.clone(), true),
        };
        if !enabled {
            if descriptor_ep.required {
                return Err(Error::validation(format!(
                    "endpoint '{}' is required and cannot be disabled",
                    descriptor_ep.name
                )));
            }
            continue;
        }
        validation::validate_endpoint_access_type(access_type, cluster.domain.as_deref())?;
        let normalized = AccessEndpoint::normalized(descriptor_ep.name.clone(), access_type, &value);
        if store.endpoint_value_in_use(cluster_id, normalized.access_type, &normalized.value).await? {
            return Err(Error::conflict(format!(
                "endpoint value '{}' is already in use on this cluster",
                normalized.value
            )));
        }
    }

    for req_def in &app.volume_requirements {
        let binding_req = request
            .volumes
            .iter()
            .find(|v| v.requirement_name == req_def.name)
            .ok_or_else(|| Error::validation(format!("volume requirement '{}' must be bound", req_def.name)))?;
        if let Some(existing_id) = binding_req.existing_volume_id {
            let volume = store.get_volume(existing_id).await?;
            if volume.cluster_id != cluster_id {
                return Err(Error::validation("existing_volume_id does not belong to this cluster"));
            }
            if volume.in_use {
                return Err(Error::conflict(format!("volume '{}' is already bound to a deployment", volume.name)));
            }
        } else {
            let size_gb = binding_req.new_volume_size_gb.unwrap_or(req_def.default_size_gb);
            validation::validate_volume_size(size_gb)?;
        }
    }

    Ok(())
}

/// Pre-enqueue validation for a deployment *update*, distinct from
/// [`admit_deployment_write`]: an update's own current endpoint values and
/// volume bindings are still on the deployment's row at the time this runs
/// (the worker only clears and re-checks them once it picks the command
/// up), so re-running the create-time uniqueness/in-use checks here would
/// reject a request that doesn't actually change a value. Name, config
/// schema, and referential checks (cluster/pool/application exist) are
/// cheap and safe to repeat; endpoint and volume admission for an update is
/// left entirely to `crate::deployment::update`'s clear-then-check order.
pub async fn admit_deployment_update(
    store: &Store,
    catalog: &Catalog,
    cluster_id: Uuid,
    request: &DeploymentCreateRequest,
) -> Result<()> {
    validation::validate_dns_label("name", &request.name)?;
    let app = catalog.get(&request.application)?;
    validate_config(app, &request.config).map_err(|errs| Error::validation(errs.join("; ")))?;

    store.get_cluster(cluster_id).await?;
    if let Some(pool_name) = &request.bound_pool {
        store.get_pool_by_name(cluster_id, pool_name).await?;
    }

    Ok(())
}

pub fn admit_volume_create(request: &VolumeCreateRequest) -> Result<()> {
    validation::validate_dns_label("name", &request.name)?;
    validation::validate_volume_size(request.size_gb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::{AdditionalComponentsRequest, PoolRequest, ProviderConfigRequest, TraefikDashboardRequest};

    fn base_request() -> ClusterCreateRequest {
        ClusterCreateRequest {
            name: "prod".to_string(),
            provider: dip_core::Provider::Hetzner,
            provider_config: ProviderConfigRequest { api_token: "x".to_string() },
            k3s_version: "v1.32.3+k3s1".to_string(),
            domain: None,
            pools: vec![PoolRequest {
                name: CONTROL_PLANE_POOL_NAME.to_string(),
                node_type: "cx22".to_string(),
                region: "nbg1".to_string(),
                number_of_nodes: Some("1".to_string()),
                autoscaling: None,
            }],
            additional_components: AdditionalComponentsRequest::default(),
        }
    }

    #[test]
    fn requires_a_control_plane_pool() {
        let mut req = base_request();
        req.pools.clear();
        assert!(admit_cluster_create(&req).is_err());
    }

    #[test]
    fn control_plane_pool_must_be_exactly_one_node() {
        let mut req = base_request();
        req.pools[0].number_of_nodes = Some("2".to_string());
        assert!(admit_cluster_create(&req).is_err());
    }

    #[test]
    fn digitalocean_is_rejected() {
        let mut req = base_request();
        req.provider = dip_core::Provider::DigitalOcean;
        assert!(admit_cluster_create(&req).is_err());
    }

    #[test]
    fn valid_request_is_admitted() {
        assert!(admit_cluster_create(&base_request()).is_ok());
    }

    #[test]
    fn dashboard_enabled_requires_credentials_and_domain() {
        let mut req = base_request();
        req.additional_components.traefik_dashboard = TraefikDashboardRequest { enabled: true, username: None, password: None };
        assert!(admit_cluster_create(&req).is_err());

        req.additional_components.traefik_dashboard =
            TraefikDashboardRequest { enabled: true, username: Some("a".to_string()), password: Some("b".to_string()) };
        assert!(admit_cluster_create(&req).is_err());

        req.domain = Some("example.com".to_string());
        assert!(admit_cluster_create(&req).is_ok());
    }
}
