//! Per-application render context and install dispatch (§4.9's
//! application-specific policies). Each application descriptor's
//! `short_name` selects one hand-written builder here — there is no
//! generic "merge config into template" path because every application's
//! values shape, volume names and endpoint names are different, the same
//! way the teacher's own catalog/marketplace code special-cases behavior
//! per plugin id rather than trying to generalize it away.

use std::collections::BTreeMap;

use dip_core::domain::{AccessEndpoint, Cluster};
use dip_core::{AccessType, ConfigMap, ConfigValue, Error, Result};
use dip_helm::ChartRef;
use dip_templates::{Renderer, TemplateId};

/// What `dip-helm`/`dip-kube` should do with a rendered application
/// artifact. Spark renders a `SparkCluster` custom resource applied
/// directly (`spec.md` §4.9: "renders a SparkCluster custom resource"),
/// everything else goes through a Helm install-or-upgrade — see
/// `DESIGN.md`'s Open Question entry for why Spark is the one exception.
pub enum InstallPlan {
    Helm { chart_repo: String, chart_name: String, values_yaml: String },
    ApplyManifest { manifest: String },
}

fn config_str(config: &ConfigMap, id: &str) -> Option<String> {
    config.get(id).map(|v| v.to_string())
}

fn config_bool(config: &ConfigMap, id: &str, default: bool) -> bool {
    match config.get(id) {
        Some(ConfigValue::Bool(b)) => *b,
        Some(ConfigValue::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => default,
    }
}

fn config_u32(config: &ConfigMap, id: &str, default: u32) -> u32 {
    match config.get(id) {
        Some(ConfigValue::Number(n)) => *n as u32,
        Some(ConfigValue::String(s)) => s.parse().unwrap_or(default),
        _ => default,
    }
}

/// Resolves where an endpoint is actually reachable, the one place
/// `spec.md` §3's three access types turn into a concrete host/path pair.
/// `Subdomain` routes off a synthesized `<value>.<cluster.domain>` host
/// with no path; the two path-based types keep the endpoint's normalized
/// value as the literal ingress path.
pub fn resolve_host_path(cluster: &Cluster, endpoint: &AccessEndpoint) -> Result<(String, String)> {
    match endpoint.access_type {
        AccessType::Subdomain => {
            let domain = cluster
                .domain
                .as_deref()
                .ok_or_else(|| Error::validation("subdomain endpoints require the cluster to have a domain"))?;
            Ok((format!("{}.{domain}", endpoint.value), "/".to_string()))
        }
        AccessType::DomainPath => {
            let domain = cluster
                .domain
                .as_deref()
                .ok_or_else(|| Error::validation("domain_path endpoints require the cluster to have a domain"))?;
            Ok((domain.to_string(), endpoint.value.clone()))
        }
        AccessType::ClusterIpPath => {
            let ip = cluster
                .access_ip
                .as_deref()
                .ok_or_else(|| Error::validation("cluster_ip_path endpoints require a provisioned cluster"))?;
            Ok((ip.to_string(), endpoint.value.clone()))
        }
    }
}

fn endpoint_by_name<'a>(endpoints: &'a [AccessEndpoint], name: &str) -> Option<&'a AccessEndpoint> {
    endpoints.iter().find(|e| e.name == name)
}

/// Everything an application's render context needs beyond the user's own
/// config: the resolved PVC name per volume requirement, the helm release/
/// namespace pair, and (for Airflow) the pull-secret/ssh-secret names
/// materialized earlier in the deployment pipeline.
pub struct RenderInputs<'a> {
    pub release_name: &'a str,
    pub namespace: &'a str,
    pub cluster: &'a Cluster,
    pub config: &'a ConfigMap,
    pub endpoints: &'a [AccessEndpoint],
    /// requirement name -> PVC name
    pub volume_pvc_names: &'a BTreeMap<String, String>,
    pub dags_ssh_secret_name: Option<&'a str>,
    pub pull_secret_name: Option<&'a str>,
}

pub fn build_plan(renderer: &Renderer, app: &str, inputs: &RenderInputs<'_>) -> Result<InstallPlan> {
    match app {
        "airflow" => build_airflow(renderer, inputs),
        "spark" => build_spark(renderer, inputs),
        "grafana" => build_grafana(renderer, inputs),
        "prefect" => build_prefect(renderer, inputs),
        other => Err(Error::validation(format!("unknown application '{other}'"))),
    }
}

fn pvc_name(inputs: &RenderInputs<'_>, requirement: &str) -> Result<String> {
    inputs
        .volume_pvc_names
        .get(requirement)
        .cloned()
        .ok_or_else(|| Error::Internal(format!("no pvc resolved for volume requirement '{requirement}'")))
}

/// §4.9's Airflow policy: Flower is rendered only when
/// `executor == CeleryExecutor && flower_enabled`; a DAG ssh secret is
/// materialized only when `dags_repository_private`; `custom_image_enabled`
/// makes `version` irrelevant and requires registry+tag plus a pull secret.
fn build_airflow(renderer: &Renderer, inputs: &RenderInputs<'_>) -> Result<InstallPlan> {
    let executor = config_str(inputs.config, "executor").unwrap_or_else(|| "CeleryExecutor".to_string());
    let flower_enabled = config_bool(inputs.config, "flower_enabled", false) && executor == "CeleryExecutor";
    let custom_image_enabled = config_bool(inputs.config, "custom_image_enabled", false);
    let dags_repository_private = config_bool(inputs.config, "dags_repository_private", false);

    let webserver = endpoint_by_name(inputs.endpoints, "webserver")
        .ok_or_else(|| Error::validation("airflow requires a 'webserver' endpoint"))?;
    let (webserver_host, webserver_path) = resolve_host_path(inputs.cluster, webserver)?;

    let (flower_host, flower_path) = if flower_enabled {
        let flower = endpoint_by_name(inputs.endpoints, "flower")
            .ok_or_else(|| Error::validation("flower_enabled requires a 'flower' endpoint"))?;
        let (h, p) = resolve_host_path(inputs.cluster, flower)?;
        (Some(h), Some(p))
    } else {
        (None, None)
    };

    let ctx = serde_json::json!({
        "executor": executor,
        "flower_enabled": flower_enabled,
        "custom_image_enabled": custom_image_enabled,
        "custom_image_registry": config_str(inputs.config, "custom_image_registry"),
        "custom_image_tag": config_str(inputs.config, "custom_image_tag"),
        "version": config_str(inputs.config, "version"),
        "dags_repository_url": config_str(inputs.config, "dags_repository_url"),
        "dags_repository_private": dags_repository_private,
        "dags_ssh_secret_name": inputs.dags_ssh_secret_name,
        "dags_pvc_name": pvc_name(inputs, "dags")?,
        "logs_pvc_name": pvc_name(inputs, "logs")?,
        "webserver_host": webserver_host,
        "webserver_path": webserver_path,
        "flower_host": flower_host,
        "flower_path": flower_path,
        "pull_secret_name": inputs.pull_secret_name,
    });
    let values_yaml = renderer.render(TemplateId::AirflowValues, &ctx)?;
    Ok(InstallPlan::Helm {
        chart_repo: "https://airflow.apache.org".to_string(),
        chart_name: "airflow".to_string(),
        values_yaml,
    })
}

/// §4.9's Spark policy: renders the `SparkCluster` CR directly, no Helm
/// release is installed for the deployment itself (the cluster-wide
/// Stackable Spark operator, if absent, is assumed already installed —
/// out of scope per `spec.md` §1's "curated catalog" framing).
fn build_spark(renderer: &Renderer, inputs: &RenderInputs<'_>) -> Result<InstallPlan> {
    let master_ui = endpoint_by_name(inputs.endpoints, "master-ui")
        .ok_or_else(|| Error::validation("spark requires a 'master-ui' endpoint"))?;
    let (master_ui_host, master_ui_path) = resolve_host_path(inputs.cluster, master_ui)?;

    let ctx = serde_json::json!({
        "release_name": inputs.release_name,
        "namespace": inputs.namespace,
        "version": config_str(inputs.config, "version"),
        "min_workers": config_u32(inputs.config, "min_workers", 1),
        "max_workers": config_u32(inputs.config, "max_workers", 4),
        "data_pvc_name": pvc_name(inputs, "data")?,
        "master_ui_host": master_ui_host,
        "master_ui_path": master_ui_path,
    });
    let manifest = renderer.render(TemplateId::SparkCluster, &ctx)?;
    Ok(InstallPlan::ApplyManifest { manifest })
}

fn build_grafana(renderer: &Renderer, inputs: &RenderInputs<'_>) -> Result<InstallPlan> {
    let dashboard = endpoint_by_name(inputs.endpoints, "dashboard")
        .ok_or_else(|| Error::validation("grafana requires a 'dashboard' endpoint"))?;
    let (dashboard_host, dashboard_path) = resolve_host_path(inputs.cluster, dashboard)?;

    let ctx = serde_json::json!({
        "replica_count": config_u32(inputs.config, "replica_count", 1),
        "version": config_str(inputs.config, "version"),
        "admin_password": config_str(inputs.config, "admin_password").unwrap_or_default(),
        "data_pvc_name": pvc_name(inputs, "data")?,
        "dashboard_host": dashboard_host,
        "dashboard_path": dashboard_path,
    });
    let values_yaml = renderer.render(TemplateId::GrafanaValues, &ctx)?;
    Ok(InstallPlan::Helm {
        chart_repo: "https://grafana.github.io/helm-charts".to_string(),
        chart_name: "grafana".to_string(),
        values_yaml,
    })
}

fn build_prefect(renderer: &Renderer, inputs: &RenderInputs<'_>) -> Result<InstallPlan> {
    let server_ui = endpoint_by_name(inputs.endpoints, "server-ui")
        .ok_or_else(|| Error::validation("prefect requires a 'server-ui' endpoint"))?;
    let (server_ui_host, server_ui_path) = resolve_host_path(inputs.cluster, server_ui)?;

    let ctx = serde_json::json!({
        "version": config_str(inputs.config, "version"),
        "worker_replicas": config_u32(inputs.config, "worker_replicas", 1),
        "work_pool_name": config_str(inputs.config, "work_pool_name").unwrap_or_else(|| "default-pool".to_string()),
        "storage_pvc_name": pvc_name(inputs, "storage")?,
        "server_ui_host": server_ui_host,
        "server_ui_path": server_ui_path,
    });
    let values_yaml = renderer.render(TemplateId::PrefectValues, &ctx)?;
    Ok(InstallPlan::Helm {
        chart_repo: "https://prefecthq.github.io/prefect-helm".to_string(),
        chart_name: "prefect-server".to_string(),
        values_yaml,
    })
}

pub fn chart_ref<'a>(chart_repo: &'a str, chart_name: &'a str) -> ChartRef<'a> {
    ChartRef::Remote { repo: chart_repo, chart: chart_name, version: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dip_core::{Provider, Status};
    use uuid::Uuid;

    fn cluster(domain: Option<&str>, access_ip: Option<&str>) -> Cluster {
        Cluster {
            id: Uuid::new_v4(),
            name: "prod".to_string(),
            provider: Provider::Hetzner,
            k3s_version: "v1.32.3+k3s1".to_string(),
            domain: domain.map(String::from),
            access_ip: access_ip.map(String::from),
            status: Status::Running,
            error_message: None,
            traefik_dashboard_enabled: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn domain_path_uses_cluster_domain_as_host() {
        let c = cluster(Some("example.com"), None);
        let e = AccessEndpoint::normalized("webserver", AccessType::DomainPath, "/airflow");
        let (host, path) = resolve_host_path(&c, &e).unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(path, "/airflow");
    }

    #[test]
    fn subdomain_without_domain_is_rejected() {
        let c = cluster(None, None);
        let e = AccessEndpoint::normalized("webserver", AccessType::Subdomain, "airflow");
        assert!(resolve_host_path(&c, &e).is_err());
    }

    #[test]
    fn cluster_ip_path_uses_access_ip() {
        let c = cluster(None, Some("1.2.3.4"));
        let e = AccessEndpoint::normalized("webserver", AccessType::ClusterIpPath, "/airflow");
        let (host, path) = resolve_host_path(&c, &e).unwrap();
        assert_eq!(host, "1.2.3.4");
        assert_eq!(path, "/airflow");
    }

    #[test]
    fn airflow_flower_disabled_needs_no_flower_endpoint() {
        let renderer = Renderer::new().unwrap();
        let cluster = cluster(Some("example.com"), None);
        let mut config = ConfigMap::new();
        config.insert("executor".into(), ConfigValue::String("KubernetesExecutor".into()));
        config.insert("flower_enabled".into(), ConfigValue::Bool(true));
        config.insert("dags_repository_url".into(), ConfigValue::String("https://x".into()));
        let endpoints = vec![AccessEndpoint::normalized("webserver", AccessType::DomainPath, "/airflow")];
        let mut pvcs = BTreeMap::new();
        pvcs.insert("dags".to_string(), "dip-dags".to_string());
        pvcs.insert("logs".to_string(), "dip-logs".to_string());
        let inputs = RenderInputs {
            release_name: "dip-airflow",
            namespace: "dip-x",
            cluster: &cluster,
            config: &config,
            endpoints: &endpoints,
            volume_pvc_names: &pvcs,
            dags_ssh_secret_name: None,
            pull_secret_name: None,
        };
        let plan = build_plan(&renderer, "airflow", &inputs).unwrap();
        match plan {
            InstallPlan::Helm { values_yaml, .. } => {
                assert!(values_yaml.contains("flower:\n  enabled: false"));
            }
            _ => panic!("expected a helm plan"),
        }
    }
}
