//! Text template rendering (C6): cloud-init, Traefik dashboard addon
//! manifests, the bundled Hetzner CSI manifest, and per-application Helm
//! values. Grounded on `shipcat_definitions`'s use of `tera` to render
//! Helm values/config files from a typed context (the teacher crate itself
//! never renders text templates, so this whole crate is pack-sourced).

use dip_core::Error;
use serde::Serialize;
use tera::{Context, Tera};

const CLOUD_INIT_CONTROL_PLANE: &str = include_str!("../templates/cloud_init_control_plane.yaml.tera");
const CLOUD_INIT_WORKER: &str = include_str!("../templates/cloud_init_worker.yaml.tera");
const TRAEFIK_DASHBOARD_INGRESSROUTE: &str =
    include_str!("../templates/traefik_dashboard_ingressroute.yaml.tera");
const TRAEFIK_DASHBOARD_MIDDLEWARE: &str = include_str!("../templates/traefik_dashboard_middleware.yaml.tera");
const HETZNER_CSI: &str = include_str!("../templates/hetzner_csi.yaml.tera");
const CLUSTER_ISSUER: &str = include_str!("../templates/cluster_issuer.yaml.tera");
const AIRFLOW_VALUES: &str = include_str!("../templates/airflow_values.yaml.tera");
const SPARK_CLUSTER: &str = include_str!("../templates/spark_cluster.yaml.tera");
const GRAFANA_VALUES: &str = include_str!("../templates/grafana_values.yaml.tera");
const PREFECT_VALUES: &str = include_str!("../templates/prefect_values.yaml.tera");

/// Logical name of every template this renderer knows about. Using an enum
/// (rather than a free-form `&str` name) means a typo in the caller is a
/// compile error, not a runtime `TemplateNotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateId {
    CloudInitControlPlane,
    CloudInitWorker,
    TraefikDashboardIngressRoute,
    TraefikDashboardMiddleware,
    HetznerCsi,
    ClusterIssuer,
    AirflowValues,
    SparkCluster,
    GrafanaValues,
    PrefectValues,
}

impl TemplateId {
    fn name(self) -> &'static str {
        match self {
            TemplateId::CloudInitControlPlane => "cloud_init_control_plane",
            TemplateId::CloudInitWorker => "cloud_init_worker",
            TemplateId::TraefikDashboardIngressRoute => "traefik_dashboard_ingressroute",
            TemplateId::TraefikDashboardMiddleware => "traefik_dashboard_middleware",
            TemplateId::HetznerCsi => "hetzner_csi",
            TemplateId::ClusterIssuer => "cluster_issuer",
            TemplateId::AirflowValues => "airflow_values",
            TemplateId::SparkCluster => "spark_cluster",
            TemplateId::GrafanaValues => "grafana_values",
            TemplateId::PrefectValues => "prefect_values",
        }
    }
}

/// Wraps a single `tera::Tera` instance holding every embedded template,
/// registered once at construction. Stateless beyond that — rendering never
/// mutates the instance.
#[derive(Clone)]
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    pub fn new() -> Result<Self, Error> {
        let mut tera = Tera::default();
        let templates = [
            (TemplateId::CloudInitControlPlane.name(), CLOUD_INIT_CONTROL_PLANE),
            (TemplateId::CloudInitWorker.name(), CLOUD_INIT_WORKER),
            (TemplateId::TraefikDashboardIngressRoute.name(), TRAEFIK_DASHBOARD_INGRESSROUTE),
            (TemplateId::TraefikDashboardMiddleware.name(), TRAEFIK_DASHBOARD_MIDDLEWARE),
            (TemplateId::HetznerCsi.name(), HETZNER_CSI),
            (TemplateId::ClusterIssuer.name(), CLUSTER_ISSUER),
            (TemplateId::AirflowValues.name(), AIRFLOW_VALUES),
            (TemplateId::SparkCluster.name(), SPARK_CLUSTER),
            (TemplateId::GrafanaValues.name(), GRAFANA_VALUES),
            (TemplateId::PrefectValues.name(), PREFECT_VALUES),
        ];
        tera.add_raw_templates(templates)
            .map_err(|e| Error::Internal(format!("invalid embedded template: {e}")))?;
        Ok(Self { tera })
    }

    /// Renders `template` against `context`. Tera rejects a reference to a
    /// variable absent from the context at the point it's evaluated — this
    /// is exactly `spec.md` §4.6's "must reject an unknown variable
    /// reference at render time," so no separate pre-validation pass is
    /// needed; a `tera::Error` here is always mapped to `Error::Template`,
    /// never surfaced as user input error (the orchestrator built the
    /// context, so an undefined variable is always this crate's caller's
    /// bug).
    pub fn render<C: Serialize>(&self, template: TemplateId, context: &C) -> Result<String, Error> {
        let ctx = Context::from_serialize(context)
            .map_err(|e| Error::Template(format!("invalid render context: {e}")))?;
        self.tera
            .render(template.name(), &ctx)
            .map_err(|e| Error::Template(render_error_detail(e)))
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new().expect("embedded templates must be valid")
    }
}

fn render_error_detail(err: tera::Error) -> String {
    let mut detail = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(s) = source {
        detail.push_str(": ");
        detail.push_str(&s.to_string());
        source = s.source();
    }
    detail
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_cloud_init_control_plane() {
        let renderer = Renderer::new().unwrap();
        let out = renderer
            .render(
                TemplateId::CloudInitControlPlane,
                &json!({
                    "server_name": "prod-control-plane",
                    "k3s_version": "v1.32.3+k3s1",
                    "pool_name": "control-plane",
                    "cluster_id": "abc-123",
                }),
            )
            .unwrap();
        assert!(out.contains("v1.32.3+k3s1"));
        assert!(out.contains("--disable servicelb"));
    }

    #[test]
    fn undefined_variable_is_rejected() {
        let renderer = Renderer::new().unwrap();
        let err = renderer
            .render(TemplateId::CloudInitWorker, &json!({ "server_name": "worker-1" }))
            .unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }

    #[test]
    fn airflow_flower_block_is_absent_when_disabled() {
        let renderer = Renderer::new().unwrap();
        let out = renderer
            .render(
                TemplateId::AirflowValues,
                &json!({
                    "executor": "KubernetesExecutor",
                    "custom_image_enabled": false,
                    "version": "2.9.3",
                    "dags_repository_url": "https://example.com/dags.git",
                    "dags_repository_private": false,
                    "dags_pvc_name": "dip-dags",
                    "logs_pvc_name": "dip-logs",
                    "webserver_host": "example.com",
                    "webserver_path": "/airflow",
                    "flower_enabled": false,
                }),
            )
            .unwrap();
        assert!(out.contains("flower:\n  enabled: false"));
        assert!(!out.contains("flower_host"));
    }
}
