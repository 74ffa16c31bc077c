use std::io::Write as _;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::process::Command;

/// Where the chart itself lives: a directory bundled under an application's
/// artifact bundle (`spec.md` §3's "path to its artifact bundle"), or a
/// reference pulled from a remote Helm repository at install time.
#[derive(Debug, Clone)]
pub enum ChartRef<'a> {
    Local(&'a Path),
    Remote { repo: &'a str, chart: &'a str, version: Option<&'a str> },
}

/// `spec.md` §4.5's three error categories. `TimeoutOnWait` is the one the
/// deployment orchestrator treats specially: on an upgrade, a wait timeout
/// becomes a `failed` status without the orchestrator tearing down
/// namespace/PVC/ingress resources it already created — `--atomic` is still
/// passed to `helm` itself (the release's own rollback is Helm's concern,
/// unchanged by `spec.md`), but the surrounding orchestration does not
/// additionally delete what it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelmFailureKind {
    ChartNotFound,
    TimeoutOnWait,
    ApiServerError,
}

#[derive(Debug, Clone)]
pub struct HelmFailure {
    pub kind: HelmFailureKind,
    pub message: String,
}

impl std::fmt::Display for HelmFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for HelmFailure {}

impl From<HelmFailure> for dip_core::Error {
    fn from(f: HelmFailure) -> Self {
        dip_core::Error::Helm(f.to_string())
    }
}

/// Deadline for `--wait` on install/upgrade (`spec.md` §4.5, §5).
const INSTALL_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const UNINSTALL_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// One Helm invocation per call, serialized by the caller's per-cluster
/// worker (`dip-orchestrator` never runs two Helm operations against the
/// same cluster concurrently).
#[async_trait]
pub trait HelmEngine: Send + Sync {
    async fn install_or_upgrade(
        &self,
        release: &str,
        namespace: &str,
        chart: &ChartRef<'_>,
        values_yaml: &str,
        kubeconfig_yaml: &str,
    ) -> Result<(), HelmFailure>;

    async fn uninstall(&self, release: &str, namespace: &str, kubeconfig_yaml: &str) -> Result<(), HelmFailure>;
}

/// Shells out to the `helm` binary on `$PATH`, grounded on the same
/// "write the dynamic bits to a temp file, pass the path as a flag" idiom
/// the teacher uses elsewhere for generated artifacts (`aion-marketplace`'s
/// use of `tempfile` for downloaded plugin bundles).
pub struct ProcessHelmEngine {
    binary: String,
}

impl ProcessHelmEngine {
    pub fn new() -> Self {
        Self { binary: "helm".to_string() }
    }

    fn write_temp_file(contents: &str, suffix: &str) -> Result<NamedTempFile, HelmFailure> {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .map_err(|e| internal_failure(format!("failed to create temp file: {e}")))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| internal_failure(format!("failed to write temp file: {e}")))?;
        Ok(file)
    }

    async fn run(&self, args: &[String], deadline: Duration) -> Result<(), HelmFailure> {
        tracing::info!(args = ?args, "running helm");
        let output = tokio::time::timeout(deadline, Command::new(&self.binary).args(args).output())
            .await
            .map_err(|_| HelmFailure {
                kind: HelmFailureKind::TimeoutOnWait,
                message: format!("helm {} timed out after {deadline:?}", args.join(" ")),
            })?
            .map_err(|e| internal_failure(format!("failed to spawn helm: {e}")))?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        Err(classify_failure(&stderr))
    }
}

impl Default for ProcessHelmEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn internal_failure(message: String) -> HelmFailure {
    HelmFailure { kind: HelmFailureKind::ApiServerError, message }
}

/// Classifies `helm`'s stderr into one of `spec.md` §4.5's three buckets.
/// Helm's own error text is the only signal available (there is no
/// structured error code on the CLI), so this matches on the fixed phrases
/// the real binary emits.
fn classify_failure(stderr: &str) -> HelmFailure {
    let lower = stderr.to_lowercase();
    let kind = if lower.contains("not found") || lower.contains("chart not found") || lower.contains("no such file") {
        HelmFailureKind::ChartNotFound
    } else if lower.contains("timed out waiting") || lower.contains("context deadline exceeded") || lower.contains("timeout") {
        HelmFailureKind::TimeoutOnWait
    } else {
        HelmFailureKind::ApiServerError
    };
    HelmFailure { kind, message: stderr.trim().to_string() }
}

#[async_trait]
impl HelmEngine for ProcessHelmEngine {
    async fn install_or_upgrade(
        &self,
        release: &str,
        namespace: &str,
        chart: &ChartRef<'_>,
        values_yaml: &str,
        kubeconfig_yaml: &str,
    ) -> Result<(), HelmFailure> {
        let values_file = Self::write_temp_file(values_yaml, ".yaml")?;
        let kubeconfig_file = Self::write_temp_file(kubeconfig_yaml, ".yaml")?;

        let mut args = vec![
            "upgrade".to_string(),
            "--install".to_string(),
            release.to_string(),
        ];
        match chart {
            ChartRef::Local(path) => args.push(path.to_string_lossy().to_string()),
            ChartRef::Remote { repo, chart, version } => {
                args.push(chart.to_string());
                args.push("--repo".to_string());
                args.push(repo.to_string());
                if let Some(version) = version {
                    args.push("--version".to_string());
                    args.push(version.to_string());
                }
            }
        }
        args.extend([
            "--namespace".to_string(),
            namespace.to_string(),
            "--create-namespace".to_string(),
            "--values".to_string(),
            values_file.path().to_string_lossy().to_string(),
            "--kubeconfig".to_string(),
            kubeconfig_file.path().to_string_lossy().to_string(),
            "--atomic".to_string(),
            "--wait".to_string(),
            "--timeout".to_string(),
            "10m".to_string(),
        ]);

        self.run(&args, INSTALL_TIMEOUT).await
    }

    async fn uninstall(&self, release: &str, namespace: &str, kubeconfig_yaml: &str) -> Result<(), HelmFailure> {
        let kubeconfig_file = Self::write_temp_file(kubeconfig_yaml, ".yaml")?;
        let args = vec![
            "uninstall".to_string(),
            release.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
            "--kubeconfig".to_string(),
            kubeconfig_file.path().to_string_lossy().to_string(),
            "--wait".to_string(),
        ];
        match self.run(&args, UNINSTALL_TIMEOUT).await {
            Ok(()) => Ok(()),
            Err(f) if f.message.to_lowercase().contains("release: not found") => Ok(()),
            Err(f) => Err(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_chart_not_found() {
        let f = classify_failure("Error: chart \"foo\" not found in repo");
        assert_eq!(f.kind, HelmFailureKind::ChartNotFound);
    }

    #[test]
    fn classifies_timeout() {
        let f = classify_failure("Error: UPGRADE FAILED: timed out waiting for the condition");
        assert_eq!(f.kind, HelmFailureKind::TimeoutOnWait);
    }

    #[test]
    fn classifies_api_server_error_as_fallback() {
        let f = classify_failure("Error: Unauthorized");
        assert_eq!(f.kind, HelmFailureKind::ApiServerError);
    }

    #[test]
    fn uninstall_of_missing_release_is_idempotent() {
        let f = HelmFailure { kind: HelmFailureKind::ApiServerError, message: "Error: uninstall: Release: not found".to_string() };
        assert!(f.message.to_lowercase().contains("release: not found"));
    }
}
