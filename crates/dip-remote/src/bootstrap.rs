//! k3s bootstrap commands run over a [`RemoteSession`] (`spec.md` §4.3).
//! Control-plane nodes install k3s server with CSI/CNI/servicelb disabled
//! (those are installed separately via C4/C5); workers join using the
//! server's node token read back over SSH.

use std::time::Duration;

use dip_core::retry::poll_until;
use dip_core::{Error, Result};

use crate::session::RemoteSession;

/// Readiness probe budget (`spec.md` §4.3): 5 s interval, 10 minute total.
pub const READINESS_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const READINESS_POLL_DEADLINE: Duration = Duration::from_secs(10 * 60);

const K3S_INSTALL_SCRIPT_URL: &str = "https://get.k3s.io";

/// Waits for cloud-init to finish applying the rendered user-data before
/// any bootstrap command runs. `cloud-init status --wait` blocks on the
/// remote side until completion or failure; its own exit code is the
/// signal, so no polling loop is needed here.
pub async fn wait_for_cloud_init(session: &RemoteSession) -> Result<()> {
    session.run("cloud-init status --wait").await?;
    Ok(())
}

/// Installs k3s server on the control-plane node. `pool_name` becomes the
/// node's `pool=<name>` label so `dip-orchestrator` can later target pools
/// by label the same way `dip-provider` targets cloud resources by label.
pub async fn install_control_plane(session: &RemoteSession, k3s_version: &str, pool_name: &str) -> Result<()> {
    let cmd = format!(
        "curl -sfL {K3S_INSTALL_SCRIPT_URL} | INSTALL_K3S_VERSION={k3s_version} sh -s - server \
         --disable servicelb --disable local-storage --disable-cloud-controller \
         --write-kubeconfig-mode=644 --node-label pool={pool_name}"
    );
    session.run(&cmd).await?;
    Ok(())
}

/// Joins a worker node to the cluster using the control plane's token.
pub async fn install_worker(
    session: &RemoteSession,
    k3s_version: &str,
    pool_name: &str,
    control_plane_ip: &str,
    node_token: &str,
) -> Result<()> {
    let cmd = format!(
        "curl -sfL {K3S_INSTALL_SCRIPT_URL} | INSTALL_K3S_VERSION={k3s_version} \
         K3S_URL=https://{control_plane_ip}:6443 K3S_TOKEN={node_token} \
         sh -s - agent --node-label pool={pool_name}"
    );
    session.run(&cmd).await?;
    Ok(())
}

/// Reads the server's node token back over SSH so worker joins never need
/// the token persisted anywhere outside the control-plane node itself.
pub async fn fetch_node_token(session: &RemoteSession) -> Result<String> {
    session.run("cat /var/lib/rancher/k3s/server/node-token").await
}

/// Reads the generated kubeconfig back over SSH (C3's output into C4).
pub async fn fetch_kubeconfig(session: &RemoteSession) -> Result<String> {
    session.run("cat /etc/rancher/k3s/k3s.yaml").await
}

/// Polls until the k3s systemd unit is active (and, on the control plane,
/// the kubeconfig file is present) or the 10-minute budget elapses.
/// `unit_name` is `k3s` on the control plane and `k3s-agent` on workers —
/// only `k3s` produces a kubeconfig, so the file check only applies there.
pub async fn wait_for_k3s_ready(session: &RemoteSession, unit_name: &str) -> Result<bool> {
    let expects_kubeconfig = unit_name == "k3s";
    let ready = poll_until::<(), Error, _, _>(READINESS_POLL_DEADLINE, READINESS_POLL_INTERVAL, || async {
        let unit_active = session.run_ok(&format!("systemctl is-active --quiet {unit_name}")).await;
        let kubeconfig_present = !expects_kubeconfig || session.run_ok("test -f /etc/rancher/k3s/k3s.yaml").await;
        if unit_active && kubeconfig_present {
            Ok(Some(()))
        } else {
            Ok(None)
        }
    })
    .await?;
    Ok(ready.is_some())
}
