//! Remote exec (C3): opens an SSH session to a freshly created server and
//! drives the k3s bootstrap over it (`spec.md` §4.3). No crate in the
//! retrieved pack performs SSH directly; this generalizes the teacher's
//! "shell out to an external binary and wait" idiom (`aion-cloud`'s Helm/
//! kubectl invocations, and `other_examples/dihmeetree-oxide`'s
//! `talosctl`/`kubectl` driving) to an async `ssh` wrapper via `openssh`.

pub mod bootstrap;
pub mod session;

pub use bootstrap::{
    fetch_kubeconfig, fetch_node_token, install_control_plane, install_worker, wait_for_cloud_init,
    wait_for_k3s_ready, READINESS_POLL_DEADLINE, READINESS_POLL_INTERVAL,
};
pub use session::{RemoteSession, COMMAND_TIMEOUT};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_budget_matches_spec() {
        assert_eq!(READINESS_POLL_INTERVAL.as_secs(), 5);
        assert_eq!(READINESS_POLL_DEADLINE.as_secs(), 600);
    }

    #[test]
    fn command_timeout_matches_spec() {
        assert_eq!(COMMAND_TIMEOUT.as_secs(), 300);
    }
}
