//! One SSH session per server, opened with the cluster's generated keypair
//! (`spec.md` §4.3). Every command is bounded by the per-operation SSH
//! deadline from §4.9 (300 s) so a hung remote shell can't stall a cluster
//! worker forever.

use std::path::Path;
use std::time::Duration;

use dip_core::{Error, Result};
use openssh::{KnownHosts, Session, SessionBuilder};

/// Per-operation deadline for a single SSH command (`spec.md` §4.9).
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

pub struct RemoteSession {
    session: Session,
    host: String,
}

impl RemoteSession {
    /// Connects as `root` to `host` using the private key at `private_key_path`.
    /// Host key checking is set to accept-new: these are freshly created
    /// cloud servers with no prior host key on record.
    pub async fn connect(host: &str, private_key_path: &Path) -> Result<Self> {
        let destination = format!("ssh://root@{host}");
        let mut builder = SessionBuilder::default();
        builder.keyfile(private_key_path).known_hosts_check(KnownHosts::Add);
        let session = builder
            .connect_mux(&destination)
            .await
            .map_err(|e| Error::Provider(format!("ssh connect to {host} failed: {e}")))?;
        Ok(Self { session, host: host.to_string() })
    }

    /// Runs `command` and returns trimmed stdout. A non-zero exit status or
    /// a command that doesn't finish within [`COMMAND_TIMEOUT`] is an error.
    pub async fn run(&self, command: &str) -> Result<String> {
        let host = self.host.clone();
        let output = tokio::time::timeout(
            COMMAND_TIMEOUT,
            self.session.command("sh").arg("-c").arg(command).output(),
        )
        .await
        .map_err(|_| Error::Provider(format!("ssh command on {host} timed out after {COMMAND_TIMEOUT:?}: {command}")))?
        .map_err(|e| Error::Provider(format!("ssh command on {host} failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Provider(format!(
                "command '{command}' on {host} exited with {:?}: {stderr}",
                output.status.code()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Best-effort: runs `command` and reports whether it exited zero,
    /// without treating a non-zero exit or timeout as an error. Used for
    /// readiness checks where "not ready yet" is a normal, expected result.
    pub async fn run_ok(&self, command: &str) -> bool {
        match tokio::time::timeout(COMMAND_TIMEOUT, self.session.command("sh").arg("-c").arg(command).status()).await {
            Ok(Ok(status)) => status.success(),
            _ => false,
        }
    }

    pub async fn close(self) -> Result<()> {
        self.session
            .close()
            .await
            .map_err(|e| Error::Provider(format!("ssh session close failed: {e}")))
    }
}
