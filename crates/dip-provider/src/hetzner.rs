//! Hetzner Cloud implementation of [`ProviderDriver`]. Talks to the Hetzner
//! Cloud API (`https://api.hetzner.cloud/v1`) over `reqwest`, the same
//! bearer-token-over-`reqwest::Client` shape the teacher's
//! `DigitalOceanClient` uses (`aion-cloud/src/providers/digital_ocean.rs`),
//! generalized with the retry/idempotency policy `spec.md` §4.2 demands.

use std::time::Duration;

use async_trait::async_trait;
use dip_core::{Error, Result};
use rand::Rng;
use serde::Deserialize;
use serde_json::json;

use crate::{FirewallHandle, NetworkHandle, ProviderDriver, ServerHandle, ServerSpec, ServerState, SshKeyHandle, VolumeHandle, VolumeSpec};

const BASE_URL: &str = "https://api.hetzner.cloud/v1";

const RETRY_MAX_ATTEMPTS: u32 = 6;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct HetznerDriver {
    client: reqwest::Client,
    api_token: String,
}

impl HetznerDriver {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_token: api_token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{BASE_URL}{path}")
    }

    /// Sends one HTTP request with the shared retry policy: 429/5xx/network
    /// errors retry up to `RETRY_MAX_ATTEMPTS` times with exponential
    /// backoff; a 4xx other than 429 (auth, validation, quota) is reported
    /// immediately (`spec.md` §4.2: "authentication errors and quota errors
    /// are reported up"). `dip_core::retry::with_backoff` retries every
    /// error uniformly and doesn't fit that short-circuit, so this loop is
    /// hand-rolled in the same shape (exponential delay, jitter, `tracing::warn!`
    /// per retry) rather than forced through the generic helper.
    async fn request<T: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let mut attempt = 0;
        loop {
            match self.request_once(method.clone(), path, body.clone()).await {
                Ok(v) => return Ok(v),
                Err(RetryableError::Terminal(e)) => return Err(e),
                Err(RetryableError::Retryable(e)) => {
                    attempt += 1;
                    if attempt >= RETRY_MAX_ATTEMPTS {
                        return Err(e);
                    }
                    let delay = jittered_delay(attempt);
                    tracing::warn!(attempt, path, delay_ms = delay.as_millis() as u64, "retrying hetzner request");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn request_once<T: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> std::result::Result<T, RetryableError> {
        let mut req = self
            .client
            .request(method, self.url(path))
            .bearer_auth(&self.api_token)
            .timeout(REQUEST_TIMEOUT);
        if let Some(body) = &body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                RetryableError::Retryable(Error::Provider(format!("request error: {e}")))
            } else {
                RetryableError::Terminal(Error::Provider(format!("request error: {e}")))
            }
        })?;

        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<T>()
                .await
                .map_err(|e| RetryableError::Terminal(Error::Provider(format!("invalid response body: {e}"))));
        }

        let text = resp.text().await.unwrap_or_default();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(RetryableError::Retryable(Error::Provider(format!(
                "hetzner API {status}: {text}"
            ))));
        }
        Err(RetryableError::Terminal(Error::Provider(format!("hetzner API {status}: {text}"))))
    }

    /// `spec.md` §4.2: "resources already present on a create call are
    /// adopted (the driver treats 'exists' as success)." Hetzner returns
    /// 409 `uniqueness_error` when a name collides; this re-fetches the
    /// existing resource by name rather than surfacing the conflict.
    async fn find_by_name<T: for<'de> Deserialize<'de>>(
        &self,
        list_path: &str,
        list_key: &'static str,
        name: &str,
    ) -> Result<Option<T>> {
        let path = format!("{list_path}?name={name}");
        let resp: serde_json::Value = self.request(reqwest::Method::GET, &path, None).await?;
        let items = resp
            .get(list_key)
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        match items.into_iter().next() {
            Some(v) => serde_json::from_value(v)
                .map(Some)
                .map_err(|e| Error::Provider(format!("malformed {list_key} response: {e}"))),
            None => Ok(None),
        }
    }
}

enum RetryableError {
    Retryable(Error),
    Terminal(Error),
}

fn jittered_delay(attempt: u32) -> Duration {
    let exp = RETRY_BASE_DELAY.saturating_mul(1u32 << attempt.min(16)).min(RETRY_MAX_DELAY);
    let jitter_frac = rand::thread_rng().gen_range(0.8..1.2);
    Duration::from_secs_f64(exp.as_secs_f64() * jitter_frac)
}

#[derive(Debug, Deserialize)]
struct HcloudServer {
    id: i64,
    name: String,
    public_net: HcloudPublicNet,
    status: String,
}

#[derive(Debug, Deserialize)]
struct HcloudPublicNet {
    ipv4: Option<HcloudIpv4>,
}

#[derive(Debug, Deserialize)]
struct HcloudIpv4 {
    ip: String,
}

#[derive(Debug, Deserialize)]
struct HcloudSshKey {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct HcloudFirewall {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct HcloudNetwork {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct HcloudVolume {
    id: i64,
    name: String,
    size: u32,
}

fn labels_to_map(labels: &[(String, String)]) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (k, v) in labels {
        map.insert(k.clone(), serde_json::Value::String(v.clone()));
    }
    serde_json::Value::Object(map)
}

#[async_trait]
impl ProviderDriver for HetznerDriver {
    async fn ensure_ssh_key(&self, cluster_id: &str, name: &str, public_key: &str) -> Result<SshKeyHandle> {
        let body = json!({
            "name": name,
            "public_key": public_key,
            "labels": labels_to_map(&crate::labels::server_labels(cluster_id, "shared", "shared")),
        });
        match self.request::<serde_json::Value>(reqwest::Method::POST, "/ssh_keys", Some(body)).await {
            Ok(resp) => {
                let key: HcloudSshKey = serde_json::from_value(resp["ssh_key"].clone())
                    .map_err(|e| Error::Provider(format!("malformed ssh_key response: {e}")))?;
                Ok(SshKeyHandle { provider_id: key.id.to_string() })
            }
            Err(Error::Provider(msg)) if msg.contains("409") || msg.contains("uniqueness_error") => {
                let existing = self
                    .find_by_name::<HcloudSshKey>("/ssh_keys", "ssh_keys", name)
                    .await?
                    .ok_or_else(|| Error::Provider(format!("ssh key '{name}' reported as existing but not found")))?;
                Ok(SshKeyHandle { provider_id: existing.id.to_string() })
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_ssh_key(&self, provider_id: &str) -> Result<()> {
        let path = format!("/ssh_keys/{provider_id}");
        match self.request::<serde_json::Value>(reqwest::Method::DELETE, &path, None).await {
            Ok(_) => Ok(()),
            Err(Error::Provider(msg)) if msg.contains("404") => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn ensure_firewall(&self, cluster_id: &str, name: &str) -> Result<FirewallHandle> {
        let body = json!({
            "name": name,
            "rules": [
                { "direction": "in", "protocol": "tcp", "port": "22", "source_ips": ["0.0.0.0/0", "::/0"] },
                { "direction": "in", "protocol": "tcp", "port": "6443", "source_ips": ["0.0.0.0/0", "::/0"] },
            ],
            "labels": labels_to_map(&crate::labels::server_labels(cluster_id, "shared", "shared")),
        });
        match self.request::<serde_json::Value>(reqwest::Method::POST, "/firewalls", Some(body)).await {
            Ok(resp) => {
                let fw: HcloudFirewall = serde_json::from_value(resp["firewall"].clone())
                    .map_err(|e| Error::Provider(format!("malformed firewall response: {e}")))?;
                Ok(FirewallHandle { provider_id: fw.id.to_string() })
            }
            Err(Error::Provider(msg)) if msg.contains("409") || msg.contains("uniqueness_error") => {
                let existing = self
                    .find_by_name::<HcloudFirewall>("/firewalls", "firewalls", name)
                    .await?
                    .ok_or_else(|| Error::Provider(format!("firewall '{name}' reported as existing but not found")))?;
                Ok(FirewallHandle { provider_id: existing.id.to_string() })
            }
            Err(e) => Err(e),
        }
    }

    async fn create_network(&self, cluster_id: &str, name: &str) -> Result<NetworkHandle> {
        let body = json!({
            "name": name,
            "ip_range": "10.0.0.0/16",
            "labels": labels_to_map(&crate::labels::server_labels(cluster_id, "shared", "shared")),
        });
        match self.request::<serde_json::Value>(reqwest::Method::POST, "/networks", Some(body)).await {
            Ok(resp) => {
                let net: HcloudNetwork = serde_json::from_value(resp["network"].clone())
                    .map_err(|e| Error::Provider(format!("malformed network response: {e}")))?;
                Ok(NetworkHandle { provider_id: net.id.to_string() })
            }
            Err(Error::Provider(msg)) if msg.contains("409") || msg.contains("uniqueness_error") => {
                let existing = self
                    .find_by_name::<HcloudNetwork>("/networks", "networks", name)
                    .await?
                    .ok_or_else(|| Error::Provider(format!("network '{name}' reported as existing but not found")))?;
                Ok(NetworkHandle { provider_id: existing.id.to_string() })
            }
            Err(e) => Err(e),
        }
    }

    async fn create_server(&self, spec: ServerSpec<'_>) -> Result<ServerHandle> {
        let mut payload = json!({
            "name": spec.name,
            "server_type": spec.server_type,
            "location": spec.region,
            "image": "ubuntu-22.04",
            "ssh_keys": [spec.ssh_key_id],
            "user_data": spec.user_data,
            "labels": labels_to_map(&spec.labels),
        });
        if let Some(network_id) = spec.network_id {
            payload["networks"] = json!([network_id]);
        }

        let resp: serde_json::Value =
            match self.request(reqwest::Method::POST, "/servers", Some(payload)).await {
                Ok(resp) => resp,
                Err(Error::Provider(msg)) if msg.contains("409") || msg.contains("uniqueness_error") => {
                    let existing = self
                        .find_by_name::<HcloudServer>("/servers", "servers", spec.name)
                        .await?
                        .ok_or_else(|| Error::Provider(format!("server '{}' reported as existing but not found", spec.name)))?;
                    return Ok(ServerHandle {
                        provider_id: existing.id.to_string(),
                        name: existing.name,
                        public_ip: existing.public_net.ipv4.map(|ip| ip.ip),
                    });
                }
                Err(e) => return Err(e),
            };

        let server: HcloudServer = serde_json::from_value(resp["server"].clone())
            .map_err(|e| Error::Provider(format!("malformed server response: {e}")))?;
        Ok(ServerHandle {
            provider_id: server.id.to_string(),
            name: server.name,
            public_ip: server.public_net.ipv4.map(|ip| ip.ip),
        })
    }

    async fn delete_server(&self, provider_id: &str) -> Result<()> {
        let path = format!("/servers/{provider_id}");
        match self.request::<serde_json::Value>(reqwest::Method::DELETE, &path, None).await {
            Ok(_) => Ok(()),
            Err(Error::Provider(msg)) if msg.contains("404") => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn list_servers_by_label(&self, cluster_id: &str) -> Result<Vec<ServerHandle>> {
        let path = format!("/servers?label_selector={}", crate::labels::cluster_selector(cluster_id));
        let resp: serde_json::Value = self.request(reqwest::Method::GET, &path, None).await?;
        let servers: Vec<HcloudServer> = serde_json::from_value(resp["servers"].clone())
            .map_err(|e| Error::Provider(format!("malformed servers response: {e}")))?;
        Ok(servers
            .into_iter()
            .map(|s| ServerHandle {
                provider_id: s.id.to_string(),
                name: s.name,
                public_ip: s.public_net.ipv4.map(|ip| ip.ip),
            })
            .collect())
    }

    async fn server_status(&self, provider_id: &str) -> Result<ServerState> {
        let path = format!("/servers/{provider_id}");
        let resp: serde_json::Value = self.request(reqwest::Method::GET, &path, None).await?;
        let server: HcloudServer = serde_json::from_value(resp["server"].clone())
            .map_err(|e| Error::Provider(format!("malformed server response: {e}")))?;
        Ok(match server.status.as_str() {
            "initializing" | "starting" => ServerState::Initializing,
            "running" => ServerState::Running,
            "off" | "stopping" => ServerState::Off,
            "deleting" => ServerState::Deleting,
            _ => ServerState::Unknown,
        })
    }

    async fn create_volume(&self, spec: VolumeSpec<'_>) -> Result<VolumeHandle> {
        let body = json!({
            "name": spec.name,
            "size": spec.size_gb,
            "location": spec.region,
            "labels": labels_to_map(&spec.labels),
            "format": "ext4",
        });
        match self.request::<serde_json::Value>(reqwest::Method::POST, "/volumes", Some(body)).await {
            Ok(resp) => {
                let vol: HcloudVolume = serde_json::from_value(resp["volume"].clone())
                    .map_err(|e| Error::Provider(format!("malformed volume response: {e}")))?;
                Ok(VolumeHandle { provider_id: vol.id.to_string(), name: vol.name, size_gb: vol.size })
            }
            Err(Error::Provider(msg)) if msg.contains("409") || msg.contains("uniqueness_error") => {
                let existing = self
                    .find_by_name::<HcloudVolume>("/volumes", "volumes", spec.name)
                    .await?
                    .ok_or_else(|| Error::Provider(format!("volume '{}' reported as existing but not found", spec.name)))?;
                Ok(VolumeHandle { provider_id: existing.id.to_string(), name: existing.name, size_gb: existing.size })
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_volume(&self, provider_id: &str) -> Result<()> {
        let path = format!("/volumes/{provider_id}");
        match self.request::<serde_json::Value>(reqwest::Method::DELETE, &path, None).await {
            Ok(_) => Ok(()),
            Err(Error::Provider(msg)) if msg.contains("404") => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn attach_volume(&self, volume_id: &str, server_id: &str) -> Result<()> {
        let path = format!("/volumes/{volume_id}/actions/attach_to_server");
        let server_id: i64 = server_id
            .parse()
            .map_err(|_| Error::Provider(format!("invalid server id '{server_id}'")))?;
        let body = json!({ "server": server_id });
        self.request::<serde_json::Value>(reqwest::Method::POST, &path, Some(body)).await?;
        Ok(())
    }

    async fn detach_volume(&self, volume_id: &str) -> Result<()> {
        let path = format!("/volumes/{volume_id}/actions/detach");
        self.request::<serde_json::Value>(reqwest::Method::POST, &path, None).await?;
        Ok(())
    }

    async fn delete_network(&self, provider_id: &str) -> Result<()> {
        let path = format!("/networks/{provider_id}");
        match self.request::<serde_json::Value>(reqwest::Method::DELETE, &path, None).await {
            Ok(_) => Ok(()),
            Err(Error::Provider(msg)) if msg.contains("404") => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn delete_firewall(&self, provider_id: &str) -> Result<()> {
        let path = format!("/firewalls/{provider_id}");
        match self.request::<serde_json::Value>(reqwest::Method::DELETE, &path, None).await {
            Ok(_) => Ok(()),
            Err(Error::Provider(msg)) if msg.contains("404") => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_selector_is_well_formed() {
        assert_eq!(crate::labels::cluster_selector("abc"), "dip/cluster=abc");
    }
}
