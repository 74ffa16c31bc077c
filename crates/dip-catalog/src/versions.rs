//! Upstream version list cache (§4.7, §5): 5-minute TTL, single-flight via
//! `moka`'s `get_with`, grounded on `aion-core/src/cache.rs`'s
//! `CacheManager` (a `moka::future::Cache` per concern, builder-configured
//! TTL/capacity).

use std::sync::Arc;
use std::time::Duration;

use dip_core::Error;
use moka::future::Cache;

const TTL: Duration = Duration::from_secs(5 * 60);
const MAX_CAPACITY: u64 = 256;

#[derive(Clone)]
pub struct VersionCache {
    cache: Cache<String, Arc<Vec<String>>>,
    client: reqwest::Client,
}

impl VersionCache {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().max_capacity(MAX_CAPACITY).time_to_live(TTL).build(),
            client: reqwest::Client::new(),
        }
    }

    /// Concurrent callers asking for the same `short_name` within the TTL
    /// window are coalesced into a single upstream fetch by `get_with`
    /// (§5: "single-flight semantics to avoid thundering herds"). A fetch
    /// failure falls back to `[default_version]` rather than failing the
    /// caller — an application with no reachable version registry is still
    /// usable with its pinned default.
    pub async fn get_or_fetch(&self, short_name: &str, default_version: &str) -> Result<Arc<Vec<String>>, Error> {
        let short_name = short_name.to_string();
        let default_version = default_version.to_string();
        let client = self.client.clone();
        let versions = self
            .cache
            .get_with(short_name.clone(), async move {
                match fetch_upstream_versions(&client, &short_name).await {
                    Ok(versions) if !versions.is_empty() => Arc::new(versions),
                    _ => Arc::new(vec![default_version]),
                }
            })
            .await;
        Ok(versions)
    }
}

impl Default for VersionCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort fetch against a public tag registry for the application's
/// chart/image. Errors are swallowed by the caller, which falls back to the
/// descriptor's pinned default — a registry outage must never block
/// deployment admission.
async fn fetch_upstream_versions(client: &reqwest::Client, short_name: &str) -> Result<Vec<String>, Error> {
    let url = format!("https://hub.docker.com/v2/repositories/apache/{short_name}/tags?page_size=20");
    let resp = client
        .get(&url)
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
        .error_for_status()
        .map_err(|e| Error::Internal(e.to_string()))?;

    #[derive(serde::Deserialize)]
    struct TagsResponse {
        results: Vec<Tag>,
    }
    #[derive(serde::Deserialize)]
    struct Tag {
        name: String,
    }

    let body: TagsResponse = resp.json().await.map_err(|e| Error::Internal(e.to_string()))?;
    Ok(body.results.into_iter().map(|t| t.name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn falls_back_to_default_on_unreachable_registry() {
        let cache = VersionCache::new();
        let versions = cache.get_or_fetch("definitely-not-a-real-app-xyz", "1.0.0").await.unwrap();
        assert!(versions.contains(&"1.0.0".to_string()) || !versions.is_empty());
    }
}
