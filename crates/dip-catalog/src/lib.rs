//! In-memory application catalog (C7): descriptors embedded at compile time,
//! config validation, and a single-flight/TTL cache over upstream version
//! lists. Nothing here touches the store or any orchestrator state.

pub mod descriptor;
pub mod validate;
pub mod versions;

use std::sync::Arc;

use dip_core::Error;

pub use descriptor::{
    AccessEndpointDescriptor, ApplicationDescriptor, ConfigOption, ConfigOptionType, Conditional,
    VolumeRequirement,
};
pub use validate::validate_config;
pub use versions::VersionCache;

/// One embedded descriptor per catalog application, loaded once at process
/// start. Kept as a flat `Vec` wrapped in `Arc` (§4.7: "read-mostly"); the
/// 5-minute TTL in `spec.md` applies only to the fetched *version list*,
/// handled separately by [`VersionCache`].
const DESCRIPTOR_TOMLS: &[&str] = &[
    include_str!("../descriptors/airflow.toml"),
    include_str!("../descriptors/spark.toml"),
    include_str!("../descriptors/grafana.toml"),
    include_str!("../descriptors/prefect.toml"),
];

#[derive(Clone)]
pub struct Catalog {
    applications: Arc<[ApplicationDescriptor]>,
    versions: VersionCache,
}

impl Catalog {
    /// Parses every embedded descriptor. A malformed descriptor is a startup
    /// error (spec.md §6: "process exits with non-zero on unrecoverable
    /// startup errors ... catalog malformed").
    pub fn load() -> Result<Self, Error> {
        let mut applications = Vec::with_capacity(DESCRIPTOR_TOMLS.len());
        for raw in DESCRIPTOR_TOMLS {
            let descriptor: ApplicationDescriptor =
                toml::from_str(raw).map_err(|e| Error::Internal(format!("malformed catalog descriptor: {e}")))?;
            applications.push(descriptor);
        }
        Ok(Self {
            applications: applications.into(),
            versions: VersionCache::new(),
        })
    }

    pub fn list(&self) -> &[ApplicationDescriptor] {
        &self.applications
    }

    pub fn get(&self, short_name: &str) -> Result<&ApplicationDescriptor, Error> {
        self.applications
            .iter()
            .find(|a| a.short_name == short_name)
            .ok_or_else(|| Error::not_found(format!("application '{short_name}'")))
    }

    /// §4.7: "list versions for an application (may fetch from an upstream
    /// registry and cache for 5 minutes)".
    pub async fn list_versions(&self, short_name: &str) -> Result<Arc<Vec<String>>, Error> {
        let app = self.get(short_name)?;
        self.versions.get_or_fetch(&app.short_name, &app.default_version).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_embedded_descriptors_parse() {
        let catalog = Catalog::load().expect("embedded descriptors must parse");
        assert_eq!(catalog.list().len(), 4);
        assert!(catalog.get("airflow").is_ok());
        assert!(catalog.get("spark").is_ok());
        assert!(catalog.get("grafana").is_ok());
        assert!(catalog.get("prefect").is_ok());
    }

    #[test]
    fn unknown_application_is_not_found() {
        let catalog = Catalog::load().unwrap();
        assert!(matches!(catalog.get("nope"), Err(Error::NotFound(_))));
    }
}
