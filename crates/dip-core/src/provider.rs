use serde::{Deserialize, Serialize};

/// IaaS backend a cluster is provisioned on. Hetzner Cloud is the only
/// implemented backend (see `dip-provider`); `DigitalOcean` is admitted by
/// the catalog/UI layer but has no driver — selecting it is rejected at
/// admission with `validation_error` rather than guessed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "provider_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Hetzner,
    DigitalOcean,
}

impl Provider {
    pub fn is_implemented(self) -> bool {
        matches!(self, Provider::Hetzner)
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Hetzner => f.write_str("hetzner"),
            Provider::DigitalOcean => f.write_str("digitalocean"),
        }
    }
}
