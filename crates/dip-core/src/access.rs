use serde::{Deserialize, Serialize};

/// Classification of a deployment's user-visible URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "access_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    Subdomain,
    DomainPath,
    ClusterIpPath,
}

/// Normalize an access-endpoint value so that uniqueness comparisons and the
/// advisory `check-endpoint-existence` route can never disagree with
/// admission (`spec.md` §9's "possibly buggy source behavior" note on
/// inconsistent slash-prefixing is resolved by using this single function
/// everywhere a value is compared).
///
/// - `Subdomain` values are lower-cased and have no leading/trailing slash.
/// - `DomainPath` and `ClusterIpPath` values are lower-cased and always
///   carry exactly one leading `/`, with trailing slashes stripped.
pub fn normalize_endpoint_value(access_type: AccessType, value: &str) -> String {
    let trimmed = value.trim().to_lowercase();
    match access_type {
        AccessType::Subdomain => trimmed.trim_matches('/').to_string(),
        AccessType::DomainPath | AccessType::ClusterIpPath => {
            let stripped = trimmed.trim_start_matches('/').trim_end_matches('/');
            format!("/{stripped}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdomain_has_no_slashes() {
        assert_eq!(normalize_endpoint_value(AccessType::Subdomain, "/Grafana/"), "grafana");
    }

    #[test]
    fn path_always_has_single_leading_slash() {
        assert_eq!(normalize_endpoint_value(AccessType::DomainPath, "grafana"), "/grafana");
        assert_eq!(normalize_endpoint_value(AccessType::DomainPath, "/grafana/"), "/grafana");
        assert_eq!(normalize_endpoint_value(AccessType::ClusterIpPath, "//grafana"), "/grafana");
    }

    #[test]
    fn normalization_is_idempotent() {
        for (t, v) in [
            (AccessType::Subdomain, "Airflow"),
            (AccessType::DomainPath, "/spark"),
            (AccessType::ClusterIpPath, "grafana/"),
        ] {
            let once = normalize_endpoint_value(t, v);
            let twice = normalize_endpoint_value(t, &once);
            assert_eq!(once, twice);
        }
    }
}
