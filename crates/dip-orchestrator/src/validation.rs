//! Admission-time validation shared by cluster and deployment creation
//! (`spec.md` §3's entity invariants, §4.8/§4.9). Pure where possible —
//! only the endpoint-uniqueness check needs the store, everything else is
//! a function of the request alone.

use dip_core::domain::PoolSize;
use dip_core::{AccessType, Error, Result};

const NAME_MIN_LEN: usize = 1;
const NAME_MAX_LEN: usize = 63;

const FIXED_COUNT_MIN: u32 = 1;
const FIXED_COUNT_MAX: u32 = 20;
const AUTOSCALE_MIN_FLOOR: u32 = 0;
const AUTOSCALE_MIN_CEIL: u32 = 10;
const AUTOSCALE_MAX_FLOOR: u32 = 1;
const AUTOSCALE_MAX_CEIL: u32 = 10;

const VOLUME_SIZE_MIN_GB: u32 = 10;
const VOLUME_SIZE_MAX_GB: u32 = 1000;

/// DNS-label validation for cluster/deployment/pool names (`spec.md` §3):
/// 1-63 characters, lowercase letters, digits and hyphens only.
pub fn validate_dns_label(field: &str, value: &str) -> Result<()> {
    if value.len() < NAME_MIN_LEN || value.len() > NAME_MAX_LEN {
        return Err(Error::validation(format!(
            "{field} must be between {NAME_MIN_LEN} and {NAME_MAX_LEN} characters"
        )));
    }
    if !value.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return Err(Error::validation(format!(
            "{field} must contain only lowercase letters, digits and hyphens"
        )));
    }
    Ok(())
}

/// Parses and validates a pool's node count/autoscaling range (`spec.md`
/// §3's Pool invariant and size bounds).
pub fn validate_pool_size(
    number_of_nodes: Option<&str>,
    autoscale_min: Option<u32>,
    autoscale_max: Option<u32>,
) -> Result<PoolSize> {
    match (number_of_nodes, autoscale_min, autoscale_max) {
        (Some(count_str), None, None) => {
            let count: u32 = count_str
                .parse()
                .map_err(|_| Error::validation("number_of_nodes must be an integer"))?;
            if !(FIXED_COUNT_MIN..=FIXED_COUNT_MAX).contains(&count) {
                return Err(Error::validation(format!(
                    "number_of_nodes must be between {FIXED_COUNT_MIN} and {FIXED_COUNT_MAX}"
                )));
            }
            Ok(PoolSize::Fixed { count })
        }
        (None, Some(min), Some(max)) => {
            if !(AUTOSCALE_MIN_FLOOR..=AUTOSCALE_MIN_CEIL).contains(&min) {
                return Err(Error::validation(format!(
                    "autoscaling min must be between {AUTOSCALE_MIN_FLOOR} and {AUTOSCALE_MIN_CEIL}"
                )));
            }
            if !(AUTOSCALE_MAX_FLOOR..=AUTOSCALE_MAX_CEIL).contains(&max) {
                return Err(Error::validation(format!(
                    "autoscaling max must be between {AUTOSCALE_MAX_FLOOR} and {AUTOSCALE_MAX_CEIL}"
                )));
            }
            if min > max {
                return Err(Error::validation("autoscaling min must be <= max"));
            }
            Ok(PoolSize::Autoscaling { min, max })
        }
        _ => Err(Error::validation(
            "a pool must specify exactly one of number_of_nodes or an autoscaling range",
        )),
    }
}

pub fn validate_volume_size(size_gb: u32) -> Result<()> {
    if !(VOLUME_SIZE_MIN_GB..=VOLUME_SIZE_MAX_GB).contains(&size_gb) {
        return Err(Error::validation(format!(
            "volume size must be between {VOLUME_SIZE_MIN_GB} and {VOLUME_SIZE_MAX_GB} GiB"
        )));
    }
    Ok(())
}

/// An endpoint with `DomainPath`/`ClusterIpPath` access requires a routable
/// host to attach to: `DomainPath` needs the cluster's `domain`, while
/// `ClusterIpPath` routes off the cluster's own access IP and has no such
/// requirement.
pub fn validate_endpoint_access_type(access_type: AccessType, cluster_domain: Option<&str>) -> Result<()> {
    if access_type == AccessType::DomainPath && cluster_domain.is_none() {
        return Err(Error::validation(
            "domain_path endpoints require the cluster to have a domain configured",
        ));
    }
    if access_type == AccessType::Subdomain && cluster_domain.is_none() {
        return Err(Error::validation(
            "subdomain endpoints require the cluster to have a domain configured",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dns_label_rejects_uppercase_and_underscore() {
        assert!(validate_dns_label("name", "Prod").is_err());
        assert!(validate_dns_label("name", "prod_1").is_err());
        assert!(validate_dns_label("name", "prod-1").is_ok());
    }

    #[test]
    fn dns_label_rejects_empty_and_too_long() {
        assert!(validate_dns_label("name", "").is_err());
        let too_long: String = std::iter::repeat('a').take(64).collect();
        assert!(validate_dns_label("name", &too_long).is_err());
    }

    #[test]
    fn pool_size_requires_exactly_one_shape() {
        assert!(validate_pool_size(None, None, None).is_err());
        assert!(validate_pool_size(Some("3"), Some(1), Some(2)).is_err());
        assert_eq!(validate_pool_size(Some("3"), None, None).unwrap(), PoolSize::Fixed { count: 3 });
    }

    #[test]
    fn fixed_count_out_of_range_is_rejected() {
        assert!(validate_pool_size(Some("0"), None, None).is_err());
        assert!(validate_pool_size(Some("21"), None, None).is_err());
    }

    #[test]
    fn autoscale_min_must_not_exceed_max() {
        assert!(validate_pool_size(None, Some(5), Some(2)).is_err());
        assert!(validate_pool_size(None, Some(2), Some(5)).is_ok());
    }

    #[test]
    fn volume_size_bounds() {
        assert!(validate_volume_size(9).is_err());
        assert!(validate_volume_size(1001).is_err());
        assert!(validate_volume_size(500).is_ok());
    }
}
