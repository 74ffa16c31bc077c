//! The `dip/cluster`, `dip/role`, `dip/pool` label triple applied to every
//! provider resource (`spec.md` §4.2), used both when creating resources and
//! when discovering them for teardown ("walks resources by `dip/cluster=<id>`
//! label, not by locally stored IDs, so leaked resources from partial
//! creates can still be garbage-collected").

pub const CLUSTER: &str = "dip/cluster";
pub const ROLE: &str = "dip/role";
pub const POOL: &str = "dip/pool";

pub const ROLE_CONTROL_PLANE: &str = "control-plane";
pub const ROLE_WORKER: &str = "worker";

pub fn cluster_selector(cluster_id: &str) -> String {
    format!("{CLUSTER}={cluster_id}")
}

pub fn server_labels(cluster_id: &str, role: &str, pool_name: &str) -> Vec<(String, String)> {
    vec![
        (CLUSTER.to_string(), cluster_id.to_string()),
        (ROLE.to_string(), role.to_string()),
        (POOL.to_string(), pool_name.to_string()),
    ]
}
