//! Transactional Postgres persistence for the cluster/pool/deployment/volume
//! entity graph (C1). Owns schema migrations; exposes no query surface
//! beyond what `dip-orchestrator` and `dip-server` need.

pub mod connection;
pub mod migrations;
pub mod rows;
pub mod store;

pub use connection::DatabaseConnection;
pub use migrations::MigrationRunner;
pub use rows::{AccessEndpointRow, ClusterRow, DeploymentRow, PoolRow, VolumeBindingRow, VolumeRow};
pub use store::Store;
