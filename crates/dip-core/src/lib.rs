//! Shared domain types, lifecycle state, and error taxonomy used by every
//! `dip-*` crate. Nothing here talks to a database, the network, or a shell —
//! that belongs to `dip-store`, `dip-provider`/`dip-remote`/`dip-kube`/`dip-helm`.

pub mod access;
pub mod config_value;
pub mod domain;
pub mod error;
pub mod provider;
pub mod retry;
pub mod status;

pub use access::{normalize_endpoint_value, AccessType};
pub use config_value::{ConfigMap, ConfigValue};
pub use error::{Error, Result};
pub use provider::Provider;
pub use status::Status;
