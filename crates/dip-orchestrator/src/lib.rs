//! Cluster and deployment orchestration (C8/C9): admission, the per-cluster
//! worker registry, and the state machines that drive a cluster or
//! deployment from request to `running` (or `failed`). `dip-server` is the
//! only caller from outside this crate — it performs admission, enqueues a
//! [`commands::Command`], and returns immediately; everything past that
//! point runs on a [`registry::WorkerRegistry`] task.

pub mod admission;
pub mod apps;
pub mod cluster;
pub mod commands;
pub mod context;
pub mod deployment;
pub mod keypair;
pub mod registry;
pub mod requests;
pub mod validation;
pub mod volume;
pub mod worker;

pub use commands::Command;
pub use context::{Deps, KubeConnector, ProviderFactory, RealKubeConnector, RealProviderFactory};
pub use registry::WorkerRegistry;
pub use requests::*;
