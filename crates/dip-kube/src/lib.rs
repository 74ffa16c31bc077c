//! Kubernetes gateway (C4): typed namespace/secret/PVC operations plus a
//! generic multi-document manifest applier, all server-side-apply so
//! `ensure` means "create if absent, no-op if present and equal"
//! (`spec.md` §4.4). Authenticates with the kubeconfig produced by C3.
//!
//! Grounded on `pando85-kaniop`'s reconcile idiom (`Api::namespaced`,
//! `Patch::Apply`, `PatchParams::apply(...).force()`) for the typed
//! resources, and on the dynamic-apply loop in
//! `other_examples/39c23b07_phkaiser13-Peitch__src-modules-multi_cluster_orchestrator-src-cluster_manager.rs.rs`
//! for the bundled-manifest path (CSI driver, Traefik dashboard
//! IngressRoute/Middleware, cert-manager ClusterIssuer) where the object
//! kind isn't known at compile time.

pub mod gateway;
pub mod manifests;

pub use gateway::{KubeClientGateway, KubeGateway, PodReadiness};

const FIELD_MANAGER: &str = "datainfrapilot";
