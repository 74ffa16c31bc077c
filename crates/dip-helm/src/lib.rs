//! Helm engine (C5): install-or-upgrade and uninstall of a release against
//! the target cluster's kubeconfig. No crate in the
//! retrieved pack wraps the `helm` binary directly — this generalizes the
//! same "shell out to an external binary over `tokio::process::Command`,
//! categorize its failure" idiom `dip-provider`'s Hetzner client uses for
//! HTTP calls (exponential-backoff-free here, since Helm operations are
//! bounded by `--wait --timeout` rather than retried) and the one
//! `other_examples/4ed795de_dihmeetree-oxide__src-main.rs.rs` uses for
//! `talosctl`/`kubectl` invocations.

pub mod engine;

pub use engine::{ChartRef, HelmEngine, HelmFailure, HelmFailureKind, ProcessHelmEngine};
