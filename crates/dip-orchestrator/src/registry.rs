//! Per-cluster worker registry (`spec.md` §4.8/§5): one bounded queue and
//! one background task per cluster ID, created lazily on first use. Two
//! clusters never share a queue, so a slow or stuck cluster never blocks
//! work for any other cluster — the concurrency model `aion-cloud`'s
//! `unified_orchestrator` approximates with its own per-target dispatch,
//! generalized here to an explicit one-task-per-cluster model.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use dip_core::{Error, Result};

use crate::commands::Command;
use crate::context::Deps;
use crate::worker;

/// Commands queued but not yet picked up by a cluster's worker task. Past
/// this, `enqueue` fails fast with `Error::Unavailable` (mapped to HTTP 503
/// at the REST boundary) rather than blocking the caller indefinitely.
const QUEUE_CAPACITY: usize = 8;

pub struct WorkerRegistry {
    deps: Arc<Deps>,
    senders: Mutex<HashMap<Uuid, mpsc::Sender<Command>>>,
}

impl WorkerRegistry {
    pub fn new(deps: Arc<Deps>) -> Self {
        Self { deps, senders: Mutex::new(HashMap::new()) }
    }

    /// Read-only access to the shared collaborators, for callers like the
    /// deployment-credentials route (§4.9) that read through `deps.kube`
    /// directly rather than enqueuing a mutating [`Command`].
    pub fn deps(&self) -> &Arc<Deps> {
        &self.deps
    }

    /// Enqueues `command` onto its cluster's worker, spawning the worker
    /// task on first use. Never blocks: a full queue is a busy cluster,
    /// reported to the caller rather than waited out.
    pub async fn enqueue(&self, command: Command) -> Result<()> {
        let cluster_id = command.cluster_id();
        let sender = self.sender_for(cluster_id).await;
        sender.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                Error::Unavailable(format!("cluster {cluster_id} is busy, try again shortly"))
            }
            mpsc::error::TrySendError::Closed(_) => {
                Error::Internal(format!("cluster {cluster_id} worker task has exited"))
            }
        })
    }

    async fn sender_for(&self, cluster_id: Uuid) -> mpsc::Sender<Command> {
        let mut senders = self.senders.lock().await;
        if let Some(sender) = senders.get(&cluster_id) {
            if !sender.is_closed() {
                return sender.clone();
            }
        }
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let deps = self.deps.clone();
        tokio::spawn(worker::run(cluster_id, deps, rx));
        senders.insert(cluster_id, tx.clone());
        tx
    }
}
