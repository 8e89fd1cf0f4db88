//! Node health monitoring.
//!
//! A single background task sweeps every node at a fixed interval. For each
//! node it inspects the backing unit (bounded by a timeout) and records what
//! it saw:
//!
//! - running: `Running`
//! - reachable but not running: `Stopped`
//! - inspection failed: `Unhealthy`, then a restart is attempted. A node that
//!   does not come back is evicted and its pods recovered.
//!
//! Inspection and restarts happen outside the store guard; only the status
//! commit and the eviction take it. A node removed mid-sweep is skipped.
//! Each node check holds a restart permit, so a sweep never restarts or
//! evicts once shutdown has begun and shutdown waits for the check in
//! progress.

use std::sync::Arc;
use std::time::Duration;

use cluster_sim_backend::{BackendError, ContainerBackend};
use cluster_sim_core::{NodeId, NodeStatus};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ClusterConfig;
use crate::recovery::RecoveryReport;
use crate::store::ClusterStore;

/// Inspect a unit, giving up after `timeout`.
pub(crate) async fn probe<B: ContainerBackend + ?Sized>(
    backend: &B,
    node_id: &NodeId,
    timeout: Duration,
) -> Result<bool, BackendError> {
    tokio::time::timeout(timeout, backend.inspect(node_id))
        .await
        .map_err(|_| BackendError::Timeout {
            op: "inspect",
            after: timeout,
        })?
}

/// Status implied by a probe result.
pub(crate) fn classify(observed: &Result<bool, BackendError>) -> NodeStatus {
    match observed {
        Ok(running) => NodeStatus::from_liveness(*running),
        Err(_) => NodeStatus::Unhealthy,
    }
}

/// Stop, wait, start, wait, then confirm the unit reports running.
pub(crate) async fn restart_sequence<B: ContainerBackend + ?Sized>(
    backend: &B,
    node_id: &NodeId,
    config: &ClusterConfig,
) -> Result<(), BackendError> {
    backend.stop(node_id).await?;
    tokio::time::sleep(config.restart_settle()).await;
    backend.start(node_id).await?;
    tokio::time::sleep(config.post_restart_grace()).await;

    if probe(backend, node_id, config.inspect_timeout()).await? {
        Ok(())
    } else {
        Err(BackendError::operation(
            "restart",
            node_id.as_str(),
            "unit not running after restart",
        ))
    }
}

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Nodes found running.
    pub running: Vec<NodeId>,
    /// Nodes reachable but not running.
    pub stopped: Vec<NodeId>,
    /// Nodes that failed inspection and came back after a restart.
    pub remediated: Vec<NodeId>,
    /// Nodes removed because the restart did not help.
    pub evicted: Vec<RecoveryReport>,
}

impl SweepReport {
    /// Number of nodes that needed attention.
    #[must_use]
    pub fn incidents(&self) -> usize {
        self.remediated.len() + self.evicted.len()
    }
}

enum Outcome {
    Running,
    Stopped,
    Remediated,
    Evicted(RecoveryReport),
    Vanished,
    Draining,
}

/// Periodic liveness checker for every node in a store.
pub struct HealthMonitor<B: ContainerBackend> {
    store: Arc<ClusterStore<B>>,
}

impl<B: ContainerBackend + 'static> HealthMonitor<B> {
    /// Create a monitor over `store`.
    #[must_use]
    pub const fn new(store: Arc<ClusterStore<B>>) -> Self {
        Self { store }
    }

    /// Check every node once.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        for node_id in self.store.node_ids().await {
            match self.check_node(&node_id).await {
                Outcome::Running => report.running.push(node_id),
                Outcome::Stopped => report.stopped.push(node_id),
                Outcome::Remediated => report.remediated.push(node_id),
                Outcome::Evicted(recovery) => report.evicted.push(recovery),
                Outcome::Vanished => debug!(node_id = %node_id, "Node removed during sweep"),
                Outcome::Draining => {
                    debug!("Cluster is shutting down, sweep abandoned");
                    break;
                }
            }
        }

        report
    }

    async fn check_node(&self, node_id: &NodeId) -> Outcome {
        let Some(_permit) = self.store.begin_restart().await else {
            return Outcome::Draining;
        };
        let backend = self.store.backend().as_ref();
        let config = self.store.config();

        let observed = probe(backend, node_id, config.inspect_timeout()).await;
        let status = classify(&observed);
        if !self.store.record_status(node_id, status).await {
            return Outcome::Vanished;
        }

        let Err(e) = observed else {
            return if status == NodeStatus::Running {
                Outcome::Running
            } else {
                Outcome::Stopped
            };
        };

        warn!(node_id = %node_id, error = %e, "Node unhealthy, attempting restart");
        match restart_sequence(backend, node_id, config).await {
            Ok(()) => {
                if !self.store.record_status(node_id, NodeStatus::Running).await {
                    return Outcome::Vanished;
                }
                info!(node_id = %node_id, "Node recovered after restart");
                Outcome::Remediated
            }
            Err(e) => {
                error!(node_id = %node_id, error = %e, "Restart failed, evicting node");
                self.store
                    .evict_node(node_id)
                    .await
                    .map_or(Outcome::Vanished, Outcome::Evicted)
            }
        }
    }

    /// Run the sweep loop on a background task.
    #[must_use]
    pub fn spawn(self) -> MonitorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(self.run(shutdown_rx));
        MonitorHandle {
            shutdown_tx,
            handle,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let interval = self.store.config().health_interval();
        info!(interval_secs = interval.as_secs(), "Health monitor started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let report = self.sweep().await;
            if report.incidents() > 0 {
                info!(
                    remediated = report.remediated.len(),
                    evicted = report.evicted.len(),
                    "Health sweep handled failures"
                );
            } else {
                debug!(
                    running = report.running.len(),
                    stopped = report.stopped.len(),
                    "Health sweep complete"
                );
            }

            tokio::select! {
                () = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Health monitor stopped");
    }
}

/// Handle to a running health monitor.
pub struct MonitorHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl MonitorHandle {
    /// Signal the monitor to stop and wait for the current sweep to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            error!(error = %e, "Health monitor task failed");
        }
    }

    /// Whether the background task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
