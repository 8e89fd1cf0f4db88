//! Cluster state store.
//!
//! `ClusterStore` is the only owner of node and pod state. Every operation
//! takes the store-wide guard on entry; the guard is an RAII value, so it is
//! released on every exit path including errors.
//!
//! Guard discipline:
//! - provisioning and teardown backend calls (provision, start after
//!   provision, destroy, shutdown stop) are awaited while holding the guard,
//!   one node at a time;
//! - liveness probing and restart sequences run on a snapshot outside the
//!   guard, and the guard is taken again only to commit. Commits tolerate the
//!   node having been removed in the meantime.
//!
//! Restarts hold a read permit on the drain gate for their whole unguarded
//! run; `shutdown` takes the write side, so it waits for in-flight restarts
//! and no restart begins once the drain has started.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cluster_sim_backend::ContainerBackend;
use cluster_sim_core::{CpuSpec, Node, NodeId, NodeStatus, Pod, PodId, PodStatus};
use cluster_sim_scheduler::{place, Policy, SchedulerError};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard};
use tracing::{debug, error, info, warn};

use crate::config::ClusterConfig;
use crate::error::{ControlError, Result};
use crate::health::{classify, probe, restart_sequence};
use crate::recovery::{recover_pods, RecoveryReport};
use crate::state::ClusterState;

/// Where a pod ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    /// Node hosting the pod.
    pub node_id: NodeId,
    /// The placed pod.
    pub pod_id: PodId,
}

/// Operations exposed to the API layer.
#[async_trait]
pub trait ClusterControl: Send + Sync {
    /// Provision a backend unit and register it as a node.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` for a zero or oversized capacity and
    /// `ControlError::Backend` if provisioning fails. No node is recorded on
    /// failure.
    async fn add_node(&self, cpus: u32) -> Result<NodeId>;

    /// Tear down a node and re-place its pods.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NodeNotFound` for an unknown node and
    /// `ControlError::Backend` if the teardown fails, in which case nothing
    /// changes.
    async fn remove_node(&self, node_id: &NodeId) -> Result<RecoveryReport>;

    /// Restart a node's unit and confirm it is running again.
    ///
    /// A node that does not come back is evicted and its pods recovered.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NodeNotFound` for an unknown node and
    /// `ControlError::Backend` if the restart failed and the node was removed.
    async fn restart_node(&self, node_id: &NodeId) -> Result<()>;

    /// Create a pod and place it according to `policy`.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` for a zero request and
    /// `ControlError::NoCapacity` if no node fits. In the latter case the pod
    /// is kept as pending.
    async fn schedule_pod(&self, cpus: u32, policy: Policy) -> Result<Placement>;

    /// Point-in-time copy of all nodes, with freshly probed liveness.
    async fn list_nodes(&self) -> Vec<Node>;
}

/// The authoritative node and pod store.
pub struct ClusterStore<B: ContainerBackend> {
    state: Mutex<ClusterState>,
    backend: Arc<B>,
    config: ClusterConfig,
    accepting: AtomicBool,
    drain: RwLock<()>,
}

impl<B: ContainerBackend + 'static> ClusterStore<B> {
    /// Create an empty store over `backend`.
    #[must_use]
    pub fn new(backend: Arc<B>, config: ClusterConfig) -> Self {
        Self {
            state: Mutex::new(ClusterState::default()),
            backend,
            config,
            accepting: AtomicBool::new(true),
            drain: RwLock::new(()),
        }
    }

    /// Get a reference to the backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Whether mutating operations are still accepted.
    #[must_use]
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Look up a node.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NodeNotFound` if the node does not exist.
    pub async fn get_node(&self, node_id: &NodeId) -> Result<Node> {
        self.state
            .lock()
            .await
            .node(node_id)
            .cloned()
            .ok_or_else(|| ControlError::NodeNotFound(node_id.clone()))
    }

    /// Look up a pod.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::PodNotFound` if the pod does not exist.
    pub async fn get_pod(&self, pod_id: &PodId) -> Result<Pod> {
        self.state
            .lock()
            .await
            .pod(pod_id)
            .cloned()
            .ok_or(ControlError::PodNotFound(*pod_id))
    }

    /// Copies of all pods, ordered by id.
    pub async fn list_pods(&self) -> Vec<Pod> {
        let mut pods: Vec<Pod> = self.state.lock().await.pods().cloned().collect();
        pods.sort_by_key(|p| p.pod_id);
        pods
    }

    /// Sum of all node capacities.
    pub async fn total_cpus(&self) -> u64 {
        self.state.lock().await.total_cpus()
    }

    /// Verify that node and pod records agree.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InternalInconsistency` describing the first
    /// violation found.
    pub async fn check_invariants(&self) -> Result<()> {
        self.state.lock().await.check_invariants()
    }

    /// Schedule a pod by policy name, using the configured default when no
    /// name is given. Unknown names select first-fit.
    ///
    /// # Errors
    ///
    /// Same as [`ClusterControl::schedule_pod`].
    pub async fn schedule_pod_named(&self, cpus: u32, policy: Option<&str>) -> Result<Placement> {
        let policy = policy.map_or(self.config.default_policy, Policy::from_name);
        self.schedule_pod(cpus, policy).await
    }

    /// Try to place every pending pod, first-fit, in pod id order.
    ///
    /// Returns the placements made; pods that still do not fit stay pending.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ShuttingDown` once shutdown has begun.
    pub async fn reschedule_pending(&self) -> Result<Vec<Placement>> {
        let mut state = self.lock_accepting().await?;

        let mut pending: Vec<(PodId, u32)> = state
            .pods()
            .filter(|p| p.node_id.is_none() && p.status == PodStatus::Pending)
            .map(|p| (p.pod_id, p.cpus))
            .collect();
        pending.sort_by_key(|(pod_id, _)| *pod_id);

        let mut placed = Vec::new();
        for (pod_id, cpus) in pending {
            let Ok(node_id) = place(cpus, state.nodes(), Policy::FirstFit) else {
                debug!(pod_id = %pod_id, cpus, "Pending pod still does not fit");
                continue;
            };
            state.commit_placement(&pod_id, &node_id)?;
            info!(pod_id = %pod_id, node_id = %node_id, "Pending pod scheduled");
            placed.push(Placement { node_id, pod_id });
        }

        Ok(placed)
    }

    /// Drain the cluster.
    ///
    /// Stops accepting mutations, waits for in-flight restarts to finish,
    /// then stops every node's unit under the guard. Backend failures are
    /// logged and skipped. Returns how many nodes were stopped; a second call
    /// stops nothing.
    pub async fn shutdown(&self) -> usize {
        if !self.accepting.swap(false, Ordering::SeqCst) {
            debug!("Shutdown already in progress");
            return 0;
        }

        let _drain = self.drain.write().await;
        let mut state = self.state.lock().await;
        info!("Stopping all nodes...");

        let mut stopped = 0;
        for node_id in state.node_ids() {
            match self.backend.stop(&node_id).await {
                Ok(()) => {
                    state.set_status(&node_id, NodeStatus::Stopped);
                    stopped += 1;
                    info!(node_id = %node_id, "Node stopped");
                }
                Err(e) => {
                    error!(node_id = %node_id, error = %e, "Error stopping node");
                }
            }
        }

        info!(stopped, "All nodes have been stopped");
        stopped
    }

    /// Permit for a restart that runs outside the guard.
    ///
    /// `None` once shutdown has begun. Holding the permit delays the drain
    /// until it is dropped.
    pub(crate) async fn begin_restart(&self) -> Option<RwLockReadGuard<'_, ()>> {
        let permit = self.drain.read().await;
        self.is_accepting().then_some(permit)
    }

    /// Node ids in creation order.
    pub(crate) async fn node_ids(&self) -> Vec<NodeId> {
        self.state.lock().await.node_ids()
    }

    /// Commit an observed status. Returns false if the node is gone.
    pub(crate) async fn record_status(&self, node_id: &NodeId, status: NodeStatus) -> bool {
        self.state.lock().await.set_status(node_id, status)
    }

    /// Forcibly destroy and remove a node that failed remediation, then
    /// recover its pods.
    ///
    /// Returns `None` if the node was already removed, so a node is evicted
    /// and its pods recovered at most once no matter how many callers race.
    pub(crate) async fn evict_node(&self, node_id: &NodeId) -> Option<RecoveryReport> {
        let mut state = self.state.lock().await;
        if !state.contains_node(node_id) {
            debug!(node_id = %node_id, "Node already removed, nothing to evict");
            return None;
        }

        if let Err(e) = self.backend.destroy(node_id).await {
            warn!(node_id = %node_id, error = %e, "Destroy failed, removing node anyway");
        }

        let report = Self::drop_node(&mut state, node_id);
        warn!(
            node_id = %node_id,
            rescheduled = report.rescheduled.len(),
            pending = report.pending.len(),
            "Evicted unrecoverable node"
        );
        Some(report)
    }

    /// Remove a node record, publishing its resident list to recovery.
    fn drop_node(state: &mut ClusterState, node_id: &NodeId) -> RecoveryReport {
        let published = state.remove_node(node_id).map(|node| node.pods);
        recover_pods(state, node_id, published)
    }

    async fn lock_accepting(&self) -> Result<MutexGuard<'_, ClusterState>> {
        if !self.is_accepting() {
            return Err(ControlError::ShuttingDown);
        }
        let state = self.state.lock().await;
        // Shutdown may have started while we waited for the guard.
        if !self.is_accepting() {
            return Err(ControlError::ShuttingDown);
        }
        Ok(state)
    }
}

#[async_trait]
impl<B: ContainerBackend + 'static> ClusterControl for ClusterStore<B> {
    async fn add_node(&self, cpus: u32) -> Result<NodeId> {
        self.config.validate_cpus(cpus)?;
        let mut state = self.lock_accepting().await?;

        let node_id = self
            .backend
            .provision(&CpuSpec::new(cpus))
            .await
            .inspect_err(|e| error!(cpus, error = %e, "Failed to provision node"))?;

        // A reissued id names a unit that already backs a registered node.
        // Leave it alone: starting or destroying it would act on that node.
        if state.contains_node(&node_id) {
            error!(node_id = %node_id, "Backend reissued a registered node id");
            return Err(ControlError::InternalInconsistency(format!(
                "backend reissued node id {node_id}"
            )));
        }

        if let Err(e) = self.backend.start(&node_id).await {
            error!(node_id = %node_id, error = %e, "Failed to start node, discarding unit");
            if let Err(cleanup) = self.backend.destroy(&node_id).await {
                warn!(node_id = %node_id, error = %cleanup, "Failed to discard unit");
            }
            return Err(e.into());
        }

        let mut node = Node::new(node_id.clone(), cpus, state.next_created_at());
        node.status = NodeStatus::Running;
        state.register_node(node);

        info!(
            node_id = %node_id,
            cpus,
            total_cpus = state.total_cpus(),
            "Node created"
        );
        Ok(node_id)
    }

    async fn remove_node(&self, node_id: &NodeId) -> Result<RecoveryReport> {
        let mut state = self.lock_accepting().await?;
        if !state.contains_node(node_id) {
            return Err(ControlError::NodeNotFound(node_id.clone()));
        }

        self.backend
            .destroy(node_id)
            .await
            .inspect_err(|e| error!(node_id = %node_id, error = %e, "Failed to destroy node"))?;

        let report = Self::drop_node(&mut state, node_id);
        info!(
            node_id = %node_id,
            rescheduled = report.rescheduled.len(),
            pending = report.pending.len(),
            total_cpus = state.total_cpus(),
            "Node deleted and pods rescheduled"
        );
        Ok(report)
    }

    async fn restart_node(&self, node_id: &NodeId) -> Result<()> {
        let Some(_restart) = self.begin_restart().await else {
            return Err(ControlError::ShuttingDown);
        };
        if !self.state.lock().await.contains_node(node_id) {
            return Err(ControlError::NodeNotFound(node_id.clone()));
        }

        match restart_sequence(self.backend.as_ref(), node_id, &self.config).await {
            Ok(()) => {
                if !self.record_status(node_id, NodeStatus::Running).await {
                    return Err(ControlError::NodeNotFound(node_id.clone()));
                }
                info!(node_id = %node_id, "Node restarted");
                Ok(())
            }
            Err(e) => {
                warn!(node_id = %node_id, error = %e, "Node still unhealthy, removing and rescheduling");
                self.evict_node(node_id).await;
                Err(e.into())
            }
        }
    }

    async fn schedule_pod(&self, cpus: u32, policy: Policy) -> Result<Placement> {
        if cpus == 0 {
            return Err(ControlError::Validation(
                "pod CPU request must be positive".to_string(),
            ));
        }
        let mut state = self.lock_accepting().await?;

        let pod = Pod::pending(cpus);
        let pod_id = pod.pod_id;
        state.insert_pod(pod);
        debug!(pod_id = %pod_id, cpus, "Pod created (pending)");

        match place(cpus, state.nodes(), policy) {
            Ok(node_id) => {
                state.commit_placement(&pod_id, &node_id)?;
                info!(pod_id = %pod_id, node_id = %node_id, policy = %policy, "Pod scheduled");
                Ok(Placement { node_id, pod_id })
            }
            Err(SchedulerError::NoCapacity { requested }) => {
                warn!(pod_id = %pod_id, requested, policy = %policy, "No capacity, pod left pending");
                Err(ControlError::NoCapacity { pod_id, requested })
            }
        }
    }

    async fn list_nodes(&self) -> Vec<Node> {
        let mut nodes = self.state.lock().await.snapshot_nodes();
        let snapshot: Vec<NodeStatus> = nodes.iter().map(|n| n.status).collect();

        let timeout = self.config.inspect_timeout();
        for node in &mut nodes {
            let observed = probe(self.backend.as_ref(), &node.node_id, timeout).await;
            node.status = classify(&observed);
        }

        // Statuses committed while probing (a restart, a drain) are newer
        // than what this listing saw.
        let mut state = self.state.lock().await;
        for (node, seen) in nodes.iter().zip(snapshot) {
            state.replace_status(&node.node_id, seen, node.status);
        }
        nodes
    }
}
