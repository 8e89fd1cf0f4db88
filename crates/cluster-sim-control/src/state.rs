//! Guarded cluster state.
//!
//! `ClusterState` holds the node map, the pod map and the capacity
//! aggregate. It is only reachable through the store's mutex, so every method
//! here runs inside a single critical section and may assume no concurrent
//! writer.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use cluster_sim_core::{Node, NodeId, NodeStatus, Pod, PodId, PodStatus};

use crate::error::{ControlError, Result};

#[derive(Debug, Default)]
pub(crate) struct ClusterState {
    nodes: HashMap<NodeId, Node>,
    pods: HashMap<PodId, Pod>,
    /// Sum of node capacities, kept incrementally.
    total_cpus: u64,
    last_created: Option<DateTime<Utc>>,
}

impl ClusterState {
    /// Creation timestamp for a new node, strictly after every earlier one.
    pub(crate) fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let created = match self.last_created {
            Some(last) if now <= last => last + Duration::nanoseconds(1),
            _ => now,
        };
        self.last_created = Some(created);
        created
    }

    pub(crate) fn register_node(&mut self, node: Node) {
        self.total_cpus += u64::from(node.cpus);
        self.nodes.insert(node.node_id.clone(), node);
    }

    pub(crate) fn remove_node(&mut self, node_id: &NodeId) -> Option<Node> {
        let node = self.nodes.remove(node_id)?;
        self.total_cpus -= u64::from(node.cpus);
        Some(node)
    }

    pub(crate) fn node(&self, node_id: &NodeId) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub(crate) fn contains_node(&self, node_id: &NodeId) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub(crate) fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub(crate) fn pod(&self, pod_id: &PodId) -> Option<&Pod> {
        self.pods.get(pod_id)
    }

    pub(crate) fn pods(&self) -> impl Iterator<Item = &Pod> {
        self.pods.values()
    }

    pub(crate) fn insert_pod(&mut self, pod: Pod) {
        self.pods.insert(pod.pod_id, pod);
    }

    pub(crate) const fn total_cpus(&self) -> u64 {
        self.total_cpus
    }

    /// Node ids in creation order.
    pub(crate) fn node_ids(&self) -> Vec<NodeId> {
        self.snapshot_nodes().into_iter().map(|n| n.node_id).collect()
    }

    /// Copies of all nodes in creation order.
    pub(crate) fn snapshot_nodes(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });
        nodes
    }

    /// Set a node's status. Returns false if the node is gone.
    pub(crate) fn set_status(&mut self, node_id: &NodeId, status: NodeStatus) -> bool {
        match self.nodes.get_mut(node_id) {
            Some(node) => {
                node.status = status;
                true
            }
            None => false,
        }
    }

    /// Set a node's status only if it is still `expected`. Returns whether
    /// the status was written.
    pub(crate) fn replace_status(
        &mut self,
        node_id: &NodeId,
        expected: NodeStatus,
        status: NodeStatus,
    ) -> bool {
        match self.nodes.get_mut(node_id) {
            Some(node) if node.status == expected => {
                node.status = status;
                true
            }
            _ => false,
        }
    }

    /// Place a pod on a node: reserve CPU, append to the resident list and
    /// mark the pod running, all or nothing.
    pub(crate) fn commit_placement(&mut self, pod_id: &PodId, node_id: &NodeId) -> Result<()> {
        let pod = self.pods.get_mut(pod_id).ok_or_else(|| {
            ControlError::InternalInconsistency(format!("placing unknown pod {pod_id}"))
        })?;
        let node = self.nodes.get_mut(node_id).ok_or_else(|| {
            ControlError::InternalInconsistency(format!("placing {pod_id} on unknown node {node_id}"))
        })?;

        if pod.node_id.is_some() {
            return Err(ControlError::InternalInconsistency(format!(
                "pod {pod_id} is already placed"
            )));
        }
        if !node.can_fit(pod.cpus) {
            return Err(ControlError::InternalInconsistency(format!(
                "node {node_id} cannot fit {} CPUs for {pod_id}",
                pod.cpus
            )));
        }

        node.used_cpus += pod.cpus;
        node.pods.push(*pod_id);
        pod.assign(node_id.clone());
        Ok(())
    }

    /// Clear a pod's placement and return it to pending.
    ///
    /// If its node still exists the reservation is released there too.
    /// Returns the node the pod was on.
    pub(crate) fn detach_pod(&mut self, pod_id: &PodId) -> Option<NodeId> {
        let pod = self.pods.get_mut(pod_id)?;
        let cpus = pod.cpus;
        let previous = pod.unassign()?;

        if let Some(node) = self.nodes.get_mut(&previous) {
            if let Some(pos) = node.pods.iter().position(|p| p == pod_id) {
                node.pods.remove(pos);
                node.used_cpus = node.used_cpus.saturating_sub(cpus);
            }
        }
        Some(previous)
    }

    /// Verify node/pod cross references and CPU accounting.
    pub(crate) fn check_invariants(&self) -> Result<()> {
        let capacity: u64 = self.nodes.values().map(|n| u64::from(n.cpus)).sum();
        if capacity != self.total_cpus {
            return inconsistent(format!(
                "aggregate capacity {} does not match node sum {capacity}",
                self.total_cpus
            ));
        }

        for node in self.nodes.values() {
            if node.used_cpus > node.cpus {
                return inconsistent(format!(
                    "node {} uses {} of {} CPUs",
                    node.node_id, node.used_cpus, node.cpus
                ));
            }

            let mut seen = HashSet::new();
            let mut resident_cpus = 0u32;
            for pod_id in &node.pods {
                if !seen.insert(pod_id) {
                    return inconsistent(format!("pod {pod_id} listed twice on {}", node.node_id));
                }
                let Some(pod) = self.pods.get(pod_id) else {
                    return inconsistent(format!(
                        "node {} lists unknown pod {pod_id}",
                        node.node_id
                    ));
                };
                if !pod.is_on(&node.node_id) {
                    return inconsistent(format!(
                        "node {} lists pod {pod_id} assigned elsewhere",
                        node.node_id
                    ));
                }
                resident_cpus += pod.cpus;
            }

            if resident_cpus != node.used_cpus {
                return inconsistent(format!(
                    "node {} reports {} used CPUs but residents need {resident_cpus}",
                    node.node_id, node.used_cpus
                ));
            }
        }

        for pod in self.pods.values() {
            match &pod.node_id {
                Some(node_id) => {
                    let hosted = self.nodes.get(node_id).is_some_and(|n| n.hosts(&pod.pod_id));
                    if !hosted {
                        return inconsistent(format!(
                            "pod {} references node {node_id} which does not host it",
                            pod.pod_id
                        ));
                    }
                    if pod.status != PodStatus::Running {
                        return inconsistent(format!(
                            "placed pod {} has status {:?}",
                            pod.pod_id, pod.status
                        ));
                    }
                }
                None if pod.status == PodStatus::Running => {
                    return inconsistent(format!("pod {} is running nowhere", pod.pod_id));
                }
                None => {}
            }
        }

        Ok(())
    }
}

fn inconsistent(message: String) -> Result<()> {
    Err(ControlError::InternalInconsistency(message))
}
