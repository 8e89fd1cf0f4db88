//! Cluster data model.
//!
//! These types describe the nodes and pods tracked by the cluster store.
//! Snapshots of them are handed out to callers, so all of them are plain
//! serializable values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{NodeId, PodId};

/// A capacity-bearing node backed by one container-backend unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Identifier issued by the backend at provisioning.
    pub node_id: NodeId,
    /// Total CPU capacity.
    pub cpus: u32,
    /// CPU currently reserved by resident pods.
    pub used_cpus: u32,
    /// Last observed status.
    pub status: NodeStatus,
    /// Resident pods, in placement order.
    pub pods: Vec<PodId>,
    /// Registration time; the scheduling tie-break.
    pub created_at: DateTime<Utc>,
}

impl Node {
    /// Create an empty, pending node.
    #[must_use]
    pub fn new(node_id: NodeId, cpus: u32, created_at: DateTime<Utc>) -> Self {
        Self {
            node_id,
            cpus,
            used_cpus: 0,
            status: NodeStatus::Pending,
            pods: Vec::new(),
            created_at,
        }
    }

    /// CPU not yet reserved by any pod.
    #[must_use]
    pub const fn free_cpus(&self) -> u32 {
        self.cpus.saturating_sub(self.used_cpus)
    }

    /// Whether a pod requesting `request` CPUs fits on this node.
    #[must_use]
    pub const fn can_fit(&self, request: u32) -> bool {
        self.free_cpus() >= request
    }

    /// Free CPU that would remain after placing `request`, if it fits.
    #[must_use]
    pub const fn leftover(&self, request: u32) -> Option<u32> {
        self.free_cpus().checked_sub(request)
    }

    /// Whether `pod_id` is in the resident list.
    #[must_use]
    pub fn hosts(&self, pod_id: &PodId) -> bool {
        self.pods.contains(pod_id)
    }
}

/// Status of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Registered but not yet confirmed running.
    #[default]
    Pending,
    /// Backend reports the unit running.
    Running,
    /// Backend reports the unit present but not running.
    Stopped,
    /// Backend could not inspect the unit.
    Unhealthy,
}

impl NodeStatus {
    /// Map a successful liveness probe to a status.
    #[must_use]
    pub const fn from_liveness(running: bool) -> Self {
        if running {
            Self::Running
        } else {
            Self::Stopped
        }
    }
}

/// A schedulable workload with a fixed CPU request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    /// Unique identifier for the pod.
    pub pod_id: PodId,
    /// Requested CPU.
    pub cpus: u32,
    /// Node the pod is placed on; `None` while pending.
    pub node_id: Option<NodeId>,
    /// Current status.
    pub status: PodStatus,
}

impl Pod {
    /// Create a new unplaced pod with a fresh identifier.
    #[must_use]
    pub fn pending(cpus: u32) -> Self {
        Self {
            pod_id: PodId::generate(),
            cpus,
            node_id: None,
            status: PodStatus::Pending,
        }
    }

    /// Record a placement on `node_id`.
    pub fn assign(&mut self, node_id: NodeId) {
        self.node_id = Some(node_id);
        self.status = PodStatus::Running;
    }

    /// Clear the placement and return to pending.
    pub fn unassign(&mut self) -> Option<NodeId> {
        self.status = PodStatus::Pending;
        self.node_id.take()
    }

    /// Whether the pod is assigned to `node_id`.
    #[must_use]
    pub fn is_on(&self, node_id: &NodeId) -> bool {
        self.node_id.as_ref() == Some(node_id)
    }
}

/// Status of a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PodStatus {
    /// Waiting for a node with enough free CPU.
    #[default]
    Pending,
    /// Placed on a node.
    Running,
    /// Terminal failure. Never assigned by the cluster itself.
    Failed,
}

/// Resource specification handed to the backend when provisioning a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSpec {
    /// CPU capacity of the unit.
    pub cpus: u32,
}

impl CpuSpec {
    /// Create a spec for `cpus` CPUs.
    #[must_use]
    pub const fn new(cpus: u32) -> Self {
        Self { cpus }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(cpus: u32, used: u32) -> Node {
        let mut node = Node::new(NodeId::new("node-a").unwrap(), cpus, Utc::now());
        node.used_cpus = used;
        node
    }

    #[test]
    fn node_capacity_math() {
        let n = node(10, 8);
        assert_eq!(n.free_cpus(), 2);
        assert!(n.can_fit(2));
        assert!(!n.can_fit(3));
        assert_eq!(n.leftover(2), Some(0));
        assert_eq!(n.leftover(1), Some(1));
        assert_eq!(n.leftover(3), None);
    }

    #[test]
    fn new_node_is_empty_and_pending() {
        let n = node(4, 0);
        assert_eq!(n.status, NodeStatus::Pending);
        assert!(n.pods.is_empty());
        assert_eq!(n.free_cpus(), 4);
    }

    #[test]
    fn status_from_liveness() {
        assert_eq!(NodeStatus::from_liveness(true), NodeStatus::Running);
        assert_eq!(NodeStatus::from_liveness(false), NodeStatus::Stopped);
    }

    #[test]
    fn pod_assign_and_unassign() {
        let node_id = NodeId::new("node-a").unwrap();
        let mut pod = Pod::pending(2);
        assert_eq!(pod.status, PodStatus::Pending);
        assert!(pod.node_id.is_none());

        pod.assign(node_id.clone());
        assert_eq!(pod.status, PodStatus::Running);
        assert!(pod.is_on(&node_id));

        assert_eq!(pod.unassign(), Some(node_id.clone()));
        assert_eq!(pod.status, PodStatus::Pending);
        assert!(!pod.is_on(&node_id));
    }

    #[test]
    fn statuses_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&NodeStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
        assert_eq!(
            serde_json::to_string(&PodStatus::Pending).unwrap(),
            "\"pending\""
        );
    }
}
