//! Failure recovery.
//!
//! When a node becomes unusable its pods have to be re-placed. Recovery
//! first works out which pods were affected:
//!
//! 1. if the node record still exists, its resident list;
//! 2. otherwise the resident list the caller captured before deleting it;
//! 3. otherwise a scan of all pods still referencing the node.
//!
//! Each affected pod is then handled on its own: detached (pending, no node),
//! and offered to the first-fit scheduler against the current node set minus
//! the failed node. Pods that do not fit stay pending; nothing is retried or
//! escalated here.
//!
//! Recovery runs inside the caller's critical section.

use cluster_sim_core::{NodeId, PodId};
use cluster_sim_scheduler::{place_excluding, Policy};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::state::ClusterState;

/// Where the set of affected pods came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPath {
    /// The failed node's record was still present.
    NodeRecord,
    /// The resident list captured by the caller before removal.
    Published,
    /// Pods found by scanning for references to the failed node.
    PodScan,
}

/// Outcome of one recovery pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// The node whose pods were recovered.
    pub failed_node: NodeId,
    /// How the affected pods were found.
    pub path: ResolutionPath,
    /// Pods placed elsewhere, with their new node.
    pub rescheduled: Vec<(PodId, NodeId)>,
    /// Pods left pending.
    pub pending: Vec<PodId>,
}

impl RecoveryReport {
    /// Number of pods recovery looked at.
    #[must_use]
    pub fn affected(&self) -> usize {
        self.rescheduled.len() + self.pending.len()
    }
}

/// Re-place every pod that lived on `failed`.
pub(crate) fn recover_pods(
    state: &mut ClusterState,
    failed: &NodeId,
    published: Option<Vec<PodId>>,
) -> RecoveryReport {
    let (path, affected) = resolve_affected(state, failed, published);
    let mut report = RecoveryReport {
        failed_node: failed.clone(),
        path,
        rescheduled: Vec::new(),
        pending: Vec::new(),
    };

    debug!(node_id = %failed, ?path, pods = affected.len(), "Recovering pods");

    for pod_id in affected {
        let Some(pod) = state.pod(&pod_id) else {
            warn!(pod_id = %pod_id, node_id = %failed, "Pod vanished before recovery");
            continue;
        };
        if pod.node_id.as_ref().is_some_and(|n| n != failed) {
            debug!(pod_id = %pod_id, "Pod already placed elsewhere, skipping");
            continue;
        }
        let cpus = pod.cpus;

        state.detach_pod(&pod_id);

        let target = match place_excluding(cpus, state.nodes(), Policy::FirstFit, failed) {
            Ok(target) => target,
            Err(e) => {
                warn!(pod_id = %pod_id, error = %e, "Pod left pending after node failure");
                report.pending.push(pod_id);
                continue;
            }
        };

        match state.commit_placement(&pod_id, &target) {
            Ok(()) => {
                info!(pod_id = %pod_id, from = %failed, to = %target, "Pod rescheduled");
                report.rescheduled.push((pod_id, target));
            }
            Err(e) => {
                error!(pod_id = %pod_id, error = %e, "Failed to commit rescheduled pod");
                report.pending.push(pod_id);
            }
        }
    }

    report
}

fn resolve_affected(
    state: &ClusterState,
    failed: &NodeId,
    published: Option<Vec<PodId>>,
) -> (ResolutionPath, Vec<PodId>) {
    if let Some(node) = state.node(failed) {
        return (ResolutionPath::NodeRecord, node.pods.clone());
    }
    if let Some(pods) = published {
        return (ResolutionPath::Published, pods);
    }

    let mut pods: Vec<PodId> = state
        .pods()
        .filter(|p| p.is_on(failed))
        .map(|p| p.pod_id)
        .collect();
    pods.sort();
    (ResolutionPath::PodScan, pods)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster_sim_core::{Node, Pod, PodStatus};

    struct Fixture {
        state: ClusterState,
        failed: NodeId,
        spare: NodeId,
    }

    /// `failed` (8 CPUs) and `spare` (`spare_cpus`), plus pods placed on
    /// `failed` with the given requests.
    fn fixture(spare_cpus: u32, pod_cpus: &[u32]) -> (Fixture, Vec<PodId>) {
        let mut state = ClusterState::default();
        let failed = NodeId::new("failed").unwrap();
        let spare = NodeId::new("spare").unwrap();

        let created = state.next_created_at();
        state.register_node(Node::new(failed.clone(), 8, created));
        let created = state.next_created_at();
        state.register_node(Node::new(spare.clone(), spare_cpus, created));

        let mut pods = Vec::new();
        for &cpus in pod_cpus {
            let pod = Pod::pending(cpus);
            let pod_id = pod.pod_id;
            state.insert_pod(pod);
            state.commit_placement(&pod_id, &failed).unwrap();
            pods.push(pod_id);
        }

        (
            Fixture {
                state,
                failed,
                spare,
            },
            pods,
        )
    }

    #[test]
    fn live_record_is_preferred_and_failed_node_excluded() {
        let (mut fx, pods) = fixture(4, &[2, 2]);

        let report = recover_pods(&mut fx.state, &fx.failed, None);

        assert_eq!(report.path, ResolutionPath::NodeRecord);
        assert_eq!(report.rescheduled.len(), 2);
        assert!(report.rescheduled.iter().all(|(_, n)| *n == fx.spare));

        let failed = fx.state.node(&fx.failed).unwrap();
        assert_eq!(failed.used_cpus, 0);
        assert!(failed.pods.is_empty());
        assert_eq!(fx.state.node(&fx.spare).unwrap().used_cpus, 4);
        for pod_id in pods {
            assert!(fx.state.pod(&pod_id).unwrap().is_on(&fx.spare));
        }
        fx.state.check_invariants().unwrap();
    }

    #[test]
    fn published_list_used_when_record_is_gone() {
        let (mut fx, pods) = fixture(4, &[3]);

        let node = fx.state.remove_node(&fx.failed).unwrap();
        let report = recover_pods(&mut fx.state, &fx.failed, Some(node.pods));

        assert_eq!(report.path, ResolutionPath::Published);
        assert_eq!(report.rescheduled, vec![(pods[0], fx.spare.clone())]);
        fx.state.check_invariants().unwrap();
    }

    #[test]
    fn scan_finds_pods_when_nothing_was_published() {
        let (mut fx, pods) = fixture(4, &[1, 2]);

        fx.state.remove_node(&fx.failed);
        let report = recover_pods(&mut fx.state, &fx.failed, None);

        assert_eq!(report.path, ResolutionPath::PodScan);
        assert_eq!(report.affected(), 2);
        assert_eq!(report.rescheduled.len(), 2);
        for pod_id in pods {
            assert!(fx.state.pod(&pod_id).unwrap().is_on(&fx.spare));
        }
        fx.state.check_invariants().unwrap();
    }

    #[test]
    fn pods_that_do_not_fit_stay_pending() {
        let (mut fx, pods) = fixture(3, &[2, 2]);

        fx.state.remove_node(&fx.failed);
        let report = recover_pods(&mut fx.state, &fx.failed, None);

        assert_eq!(report.rescheduled.len(), 1);
        assert_eq!(report.pending.len(), 1);

        let pending = fx.state.pod(&report.pending[0]).unwrap();
        assert_eq!(pending.status, PodStatus::Pending);
        assert!(pending.node_id.is_none());

        assert_eq!(fx.state.node(&fx.spare).unwrap().used_cpus, 2);
        assert!(pods.iter().all(|p| !fx.state.pod(p).unwrap().is_on(&fx.failed)));
        fx.state.check_invariants().unwrap();
    }

    #[test]
    fn second_pass_finds_nothing_to_do() {
        let (mut fx, _) = fixture(8, &[2]);

        let node = fx.state.remove_node(&fx.failed).unwrap();
        let first = recover_pods(&mut fx.state, &fx.failed, Some(node.pods));
        assert_eq!(first.rescheduled.len(), 1);

        let second = recover_pods(&mut fx.state, &fx.failed, None);
        assert_eq!(second.path, ResolutionPath::PodScan);
        assert_eq!(second.affected(), 0);
        assert_eq!(fx.state.node(&fx.spare).unwrap().used_cpus, 2);
    }

    #[test]
    fn stale_published_entry_for_moved_pod_is_skipped() {
        let (mut fx, pods) = fixture(8, &[2]);

        let node = fx.state.remove_node(&fx.failed).unwrap();
        fx.state.detach_pod(&pods[0]);
        fx.state.commit_placement(&pods[0], &fx.spare).unwrap();

        let report = recover_pods(&mut fx.state, &fx.failed, Some(node.pods));
        assert_eq!(report.affected(), 0);
        assert_eq!(fx.state.node(&fx.spare).unwrap().used_cpus, 2);
        fx.state.check_invariants().unwrap();
    }
}
