//! Node selection.
//!
//! Placement is a pure function of the CPU request, the candidate nodes and
//! the policy. Candidates are always visited in ascending creation order
//! (node id breaks exact timestamp ties), which makes every policy
//! deterministic: when two nodes score the same, the older one wins.
//!
//! Nothing here mutates a node. The caller commits the placement.

use cluster_sim_core::{Node, NodeId};
use tracing::trace;

use crate::error::{Result, SchedulerError};
use crate::policy::Policy;

/// Choose a node for a pod requesting `request` CPUs.
///
/// # Errors
///
/// Returns `SchedulerError::NoCapacity` if no node has `request` free CPUs.
pub fn place<'a, I>(request: u32, nodes: I, policy: Policy) -> Result<NodeId>
where
    I: IntoIterator<Item = &'a Node>,
{
    select(request, creation_order(nodes, None), policy)
}

/// Like [`place`], but never chooses `excluded`.
///
/// Used when re-placing pods away from a node that is being torn down but
/// may still be present in the node set.
///
/// # Errors
///
/// Returns `SchedulerError::NoCapacity` if no other node has room.
pub fn place_excluding<'a, I>(
    request: u32,
    nodes: I,
    policy: Policy,
    excluded: &NodeId,
) -> Result<NodeId>
where
    I: IntoIterator<Item = &'a Node>,
{
    select(request, creation_order(nodes, Some(excluded)), policy)
}

fn creation_order<'a, I>(nodes: I, excluded: Option<&NodeId>) -> Vec<&'a Node>
where
    I: IntoIterator<Item = &'a Node>,
{
    let mut candidates: Vec<&Node> = nodes
        .into_iter()
        .filter(|n| excluded != Some(&n.node_id))
        .collect();
    candidates.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
    candidates
}

fn select(request: u32, candidates: Vec<&Node>, policy: Policy) -> Result<NodeId> {
    let chosen = match policy {
        Policy::FirstFit => candidates.into_iter().find(|n| n.can_fit(request)),
        Policy::BestFit => by_leftover(request, candidates, |new, best| new < best),
        Policy::WorstFit => by_leftover(request, candidates, |new, best| new > best),
    };

    match chosen {
        Some(node) => {
            trace!(
                node_id = %node.node_id,
                request,
                policy = %policy,
                free = node.free_cpus(),
                "Selected node"
            );
            Ok(node.node_id.clone())
        }
        None => Err(SchedulerError::NoCapacity { requested: request }),
    }
}

/// Scan eligible nodes, keeping the first one whose leftover is strictly
/// `better` than the current pick.
fn by_leftover<'a>(
    request: u32,
    candidates: Vec<&'a Node>,
    better: impl Fn(u32, u32) -> bool,
) -> Option<&'a Node> {
    let mut best: Option<(u32, &Node)> = None;
    for node in candidates {
        let Some(leftover) = node.leftover(request) else {
            continue;
        };
        match best {
            Some((current, _)) if !better(leftover, current) => {}
            _ => best = Some((leftover, node)),
        }
    }
    best.map(|(_, node)| node)
}
