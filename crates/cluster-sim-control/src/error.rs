//! Error types for the control plane.
//!
//! This module defines all errors that cluster store operations can return
//! to a caller.

use cluster_sim_backend::BackendError;
use cluster_sim_core::{NodeId, PodId};
use thiserror::Error;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur in cluster operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Malformed input, rejected before touching any state.
    #[error("validation error: {0}")]
    Validation(String),

    /// The requested node was not found.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// The requested pod was not found.
    #[error("pod not found: {0}")]
    PodNotFound(PodId),

    /// No node could host the pod. The pod is kept as pending.
    #[error("no capacity for pod {pod_id}: no node has {requested} free CPUs")]
    NoCapacity {
        /// The pod that stays pending.
        pod_id: PodId,
        /// CPUs it asked for.
        requested: u32,
    },

    /// A container backend call failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Node and pod records disagree. Always a defect.
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),

    /// The cluster is draining and accepts no new mutations.
    #[error("cluster is shutting down")]
    ShuttingDown,
}

impl ControlError {
    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NodeNotFound(_) | Self::PodNotFound(_) => 404,
            Self::NoCapacity { .. } => 409,
            Self::Backend(_) => 502,
            Self::InternalInconsistency(_) => 500,
            Self::ShuttingDown => 503,
        }
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::NoCapacity { .. } => true,
            Self::Backend(e) => e.is_retriable(),
            _ => false,
        }
    }
}
