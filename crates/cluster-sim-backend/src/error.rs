//! Error types for the backend crate.

use std::time::Duration;

use cluster_sim_core::NodeId;
use thiserror::Error;

/// Errors returned by container backend operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The unit backing a node does not exist.
    #[error("unit not found: {0}")]
    UnitNotFound(NodeId),

    /// The backend could not be reached.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// A lifecycle operation was rejected or failed.
    #[error("{op} failed for unit {unit}: {reason}")]
    Operation {
        /// The operation that failed.
        op: &'static str,
        /// Unit the operation targeted, if one existed yet.
        unit: String,
        /// Backend-provided failure reason.
        reason: String,
    },

    /// The operation did not complete in time.
    #[error("{op} timed out after {after:?}")]
    Timeout {
        /// The operation that timed out.
        op: &'static str,
        /// How long the caller waited.
        after: Duration,
    },
}

impl BackendError {
    /// Build an `Operation` error.
    #[must_use]
    pub fn operation(op: &'static str, unit: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Operation {
            op,
            unit: unit.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error means the unit is gone.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::UnitNotFound(_))
    }

    /// Check if this error is retriable.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout { .. })
    }
}

/// A specialized Result type for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;
