//! Error types for the scheduler crate.

use thiserror::Error;

/// Errors that can occur during placement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// No node has enough free CPU for the request.
    #[error("no node has {requested} free CPUs")]
    NoCapacity {
        /// CPUs the pod asked for.
        requested: u32,
    },
}

/// A specialized Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;
