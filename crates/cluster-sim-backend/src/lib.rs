//! Container backend interface for cluster-sim.
//!
//! Every node in the cluster is backed by one externally provisioned unit
//! (a container, VM or process). The control plane only needs five lifecycle
//! capabilities from whatever provides those units, captured by the
//! [`ContainerBackend`] trait:
//!
//! - `provision`: create a unit sized by a [`CpuSpec`], returning its id
//! - `start` / `stop`: change whether the unit is running
//! - `inspect`: report liveness
//! - `destroy`: remove the unit (idempotent)
//!
//! [`SimulatedBackend`] keeps units in memory and supports fault injection,
//! which is what the daemon and the test suites run against.
//!
//! # Example
//!
//! ```
//! use cluster_sim_backend::{ContainerBackend, SimulatedBackend};
//! use cluster_sim_core::CpuSpec;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SimulatedBackend::new();
//!
//! let unit = backend.provision(&CpuSpec::new(4)).await?;
//! backend.start(&unit).await?;
//! assert!(backend.inspect(&unit).await?);
//!
//! backend.destroy(&unit).await?;
//! // Destroying again is not an error.
//! backend.destroy(&unit).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod simulated;

pub use error::{BackendError, Result};
pub use simulated::{CallCounts, SimulatedBackend};

use async_trait::async_trait;
use cluster_sim_core::{CpuSpec, NodeId};

/// Lifecycle operations on the unit backing a node.
#[async_trait]
pub trait ContainerBackend: Send + Sync {
    /// Create a unit with the given CPU capacity.
    ///
    /// The returned identifier becomes the node's identifier. The unit is not
    /// guaranteed to be running until [`ContainerBackend::start`] succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit cannot be created.
    async fn provision(&self, spec: &CpuSpec) -> Result<NodeId>;

    /// Start a provisioned or stopped unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit is missing or refuses to start.
    async fn start(&self, unit: &NodeId) -> Result<()>;

    /// Stop a running unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit is missing or refuses to stop.
    async fn stop(&self, unit: &NodeId) -> Result<()>;

    /// Report whether the unit is running.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit is missing or cannot be reached.
    async fn inspect(&self, unit: &NodeId) -> Result<bool>;

    /// Remove the unit.
    ///
    /// Destroying a unit that is already stopped or absent succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to remove an existing unit.
    async fn destroy(&self, unit: &NodeId) -> Result<()>;
}
