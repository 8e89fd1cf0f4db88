//! Control plane for cluster-sim.
//!
//! This crate owns the cluster's node and pod records and keeps them
//! consistent while nodes are added, removed, restarted and lost.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  API layer / daemon (HTTP)                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ClusterStore                          │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │   Node      │ │    Pod      │ │     Failure         │    │
//! │  │  Lifecycle  │ │ Scheduling  │ │     Recovery        │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!          ▲                   │                   │
//!          │                   ▼                   ▼
//!   ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐
//!   │HealthMonitor │   │  Placement   │   │ ContainerBackend │
//!   │  (periodic)  │   │  (policies)  │   │   (simulated)    │
//!   └──────────────┘   └──────────────┘   └──────────────────┘
//! ```
//!
//! All state lives behind one async mutex inside [`ClusterStore`]. Node
//! provisioning and teardown are awaited under that guard, so two operations
//! can never both claim the same free CPUs. Liveness checks and restarts run
//! outside it and commit their findings afterwards.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use cluster_sim_control::{ClusterConfig, ClusterControl, ClusterStore, Policy};
//! use cluster_sim_backend::SimulatedBackend;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(SimulatedBackend::new());
//! let store = ClusterStore::new(backend, ClusterConfig::immediate());
//!
//! let node_id = store.add_node(4).await?;
//! let placement = store.schedule_pod(2, Policy::FirstFit).await?;
//! assert_eq!(placement.node_id, node_id);
//!
//! // The pod moves (or goes pending) when its node is removed.
//! let report = store.remove_node(&node_id).await?;
//! assert_eq!(report.pending, vec![placement.pod_id]);
//! # Ok(())
//! # }
//! ```
//!
//! # Failure Handling
//!
//! - `remove_node` destroys the unit, then re-places the node's pods.
//! - `restart_node` and the [`HealthMonitor`] run stop, start and a liveness
//!   check; a node that stays down is evicted and its pods recovered.
//! - Recovery places pods first-fit on the remaining nodes. Pods that do not
//!   fit stay pending until [`ClusterStore::reschedule_pending`] finds room.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod health;
pub mod recovery;
mod state;
pub mod store;

pub use config::ClusterConfig;
pub use error::{ControlError, Result};
pub use health::{HealthMonitor, MonitorHandle, SweepReport};
pub use recovery::{RecoveryReport, ResolutionPath};
pub use store::{ClusterControl, ClusterStore, Placement};

// Re-export commonly used types from dependencies for convenience
pub use cluster_sim_core::{Node, NodeId, NodeStatus, Pod, PodId, PodStatus};
pub use cluster_sim_scheduler::Policy;
