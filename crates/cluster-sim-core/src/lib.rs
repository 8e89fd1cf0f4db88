//! Core types for cluster-sim.
//!
//! This crate provides the foundational types shared by the scheduler, the
//! container backend and the control plane:
//!
//! - **Identifiers**: [`NodeId`] (opaque, backend-issued) and [`PodId`]
//! - **Data model**: [`Node`], [`Pod`] and their status enums
//!
//! # Example
//!
//! ```
//! use cluster_sim_core::{Node, NodeId, Pod};
//!
//! let node = Node::new(NodeId::new("node-a").unwrap(), 4, chrono::Utc::now());
//! let pod = Pod::pending(2);
//!
//! assert!(node.can_fit(pod.cpus));
//! assert_eq!(node.leftover(pod.cpus), Some(2));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;
pub mod types;

pub use ids::{IdError, NodeId, PodId};
pub use types::{CpuSpec, Node, NodeStatus, Pod, PodStatus};
