//! Pod placement for cluster-sim.
//!
//! This crate decides *where* a pod should run; it never changes any state.
//! Given a CPU request, a set of [`Node`](cluster_sim_core::Node)s and a
//! [`Policy`], [`place`] returns the chosen node id or
//! [`SchedulerError::NoCapacity`].
//!
//! A node is eligible when its free CPU (`cpus - used_cpus`) covers the
//! request. Candidates are visited oldest first, so ties always resolve to
//! the earliest-created node:
//!
//! | Policy | Choice |
//! |---|---|
//! | `first_fit` (default) | first eligible node |
//! | `best_fit` | eligible node with the smallest leftover |
//! | `worst_fit` | eligible node with the largest leftover |
//!
//! # Example
//!
//! ```
//! use cluster_sim_core::{Node, NodeId};
//! use cluster_sim_scheduler::{place, Policy};
//!
//! let now = chrono::Utc::now();
//! let small = Node::new(NodeId::new("small").unwrap(), 2, now);
//! let large = Node::new(NodeId::new("large").unwrap(), 8, now + chrono::Duration::seconds(1));
//! let nodes = [small, large];
//!
//! assert_eq!(place(2, &nodes, Policy::BestFit).unwrap().as_str(), "small");
//! assert_eq!(place(2, &nodes, Policy::WorstFit).unwrap().as_str(), "large");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod placement;
pub mod policy;

pub use error::{Result, SchedulerError};
pub use placement::{place, place_excluding};
pub use policy::Policy;
