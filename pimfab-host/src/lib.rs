// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

#![doc(test(attr(warn(unused))))]

//! The simulation host seen by the PIMFAB topology builder.
//!
//! Builders never create simulation objects directly. They describe the
//! components, subcomponents, parameters and links to a [`Host`] which owns
//! the resulting graph. The [`ComponentGraph`] is the host used by the
//! `pimfab` binary and the tests: it records the graph in memory and rejects
//! structural mistakes as they happen.
//!
//! # Simple Graph
//!
//! ```rust
//! use pimfab_host::graph::ComponentGraph;
//! use pimfab_host::host::{Host, Latency, PortRef};
//! use pimfab_host::params;
//! use pimfab_track::tracker::dev_null_tracker;
//!
//! let graph = ComponentGraph::new(&dev_null_tracker());
//! let cpu = graph.create_component("revcpu.RevCPU", "cpu0").unwrap();
//! let l1 = graph.create_component("memHierarchy.Cache", "l1_0").unwrap();
//! graph.set_parameters(l1, &params! { "node" => 0 }).unwrap();
//!
//! let link = graph.create_link("link_cpu_l1_0").unwrap();
//! graph
//!     .connect(
//!         link,
//!         PortRef::new(cpu, "cache_link", Latency::from_ns(1)),
//!         PortRef::new(l1, "high_network_0", Latency::from_ns(1)),
//!     )
//!     .unwrap();
//! graph.finalize().unwrap();
//! assert_eq!(graph.num_components(), 2);
//! ```
//!
//! [`Host`]: crate::host::Host
//! [`ComponentGraph`]: crate::graph::ComponentGraph

pub mod graph;
pub mod host;
pub mod param;
pub mod test_helpers;
pub mod types;
