// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

#![doc(test(attr(warn(unused))))]

//! `PIMFAB` - the PIM Fabric topology builder
//!
//! This library builds the component graph of a simulated machine with one
//! compute cluster and N memory nodes, each memory node carrying a
//! processing-in-memory accelerator:
//!
//! ```text
//!   cpu0..cpuK ── l1_* ── cpubus ── l2cache ──┐
//!                                             │ port0
//!                                       local_network
//!                              port1 │ ... │ portN
//!                               memory0 ... memory{N-1}
//! ```
//!
//! The global address space is split across the memory nodes by the
//! [interleaver](crate::interleave) and the [topology](crate::topology)
//! builder checks that every address has exactly one owner and that every
//! port is connected exactly once before the graph is handed to the
//! simulation host.
//!
//! # Simple Build
//!
//! ```rust
//! use pimfab_host::graph::ComponentGraph;
//! use pimfab_platform::topology::FabricTopology;
//! use pimfab_track::tracker::dev_null_tracker;
//!
//! let graph = ComponentGraph::new(&dev_null_tracker());
//! let yaml = "
//! memory:
//!   total_bytes: 4GiB
//!   nodes: 4
//!   interleave: wide
//! compute:
//!   num_cpus: 2
//! ";
//! let topology = FabricTopology::from_string(&graph, graph.top(), yaml).unwrap();
//! assert_eq!(topology.router_ports().num_ports(), 5);
//! assert_eq!(topology.decoder().decode(200 * 1024 * 1024), Some(1));
//! assert!(graph.is_finalized());
//! ```

pub mod compute;
pub mod error;
pub mod interleave;
pub mod memory;
pub mod params;
pub mod ports;
pub mod topology;
pub mod types;
