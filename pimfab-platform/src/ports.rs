// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Port allocation and wiring checks.
//!
//! A [`PortAllocator`] issues indexed port names (`high_network_0`,
//! `port1`, ...) for one component. Indices are issued in ascending order
//! so that the same build sizes always give the same names.
//!
//! The [`WiringLedger`] records every port the build expects to connect and
//! checks at the end of wiring that each was connected exactly once.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::BuildError;
use crate::{config_error, wiring_error};

/// Prefix of the bus ports facing the processing nodes.
pub const BUS_INBOUND_PREFIX: &str = "high_network_";

/// Prefix of the router ports.
pub const ROUTER_PORT_PREFIX: &str = "port";

/// A named port on a named component.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId {
    pub component: String,
    pub port: String,
}

impl PortId {
    #[must_use]
    pub fn new(component: &str, port: &str) -> Self {
        Self {
            component: component.to_string(),
            port: port.to_string(),
        }
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.component, self.port)
    }
}

/// Issues collision-free indexed ports for one component.
pub struct PortAllocator {
    component: String,
    prefix: String,
    issued: BTreeSet<usize>,
}

impl PortAllocator {
    #[must_use]
    pub fn new(component: &str, prefix: &str) -> Self {
        Self {
            component: component.to_string(),
            prefix: prefix.to_string(),
            issued: BTreeSet::new(),
        }
    }

    fn port(&self, index: usize) -> PortId {
        PortId::new(&self.component, &format!("{}{index}", self.prefix))
    }

    /// Issue the lowest free index.
    pub fn allocate(&mut self) -> PortId {
        let index = (0..)
            .find(|i| !self.issued.contains(i))
            .unwrap_or(self.issued.len());
        self.issued.insert(index);
        self.port(index)
    }

    /// Issue a specific index, failing if it has already been issued.
    pub fn allocate_at(&mut self, index: usize) -> Result<PortId, BuildError> {
        let port = self.port(index);
        if !self.issued.insert(index) {
            return wiring_error!(port.component, port.port ; "allocated twice");
        }
        Ok(port)
    }

    /// Issue `count` consecutive free indices.
    pub fn allocate_n(&mut self, count: usize) -> Vec<PortId> {
        (0..count).map(|_| self.allocate()).collect()
    }

    #[must_use]
    pub fn num_allocated(&self) -> usize {
        self.issued.len()
    }
}

/// The ports of the shared bus that face the processing nodes:
/// `high_network_0 .. high_network_{K-1}`.
pub fn bus_inbound_ports(bus_name: &str, num_nodes: usize) -> Result<Vec<PortId>, BuildError> {
    if num_nodes == 0 {
        return config_error!("A compute cluster must host at least 1 processing node");
    }
    let mut allocator = PortAllocator::new(bus_name, BUS_INBOUND_PREFIX);
    Ok(allocator.allocate_n(num_nodes))
}

/// Router ports: `port0` for the compute uplink then one per memory node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouterPorts {
    pub uplink: PortId,
    pub memory: Vec<PortId>,
}

impl RouterPorts {
    #[must_use]
    pub fn num_ports(&self) -> usize {
        1 + self.memory.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortId> {
        std::iter::once(&self.uplink).chain(self.memory.iter())
    }
}

pub fn router_ports(router_name: &str, num_memory_nodes: usize) -> Result<RouterPorts, BuildError> {
    if num_memory_nodes == 0 {
        return config_error!("The router needs at least 1 memory node to serve");
    }
    let mut allocator = PortAllocator::new(router_name, ROUTER_PORT_PREFIX);
    let uplink = allocator.allocate_at(0)?;
    let memory = allocator.allocate_n(num_memory_nodes);
    Ok(RouterPorts { uplink, memory })
}

/// Tracks how many times each expected port has been connected.
#[derive(Default)]
pub struct WiringLedger {
    ports: BTreeMap<PortId, usize>,
}

impl WiringLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a port that must be connected exactly once.
    pub fn expect(&mut self, port: &PortId) -> Result<(), BuildError> {
        if self.ports.insert(port.clone(), 0).is_some() {
            return wiring_error!(port.component, port.port ; "allocated twice");
        }
        Ok(())
    }

    /// Record a connection to a port.
    pub fn bind(&mut self, port: &PortId) -> Result<(), BuildError> {
        match self.ports.get_mut(port) {
            None => wiring_error!(port.component, port.port ; "connected but never allocated"),
            Some(count) if *count > 0 => {
                *count += 1;
                wiring_error!(port.component, port.port ; "connected {} times", *count)
            }
            Some(count) => {
                *count = 1;
                Ok(())
            }
        }
    }

    /// Check that every expected port was connected exactly once.
    pub fn verify(&self) -> Result<(), BuildError> {
        for (port, count) in &self.ports {
            match count {
                1 => {}
                0 => return wiring_error!(port.component, port.port ; "left unconnected"),
                n => return wiring_error!(port.component, port.port ; "connected {n} times"),
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn num_allocated(&self) -> usize {
        self.ports.len()
    }

    #[must_use]
    pub fn num_connected(&self) -> usize {
        self.ports.values().filter(|c| **c > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::BuildError;
    use crate::ports::*;

    #[test]
    fn allocate_skips_reserved() {
        let mut allocator = PortAllocator::new("local_network", "port");
        allocator.allocate_at(1).unwrap();
        assert_eq!(allocator.allocate().port, "port0");
        assert_eq!(allocator.allocate().port, "port2");
        assert_eq!(allocator.num_allocated(), 3);
        assert!(allocator.allocate_at(2).is_err());
    }

    #[test]
    fn bus_needs_a_node() {
        let err = bus_inbound_ports("cpubus", 0).unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
    }

    #[test]
    fn ledger_detects_dangling_port() {
        let mut ledger = WiringLedger::new();
        let a = PortId::new("local_network", "port0");
        let b = PortId::new("local_network", "port1");
        ledger.expect(&a).unwrap();
        ledger.expect(&b).unwrap();
        ledger.bind(&a).unwrap();
        assert_eq!(ledger.num_connected(), 1);

        let err = ledger.verify().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Wiring inconsistency at local_network.port1: left unconnected"
        );
    }

    #[test]
    fn ledger_detects_double_connection() {
        let mut ledger = WiringLedger::new();
        let a = PortId::new("cpubus", "high_network_0");
        ledger.expect(&a).unwrap();
        ledger.bind(&a).unwrap();
        assert!(ledger.bind(&a).is_err());
        assert!(ledger.verify().is_err());
    }

    #[test]
    fn ledger_rejects_unknown_port() {
        let mut ledger = WiringLedger::new();
        let err = ledger.bind(&PortId::new("cpubus", "low_network_1")).unwrap_err();
        assert!(err.detail().contains("never allocated"));
    }
}
