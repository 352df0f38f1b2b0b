// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The interface to the simulation host.
//!
//! The topology builder only ever talks to the host through the [`Host`]
//! trait: it creates components and subcomponents, sets their parameters,
//! and connects ports with named links. Once the build is complete the host
//! is finalized and no further structural change is accepted.

use std::fmt;

use crate::param::Params;
use crate::types::{SimError, SimResult};

/// Opaque identity of a component (or subcomponent) created by a [`Host`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentHandle(pub(crate) usize);

impl ComponentHandle {
    /// Index of this component in creation order.
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque identity of a link created by a [`Host`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkHandle(pub(crate) usize);

/// Latency of one side of a link.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Latency {
    ps: u64,
}

impl Latency {
    #[must_use]
    pub fn from_ps(ps: u64) -> Self {
        Self { ps }
    }

    #[must_use]
    pub fn from_ns(ns: u64) -> Self {
        Self { ps: ns * 1000 }
    }

    #[must_use]
    pub fn as_ps(&self) -> u64 {
        self.ps
    }
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ps != 0 && self.ps % 1000 == 0 {
            write!(f, "{}ns", self.ps / 1000)
        } else {
            write!(f, "{}ps", self.ps)
        }
    }
}

/// One end of a link: a named port on a component, with its latency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortRef {
    pub component: ComponentHandle,
    pub port: String,
    pub latency: Latency,
}

impl PortRef {
    #[must_use]
    pub fn new(component: ComponentHandle, port: &str, latency: Latency) -> Self {
        Self {
            component,
            port: port.to_string(),
            latency,
        }
    }
}

/// Statistics output configuration.
///
/// This is passed through to the host untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatisticsConfig {
    pub load_level: u32,
    pub output: String,
    pub output_options: Params,
    pub enable_all: bool,
}

/// The capabilities required from the simulation host.
pub trait Host {
    /// Create a top-level component of the given kind.
    fn create_component(&self, kind: &str, instance_name: &str)
    -> Result<ComponentHandle, SimError>;

    /// Create a subcomponent of `kind` in the named slot of `parent`.
    fn attach_subcomponent(
        &self,
        parent: ComponentHandle,
        slot_name: &str,
        kind: &str,
    ) -> Result<ComponentHandle, SimError>;

    /// Add parameters to a component. Later values replace earlier ones.
    fn set_parameters(&self, handle: ComponentHandle, params: &Params) -> SimResult;

    /// Create a named, unconnected link.
    fn create_link(&self, name: &str) -> Result<LinkHandle, SimError>;

    /// Connect both ends of a link.
    fn connect(&self, link: LinkHandle, a: PortRef, b: PortRef) -> SimResult;

    /// Pass statistics configuration through to the host.
    fn configure_statistics(&self, config: StatisticsConfig) -> SimResult;

    /// Hand the graph over for execution. No structural change is allowed
    /// afterwards.
    fn finalize(&self) -> SimResult;

    /// Full name of a component, for diagnostics.
    fn component_name(&self, handle: ComponentHandle) -> Result<String, SimError>;
}

#[cfg(test)]
mod tests {
    use crate::host::Latency;

    #[test]
    fn latency_display() {
        assert_eq!(Latency::from_ns(1).to_string(), "1ns");
        assert_eq!(Latency::from_ps(0).to_string(), "0ps");
        assert_eq!(Latency::from_ps(1500).to_string(), "1500ps");
        assert_eq!(Latency::from_ns(2).as_ps(), 2000);
    }
}
