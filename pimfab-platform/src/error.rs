// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Errors raised while building a fabric topology.
//!
//! Every error is fatal: the build stops at the first one and the host is
//! never finalized.

use std::error::Error;
use std::fmt;

use pimfab_host::types::SimError;

/// Build a [`BuildError::Configuration`] from a format string and arguments.
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)+) => {
        Err($crate::error::BuildError::Configuration(format!($($arg)+)))
    };
}

/// Build a [`BuildError::PartitionInconsistency`] naming the offending nodes.
///
/// ```rust
/// use pimfab_platform::error::BuildError;
/// use pimfab_platform::partition_error;
///
/// let err: Result<(), BuildError> = partition_error!(vec![0, 1] ; "ranges overlap at {:#x}", 0x80);
/// assert!(err.unwrap_err().to_string().contains("nodes [0, 1]"));
/// ```
#[macro_export]
macro_rules! partition_error {
    ($nodes:expr ; $($arg:tt)+) => {
        Err($crate::error::BuildError::PartitionInconsistency {
            nodes: $nodes,
            detail: format!($($arg)+),
        })
    };
}

/// Build a [`BuildError::WiringInconsistency`] for a component port.
#[macro_export]
macro_rules! wiring_error {
    ($component:expr, $port:expr ; $($arg:tt)+) => {
        Err($crate::error::BuildError::WiringInconsistency {
            component: $component.to_string(),
            port: $port.to_string(),
            detail: format!($($arg)+),
        })
    };
}

#[derive(Clone, Debug, PartialEq)]
pub enum BuildError {
    /// Invalid policy, backend kind, node or core count.
    Configuration(String),

    /// Computed address ranges leave a hole or overlap.
    PartitionInconsistency { nodes: Vec<usize>, detail: String },

    /// A port left unconnected, connected twice, or never allocated.
    WiringInconsistency {
        component: String,
        port: String,
        detail: String,
    },

    /// The host rejected a structural change.
    Host(SimError),
}

impl BuildError {
    /// The message without the error class prefix.
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            BuildError::Configuration(detail)
            | BuildError::PartitionInconsistency { detail, .. }
            | BuildError::WiringInconsistency { detail, .. } => detail,
            BuildError::Host(e) => &e.0,
        }
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Configuration(detail) => write!(f, "Configuration error: {detail}"),
            BuildError::PartitionInconsistency { nodes, detail } => {
                write!(f, "Partition inconsistency (nodes {nodes:?}): {detail}")
            }
            BuildError::WiringInconsistency {
                component,
                port,
                detail,
            } => write!(f, "Wiring inconsistency at {component}.{port}: {detail}"),
            BuildError::Host(e) => write!(f, "Host {e}"),
        }
    }
}

impl Error for BuildError {}

impl From<SimError> for BuildError {
    fn from(e: SimError) -> Self {
        BuildError::Host(e)
    }
}

#[cfg(test)]
mod tests {
    use pimfab_host::types::SimError;

    use crate::error::BuildError;

    #[test]
    fn display_names_the_invariant() {
        let err: Result<(), BuildError> = wiring_error!("local_network", "port2" ; "left unconnected");
        assert_eq!(
            err.unwrap_err().to_string(),
            "Wiring inconsistency at local_network.port2: left unconnected"
        );

        let err: Result<(), BuildError> = config_error!("node count must be at least 1");
        assert_eq!(
            err.unwrap_err().to_string(),
            "Configuration error: node count must be at least 1"
        );

        let err = BuildError::from(SimError("Duplicate link name 'a'".to_string()));
        assert_eq!(err.to_string(), "Host Error: Duplicate link name 'a'");
        assert_eq!(err.detail(), "Duplicate link name 'a'");
    }
}
