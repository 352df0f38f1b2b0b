// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! A memory node: one memory controller with its accelerator backend, its
//! storage backend and a NIC onto the router.
//!
//! ```text
//!   memory<n> (controller, decodes its InterleaveDescriptor)
//!     ├── backend   (accelerator)
//!     │     └── backend (storage: simpleMem | dramsim3)
//!     └── cpulink   (NIC, memory routing group) ── port ──> router
//! ```

use std::fmt;
use std::rc::Rc;

use pimfab_host::host::{ComponentHandle, Host};
use pimfab_host::param::{ParamValue, Params};
use pimfab_model_builder::{EntityDisplay, EntityGet};
use pimfab_track::entity::Entity;
use pimfab_track::{debug, info};

use crate::error::BuildError;
use crate::interleave::InterleaveDescriptor;
use crate::params;
use crate::ports::PortId;
use crate::types::{PlatformConfig, format_bytes};

pub const MEMORY_CONTROLLER_KIND: &str = "PIM.PIMMemController";
pub const ACCELERATOR_BACKEND_KIND: &str = "PIM.PIMBackend";
pub const NIC_KIND: &str = "memHierarchy.MemNIC";

/// Port of a NIC that faces the router.
pub const NIC_PORT: &str = "port";

/// Tag on a network interface used to segregate traffic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutingGroup(pub u32);

impl RoutingGroup {
    pub const COMPUTE: RoutingGroup = RoutingGroup(1);
    pub const MEMORY: RoutingGroup = RoutingGroup(2);
}

impl fmt::Display for RoutingGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The group of an interface plus which groups it accepts traffic from and
/// may send to. Empty lists are left to the host default.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingTags {
    pub group: RoutingGroup,
    pub sources: Vec<RoutingGroup>,
    pub destinations: Vec<RoutingGroup>,
}

impl RoutingTags {
    /// The uplink of the compute cluster.
    #[must_use]
    pub fn compute() -> Self {
        Self {
            group: RoutingGroup::COMPUTE,
            sources: Vec::new(),
            destinations: Vec::new(),
        }
    }

    /// A memory node: accepts compute and memory traffic, replies only
    /// within the memory group.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            group: RoutingGroup::MEMORY,
            sources: vec![RoutingGroup::COMPUTE, RoutingGroup::MEMORY],
            destinations: vec![RoutingGroup::MEMORY],
        }
    }

    #[must_use]
    pub fn params(&self) -> Params {
        let groups = |list: &[RoutingGroup]| ParamValue::from(list.iter().map(|g| g.0).collect::<Vec<_>>());
        let mut p = Params::new();
        p.insert("group".to_string(), ParamValue::from(self.group.0));
        if !self.sources.is_empty() {
            p.insert("sources".to_string(), groups(&self.sources));
        }
        if !self.destinations.is_empty() {
            p.insert("destinations".to_string(), groups(&self.destinations));
        }
        p
    }
}

#[derive(EntityGet, EntityDisplay)]
pub struct MemoryNode {
    entity: Rc<Entity>,
    descriptor: InterleaveDescriptor,
    controller: ComponentHandle,
    backend: ComponentHandle,
    storage: ComponentHandle,
    nic: ComponentHandle,
    uplink: PortId,
}

impl MemoryNode {
    /// Create the controller, backends and NIC of one memory node.
    pub fn new_and_register(
        host: &dyn Host,
        parent: &Rc<Entity>,
        cfg: &PlatformConfig,
        descriptor: InterleaveDescriptor,
    ) -> Result<Self, BuildError> {
        let node = descriptor.node_id;
        let name = format!("memory{node}");
        let entity = Rc::new(Entity::new(parent, &name));

        let controller = host.create_component(MEMORY_CONTROLLER_KIND, &name)?;
        host.set_parameters(controller, &params::memory_controller(cfg, &descriptor))?;

        let backend = host.attach_subcomponent(controller, "backend", ACCELERATOR_BACKEND_KIND)?;
        host.set_parameters(backend, &params::accelerator_backend(cfg, node))?;

        let storage = host.attach_subcomponent(backend, "backend", cfg.memory.model.kind())?;
        host.set_parameters(storage, &params::storage_backend(cfg))?;

        let nic = host.attach_subcomponent(controller, "cpulink", NIC_KIND)?;
        host.set_parameters(nic, &params::memory_nic(cfg, &RoutingTags::memory()))?;
        let uplink = PortId::new(&host.component_name(nic)?, NIC_PORT);

        match descriptor.interleave {
            Some(interleave) => {
                info!(entity ; "{name} start={:#X} end={:#X} size={:#X} interleave_size={} interleave_step={}",
                    descriptor.range.start(), descriptor.range.end(),
                    params::node_capacity_bytes(cfg),
                    format_bytes(interleave.granule_bytes), format_bytes(interleave.stride_bytes));
            }
            None => {
                info!(entity ; "{name} start={:#X} end={:#X} size={:#X}",
                    descriptor.range.start(), descriptor.range.end(),
                    params::node_capacity_bytes(cfg));
            }
        }
        debug!(entity ; "{} backend, PIM type {}", cfg.memory.model, cfg.memory.pim_type.code());

        Ok(Self {
            entity,
            descriptor,
            controller,
            backend,
            storage,
            nic,
            uplink,
        })
    }

    #[must_use]
    pub fn node_id(&self) -> usize {
        self.descriptor.node_id
    }

    #[must_use]
    pub fn descriptor(&self) -> &InterleaveDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn controller(&self) -> ComponentHandle {
        self.controller
    }

    #[must_use]
    pub fn backend(&self) -> ComponentHandle {
        self.backend
    }

    #[must_use]
    pub fn storage(&self) -> ComponentHandle {
        self.storage
    }

    #[must_use]
    pub fn nic(&self) -> ComponentHandle {
        self.nic
    }

    /// The NIC port that connects to the router.
    #[must_use]
    pub fn uplink(&self) -> &PortId {
        &self.uplink
    }
}

#[cfg(test)]
mod tests {
    use pimfab_host::param::ParamValue;

    use crate::memory::{RoutingGroup, RoutingTags};

    #[test]
    fn memory_group_accepts_compute() {
        let p = RoutingTags::memory().params();
        assert_eq!(p.get("group"), Some(&ParamValue::UInt(2)));
        assert_eq!(p.get("sources"), Some(&ParamValue::from(vec![1u32, 2])));
        assert_eq!(p.get("destinations"), Some(&ParamValue::from(vec![2u32])));
    }

    #[test]
    fn compute_group_only_tags() {
        let p = RoutingTags::compute().params();
        assert_eq!(p.len(), 1);
        assert_eq!(RoutingGroup::COMPUTE.to_string(), "1");
    }
}
