// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The compute side of the fabric.
//!
//! ```text
//!   cpu0 ── l1_0 ──┐
//!   cpu1 ── l1_1 ──┤ cpubus ── l2cache ── memlink (NIC) ──> router port0
//!   ...            │
//!   cpuK ── l1_K ──┘
//! ```
//!
//! A [`ProcessingNode`] is one core and its private L1 cache. The core is
//! either instruction-driven or a synthetic workload generator; both present
//! one port to the L1 so the [`ComputeCluster`] does not care which it gets.

use std::rc::Rc;

use pimfab_host::host::{ComponentHandle, Host, Latency, PortRef};
use pimfab_model_builder::{EntityDisplay, EntityGet};
use pimfab_track::entity::Entity;
use pimfab_track::{debug, info};

use crate::config_error;
use crate::error::BuildError;
use crate::memory::{NIC_KIND, NIC_PORT, RoutingTags};
use crate::params;
use crate::ports::{PortId, WiringLedger, bus_inbound_ports};
use crate::types::PlatformConfig;

/// Address distance between the working sets of neighbouring nodes.
pub const WORKING_SET_STRIDE: u64 = 0x10000;

pub const INSTRUCTION_CORE_KIND: &str = "revcpu.RevCPU";
pub const CORE_MEMORY_CONTROLLER_KIND: &str = "revcpu.RevBasicMemCtrl";
pub const CORE_INTERFACE_KIND: &str = "memHierarchy.standardInterface";
pub const GENERATOR_CORE_KIND: &str = "AppGen.RequestGenCPU_KG";
pub const CACHE_KIND: &str = "memHierarchy.Cache";
pub const BUS_KIND: &str = "memHierarchy.Bus";
pub const MEMORY_LINK_KIND: &str = "memHierarchy.MemLink";

pub const BUS_NAME: &str = "cpubus";
pub const L2_NAME: &str = "l2cache";

const CACHE_UP_PORT: &str = "high_network_0";
const CACHE_DOWN_PORT: &str = "low_network_0";
const BUS_DOWN_PORT: &str = "low_network_0";
const MEMORY_LINK_PORT: &str = "port";

/// Which kind of core a processing node carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoreVariant {
    /// Runs a program on an instruction-set model.
    Instruction,

    /// Issues requests from the named workload generator.
    Generator { workload: String },
}

impl CoreVariant {
    /// Generator when a workload is configured, otherwise instruction-driven.
    #[must_use]
    pub fn from_config(cfg: &PlatformConfig) -> Self {
        match &cfg.compute.app {
            Some(workload) => CoreVariant::Generator {
                workload: workload.clone(),
            },
            None => CoreVariant::Instruction,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            CoreVariant::Instruction => INSTRUCTION_CORE_KIND,
            CoreVariant::Generator { .. } => GENERATOR_CORE_KIND,
        }
    }

    /// Name of the port that attaches to the private cache.
    #[must_use]
    pub fn cache_port(&self) -> &'static str {
        match self {
            CoreVariant::Instruction => "port",
            CoreVariant::Generator { .. } => "cache_link",
        }
    }
}

/// Private stack/heap placement of one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkingSet {
    pub heap_buffer: u64,
    pub mem_size: u64,
}

/// Offset node `index` by `index * WORKING_SET_STRIDE` below the top of
/// memory.
pub fn working_set(index: usize, total_bytes: u64) -> Result<WorkingSet, BuildError> {
    let offset = (index as u64)
        .checked_mul(WORKING_SET_STRIDE)
        .filter(|offset| *offset < total_bytes);
    let Some(offset) = offset else {
        return config_error!(
            "Processing node {index} working set does not fit in {total_bytes:#x} bytes"
        );
    };
    Ok(WorkingSet {
        heap_buffer: offset,
        mem_size: total_bytes - offset,
    })
}

/// Arguments handed to node `index`: the shared arguments followed by the
/// node index.
#[must_use]
pub fn node_args(args: &str, index: usize) -> String {
    if args.is_empty() {
        format!("{index}")
    } else {
        format!("{args} {index}")
    }
}

/// One core with its private L1 cache.
#[derive(EntityGet, EntityDisplay)]
pub struct ProcessingNode {
    entity: Rc<Entity>,
    index: usize,
    variant: CoreVariant,
    core: ComponentHandle,
    /// The component owning the port that attaches to the L1.
    cache_client: ComponentHandle,
    l1: ComponentHandle,
    l1_name: String,
}

impl ProcessingNode {
    pub fn new_and_register(
        host: &dyn Host,
        parent: &Rc<Entity>,
        cfg: &PlatformConfig,
        variant: &CoreVariant,
        index: usize,
    ) -> Result<Self, BuildError> {
        let name = format!("cpu{index}");
        let entity = Rc::new(Entity::new(parent, &name));
        let args = node_args(&cfg.compute.args, index);

        let core = host.create_component(variant.kind(), &name)?;
        let cache_client = match variant {
            CoreVariant::Instruction => {
                let placement = working_set(index, cfg.memory.total_bytes)?;
                let mut p = params::instruction_core(cfg);
                p.extend(pimfab_host::params! {
                    "memSize" => placement.mem_size,
                    "heapBuffer" => placement.heap_buffer,
                    "args" => &args,
                });
                host.set_parameters(core, &p)?;
                info!(entity ; "REV_CPU[{index}] args={args} mem_top={:#x}", placement.mem_size);

                let controller =
                    host.attach_subcomponent(core, "memory", CORE_MEMORY_CONTROLLER_KIND)?;
                host.set_parameters(controller, &params::core_memory_controller(cfg))?;
                let interface =
                    host.attach_subcomponent(controller, "memIface", CORE_INTERFACE_KIND)?;
                host.set_parameters(interface, &params::l1_interface())?;
                interface
            }
            CoreVariant::Generator { workload } => {
                let mut p = params::workload_generator(cfg);
                p.extend(pimfab_host::params! { "args" => &args });
                host.set_parameters(core, &p)?;
                info!(entity ; "APP_CPU[{index}] ({workload}) args={args}");

                let generator =
                    host.attach_subcomponent(core, "generator", &format!("AppGen.{workload}"))?;
                host.set_parameters(generator, &params::workload_generator(cfg))?;
                core
            }
        };

        let l1_name = format!("l1_{index}");
        let l1 = host.create_component(CACHE_KIND, &l1_name)?;
        host.set_parameters(l1, &params::l1_cache(cfg, index))?;

        Ok(Self {
            entity,
            index,
            variant: variant.clone(),
            core,
            cache_client,
            l1,
            l1_name,
        })
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn variant(&self) -> &CoreVariant {
        &self.variant
    }

    #[must_use]
    pub fn core(&self) -> ComponentHandle {
        self.core
    }

    #[must_use]
    pub fn l1(&self) -> ComponentHandle {
        self.l1
    }

    /// The L1 port facing the shared bus.
    #[must_use]
    pub fn l1_downlink(&self) -> PortId {
        PortId::new(&self.l1_name, CACHE_DOWN_PORT)
    }

    /// Connect the core to its private cache with `link_cpu_l1_<i>`.
    pub fn wire(
        &self,
        host: &dyn Host,
        ledger: &mut WiringLedger,
        latency: Latency,
    ) -> Result<(), BuildError> {
        let client = PortId::new(&host.component_name(self.cache_client)?, self.variant.cache_port());
        let cache = PortId::new(&self.l1_name, CACHE_UP_PORT);
        connect(
            host,
            ledger,
            &format!("link_cpu_l1_{}", self.index),
            (self.cache_client, &client),
            (self.l1, &cache),
            latency,
        )
    }
}

/// Create a link and connect it, recording both ends in the ledger.
pub(crate) fn connect(
    host: &dyn Host,
    ledger: &mut WiringLedger,
    link_name: &str,
    a: (ComponentHandle, &PortId),
    b: (ComponentHandle, &PortId),
    latency: Latency,
) -> Result<(), BuildError> {
    ledger.bind(a.1)?;
    ledger.bind(b.1)?;
    let link = host.create_link(link_name)?;
    host.connect(
        link,
        PortRef::new(a.0, &a.1.port, latency),
        PortRef::new(b.0, &b.1.port, latency),
    )?;
    Ok(())
}

/// K processing nodes behind a shared bus and a shared L2 cache.
#[derive(EntityGet, EntityDisplay)]
pub struct ComputeCluster {
    entity: Rc<Entity>,
    nodes: Vec<ProcessingNode>,
    bus: ComponentHandle,
    bus_ports: Vec<PortId>,
    l2: ComponentHandle,
    memory_link: ComponentHandle,
    nic: ComponentHandle,
    uplink: PortId,
}

impl ComputeCluster {
    pub fn new_and_register(
        host: &dyn Host,
        parent: &Rc<Entity>,
        cfg: &PlatformConfig,
        node: usize,
    ) -> Result<Self, BuildError> {
        let num_nodes = cfg.compute.num_cpus;
        let bus_ports = bus_inbound_ports(BUS_NAME, num_nodes)?;
        let entity = Rc::new(Entity::new(parent, "cluster"));

        let variant = CoreVariant::from_config(cfg);
        let nodes = (0..num_nodes)
            .map(|i| ProcessingNode::new_and_register(host, &entity, cfg, &variant, i))
            .collect::<Result<Vec<_>, BuildError>>()?;

        let bus = host.create_component(BUS_KIND, BUS_NAME)?;
        host.set_parameters(bus, &params::cpu_bus(cfg))?;

        let l2 = host.create_component(CACHE_KIND, L2_NAME)?;
        host.set_parameters(l2, &params::l2_cache(cfg, node))?;

        let memory_link = host.attach_subcomponent(l2, "cpulink", MEMORY_LINK_KIND)?;
        host.set_parameters(memory_link, &params::memory_link())?;

        let nic = host.attach_subcomponent(l2, "memlink", NIC_KIND)?;
        host.set_parameters(nic, &params::memory_nic(cfg, &RoutingTags::compute()))?;
        let uplink = PortId::new(&host.component_name(nic)?, NIC_PORT);

        debug!(entity ; "{num_nodes} processing nodes on {} bus ports", bus_ports.len());

        Ok(Self {
            entity,
            nodes,
            bus,
            bus_ports,
            l2,
            memory_link,
            nic,
            uplink,
        })
    }

    #[must_use]
    pub fn nodes(&self) -> &[ProcessingNode] {
        &self.nodes
    }

    /// Bus ports issued to the processing nodes, in node order.
    #[must_use]
    pub fn bus_ports(&self) -> &[PortId] {
        &self.bus_ports
    }

    #[must_use]
    pub fn bus(&self) -> ComponentHandle {
        self.bus
    }

    #[must_use]
    pub fn l2(&self) -> ComponentHandle {
        self.l2
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

    /// Every port inside the cluster that wiring must connect.
    pub fn expected_ports(&self, host: &dyn Host) -> Result<Vec<PortId>, BuildError> {
        let mut ports = Vec::new();
        for node in &self.nodes {
            ports.push(PortId::new(
                &host.component_name(node.cache_client)?,
                node.variant.cache_port(),
            ));
            ports.push(PortId::new(&node.l1_name, CACHE_UP_PORT));
            ports.push(node.l1_downlink());
        }
        ports.extend(self.bus_ports.iter().cloned());
        ports.push(PortId::new(BUS_NAME, BUS_DOWN_PORT));
        ports.push(PortId::new(
            &host.component_name(self.memory_link)?,
            MEMORY_LINK_PORT,
        ));
        Ok(ports)
    }

    /// Wire each node to its L1, each L1 to its bus port, and the bus to
    /// the L2. The uplink is left for the router.
    pub fn wire(
        &self,
        host: &dyn Host,
        ledger: &mut WiringLedger,
        latency: Latency,
    ) -> Result<(), BuildError> {
        for (node, bus_port) in self.nodes.iter().zip(&self.bus_ports) {
            node.wire(host, ledger, latency)?;
            connect(
                host,
                ledger,
                &format!("link_l1_{}_cpubus", node.index),
                (node.l1, &node.l1_downlink()),
                (self.bus, bus_port),
                latency,
            )?;
        }

        let bus_down = PortId::new(BUS_NAME, BUS_DOWN_PORT);
        let l2_up = PortId::new(&host.component_name(self.memory_link)?, MEMORY_LINK_PORT);
        connect(
            host,
            ledger,
            "link_cpubus_l2",
            (self.bus, &bus_down),
            (self.memory_link, &l2_up),
            latency,
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::compute::*;

    #[test]
    fn working_set_placement() {
        let total = 1 << 40;
        assert_eq!(
            working_set(0, total).unwrap(),
            WorkingSet {
                heap_buffer: 0,
                mem_size: total
            }
        );
        assert_eq!(
            working_set(3, total).unwrap(),
            WorkingSet {
                heap_buffer: 0x30000,
                mem_size: total - 0x30000
            }
        );
        assert!(working_set(2, 0x20000).is_err());
    }

    #[test]
    fn args_append_index() {
        assert_eq!(node_args("", 2), "2");
        assert_eq!(node_args("-n 8", 2), "-n 8 2");
    }

    #[test]
    fn variant_ports() {
        let generator = CoreVariant::Generator {
            workload: "STREAM".to_string(),
        };
        assert_eq!(generator.cache_port(), "cache_link");
        assert_eq!(generator.kind(), GENERATOR_CORE_KIND);
        assert_eq!(CoreVariant::Instruction.cache_port(), "port");
    }
}
