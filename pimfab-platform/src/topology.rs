// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The fabric assembler.
//!
//! A build moves through four phases, each consuming the previous one:
//!
//! ```text
//!   PlatformConfig ─> Partitioned ─> Instantiated ─> Wired ─> FabricTopology
//!                     (address      (cluster and     (router   (statistics,
//!                      ranges)       memory nodes)    links)    host finalized)
//! ```
//!
//! Any error aborts the build. The host is only finalized by the last phase
//! so a failed build never hands a partial graph to the simulation engine.

use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use std::rc::Rc;

use pimfab_host::host::{ComponentHandle, Host, Latency, StatisticsConfig};
use pimfab_host::params;
use pimfab_model_builder::EntityGet;
use pimfab_track::entity::{Entity, GetEntity};
use pimfab_track::{debug, error, info};

use crate::compute::{ComputeCluster, connect};
use crate::config_error;
use crate::error::BuildError;
use crate::interleave::{AddressDecoder, InterleaveDescriptor, partition, verify_coverage};
use crate::memory::MemoryNode;
use crate::params::router;
use crate::ports::{RouterPorts, WiringLedger, router_ports};
use crate::types::PlatformConfig;

pub const ROUTER_NAME: &str = "local_network";
pub const ROUTER_KIND: &str = "merlin.hr_router";
pub const ROUTER_TOPOLOGY: &str = "merlin.singlerouter";

/// Node of the compute cluster as seen by its caches.
const CLUSTER_NODE: usize = 0;

/// Address ranges have been computed and checked.
pub struct Partitioned {
    entity: Rc<Entity>,
    config: PlatformConfig,
    descriptors: Vec<InterleaveDescriptor>,
    decoder: AddressDecoder,
}

impl Partitioned {
    /// Validate the configuration and split the address space.
    pub fn new(parent: &Rc<Entity>, config: PlatformConfig) -> Result<Self, BuildError> {
        Self::with_entity(Rc::new(Entity::new(parent, "fabric")), config)
    }

    fn with_entity(entity: Rc<Entity>, config: PlatformConfig) -> Result<Self, BuildError> {
        config.validate()?;
        let memory = &config.memory;
        let descriptors = partition(memory.total_bytes, memory.nodes, memory.interleave)?;
        let decoder = verify_coverage(memory.total_bytes, &descriptors)?;

        info!(entity ; "NODES={} INTERLEAVE={} total={:#X}",
            memory.nodes, memory.interleave, memory.total_bytes);
        Ok(Self {
            entity,
            config,
            descriptors,
            decoder,
        })
    }

    #[must_use]
    pub fn descriptors(&self) -> &[InterleaveDescriptor] {
        &self.descriptors
    }

    /// Create the compute cluster and one memory node per descriptor.
    pub fn instantiate(self, host: &dyn Host) -> Result<Instantiated, BuildError> {
        let cluster = ComputeCluster::new_and_register(host, &self.entity, &self.config, CLUSTER_NODE)?;
        let memory_nodes = self
            .descriptors
            .iter()
            .map(|d| MemoryNode::new_and_register(host, &self.entity, &self.config, *d))
            .collect::<Result<Vec<_>, BuildError>>()?;

        debug!(self.entity ; "instantiated {} processing nodes and {} memory nodes",
            cluster.nodes().len(), memory_nodes.len());
        Ok(Instantiated {
            partitioned: self,
            cluster,
            memory_nodes,
        })
    }
}

/// All components exist but none are linked.
pub struct Instantiated {
    partitioned: Partitioned,
    cluster: ComputeCluster,
    memory_nodes: Vec<MemoryNode>,
}

impl Instantiated {
    #[must_use]
    pub fn cluster(&self) -> &ComputeCluster {
        &self.cluster
    }

    #[must_use]
    pub fn memory_nodes(&self) -> &[MemoryNode] {
        &self.memory_nodes
    }

    /// Create the router and every link, then check that each port was
    /// connected exactly once.
    pub fn wire(self, host: &dyn Host) -> Result<Wired, BuildError> {
        let cfg = &self.partitioned.config;
        let latency = Latency::from_ns(cfg.timing.link_latency_ns);
        let ports = router_ports(ROUTER_NAME, self.memory_nodes.len())?;

        let mut ledger = WiringLedger::new();
        for port in self.cluster.expected_ports(host)? {
            ledger.expect(&port)?;
        }
        ledger.expect(self.cluster.uplink())?;
        for port in ports.iter() {
            ledger.expect(port)?;
        }
        for node in &self.memory_nodes {
            ledger.expect(node.uplink())?;
        }

        self.cluster.wire(host, &mut ledger, latency)?;

        let router_handle = host.create_component(ROUTER_KIND, ROUTER_NAME)?;
        host.set_parameters(router_handle, &router(cfg, ports.num_ports()))?;
        host.attach_subcomponent(router_handle, "topology", ROUTER_TOPOLOGY)?;

        connect(
            host,
            &mut ledger,
            "link_cache_net_0",
            (self.cluster.nic(), self.cluster.uplink()),
            (router_handle, &ports.uplink),
            latency,
        )?;
        for (node, port) in self.memory_nodes.iter().zip(&ports.memory) {
            connect(
                host,
                &mut ledger,
                &format!("link_dir_net_{}", node.node_id()),
                (router_handle, port),
                (node.nic(), node.uplink()),
                latency,
            )?;
        }

        ledger.verify()?;
        info!(self.partitioned.entity ; "{ROUTER_NAME}: {} ports, {} of {} fabric ports connected",
            ports.num_ports(), ledger.num_connected(), ledger.num_allocated());

        Ok(Wired {
            instantiated: self,
            router: router_handle,
            router_ports: ports,
            ledger,
        })
    }
}

/// Every port is connected. Nothing has been handed to the host yet.
pub struct Wired {
    instantiated: Instantiated,
    router: ComponentHandle,
    router_ports: RouterPorts,
    ledger: WiringLedger,
}

impl Wired {
    #[must_use]
    pub fn router_ports(&self) -> &RouterPorts {
        &self.router_ports
    }

    /// Pass the statistics setup through and finalize the host.
    pub fn finalize(self, host: &dyn Host) -> Result<FabricTopology, BuildError> {
        let Wired {
            instantiated,
            router,
            router_ports,
            ledger,
        } = self;
        let Instantiated {
            partitioned,
            cluster,
            memory_nodes,
        } = instantiated;
        let Partitioned {
            entity,
            config,
            descriptors,
            decoder,
        } = partitioned;

        host.configure_statistics(statistics_config(&config))?;
        host.finalize()?;

        let memories_idx_by_name = memory_nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.entity().name.to_string(), i))
            .collect();

        info!(entity ; "finalized with {} memory nodes", memory_nodes.len());
        Ok(FabricTopology {
            entity,
            config,
            descriptors,
            decoder,
            cluster,
            memory_nodes,
            memories_idx_by_name,
            router,
            router_ports,
            num_allocated_ports: ledger.num_allocated(),
            num_connected_ports: ledger.num_connected(),
        })
    }
}

/// CSV statistics written into the output directory.
fn statistics_config(cfg: &PlatformConfig) -> StatisticsConfig {
    let stats = &cfg.statistics;
    let filepath = if cfg.output_directory.is_empty() {
        format!("./{}", stats.file_name)
    } else {
        format!("{}/{}", cfg.output_directory.trim_end_matches('/'), stats.file_name)
    };
    StatisticsConfig {
        load_level: stats.load_level,
        output: stats.output.clone(),
        output_options: params! {
            "filepath" => filepath,
            "separator" => &stats.separator,
        },
        enable_all: stats.enable_all,
    }
}

/// A fully built and finalized fabric.
#[derive(EntityGet)]
pub struct FabricTopology {
    entity: Rc<Entity>,
    config: PlatformConfig,
    descriptors: Vec<InterleaveDescriptor>,
    decoder: AddressDecoder,
    cluster: ComputeCluster,
    memory_nodes: Vec<MemoryNode>,
    memories_idx_by_name: HashMap<String, usize>,
    router: ComponentHandle,
    router_ports: RouterPorts,
    num_allocated_ports: usize,
    num_connected_ports: usize,
}

impl FabricTopology {
    /// Load a configuration file (and the environment) then build.
    pub fn from_file(
        host: &dyn Host,
        parent: &Rc<Entity>,
        config_path: &Path,
    ) -> Result<Self, BuildError> {
        let config = PlatformConfig::load(Some(config_path))?;
        FabricTopology::build(host, parent, config)
    }

    /// Build from a YAML document layered over the defaults.
    pub fn from_string(
        host: &dyn Host,
        parent: &Rc<Entity>,
        config: &str,
    ) -> Result<Self, BuildError> {
        let config = PlatformConfig::from_yaml_str(config)?;
        FabricTopology::build(host, parent, config)
    }

    /// Run all four phases in order.
    pub fn build(
        host: &dyn Host,
        parent: &Rc<Entity>,
        config: PlatformConfig,
    ) -> Result<Self, BuildError> {
        let entity = Rc::new(Entity::new(parent, "fabric"));
        let built = Partitioned::with_entity(entity.clone(), config)
            .and_then(|partitioned| partitioned.instantiate(host))
            .and_then(|instantiated| instantiated.wire(host))
            .and_then(|wired| wired.finalize(host));
        if let Err(e) = &built {
            error!(entity ; "build aborted: {e}");
        }
        built
    }

    #[must_use]
    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    #[must_use]
    pub fn descriptors(&self) -> &[InterleaveDescriptor] {
        &self.descriptors
    }

    #[must_use]
    pub fn decoder(&self) -> &AddressDecoder {
        &self.decoder
    }

    #[must_use]
    pub fn cluster(&self) -> &ComputeCluster {
        &self.cluster
    }

    #[must_use]
    pub fn memory_nodes(&self) -> &[MemoryNode] {
        &self.memory_nodes
    }

    pub fn memory_node(&self, name: &str) -> Result<&MemoryNode, BuildError> {
        match self.memories_idx_by_name.get(name) {
            Some(i) => Ok(&self.memory_nodes[*i]),
            None => config_error!("No memory node called '{name}'"),
        }
    }

    #[must_use]
    pub fn router(&self) -> ComponentHandle {
        self.router
    }

    #[must_use]
    pub fn router_ports(&self) -> &RouterPorts {
        &self.router_ports
    }

    #[must_use]
    pub fn num_allocated_ports(&self) -> usize {
        self.num_allocated_ports
    }

    #[must_use]
    pub fn num_connected_ports(&self) -> usize {
        self.num_connected_ports
    }
}

impl Display for FabricTopology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "ProcessingNodes:")?;
        for node in self.cluster.nodes() {
            writeln!(f, "  {}: {}", node.index(), node.entity())?;
        }

        writeln!(f, "\nMemoryNodes:")?;
        for (node, descriptor) in self.memory_nodes.iter().zip(&self.descriptors) {
            writeln!(f, "  {}: {descriptor}", node.entity())?;
        }

        writeln!(f, "\nRouter {ROUTER_NAME}:")?;
        for port in self.router_ports.iter() {
            writeln!(f, "  {port}")?;
        }
        writeln!(
            f,
            "\n{} of {} ports connected",
            self.num_connected_ports, self.num_allocated_ports
        )
    }
}
