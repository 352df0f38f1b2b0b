// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Parameter tables for every component kind in the fabric.
//!
//! Each table is a pure function of the [`PlatformConfig`] (plus the node
//! being built where relevant), so building the same configuration twice
//! always produces the same parameters.

use pimfab_host::param::{ParamValue, Params};
use pimfab_host::params;

use crate::interleave::InterleaveDescriptor;
use crate::memory::RoutingTags;
use crate::types::{MemoryModel, PlatformConfig, format_bytes};

/// First address of the region the L1 interfaces never cache.
pub const PIM_REGION_BASE: u64 = 0x0E00_0000;

/// One past the last address of the non-cacheable region.
pub const PIM_REGION_BOUND: u64 = 0x0F80_0000 + 0x0010_0000;

const VERBOSE_CORE: u32 = 1;
const VERBOSE_CORE_MEM_CTRL: u32 = 0;
const VERBOSE_CACHE: u32 = 0;
const VERBOSE_MEM: u32 = 3;
const VERBOSE_GENERATOR: u32 = 1;

const DEBUG_LEVEL_BUS: u32 = 9;
const DEBUG_LEVEL_CACHE: u32 = 4;
const DEBUG_LEVEL_MEM: u32 = 8;
const DEBUG_LEVEL_NIC: u32 = 8;
const DEBUG_LEVEL_ROUTER: u32 = 8;

/// Debug output disabled, with the level used when it is turned on.
fn debug_off(level: u32) -> Params {
    params! {
        "debug" => 0,
        "debug_level" => level,
        "debug_addr" => Vec::<u64>::new(),
    }
}

pub fn instruction_core(cfg: &PlatformConfig) -> Params {
    params! {
        "verbose" => VERBOSE_CORE,
        "numCores" => cfg.compute.num_cores,
        "clock" => &cfg.timing.clock,
        "maxHeapSize" => (1u64 << 30) >> 4,
        "machine" => format!("[CORES:{}]", cfg.compute.arch),
        "memCost" => "[0:1:10]",
        "program" => &cfg.compute.program,
        "enableMemH" => 1,
        "splash" => 0,
    }
}

pub fn core_memory_controller(cfg: &PlatformConfig) -> Params {
    let max = cfg.timing.max_transactions;
    params! {
        "verbose" => VERBOSE_CORE_MEM_CTRL,
        "clock" => &cfg.timing.clock,
        "max_loads" => max,
        "max_stores" => max,
        "max_flush" => max,
        "max_llsc" => max,
        "max_readlock" => max,
        "max_writeunlock" => max,
        "max_custom" => max,
        "ops_per_cycle" => max,
    }
}

pub fn workload_generator(cfg: &PlatformConfig) -> Params {
    params! {
        "verbose" => VERBOSE_GENERATOR,
        "max_reqs_cycle" => 2,
        "cache_line_size" => cfg.cache.line_size,
        "maxmemreqpending" => 1,
        "clock" => &cfg.timing.clock,
    }
}

/// Parameters for the memory interface between a core and its L1.
#[must_use]
pub fn l1_interface() -> Params {
    params! {
        "noncacheable_regions" => vec![PIM_REGION_BASE, PIM_REGION_BOUND - 1],
    }
}

pub fn l1_cache(cfg: &PlatformConfig, node: usize) -> Params {
    let mut p = params! {
        "cache_frequency" => &cfg.timing.clock,
        "cache_size" => &cfg.cache.l1_size,
        "associativity" => cfg.cache.l1_associativity,
        "access_latency_cycles" => cfg.timing.l1_access_latency_cycles,
        "L1" => 1,
        "cache_line_size" => cfg.cache.line_size,
        "coherence_protocol" => &cfg.cache.coherence_protocol,
        "cache_type" => "inclusive",
        "max_requests_per_cycle" => -1,
        "maxRequestDelay" => 0,
        "verbose" => VERBOSE_CACHE,
        "force_noncacheable_reqs" => cfg.compute.force_noncacheable_reqs,
        "replacement_policy" => "lru",
        "node" => node,
    };
    p.extend(debug_off(DEBUG_LEVEL_CACHE));
    p
}

pub fn l2_cache(cfg: &PlatformConfig, node: usize) -> Params {
    let mut p = params! {
        "cache_frequency" => &cfg.timing.clock,
        "cache_size" => &cfg.cache.l2_size,
        "associativity" => cfg.cache.l2_associativity,
        "access_latency_cycles" => cfg.timing.l2_access_latency_cycles,
        "cache_line_size" => cfg.cache.line_size,
        "coherence_protocol" => &cfg.cache.coherence_protocol,
        "max_requests_per_cycle" => -1,
        "request_link_width" => "0B",
        "response_link_width" => "0B",
        "maxRequestDelay" => 0,
        "mshr_num_entries" => cfg.cache.mshr_num_entries,
        "mshr_latency_cycles" => cfg.cache.mshr_latency_cycles,
        "verbose" => VERBOSE_CACHE,
        "force_noncacheable_reqs" => cfg.compute.force_noncacheable_reqs,
        "node" => node,
    };
    p.extend(debug_off(DEBUG_LEVEL_CACHE));
    p
}

pub fn cpu_bus(cfg: &PlatformConfig) -> Params {
    let mut p = params! { "bus_frequency" => &cfg.timing.clock };
    p.extend(debug_off(DEBUG_LEVEL_BUS));
    p
}

#[must_use]
pub fn memory_link() -> Params {
    let mut p = params! { "latency" => "0ps" };
    p.extend(debug_off(DEBUG_LEVEL_BUS));
    p
}

/// A NIC onto the router, tagged with its routing groups.
pub fn memory_nic(cfg: &PlatformConfig, tags: &RoutingTags) -> Params {
    let mut p = params! {
        "network_bw" => &cfg.timing.memnic_network_bw,
        "network_input_buffer_size" => "1KiB",
        "network_output_buffer_size" => "1KiB",
        "range_check" => 0,
    };
    p.extend(debug_off(DEBUG_LEVEL_NIC));
    p.extend(tags.params());
    p
}

/// Share of the global memory held by one node.
pub fn node_capacity_bytes(cfg: &PlatformConfig) -> u64 {
    cfg.memory.total_bytes / cfg.memory.nodes.max(1) as u64
}

/// Memory controller parameters including the address decode of its node.
pub fn memory_controller(cfg: &PlatformConfig, descriptor: &InterleaveDescriptor) -> Params {
    let mut p = params! {
        "pim_type" => cfg.memory.pim_type.code(),
        "clock" => &cfg.timing.clock,
        "request_width" => 64,
        "verbose" => VERBOSE_MEM,
        "listenercount" => 0,
        "backing" => "malloc",
        "customCmdHandler" => "memHierarchy.defCustomCmdHandler",
        "node_id" => descriptor.node_id,
        "backend.mem_size" => format_bytes(node_capacity_bytes(cfg)),
        "addr_range_start" => descriptor.range.start().to_string(),
        "addr_range_end" => descriptor.range.end().to_string(),
    };
    if let Some(interleave) = &descriptor.interleave {
        p.insert(
            "interleave_size".to_string(),
            ParamValue::from(format_bytes(interleave.granule_bytes)),
        );
        p.insert(
            "interleave_step".to_string(),
            ParamValue::from(format_bytes(interleave.stride_bytes)),
        );
    }
    p.extend(debug_off(DEBUG_LEVEL_MEM));
    p
}

/// Parameters shared by the accelerator backend and its storage backend.
fn backend_common(cfg: &PlatformConfig) -> Params {
    let mut p = params! {
        "verbose" => VERBOSE_MEM,
        "mem_size" => format_bytes(node_capacity_bytes(cfg)),
        "pim_type" => cfg.memory.pim_type.code(),
        "num_nodes" => cfg.memory.nodes,
        "output_directory" => &cfg.output_directory,
    };
    p.extend(debug_off(DEBUG_LEVEL_MEM));
    p
}

pub fn accelerator_backend(cfg: &PlatformConfig, node: usize) -> Params {
    let mut p = params! {
        "node_id" => node,
        "max_requests_per_cycle" => cfg.memory.max_requests_per_cycle,
        "request_delay" => &cfg.memory.request_delay,
    };
    p.extend(backend_common(cfg));
    p
}

pub fn storage_backend(cfg: &PlatformConfig) -> Params {
    let mut p = match cfg.memory.model {
        MemoryModel::SimpleMem => params! { "access_time" => &cfg.memory.access_time },
        MemoryModel::Dramsim3 => params! { "config_ini" => &cfg.memory.dramsim3_config_ini },
    };
    p.extend(backend_common(cfg));
    p
}

pub fn router(cfg: &PlatformConfig, num_ports: usize) -> Params {
    let mut p = params! {
        "id" => 0,
        "num_ports" => num_ports.to_string(),
        "topology" => crate::topology::ROUTER_TOPOLOGY,
        "link_bw" => &cfg.router.link_bw,
        "xbar_bw" => &cfg.router.xbar_bw,
        "flit_size" => &cfg.router.flit_size,
        "input_latency" => &cfg.router.input_latency,
        "output_latency" => &cfg.router.output_latency,
        "input_buf_size" => &cfg.router.input_buf_size,
        "output_buf_size" => &cfg.router.output_buf_size,
    };
    p.extend(debug_off(DEBUG_LEVEL_ROUTER));
    p
}
