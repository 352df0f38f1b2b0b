// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use pimfab_host::host::{Host, Latency, PortRef, StatisticsConfig};
use pimfab_host::param::ParamValue;
use pimfab_host::params;
use pimfab_host::test_helpers::start_test;

fn ns1(component: pimfab_host::host::ComponentHandle, port: &str) -> PortRef {
    PortRef::new(component, port, Latency::from_ns(1))
}

#[test]
fn build_and_finalize() {
    let graph = start_test(file!());
    let memory = graph
        .create_component("PIM.PIMMemController", "memory0")
        .unwrap();
    let backend = graph
        .attach_subcomponent(memory, "backend", "PIM.PIMBackend")
        .unwrap();
    let nic = graph
        .attach_subcomponent(memory, "cpulink", "memHierarchy.MemNIC")
        .unwrap();
    graph
        .set_parameters(backend, &params! { "node_id" => 0 })
        .unwrap();

    let router = graph
        .create_component("merlin.hr_router", "local_network")
        .unwrap();
    let link = graph.create_link("link_dir_net_0").unwrap();
    graph
        .connect(link, ns1(router, "port1"), ns1(nic, "port"))
        .unwrap();

    graph.finalize().unwrap();
    assert!(graph.is_finalized());
    assert_eq!(graph.num_components(), 4);
    assert_eq!(graph.num_links(), 1);
    assert_eq!(graph.num_bound_ports(), 2);
    assert_eq!(graph.component_name(backend).unwrap(), "memory0.backend");
    assert_eq!(graph.find_component("memory0.cpulink"), Some(nic));
    assert_eq!(
        graph.link_bound_to(router, "port1").as_deref(),
        Some("link_dir_net_0")
    );
    assert_eq!(
        graph.params_of("memory0.backend").unwrap().get("node_id"),
        Some(&ParamValue::Int(0))
    );

    let record = graph.component(memory).unwrap();
    assert_eq!(record.slots.len(), 2);
    assert_eq!(record.slots.get("backend"), Some(&backend));
}

#[test]
fn later_parameters_replace_earlier() {
    let graph = start_test(file!());
    let l1 = graph.create_component("memHierarchy.Cache", "l1_0").unwrap();
    graph
        .set_parameters(l1, &params! { "cache_size" => "32 KiB", "node" => 0 })
        .unwrap();
    graph
        .set_parameters(l1, &params! { "cache_size" => "64 KiB" })
        .unwrap();
    let p = graph.params_of("l1_0").unwrap();
    assert_eq!(p.get("cache_size"), Some(&ParamValue::from("64 KiB")));
    assert_eq!(p.len(), 2);
}

#[test]
fn duplicate_component_rejected() {
    let graph = start_test(file!());
    graph.create_component("revcpu.RevCPU", "cpu0").unwrap();
    let err = graph.create_component("revcpu.RevCPU", "cpu0").unwrap_err();
    assert!(err.0.contains("Duplicate component name 'cpu0'"));
}

#[test]
fn slot_filled_once() {
    let graph = start_test(file!());
    let cpu = graph.create_component("revcpu.RevCPU", "cpu0").unwrap();
    graph
        .attach_subcomponent(cpu, "memory", "revcpu.RevBasicMemCtrl")
        .unwrap();
    let err = graph
        .attach_subcomponent(cpu, "memory", "revcpu.RevBasicMemCtrl")
        .unwrap_err();
    assert!(err.0.contains("Slot 'memory' of 'cpu0' already filled"));
}

#[test]
#[should_panic(expected = "Port l1_0.high_network_0 already bound by link 'a'")]
fn port_bound_once() {
    let graph = start_test(file!());
    let cpu0 = graph.create_component("revcpu.RevCPU", "cpu0").unwrap();
    let cpu1 = graph.create_component("revcpu.RevCPU", "cpu1").unwrap();
    let l1 = graph.create_component("memHierarchy.Cache", "l1_0").unwrap();

    let a = graph.create_link("a").unwrap();
    let b = graph.create_link("b").unwrap();
    graph
        .connect(a, ns1(cpu0, "cache_link"), ns1(l1, "high_network_0"))
        .unwrap();
    graph
        .connect(b, ns1(cpu1, "cache_link"), ns1(l1, "high_network_0"))
        .unwrap();
}

#[test]
fn link_connected_once() {
    let graph = start_test(file!());
    let cpu = graph.create_component("revcpu.RevCPU", "cpu0").unwrap();
    let l1 = graph.create_component("memHierarchy.Cache", "l1_0").unwrap();
    let link = graph.create_link("link_cpu_l1_0").unwrap();
    graph
        .connect(link, ns1(cpu, "cache_link"), ns1(l1, "high_network_0"))
        .unwrap();
    let err = graph
        .connect(link, ns1(cpu, "other"), ns1(l1, "other"))
        .unwrap_err();
    assert!(err.0.contains("already connected"));
    assert!(graph.create_link("link_cpu_l1_0").is_err());
}

#[test]
fn unconnected_link_blocks_finalize() {
    let graph = start_test(file!());
    graph.create_link("dangling").unwrap();
    let err = graph.finalize().unwrap_err();
    assert_eq!(err.to_string(), "Error: Link 'dangling' was never connected");
    assert!(!graph.is_finalized());
}

#[test]
fn no_changes_after_finalize() {
    let graph = start_test(file!());
    let cpu = graph.create_component("revcpu.RevCPU", "cpu0").unwrap();
    graph.finalize().unwrap();

    assert!(graph.create_component("revcpu.RevCPU", "cpu1").is_err());
    assert!(graph.set_parameters(cpu, &params! { "verbose" => 0 }).is_err());
    assert!(graph.create_link("late").is_err());
    assert!(graph.finalize().is_err());
}

#[test]
fn statistics_passed_through() {
    let graph = start_test(file!());
    let config = StatisticsConfig {
        load_level: 7,
        output: "sst.statOutputCSV".to_string(),
        output_options: params! { "filepath" => "./sst-stats.csv", "separator" => "," },
        enable_all: true,
    };
    graph.configure_statistics(config.clone()).unwrap();
    assert_eq!(graph.statistics(), Some(config));
    assert!(graph.to_string().contains("Statistics: level 7 to sst.statOutputCSV"));
}

#[test]
fn identical_builds_have_equal_snapshots() {
    let build = || {
        let graph = start_test(file!());
        let cpu = graph.create_component("revcpu.RevCPU", "cpu0").unwrap();
        let l1 = graph.create_component("memHierarchy.Cache", "l1_0").unwrap();
        let link = graph.create_link("link_cpu_l1_0").unwrap();
        graph
            .connect(link, ns1(cpu, "cache_link"), ns1(l1, "high_network_0"))
            .unwrap();
        graph.snapshot()
    };
    assert_eq!(build(), build());
}
