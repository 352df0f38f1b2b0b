// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use std::path::Path;

use pimfab_host::test_helpers::start_test;
use pimfab_platform::error::BuildError;
use pimfab_platform::interleave::InterleavePolicy;
use pimfab_platform::topology::FabricTopology;
use pimfab_platform::types::MemoryModel;

/// Build from YAML, check nothing reached the host, return the error.
fn build_error(yaml: &str) -> BuildError {
    let graph = start_test(file!());
    let err = match FabricTopology::from_string(&graph, graph.top(), yaml) {
        Ok(_) => panic!("build should have failed"),
        Err(e) => e,
    };
    assert_eq!(graph.num_components(), 0);
    assert!(!graph.is_finalized());
    err
}

#[test]
fn none_with_two_nodes() {
    let err = build_error(
        "
memory:
  nodes: 2
  interleave: none
",
    );
    assert!(matches!(err, BuildError::Configuration(_)));
    assert!(err.detail().contains("ambiguous routing"));
}

#[test]
fn unsupported_memory_model() {
    let err = build_error("memory: { model: hbm }");
    assert!(matches!(err, BuildError::Configuration(_)));
    assert!(err.detail().contains("Unsupported memory model 'hbm'"));
}

#[test]
fn unsupported_interleave_policy() {
    let err = build_error("memory: { interleave: diagonal }");
    assert!(matches!(err, BuildError::Configuration(_)));
    assert!(err.detail().contains("diagonal"));
}

#[test]
fn reserved_pim_type() {
    let err = build_error("memory: { pim_type: 2 }");
    assert!(err.detail().contains("reserved"));
}

#[test]
fn empty_compute_cluster() {
    let err = build_error("compute: { num_cpus: 0 }");
    assert_eq!(
        err,
        BuildError::Configuration(
            "A compute cluster must host at least 1 processing node".to_string()
        )
    );
}

#[test]
fn more_granules_than_memory() {
    let err = build_error(
        "
memory:
  total_bytes: 256MiB
  nodes: 4
  interleave: wide
",
    );
    assert!(matches!(err, BuildError::Configuration(_)));
}

#[test]
fn working_sets_beyond_memory() {
    // Three working sets 0x10000 apart need more than 0x20000 bytes.
    let err = build_error(
        "
memory:
  total_bytes: 0x20000
  nodes: 1
  interleave: none
compute:
  num_cpus: 3
",
    );
    assert_eq!(
        err,
        BuildError::Configuration(
            "Processing node 2 working set does not fit in 0x20000 bytes".to_string()
        )
    );
}

#[test]
fn address_hole_is_a_partition_error() {
    // One granule beyond a whole number of strides leaves the last granule
    // outside node 0's envelope.
    let err = build_error(
        "
memory:
  total_bytes: 0x1_0800_0000
  nodes: 4
  interleave: wide
",
    );
    match err {
        BuildError::PartitionInconsistency { nodes, .. } => assert_eq!(nodes, vec![0]),
        other => panic!("unexpected error {other}"),
    }
}

#[test]
#[should_panic(expected = "Graph already finalized")]
fn finalized_graph_rejects_second_build() {
    let graph = start_test(file!());
    FabricTopology::from_string(&graph, graph.top(), "").unwrap();
    FabricTopology::from_string(&graph, graph.top(), "").unwrap();
}

#[test]
fn missing_config_file() {
    let graph = start_test(file!());
    let err = FabricTopology::from_file(&graph, graph.top(), Path::new("no-such-fabric.yaml"))
        .err()
        .unwrap();
    assert!(err.detail().starts_with("Unable to read"));
}

#[test]
fn environment_overrides_file() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "fabric.yaml",
            "
memory:
  total_bytes: 1GiB
  nodes: 2
  model: dramsim3
compute:
  num_cpus: 2
",
        )?;
        jail.set_env("NODES", "4");
        jail.set_env("INTERLEAVE", "SMALL");
        jail.set_env("APP", "GUPS");

        let graph = start_test(file!());
        let topology =
            FabricTopology::from_file(&graph, graph.top(), Path::new("fabric.yaml")).unwrap();
        let config = topology.config();
        assert_eq!(config.memory.nodes, 4);
        assert_eq!(config.memory.interleave, InterleavePolicy::Small);
        assert_eq!(config.memory.model, MemoryModel::Dramsim3);
        assert_eq!(config.compute.app.as_deref(), Some("GUPS"));
        assert_eq!(topology.memory_nodes().len(), 4);
        assert_eq!(topology.descriptors()[0].stride_bytes(), Some(256));

        let storage = graph.find_component("memory3.backend.backend").unwrap();
        assert_eq!(graph.component(storage).unwrap().kind, "memHierarchy.dramsim3");
        Ok(())
    });
}
