// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use pimfab_platform::interleave::{
    InterleaveDescriptor, InterleavePolicy, SMALL_GRANULE_BYTES, WIDE_GRANULE_BYTES, partition,
    verify_coverage,
};

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Nodes whose envelope and interleave both claim `addr`.
fn owners(descriptors: &[InterleaveDescriptor], addr: u64) -> Vec<usize> {
    let n = descriptors.len() as u64;
    descriptors
        .iter()
        .filter(|d| {
            let granule = d.granule_bytes().unwrap();
            d.range.contains(addr) && (addr / granule) % n == d.node_id as u64
        })
        .map(|d| d.node_id)
        .collect()
}

#[test]
fn small_interleave_covers_every_address_once() {
    for num_nodes in 1..=8 {
        let total = SMALL_GRANULE_BYTES * num_nodes as u64 * 3;
        let descriptors = partition(total, num_nodes, InterleavePolicy::Small).unwrap();
        let decoder = verify_coverage(total, &descriptors).unwrap();

        for addr in 0..total {
            let owned_by = owners(&descriptors, addr);
            assert_eq!(owned_by.len(), 1, "address {addr:#x} with {num_nodes} nodes");
            assert_eq!(decoder.decode(addr), Some(owned_by[0]));
        }
        assert_eq!(decoder.decode(total), None);
    }
}

#[test]
fn wide_interleave_covers_every_granule_once() {
    for num_nodes in [1, 2, 3, 4, 8] {
        let total = WIDE_GRANULE_BYTES * num_nodes as u64 * 4;
        let descriptors = partition(total, num_nodes, InterleavePolicy::Wide).unwrap();
        let decoder = verify_coverage(total, &descriptors).unwrap();

        let mut addr = 0;
        while addr < total {
            for probe in [addr, addr + WIDE_GRANULE_BYTES - 1] {
                let owned_by = owners(&descriptors, probe);
                assert_eq!(owned_by.len(), 1, "address {probe:#x} with {num_nodes} nodes");
                assert_eq!(decoder.decode(probe), Some(owned_by[0]));
            }
            addr += WIDE_GRANULE_BYTES;
        }
    }
}

#[test]
fn single_node_without_interleave() {
    let total = 8 * 512 * GIB;
    let descriptors = partition(total, 1, InterleavePolicy::None).unwrap();
    assert_eq!(descriptors.len(), 1);
    assert_eq!(descriptors[0].range.start(), 0);
    assert_eq!(descriptors[0].range.end(), total - 1);
    assert_eq!(descriptors[0].granule_bytes(), None);
    assert_eq!(descriptors[0].stride_bytes(), None);

    let decoder = verify_coverage(total, &descriptors).unwrap();
    assert_eq!(decoder.decode(total - 1), Some(0));
}

#[test]
fn four_wide_nodes() {
    let total = 4 * GIB;
    let descriptors = partition(total, 4, InterleavePolicy::Wide).unwrap();
    assert_eq!(descriptors[0].range.start(), 0);
    assert_eq!(descriptors[3].range.end(), total - 1);
    for d in &descriptors {
        assert_eq!(d.granule_bytes(), Some(128 * MIB));
        assert_eq!(d.stride_bytes(), Some(512 * MIB));
    }

    let decoder = verify_coverage(total, &descriptors).unwrap();
    assert_eq!(decoder.num_nodes(), 4);
    assert_eq!(decoder.decode(200 * MIB), Some(1));
    assert_eq!(decoder.decode(512 * MIB), Some(0));
}

#[test]
fn none_needs_a_single_node() {
    for num_nodes in [0, 2, 3] {
        assert!(partition(GIB, num_nodes, InterleavePolicy::None).is_err());
    }
}

#[test]
fn partition_is_deterministic() {
    let a = partition(4 * GIB, 4, InterleavePolicy::Small).unwrap();
    let b = partition(4 * GIB, 4, InterleavePolicy::Small).unwrap();
    assert_eq!(a, b);
}
