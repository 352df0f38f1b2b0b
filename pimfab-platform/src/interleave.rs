// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Partitioning of the global physical address space across memory nodes.
//!
//! The global range `[0, S-1]` is split across `N` memory nodes by one of
//! three policies:
//!
//!  - [`InterleavePolicy::None`]: a single node owns the whole range.
//!  - [`InterleavePolicy::Wide`]: nodes take turns owning 128 MiB granules.
//!  - [`InterleavePolicy::Small`]: nodes take turns owning 64 byte granules.
//!
//! For the interleaved policies a node's [`AddressRange`] is the *envelope*
//! that its granules are scattered within, not a contiguous block. Address
//! `a` belongs to node `floor(a / G) mod N`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::BuildError;
use crate::{config_error, partition_error};

/// Granule used by [`InterleavePolicy::Wide`].
pub const WIDE_GRANULE_BYTES: u64 = 128 * 1024 * 1024;

/// Granule used by [`InterleavePolicy::Small`] (one cache line).
pub const SMALL_GRANULE_BYTES: u64 = 64;

/// An inclusive byte range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AddressRange {
    start: u64,
    end: u64,
}

impl AddressRange {
    pub fn new(start: u64, end: u64) -> Result<Self, BuildError> {
        if end < start {
            return config_error!("Address range end {end:#x} is below start {start:#x}");
        }
        Ok(Self { start, end })
    }

    #[must_use]
    pub fn start(&self) -> u64 {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bytes spanned. Saturates for the full 64-bit space.
    #[must_use]
    pub fn span(&self) -> u64 {
        (self.end - self.start).saturating_add(1)
    }

    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        self.start <= addr && addr <= self.end
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, {:#x}]", self.start, self.end)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InterleavePolicy {
    None,
    Wide,
    Small,
}

impl InterleavePolicy {
    /// The interleave granule, `None` when not interleaved.
    #[must_use]
    pub fn granule_bytes(&self) -> Option<u64> {
        match self {
            InterleavePolicy::None => None,
            InterleavePolicy::Wide => Some(WIDE_GRANULE_BYTES),
            InterleavePolicy::Small => Some(SMALL_GRANULE_BYTES),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            InterleavePolicy::None => "none",
            InterleavePolicy::Wide => "wide",
            InterleavePolicy::Small => "small",
        }
    }
}

impl fmt::Display for InterleavePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for InterleavePolicy {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(InterleavePolicy::None),
            "wide" => Ok(InterleavePolicy::Wide),
            "small" => Ok(InterleavePolicy::Small),
            _ => config_error!(
                "Unsupported interleave policy '{s}' (must be one of: none, wide, small)"
            ),
        }
    }
}

/// Granule and stride of an interleaved node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Interleave {
    pub granule_bytes: u64,
    pub stride_bytes: u64,
}

/// The part of the address space owned by one memory node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InterleaveDescriptor {
    pub node_id: usize,
    pub range: AddressRange,
    pub interleave: Option<Interleave>,
}

impl InterleaveDescriptor {
    #[must_use]
    pub fn granule_bytes(&self) -> Option<u64> {
        self.interleave.map(|i| i.granule_bytes)
    }

    #[must_use]
    pub fn stride_bytes(&self) -> Option<u64> {
        self.interleave.map(|i| i.stride_bytes)
    }
}

impl fmt::Display for InterleaveDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {} {}", self.node_id, self.range)?;
        if let Some(interleave) = &self.interleave {
            write!(
                f,
                " granule {:#x} stride {:#x}",
                interleave.granule_bytes, interleave.stride_bytes
            )?;
        }
        Ok(())
    }
}

/// Compute one descriptor per node for the global range `[0, total_bytes-1]`.
///
/// Envelopes of interleaved policies follow the address-decoder boundary
/// rule `end = S - (N - n - 1) * G - 1` even when `S` is not a multiple of
/// the stride. Use [`verify_coverage`] to check the result.
///
/// ```rust
/// use pimfab_platform::interleave::{InterleavePolicy, partition};
///
/// let gib = 1024 * 1024 * 1024;
/// let descriptors = partition(4 * gib, 4, InterleavePolicy::Wide).unwrap();
/// assert_eq!(descriptors[3].range.end(), 4 * gib - 1);
/// assert_eq!(descriptors[0].stride_bytes(), Some(512 * 1024 * 1024));
/// ```
pub fn partition(
    total_bytes: u64,
    num_nodes: usize,
    policy: InterleavePolicy,
) -> Result<Vec<InterleaveDescriptor>, BuildError> {
    if num_nodes == 0 {
        return config_error!("Node count must be at least 1");
    }
    if total_bytes == 0 {
        return config_error!("Total memory size must be non-zero");
    }

    let Some(granule_bytes) = policy.granule_bytes() else {
        if num_nodes != 1 {
            return config_error!(
                "Interleave policy 'none' requires exactly 1 node but {num_nodes} were requested (ambiguous routing)"
            );
        }
        return Ok(vec![InterleaveDescriptor {
            node_id: 0,
            range: AddressRange::new(0, total_bytes - 1)?,
            interleave: None,
        }]);
    };

    let n = num_nodes as u64;
    let stride_bytes = match granule_bytes.checked_mul(n) {
        Some(stride) if stride <= total_bytes => stride,
        _ => {
            return config_error!(
                "{num_nodes} nodes with a {granule_bytes:#x} byte granule need more than the {total_bytes:#x} bytes of memory"
            );
        }
    };

    (0..n)
        .map(|node| {
            let start = node * granule_bytes;
            let end = total_bytes - (n - node - 1) * granule_bytes - 1;
            Ok(InterleaveDescriptor {
                node_id: node as usize,
                range: AddressRange::new(start, end)?,
                interleave: Some(Interleave {
                    granule_bytes,
                    stride_bytes,
                }),
            })
        })
        .collect()
}

/// Resolves addresses to the node that owns them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressDecoder {
    total_bytes: u64,
    interleave: Option<Interleave>,
    ranges: Vec<AddressRange>,
}

impl AddressDecoder {
    /// Build a decoder from the descriptors of all nodes, ordered by node.
    pub fn new(total_bytes: u64, descriptors: &[InterleaveDescriptor]) -> Result<Self, BuildError> {
        if total_bytes == 0 {
            return config_error!("Total memory size must be non-zero");
        }
        let Some(first) = descriptors.first() else {
            return partition_error!(Vec::new() ; "no node descriptors to decode with");
        };

        for (i, d) in descriptors.iter().enumerate() {
            if d.node_id != i {
                return partition_error!(vec![i, d.node_id] ; "descriptor {i} is for node {}", d.node_id);
            }
            if d.interleave != first.interleave {
                return partition_error!(vec![0, i] ; "nodes disagree on the interleave granule/stride");
            }
        }

        if let Some(interleave) = &first.interleave {
            let all_nodes = || -> Vec<usize> { (0..descriptors.len()).collect() };
            if interleave.granule_bytes == 0 {
                return partition_error!(all_nodes() ; "interleave granule is zero");
            }
            let expected = interleave
                .granule_bytes
                .checked_mul(descriptors.len() as u64);
            if expected != Some(interleave.stride_bytes) {
                return partition_error!(
                    all_nodes() ;
                    "stride {:#x} is not granule {:#x} x {} nodes",
                    interleave.stride_bytes, interleave.granule_bytes, descriptors.len()
                );
            }
        }

        Ok(Self {
            total_bytes,
            interleave: first.interleave,
            ranges: descriptors.iter().map(|d| d.range).collect(),
        })
    }

    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.ranges.len()
    }

    /// The node owning `addr`, or `None` for an address no node claims.
    #[must_use]
    pub fn decode(&self, addr: u64) -> Option<usize> {
        if addr >= self.total_bytes {
            return None;
        }
        match &self.interleave {
            Some(interleave) => {
                let node = ((addr / interleave.granule_bytes) % self.ranges.len() as u64) as usize;
                self.ranges[node].contains(addr).then_some(node)
            }
            None => self.ranges.iter().position(|r| r.contains(addr)),
        }
    }

    /// The last address in the global range that decodes to `node`.
    fn last_owned(&self, node: usize, granule_bytes: u64) -> Option<u64> {
        let n = self.ranges.len() as u64;
        let node = node as u64;
        let last_granule = (self.total_bytes - 1) / granule_bytes;
        if last_granule < node {
            return None;
        }
        let granule = last_granule - (last_granule - node) % n;
        let end = (granule + 1).saturating_mul(granule_bytes) - 1;
        Some(end.min(self.total_bytes - 1))
    }
}

/// Check that every address of `[0, total_bytes-1]` is owned by exactly one
/// node.
pub fn verify_coverage(
    total_bytes: u64,
    descriptors: &[InterleaveDescriptor],
) -> Result<AddressDecoder, BuildError> {
    // Rejects an empty address space.
    let decoder = AddressDecoder::new(total_bytes, descriptors)?;
    let last = total_bytes - 1;

    for d in descriptors {
        if d.range.end() > last {
            return partition_error!(
                vec![d.node_id] ;
                "node {} range {} extends past the last address {last:#x}",
                d.node_id, d.range
            );
        }
    }

    match &decoder.interleave {
        Some(interleave) => {
            let granule = interleave.granule_bytes;
            for d in descriptors {
                let first_owned = d.node_id as u64 * granule;
                if d.range.start() != first_owned {
                    return partition_error!(
                        vec![d.node_id] ;
                        "node {} range {} does not start at its first granule {first_owned:#x}",
                        d.node_id, d.range
                    );
                }
                if let Some(last_owned) = decoder.last_owned(d.node_id, granule)
                    && last_owned > d.range.end()
                {
                    return partition_error!(
                        vec![d.node_id] ;
                        "address {last_owned:#x} decodes to node {} outside its range {}",
                        d.node_id, d.range
                    );
                }
            }
        }
        None => {
            let mut sorted: Vec<&InterleaveDescriptor> = descriptors.iter().collect();
            sorted.sort_by_key(|d| d.range.start());
            let mut next = 0;
            let mut prev_node = None;
            for d in sorted {
                if d.range.start() != next {
                    let nodes = prev_node.into_iter().chain([d.node_id]).collect();
                    if d.range.start() < next {
                        return partition_error!(nodes ; "range {} overlaps at {:#x}", d.range, d.range.start());
                    }
                    return partition_error!(nodes ; "addresses [{next:#x}, {:#x}] are not owned", d.range.start() - 1);
                }
                next = d.range.end().wrapping_add(1);
                prev_node = Some(d.node_id);
            }
            if next != total_bytes {
                let nodes = prev_node.into_iter().collect();
                return partition_error!(nodes ; "addresses from {next:#x} to {last:#x} are not owned");
            }
        }
    }
    Ok(decoder)
}

#[cfg(test)]
mod tests {
    use crate::error::BuildError;
    use crate::interleave::*;

    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * MIB;

    #[test]
    fn policy_from_str() {
        assert_eq!("WIDE".parse::<InterleavePolicy>().unwrap(), InterleavePolicy::Wide);
        assert_eq!("none".parse::<InterleavePolicy>().unwrap(), InterleavePolicy::None);
        let err = "medium".parse::<InterleavePolicy>().unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
    }

    #[test]
    fn small_policy_envelopes() {
        let d = partition(4096, 4, InterleavePolicy::Small).unwrap();
        assert_eq!(d[0].range, AddressRange::new(0, 4096 - 3 * 64 - 1).unwrap());
        assert_eq!(d[2].range, AddressRange::new(128, 4096 - 64 - 1).unwrap());
        assert_eq!(d[3].range.end(), 4095);
        assert_eq!(d[1].granule_bytes(), Some(64));
        assert_eq!(d[1].stride_bytes(), Some(256));
    }

    #[test]
    fn single_node_interleave_keeps_granule() {
        let d = partition(GIB, 1, InterleavePolicy::Wide).unwrap();
        assert_eq!(d[0].range, AddressRange::new(0, GIB - 1).unwrap());
        assert_eq!(d[0].stride_bytes(), Some(WIDE_GRANULE_BYTES));

        let decoder = verify_coverage(GIB, &d).unwrap();
        assert_eq!(decoder.decode(GIB - 1), Some(0));
        assert_eq!(decoder.decode(GIB), None);
    }

    #[test]
    fn too_many_nodes_for_memory() {
        let err = partition(3 * 64, 4, InterleavePolicy::Small).unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
        assert!(partition(GIB, 0, InterleavePolicy::Wide).is_err());
        assert!(partition(0, 1, InterleavePolicy::None).is_err());
    }

    #[test]
    fn remainder_leaves_a_hole() {
        // 5 granules over 2 nodes: the last granule belongs to node 0.
        let total = 5 * WIDE_GRANULE_BYTES;
        let d = partition(total, 2, InterleavePolicy::Wide).unwrap();
        assert_eq!(d[0].range.end(), 4 * WIDE_GRANULE_BYTES - 1);
        assert_eq!(d[1].range.end(), total - 1);

        match verify_coverage(total, &d).unwrap_err() {
            BuildError::PartitionInconsistency { nodes, detail } => {
                assert_eq!(nodes, vec![0]);
                assert!(detail.contains("0x27ffffff"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn single_node_remainder_is_covered() {
        let total = 3 * SMALL_GRANULE_BYTES + 8;
        let d = partition(total, 1, InterleavePolicy::Small).unwrap();
        let decoder = verify_coverage(total, &d).unwrap();
        assert_eq!(decoder.decode(total - 1), Some(0));
        assert_eq!(decoder.num_nodes(), 1);
    }

    #[test]
    fn gap_between_contiguous_ranges() {
        let d = vec![InterleaveDescriptor {
            node_id: 0,
            range: AddressRange::new(0, MIB - 2).unwrap(),
            interleave: None,
        }];
        let err = verify_coverage(MIB, &d).unwrap_err();
        assert!(matches!(err, BuildError::PartitionInconsistency { ref nodes, .. } if nodes == &[0]));
    }

    #[test]
    fn mismatched_interleave_rejected() {
        let mut d = partition(GIB, 2, InterleavePolicy::Wide).unwrap();
        d[1].interleave = Some(Interleave {
            granule_bytes: 64,
            stride_bytes: 128,
        });
        assert!(matches!(
            AddressDecoder::new(GIB, &d),
            Err(BuildError::PartitionInconsistency { .. })
        ));
    }

    #[test]
    fn empty_address_space_rejected() {
        let d = partition(64, 1, InterleavePolicy::Small).unwrap();
        let err = verify_coverage(0, &d).unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
        assert!(AddressDecoder::new(0, &d).is_err());
    }

    #[test]
    fn oversized_granule_rejected() {
        let mut d = partition(GIB, 2, InterleavePolicy::Wide).unwrap();
        for descriptor in &mut d {
            descriptor.interleave = Some(Interleave {
                granule_bytes: u64::MAX / 2 + 1,
                stride_bytes: 0,
            });
        }
        let err = AddressDecoder::new(GIB, &d).unwrap_err();
        assert!(matches!(err, BuildError::PartitionInconsistency { ref nodes, .. } if nodes == &[0, 1]));

        for descriptor in &mut d {
            descriptor.interleave = Some(Interleave {
                granule_bytes: 0,
                stride_bytes: 0,
            });
        }
        let err = AddressDecoder::new(GIB, &d).unwrap_err();
        assert!(err.detail().contains("granule is zero"));
    }

    #[test]
    fn shifted_envelope_rejected() {
        let mut d = partition(GIB, 2, InterleavePolicy::Wide).unwrap();
        d[1].range = AddressRange::new(0, GIB - 1).unwrap();
        let err = verify_coverage(GIB, &d).unwrap_err();
        assert!(err.detail().contains("does not start at its first granule"));
    }
}
