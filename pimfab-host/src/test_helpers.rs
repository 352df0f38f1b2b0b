// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use pimfab_track::test_helpers::create_tracker;

use crate::graph::ComponentGraph;

#[must_use]
pub fn start_test(full_filepath: &str) -> ComponentGraph {
    ComponentGraph::new(&create_tracker(full_filepath))
}
