// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use std::rc::Rc;

use pimfab_track::builder::{TrackerConfig, TrackersConfig, setup_trackers};
use pimfab_track::entity::{Entity, toplevel};
use pimfab_track::log::Level;
use pimfab_track::{Track, info, trace};

#[test]
fn log_file_honours_level_and_filter() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("build.log");
    let path_str = path.to_str().unwrap().to_string();

    let config = TrackersConfig {
        stdout: TrackerConfig {
            enable: false,
            ..TrackerConfig::default()
        },
        log_file: TrackerConfig {
            enable: true,
            level: Level::Debug,
            filter_regex: "memory",
            file: Some(&path_str),
        },
    };
    let tracker = setup_trackers(&config).unwrap();
    let top = toplevel(&tracker, "top");
    let memory = Rc::new(Entity::new(&top, "memory0"));
    let cpu = Rc::new(Entity::new(&top, "cpu0"));

    info!(memory ; "start=0x0");
    trace!(memory ; "too detailed");
    info!(cpu ; "filtered out");
    tracker.shutdown();

    let log = std::fs::read_to_string(&path).unwrap();
    assert!(log.contains(":INFO: start=0x0"));
    assert!(!log.contains("too detailed"));
    assert!(!log.contains("filtered out"));
}
