// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Build a PIM fabric topology and report what was built.
//!
//! For example, run using:
//!   NODES=4 cargo run --bin pimfab -- --config fabric.yaml --stdout
//! --stdout-level info

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use pimfab_host::graph::ComponentGraph;
use pimfab_platform::topology::FabricTopology;
use pimfab_platform::types::PlatformConfig;
use pimfab_track::{Track, Tracker};
use pimfab_track::builder::{TrackerConfig, TrackersConfig, setup_trackers};

/// Command-line arguments.
#[derive(Parser)]
#[command(about = "Build a PIM fabric topology from configuration")]
struct Cli {
    /// Configuration file (TOML, or YAML by extension). Environment
    /// variables override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable logging to the console.
    #[arg(long, default_value = "false")]
    stdout: bool,

    /// Level of log message to display.
    #[arg(long, default_value = "Info")]
    stdout_level: log::Level,

    /// Set a regular expression for which entites should have logging level set
    /// to `--stdout-level`. Others will have level set to `Error`.
    #[arg(long, default_value = "")]
    stdout_filter_regex: String,

    /// Also write the log to this file.
    #[arg(long)]
    log_file: Option<String>,

    /// Level of log message written to `--log-file`.
    #[arg(long, default_value = "Debug")]
    log_file_level: log::Level,

    /// Print every component and link handed to the simulation host.
    #[arg(long)]
    dump_graph: bool,
}

fn setup_all_trackers(args: &Cli) -> Result<Tracker> {
    let config = TrackersConfig {
        stdout: TrackerConfig {
            enable: args.stdout,
            level: args.stdout_level,
            filter_regex: &args.stdout_filter_regex,
            file: None,
        },
        log_file: TrackerConfig {
            enable: args.log_file.is_some(),
            level: args.log_file_level,
            filter_regex: "",
            file: args.log_file.as_deref(),
        },
    };
    Ok(setup_trackers(&config)?)
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let tracker = setup_all_trackers(&args)?;

    let config = PlatformConfig::load(args.config.as_deref())?;
    let graph = ComponentGraph::new(&tracker);
    let topology = FabricTopology::build(&graph, graph.top(), config);
    tracker.shutdown();
    let topology = topology?;

    println!("Built fabric:");
    println!("{topology}");

    if args.dump_graph {
        println!("{graph}");
    }
    Ok(())
}
