//! # Motus Supervisor Binary
//!
//! Cyclic control-loop host driving a robot control plugin.
//!
//! # Usage
//!
//! ```bash
//! # Run the linear reference controller
//! motus_supervisor --config config/robot.toml
//!
//! # Pick a plugin and the initial control state
//! motus_supervisor --config config/robot.toml --controller linear --state operation
//!
//! # Verbose logging, JSON output
//! motus_supervisor --config config/robot.toml -v --json
//! ```

#![deny(warnings)]

use clap::Parser;
use motus_common::consts::{DEFAULT_CONFIG_PATH, DEFAULT_CYCLE_TIME_US};
use motus_common::state::ControlState;
use motus_supervisor::Supervisor;
use motus_supervisor::rt::rt_setup;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// Motus Supervisor - cyclic control-loop host for robot control plugins
#[derive(Parser, Debug)]
#[command(name = "motus_supervisor")]
#[command(version)]
#[command(about = "Cyclic control-loop host for robot control plugins")]
#[command(long_about = None)]
struct Args {
    /// Path to the robot configuration file (TOML). The file content is
    /// handed to the plugin as its configuration string.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Controller plugin to load
    #[arg(long, default_value = "linear")]
    controller: String,

    /// Initial control state (passive, offset, calibration, preprocessing, operation)
    #[arg(long, default_value = "passive")]
    state: String,

    /// Control cycle time in microseconds
    #[arg(long, default_value_t = DEFAULT_CYCLE_TIME_US)]
    cycle_time_us: u32,

    /// CPU core to pin the loop to (rt feature only)
    #[arg(long, default_value_t = 0)]
    cpu: usize,

    /// SCHED_FIFO priority (rt feature only)
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("Supervisor failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    setup_tracing(&args);

    info!("Motus Supervisor v{} starting...", env!("CARGO_PKG_VERSION"));

    let initial_state = parse_state(&args.state)?;

    let configuration = std::fs::read_to_string(&args.config)
        .map_err(|e| format!("cannot read config {:?}: {e}", args.config))?;

    let registry = motus_plugins::builtin_registry();
    info!("Available controllers: {:?}", registry.list_controllers());
    let controller = registry.create_controller(&args.controller)?;

    let mut supervisor = Supervisor::new(controller, &configuration, args.cycle_time_us)?;

    rt_setup(args.cpu, args.rt_priority)?;

    // Ctrl-C raises the stop flag; the loop ends after the current cycle.
    let stop = supervisor.stop_handle();
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::Relaxed);
    })?;

    supervisor.set_control_state(initial_state);
    let result = supervisor.run();

    // The controller teardown runs exactly once, loop error or not.
    supervisor.shutdown()?;
    result?;

    Ok(())
}

fn parse_state(name: &str) -> Result<ControlState, String> {
    match name {
        "passive" => Ok(ControlState::Passive),
        "offset" => Ok(ControlState::Offset),
        "calibration" => Ok(ControlState::Calibration),
        "preprocessing" => Ok(ControlState::Preprocessing),
        "operation" => Ok(ControlState::Operation),
        other => Err(format!(
            "unknown control state '{other}' (expected passive, offset, calibration, preprocessing or operation)"
        )),
    }
}

fn setup_tracing(args: &Args) {
    let default_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
