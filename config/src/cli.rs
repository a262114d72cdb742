//! The worker pool CLI and config definitions

use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use sleepy_queue::Priority;
use util::telemetry::LevelFilter;

// -------
// | CLI |
// -------

/// Defines the worker pool's command line interface
#[derive(Debug, Parser, Serialize, Deserialize)]
#[clap(author, about, long_about = None, args_override_self = true)]
#[rustfmt::skip]
pub struct Cli {
    // ---------------
    // | Config File |
    // ---------------
    /// A TOML config file to read from, keys are the long names of the flags below
    #[clap(long, value_parser)]
    pub config_file: Option<String>,

    // -------------------
    // | Sleeper Workers |
    // -------------------

    /// The number of sleeper threads, each holds at most one task
    #[clap(long, value_parser, default_value = "4", env = "NUM_SLEEPERS")]
    pub num_sleepers: usize,
    /// The minimum priority a task must have for a sleeper to swap to it
    ///
    /// Tasks below the floor are only run once harvested by maintenance
    #[clap(long, value_parser, default_value = "0")]
    pub priority_floor: Priority,
    /// How long a sleeper holding nothing waits between swap attempts, in milliseconds
    #[clap(long, value_parser, default_value = "10")]
    pub idle_poll_ms: u64,
    /// The longest a sleeper holding a task sleeps before checking for a better one, in milliseconds
    #[clap(long, value_parser, default_value = "100")]
    pub max_sleep_ms: u64,

    // ---------------
    // | Maintenance |
    // ---------------

    /// The interval between maintenance sweeps, in milliseconds
    #[clap(long, value_parser, default_value = "50")]
    pub maintenance_interval_ms: u64,
    /// The number of threads executing harvested tasks
    #[clap(long, value_parser, default_value = "2")]
    pub executor_threads: usize,

    // ------------------
    // | Synthetic Load |
    // ------------------

    /// The number of synthetic tasks the node schedules per second, zero disables the load generator
    #[clap(long, value_parser, default_value = "0")]
    pub load_tasks_per_sec: u64,
    /// The longest delay before a synthetic task wakes, in milliseconds
    #[clap(long, value_parser, default_value = "1000")]
    pub load_max_delay_ms: u64,

    // -----------
    // | Logging |
    // -----------

    /// The default log level, overridden by `RUST_LOG`
    #[clap(long, value_parser, default_value = "info")]
    pub log_level: String,
    /// Emit logs as json lines
    #[clap(long, value_parser, default_value = "false")]
    pub json_logs: bool,
}

// ----------
// | Config |
// ----------

/// The parsed and validated worker pool config
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// The number of sleeper threads
    pub num_sleepers: usize,
    /// The minimum priority a sleeper swaps to
    pub priority_floor: Priority,
    /// The wait between swap attempts of an idle sleeper
    pub idle_poll_interval: Duration,
    /// The longest uninterrupted sleep of a sleeper holding a task
    pub max_sleep: Duration,
    /// The interval between maintenance sweeps
    pub maintenance_interval: Duration,
    /// The number of threads executing harvested tasks
    pub executor_threads: usize,
    /// The number of synthetic tasks scheduled per second, zero disables them
    pub load_tasks_per_sec: u64,
    /// The longest delay before a synthetic task wakes
    pub load_max_delay: Duration,
    /// The default log level
    pub log_level: LevelFilter,
    /// Whether to emit logs as json lines
    pub json_logs: bool,
}
