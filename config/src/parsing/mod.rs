//! Parsing logic for the worker pool config

use std::{env, str::FromStr, time::Duration};

use clap::Parser;
use util::telemetry::LevelFilter;

use crate::{Cli, PoolConfig, parsing::config_file::config_file_args, validation::validate_config};

pub mod config_file;

/// Parses command line args into the pool config
///
/// We allow for configurations to come from both a config file and overrides
/// on the command line directly. To support this, we first read configuration
/// options from the config file, prepend them to the cli args string, and parse
/// with `args_override_self` so that cli args (which come after config file
/// args) take precedence.
pub fn parse_command_line_args() -> Result<PoolConfig, String> {
    let command_line_args: Vec<String> = env::args().collect();
    parse_config_from_arg_list(command_line_args)
}

/// Parse a full argument list, including the executable name, merging in the
/// config file if one is named
pub(crate) fn parse_config_from_arg_list(mut args: Vec<String>) -> Result<PoolConfig, String> {
    // The first argument is the executable name, keep it in front
    let config_file_args = config_file_args(&args)?;
    let mut full_args = vec![args.remove(0)];
    full_args.extend(config_file_args);
    full_args.extend(args);

    let cli = Cli::try_parse_from(full_args).map_err(|e| e.to_string())?;
    parse_config_from_args(cli)
}

/// Parse the config from a set of command line arguments
///
/// Separating out this functionality allows us to easily inject custom args
/// apart from what is specified on the command line
pub fn parse_config_from_args(cli_args: Cli) -> Result<PoolConfig, String> {
    let log_level = LevelFilter::from_str(&cli_args.log_level)
        .map_err(|_| format!("invalid log level: {}", cli_args.log_level))?;

    let config = PoolConfig {
        num_sleepers: cli_args.num_sleepers,
        priority_floor: cli_args.priority_floor,
        idle_poll_interval: Duration::from_millis(cli_args.idle_poll_ms),
        max_sleep: Duration::from_millis(cli_args.max_sleep_ms),
        maintenance_interval: Duration::from_millis(cli_args.maintenance_interval_ms),
        executor_threads: cli_args.executor_threads,
        load_tasks_per_sec: cli_args.load_tasks_per_sec,
        load_max_delay: Duration::from_millis(cli_args.load_max_delay_ms),
        log_level,
        json_logs: cli_args.json_logs,
    };

    validate_config(&config)?;
    Ok(config)
}
