//! Configuration for the sleepy worker pool
//!
//! Options may be given on the command line or in a TOML config file; the
//! command line takes precedence over the file

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(clippy::needless_pass_by_value)]

mod cli;
pub mod parsing;
mod validation;

pub use cli::{Cli, PoolConfig};
pub use parsing::{
    config_file::parse_config_from_file, parse_command_line_args, parse_config_from_args,
};
