//! Parsing logic for a separate pool config file

use std::fs;

use clap::Parser;
use toml::{Value, map::Map};

use crate::{Cli, PoolConfig, parsing::parse_config_from_args};

/// The CLI argument name for the config file
const CONFIG_FILE_ARG: &str = "--config-file";

/// Parse args from a config file
pub(crate) fn config_file_args(cli_args: &[String]) -> Result<Vec<String>, String> {
    // If we find "--config-file", the next argument is the file to read from
    let Some(index) = cli_args.iter().position(|arg| arg == CONFIG_FILE_ARG) else {
        return Ok(vec![]);
    };

    let path = cli_args.get(index + 1).ok_or(format!("{CONFIG_FILE_ARG} requires a path"))?;
    read_config_file(path)
}

/// Parse a config entirely from a file
pub fn parse_config_from_file(path: &str) -> Result<PoolConfig, String> {
    let mut file_args = read_config_file(path)?;
    file_args.insert(0, "dummy-program-name".to_string());
    let cli = Cli::try_parse_from(file_args).map_err(|e| e.to_string())?;
    parse_config_from_args(cli)
}

/// Parse a config file
fn read_config_file(path: &str) -> Result<Vec<String>, String> {
    let file_contents = fs::read_to_string(path).map_err(|err| err.to_string())?;
    let config_kv_pairs: Map<_, _> =
        toml::from_str(&file_contents).map_err(|err| err.to_string())?;

    let mut config_file_args: Vec<String> = Vec::with_capacity(config_kv_pairs.len());
    for (toml_key, value) in config_kv_pairs.iter() {
        // Format the TOML key into --key
        let cli_arg = format!("--{}", toml_key);
        let cli_values = parse_toml_value(cli_arg, value)?;
        config_file_args.extend(cli_values);
    }

    Ok(config_file_args)
}

// ----------------
// | TOML Parsing |
// ----------------

/// Parse a toml value into a list of strings to append to the CLI args
fn parse_toml_value(cli_arg: String, val: &Value) -> Result<Vec<String>, String> {
    match val {
        // Just the flag, i.e. --flag, omitted entirely when false
        Value::Boolean(b) => Ok(if *b { vec![cli_arg] } else { vec![] }),
        x => {
            let value_str = toml_value_to_string(x)
                .map_err(|_| format!("error parsing config value: {cli_arg} = {x:?}"))?;
            Ok(vec![cli_arg, value_str])
        },
    }
}

/// Helper method to convert a toml value to a string
fn toml_value_to_string(val: &Value) -> Result<String, String> {
    Ok(match val {
        Value::String(val) => val.clone(),
        Value::Integer(val) => format!("{:?}", val),
        Value::Float(val) => format!("{:?}", val),
        _ => {
            return Err("unsupported value".to_string());
        },
    })
}
