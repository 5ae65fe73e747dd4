//! CLI module for regstore
//!
//! Provides command-line access to a bootstrapped in-memory store:
//! - members: list register members, optionally as of a past instant
//! - versions: print a resource's version history
//! - check-config: validate a configuration file

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{check_config, members, run, run_command, versions};
pub use errors::{CliError, CliErrorCode, CliResult};
