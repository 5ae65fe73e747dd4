//! CLI command implementations
//!
//! Each command builds an in-memory store from a config file and a
//! bootstrap document, runs one query and prints JSON lines to stdout.

use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use crate::observability::{log_event_with_fields, Event};
use crate::registry::StatusFilter;
use crate::store::{Store, StoreConfig};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

pub fn run_command(cmd: Command) -> CliResult<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cmd {
        Command::Members {
            config,
            bootstrap,
            register,
            status,
            at,
        } => members(
            &mut out,
            &config,
            &bootstrap,
            register.as_deref(),
            &status,
            at.as_deref(),
        ),
        Command::Versions {
            config,
            bootstrap,
            uri,
        } => versions(&mut out, &config, &bootstrap, &uri),
        Command::CheckConfig { config } => check_config(&mut out, &config),
    }
}

fn load_config(path: &Path) -> CliResult<StoreConfig> {
    let config = StoreConfig::load(path)?;
    log_event_with_fields(
        Event::ConfigLoaded,
        &[("path", &path.display().to_string()), ("root", &config.root_uri)],
    );
    Ok(config)
}

/// Load config and bootstrap into a fresh store. One-shot commands have no
/// listeners, so the notifier is not started.
fn open_store(config_path: &Path, bootstrap_path: &Path) -> CliResult<Store> {
    let config = load_config(config_path)?.with_notifier(false);
    let store = Store::open(config)?;
    store.load_bootstrap(bootstrap_path)?;
    Ok(store)
}

fn write_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    out.write_all(b"\n")?;
    Ok(())
}

fn parse_instant(s: &str) -> CliResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CliError::usage_error(format!("Invalid --at '{}': {}", s, e)))
}

/// Print member summaries of a register
pub fn members<W: Write>(
    out: &mut W,
    config: &Path,
    bootstrap: &Path,
    register: Option<&str>,
    status: &str,
    at: Option<&str>,
) -> CliResult<()> {
    let filter: StatusFilter = status
        .parse()
        .map_err(|e| CliError::usage_error(format!("Invalid --status: {}", e)))?;
    let at = at.map(parse_instant).transpose()?;

    let store = open_store(config, bootstrap)?;
    let register = register.unwrap_or_else(|| store.root_uri()).to_string();
    for member in store.list_members(&register, filter, at)? {
        write_line(out, &member?)?;
    }
    Ok(())
}

/// Print the version history of a resource
pub fn versions<W: Write>(out: &mut W, config: &Path, bootstrap: &Path, uri: &str) -> CliResult<()> {
    let store = open_store(config, bootstrap)?;
    for info in store.list_versions(uri)? {
        write_line(
            out,
            &json!({
                "uri": info.uri,
                "version": info.version,
                "from": info.from,
                "to": info.to,
                "replaces": info.replaces(),
            }),
        )?;
    }
    Ok(())
}

/// Validate a configuration file
pub fn check_config<W: Write>(out: &mut W, config: &Path) -> CliResult<()> {
    let config = load_config(config)?;
    write_line(out, &json!({ "valid": true, "config": config }))
}
