//! CLI argument definitions using clap
//!
//! Commands:
//! - regstore members --config <path> --bootstrap <path> [--register <uri>] [--status <token>] [--at <rfc3339>]
//! - regstore versions --config <path> --bootstrap <path> --uri <uri>
//! - regstore check-config --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// regstore - versioned, hierarchical metadata registry
#[derive(Parser, Debug)]
#[command(name = "regstore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the members of a register as JSON lines
    Members {
        /// Path to configuration file
        #[arg(long, default_value = "./regstore.json")]
        config: PathBuf,

        /// Bootstrap document seeding the store
        #[arg(long)]
        bootstrap: PathBuf,

        /// Register URI (defaults to the root register)
        #[arg(long)]
        register: Option<String>,

        /// Status filter: any, valid, accepted, notaccepted or a status name
        #[arg(long, default_value = "any")]
        status: String,

        /// Reconstruct membership as of this RFC 3339 instant
        #[arg(long)]
        at: Option<String>,
    },

    /// Print the version history of a resource
    Versions {
        /// Path to configuration file
        #[arg(long, default_value = "./regstore.json")]
        config: PathBuf,

        /// Bootstrap document seeding the store
        #[arg(long)]
        bootstrap: PathBuf,

        /// Item, entity or register URI
        #[arg(long)]
        uri: String,
    },

    /// Validate a configuration file and exit
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./regstore.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_members() {
        let cli = Cli::try_parse_from([
            "regstore",
            "members",
            "--bootstrap",
            "boot.json",
            "--status",
            "stable",
            "--at",
            "2024-01-01T00:00:00Z",
        ])
        .unwrap();
        match cli.command {
            Command::Members {
                config,
                status,
                at,
                register,
                ..
            } => {
                assert_eq!(config, PathBuf::from("./regstore.json"));
                assert_eq!(status, "stable");
                assert_eq!(at.as_deref(), Some("2024-01-01T00:00:00Z"));
                assert!(register.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_versions_requires_uri() {
        assert!(Cli::try_parse_from(["regstore", "versions", "--bootstrap", "b.json"]).is_err());
    }
}
