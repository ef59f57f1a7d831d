//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: drive job loops for a tenant against a fixture store (dry-run network)
//! - check-config: validate configuration and print resolved job settings

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use autopilot::domain::JobKind;

/// Autopilot - per-tenant messaging automation orchestrator
#[derive(Parser, Debug)]
#[command(name = "autopilot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run job loops for a tenant until Ctrl-C
    Run {
        /// YAML fixture holding accounts, content, targets, rules and destinations
        #[arg(short, long)]
        store: PathBuf,

        /// Tenant to run for
        #[arg(short, long)]
        tenant: String,

        /// Job kinds to start (repeatable); all kinds when omitted
        #[arg(short, long = "kind", value_parser = parse_kind)]
        kinds: Vec<JobKind>,

        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        for_secs: Option<u64>,
    },

    /// Validate configuration and print resolved per-kind settings
    CheckConfig,
}

fn parse_kind(s: &str) -> Result<JobKind, String> {
    s.parse()
}
