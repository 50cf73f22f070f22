//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::OutputFormat;

/// sharedbus - scope-aware event bus playground
#[derive(Parser, Debug)]
#[command(name = "sb", author, version, about = "Run event bus scenarios against a scripted component host", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a scenario file and print every delivery
    Run {
        /// Scenario YAML file (relative paths use the configured scenario-dir)
        #[arg(required = true)]
        scenario: PathBuf,

        /// Output format (default: from config, else text)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Walk through the built-in modal display example
    Demo,
}
