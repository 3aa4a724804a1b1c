//! CLI interface for Insight
//!
//! This module provides the command-line interface using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Insight autonomous research agent
///
/// A boss agent plans tasks toward an objective, a worker executes them
/// against PubMed, MyGene or the language model, and cleaned results are
/// stored in a vector index that feeds later cycles.
#[derive(Parser, Debug)]
#[command(name = "insight")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress the console sections
    #[arg(long, short, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the agent loop (default)
    Run {
        /// Objective to pursue instead of the configured one
        #[arg(long)]
        objective: Option<String>,

        /// Stop after this many completed tasks
        #[arg(long, value_name = "N")]
        max_iterations: Option<u32>,
    },

    /// Create the vector index if it does not exist
    InitIndex,

    /// Check configuration, credentials and service reachability
    Doctor,
}

impl Cli {
    /// The subcommand to run, `run` when none was given
    pub fn resolved_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run {
            objective: None,
            max_iterations: None,
        })
    }
}
