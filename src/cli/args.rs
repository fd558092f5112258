//! CLI argument definitions using clap
//!
//! Commands:
//! - pmcore init --config <path>
//! - pmcore start --config <path>
//! - pmcore serve --config <path> [--port <port>]
//! - pmcore attrs --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// pmcore - System sleep-state transition coordinator
#[derive(Parser, Debug)]
#[command(name = "pmcore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default configuration file
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./pmcore.json")]
        config: PathBuf,
    },

    /// Boot a coordinator on the simulated platform and serve JSON lines on stdin
    Start {
        /// Path to configuration file
        #[arg(long, default_value = "./pmcore.json")]
        config: PathBuf,
    },

    /// Serve the control surface over HTTP
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./pmcore.json")]
        config: PathBuf,

        /// Override the configured HTTP port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print the attribute table for a configuration
    Attrs {
        /// Path to configuration file
        #[arg(long, default_value = "./pmcore.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
