use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct ChainCli {
    /// Subcommands
    #[command(subcommand)]
    pub command: ChainCliCommand
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum ChainCliCommand {
    /// Process one message and print the report as JSON
    Run {
        /// Configuration file (defaults to the platform config directory)
        #[arg(long)]
        config:  Option<PathBuf>,
        /// Entry chain
        #[arg(long)]
        chain:   String,
        /// JSON file holding the message object
        #[arg(long)]
        message: Option<PathBuf>
    },
    /// Build every chain of a configuration and list them
    Check {
        /// Configuration file (defaults to the platform config directory)
        #[arg(long)]
        config: Option<PathBuf>
    },
    /// Write an example configuration
    Init {
        /// Target file (defaults to the platform config directory)
        #[arg(long)]
        config: Option<PathBuf>
    }
}
