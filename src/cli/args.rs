//! CLI argument definitions using clap
//!
//! Commands:
//! - walrecover replay --dir <path>
//! - walrecover list --dir <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// walrecover - targeted write-ahead log replay
#[derive(Parser, Debug)]
#[command(name = "walrecover")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to an optional JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log every record at trace level
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Replay DML records from the redo position and checkpoint
    Replay {
        /// Directory holding the control file and log segments
        #[arg(long)]
        dir: PathBuf,
    },

    /// List every record from the redo position without applying it
    List {
        /// Directory holding the control file and log segments
        #[arg(long)]
        dir: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
