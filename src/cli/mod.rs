//! CLI module for walrecover
//!
//! Provides command-line interface for:
//! - replay: apply DML records from the redo position, then checkpoint
//! - list: report every record from the redo position, read-only

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{list, load_config, replay, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_error_to, write_response_to};
