//! CLI module for convo-stream.
//!
//! This module provides command-line interface functionality including:
//! - Argument parsing
//! - Version display
//! - Sending one turn and printing the reply
//!
//! # Usage
//!
//! ```ignore
//! use convo_stream::cli::{parse_args, run_cli_command, CliCommand};
//!
//! let command = parse_args(std::env::args());
//! if let Some(result) = run_cli_command(&command) {
//!     // CLI command was executed, exit with result
//!     std::process::exit(if result.is_ok() { 0 } else { 2 });
//! }
//! // Otherwise the command sends a message
//! ```

pub mod args;
pub mod send;
pub mod version;

pub use args::{parse_args, CliCommand, SendArgs, USAGE};
pub use send::run_send;
pub use version::{handle_version_command, version_line, VERSION};

use color_eyre::eyre::eyre;
use color_eyre::Result;

/// Run a command that needs no runtime.
///
/// # Returns
///
/// * `None` - If the command is `Send` (handled by [`run_send`])
/// * `Some(Ok(()))` - If a CLI command executed successfully
/// * `Some(Err(e))` - If the arguments were invalid
///
/// # Note
///
/// The `Version` command never returns as it calls `std::process::exit(0)`.
pub fn run_cli_command(command: &CliCommand) -> Option<Result<()>> {
    match command {
        CliCommand::Version => {
            // This function never returns (calls exit)
            handle_version_command();
        }
        CliCommand::Help => {
            println!("{}", USAGE);
            Some(Ok(()))
        }
        CliCommand::Invalid(reason) => {
            eprintln!("{}\n\n{}", reason, USAGE);
            Some(Err(eyre!("invalid arguments: {}", reason)))
        }
        CliCommand::Send(_) => None,
    }
}
