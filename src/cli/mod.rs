//! Command-line interface
//!
//! - `args` - clap definitions
//! - `router` - dispatch from parsed arguments to commands
//! - `commands` - the command implementations

pub mod args;
pub mod commands;
pub mod router;

pub use args::{Cli, Commands, JobArgs};
pub use router::execute_command;
