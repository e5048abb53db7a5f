//! Error handling utilities

use crate::error::{describe_error_code, ReachError};
use tracing::error;

/// Report a fatal error and exit with its status code.
///
/// - `verbose = 0`: one-line message only
/// - `verbose >= 1`: full error chain as well
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    error!("Fatal error: {}", error);

    let exit_code = if let Some(reach_err) = error.downcast_ref::<ReachError>() {
        eprintln!("Error: {}", reach_err.user_message());
        if let Some(round) = reach_err.round() {
            eprintln!("  round: {round}");
        }
        let code = reach_err.code();
        eprintln!("  code: E{:04} ({})", code, describe_error_code(code));
        reach_err.exit_code()
    } else {
        eprintln!("Error: {error}");
        1
    };

    if verbose >= 1 {
        eprintln!("\nError chain:");
        for (i, cause) in error.chain().enumerate() {
            eprintln!("  {}: {}", i, cause);
        }
    }

    std::process::exit(exit_code)
}
