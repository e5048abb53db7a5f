/// Error code registry for reachmap
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Graph input errors
/// - 3000-3999: Storage errors
/// - 4000-4999: Round execution errors
/// - 5000-5999: Extraction errors
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_INVALID_VALUE: u16 = 1001;
    pub const CONFIG_PARSE_ERROR: u16 = 1002;

    // Graph input errors (2000-2999)
    pub const GRAPH_INVALID: u16 = 2001;

    // Storage errors (3000-3999)
    pub const STORAGE_IO_ERROR: u16 = 3001;
    pub const STORAGE_ROUND: u16 = 3002;

    // Round execution errors (4000-4999)
    pub const ROUND_FAILED: u16 = 4001;
    pub const ROUND_LIMIT_EXCEEDED: u16 = 4002;
    pub const ROUND_INVALID_STATE: u16 = 4003;

    // Extraction errors (5000-5999)
    pub const EXTRACT_NOT_CONVERGED: u16 = 5001;
    pub const EXTRACT_FAILED: u16 = 5002;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        1001 => "Invalid value in job configuration",
        1002 => "Failed to parse job configuration",

        2001 => "Graph input is malformed",

        3001 => "Filesystem I/O error",
        3002 => "Round directory is missing, incomplete, or unreadable",

        4001 => "A propagation round could not be completed",
        4002 => "Distances were still changing when the round limit was reached",
        4003 => "Job state machine received an invalid transition",

        5001 => "Snapshot has not converged and cannot be extracted",
        5002 => "Reachability extraction failed",

        _ => "Unknown error code",
    }
}
