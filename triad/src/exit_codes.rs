//! Stable exit codes for triad CLI commands.

/// Command succeeded; for `run`, the workflow completed.
pub const OK: i32 = 0;
/// Command failed due to invalid config/arguments or an I/O error.
pub const INVALID: i32 = 1;
/// `run` reached a `Failed` terminal (planning failure or cancellation).
pub const FAILED: i32 = 2;
/// `run` finished but the final task exhausted its iteration budget.
pub const EXHAUSTED: i32 = 3;
/// `session show` found no record for the given id.
pub const NOT_FOUND: i32 = 4;
