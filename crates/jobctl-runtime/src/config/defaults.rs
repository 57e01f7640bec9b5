//! Compile-time defaults for `ControlConfig`

/// General worker threads
pub const NUM_WORKERS: usize = 2;

/// Reserved worker threads, one per long-lived resource
pub const NUM_RESERVED_WORKERS: usize = 6;

/// General queue capacity (slot table size)
pub const MAX_JOBS: usize = 30;

/// Upper bound on one idle sleep before a worker re-checks the tables
pub const PARK_TIMEOUT_MS: u64 = 100;

/// Emit `[add_job]` / `[run_job]` control traces
pub const DEBUG_LOGGING: bool = false;
