//! # jobctl-core
//!
//! Core types for the jobctl background job scheduler.
//!
//! This crate is platform-agnostic and spawns no threads.
//! Worker pools, slot tables and the scheduler live in `jobctl-runtime`.
//!
//! ## Modules
//!
//! - `id` - Slot, reserved-worker, worker and job identifiers
//! - `state` - Job state machine
//! - `job` - The `Execute` trait, the `Job` record and `JobContext`
//! - `handle` - Shared per-job state accessor (state lock + wait condition)
//! - `error` - Error types
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod state;
pub mod job;
pub mod handle;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::{JobId, ReservedId, SlotIndex, WorkerId};
pub use state::JobState;
pub use job::{Execute, Job, JobContext};
pub use handle::{JobHandle, StateCallback};
pub use error::{ControlError, ControlResult};
pub use env::{env_get, env_get_bool, env_get_opt};

/// Scheduler-wide constants
pub mod constants {
    /// Hard upper bound on general worker threads
    pub const MAX_WORKERS: usize = 8;

    /// Hard upper bound on reserved (resource-affine) worker threads
    pub const MAX_RESERVED_WORKERS: usize = 16;

    /// Result recorded for a job whose `execute` panicked
    pub const JOB_PANICKED: i32 = i32::MIN;
}
