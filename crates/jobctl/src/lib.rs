//! # jobctl - background job control
//!
//! A fixed-capacity job scheduler for interactive applications that push
//! expensive work (thumbnails, exports, imports) off their main thread.
//!
//! ## Features
//!
//! - **Bounded**: a fixed slot table; submissions past capacity are rejected
//! - **LIFO dispatch**: the most recent request runs first, which suits
//!   "what the user is looking at now" workloads; `revive` bumps a queued job
//! - **De-duplication**: an equal job already waiting is not queued twice
//! - **Reserved workers**: one dedicated thread per long-lived resource,
//!   holding only the latest pending request
//! - **Cooperative cancellation** and blocking `wait` per job
//!
//! Dispatch order is deliberately *not* FIFO. Code that needs ordering
//! between jobs must enforce it itself.
//!
//! ## Quick Start
//!
//! ```ignore
//! use jobctl::{ControlConfig, Execute, Job, JobContext, Scheduler};
//!
//! #[derive(PartialEq)]
//! enum Work {
//!     Thumbnail { image: u32, size: u32 },
//! }
//!
//! impl Execute for Work {
//!     fn execute(&mut self, ctx: &JobContext<'_>) -> i32 {
//!         match self {
//!             Work::Thumbnail { .. } if ctx.is_cancelled() => 1,
//!             Work::Thumbnail { .. } => 0,
//!         }
//!     }
//! }
//!
//! let sched = Scheduler::new(ControlConfig::from_env())?;
//! sched.start()?;
//!
//! let job = Job::new(Work::Thumbnail { image: 7, size: 256 });
//! let handle = job.handle();
//! sched.submit(job)?;
//! assert_eq!(handle.wait(), Some(0));
//! ```
//!
//! ## Architecture
//!
//! ```text
//!   producers ── submit ──▶ ┌──────────────────────────┐
//!             ── revive ──▶ │  slot table (N slots)    │──▶ general workers
//!                           │  idle stack / queued LIFO│
//!                           └──────────────────────────┘
//!   producers ── submit_reserved(id) ──▶ reserved slot[id] ──▶ reserved worker[id]
//!
//!   JobHandle: per-job state lock + condvar (wait / cancel / callbacks)
//! ```

// Re-export core types
pub use jobctl_core::{
    ControlError,
    ControlResult,
    Execute,
    Job,
    JobContext,
    JobHandle,
    JobId,
    JobState,
    ReservedId,
    SlotIndex,
    StateCallback,
    WorkerId,
};
pub use jobctl_core::constants::{JOB_PANICKED, MAX_RESERVED_WORKERS, MAX_WORKERS};

// Re-export kprint macros for debug logging
pub use jobctl_core::{kprint, kprintln, klog, kerror, kwarn, kinfo, kdebug, ktrace};
pub use jobctl_core::kprint::{LogLevel, init as init_logging, set_log_level, set_flush_enabled, set_time_enabled};

// Re-export env utilities
pub use jobctl_core::{env_get, env_get_bool, env_get_opt};

// Re-export runtime types
pub use jobctl_runtime::{
    current_worker,
    ControlConfig,
    QueueStats,
    Scheduler,
    WorkerStats,
};

/// Start a scheduler, run `f` with it, then shut it down
///
/// Shutdown waits for running jobs and discards whatever is still queued.
pub fn block_on<E, F, T>(config: ControlConfig, f: F) -> ControlResult<T>
where
    E: Execute + PartialEq,
    F: FnOnce(&Scheduler<E>) -> T,
{
    let sched = Scheduler::new(config)?;
    sched.start()?;
    let result = f(&sched);
    sched.shutdown();
    Ok(result)
}
