//! # jobctl-runtime
//!
//! Threads and tables behind the jobctl scheduler.
//!
//! This crate provides:
//! - The general slot table (fixed capacity, LIFO dispatch, de-duplication)
//! - Reserved per-resource slots with last-writer-wins semantics
//! - Worker thread management and per-worker counters
//! - Missed-wakeup-free parking for idle workers
//! - The `Scheduler` tying them together

pub mod config;
pub mod table;
pub mod reserved;
pub mod parking;
pub mod worker;
pub mod tls;
pub mod executor;
pub mod scheduler;

// Re-exports
pub use config::ControlConfig;
pub use scheduler::{QueueStats, Scheduler};
pub use worker::WorkerStats;
pub use tls::current_worker;
