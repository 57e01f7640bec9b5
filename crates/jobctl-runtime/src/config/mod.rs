//! Job control configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Example
//!
//! ```rust,ignore
//! use jobctl_runtime::config::ControlConfig;
//!
//! // Defaults with env overrides
//! let config = ControlConfig::from_env();
//!
//! // Or customize programmatically
//! let config = ControlConfig::new()
//!     .num_workers(4)
//!     .max_jobs(64);
//! ```

pub mod defaults;

use std::time::Duration;
use jobctl_core::constants::{MAX_RESERVED_WORKERS, MAX_WORKERS};
use jobctl_core::env::{env_get, env_get_bool};
use jobctl_core::error::{ControlError, ControlResult};

/// Scheduler configuration with builder pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlConfig {
    /// General worker threads, clamped to [1, MAX_WORKERS]
    pub num_workers: usize,
    /// Reserved worker threads (one reserved slot each)
    pub num_reserved: usize,
    /// Capacity of the general slot table
    pub max_jobs: usize,
    /// Upper bound on a single idle sleep
    pub park_timeout: Duration,
    /// Enable control debug traces
    pub debug_logging: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ControlConfig {
    /// Create config from compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `JOBCTL_WORKER_THREADS` - General worker threads (clamped to 1..=8)
    /// - `JOBCTL_RESERVED_WORKERS` - Reserved worker threads
    /// - `JOBCTL_MAX_JOBS` - General queue capacity
    /// - `JOBCTL_PARK_TIMEOUT_MS` - Idle sleep bound in milliseconds
    /// - `JOBCTL_DEBUG` - Enable control debug traces (0/1)
    pub fn from_env() -> Self {
        Self::new()
            .num_workers(env_get("JOBCTL_WORKER_THREADS", defaults::NUM_WORKERS))
            .num_reserved(env_get("JOBCTL_RESERVED_WORKERS", defaults::NUM_RESERVED_WORKERS))
            .max_jobs(env_get("JOBCTL_MAX_JOBS", defaults::MAX_JOBS))
            .park_timeout(Duration::from_millis(env_get(
                "JOBCTL_PARK_TIMEOUT_MS",
                defaults::PARK_TIMEOUT_MS,
            )))
            .debug_logging(env_get_bool("JOBCTL_DEBUG", defaults::DEBUG_LOGGING))
    }

    /// Create config with explicit defaults (no env override).
    pub fn new() -> Self {
        Self {
            num_workers: defaults::NUM_WORKERS,
            num_reserved: defaults::NUM_RESERVED_WORKERS,
            max_jobs: defaults::MAX_JOBS,
            park_timeout: Duration::from_millis(defaults::PARK_TIMEOUT_MS),
            debug_logging: defaults::DEBUG_LOGGING,
        }
    }

    // Builder methods

    /// Set general worker count, clamped to [1, MAX_WORKERS]
    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n.clamp(1, MAX_WORKERS);
        self
    }

    pub fn num_reserved(mut self, n: usize) -> Self {
        self.num_reserved = n;
        self
    }

    pub fn max_jobs(mut self, n: usize) -> Self {
        self.max_jobs = n;
        self
    }

    pub fn park_timeout(mut self, d: Duration) -> Self {
        self.park_timeout = d;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> ControlResult<()> {
        if self.num_workers == 0 {
            return Err(ControlError::InvalidConfig("num_workers must be > 0"));
        }
        if self.num_workers > MAX_WORKERS {
            return Err(ControlError::InvalidConfig("num_workers exceeds maximum"));
        }
        if self.num_reserved > MAX_RESERVED_WORKERS {
            return Err(ControlError::InvalidConfig("num_reserved exceeds maximum"));
        }
        if self.max_jobs == 0 {
            return Err(ControlError::InvalidConfig("max_jobs must be > 0"));
        }
        if self.max_jobs > u32::MAX as usize {
            return Err(ControlError::InvalidConfig("max_jobs must fit in a slot index"));
        }
        if self.park_timeout.is_zero() {
            return Err(ControlError::InvalidConfig("park_timeout must be > 0"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        eprintln!("jobctl configuration:");
        eprintln!("  num_workers:    {}", self.num_workers);
        eprintln!("  num_reserved:   {}", self.num_reserved);
        eprintln!("  max_jobs:       {}", self.max_jobs);
        eprintln!("  park_timeout:   {:?}", self.park_timeout);
        eprintln!("  debug_logging:  {}", self.debug_logging);
    }
}
