//! Error types for job control

use core::fmt;
use crate::id::SlotIndex;
use crate::state::JobState;

/// Result type for job control operations
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur in job control operations
///
/// Capacity and duplicate conditions are recoverable and returned
/// synchronously from submission. A job's own failure is reported only
/// through its integer result, never through this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// General queue has no idle slot; the job was marked Discarded
    QueueFull,

    /// An equivalent job is already queued in `slot`; nothing was done
    AlreadyQueued { slot: SlotIndex },

    /// Reserved id outside the configured reserved range
    ReservedOutOfRange { id: usize, max: usize },

    /// Job is not in a state that allows the operation
    InvalidState(JobState),

    /// Rejected state transition
    InvalidTransition { from: JobState, to: JobState },

    /// Scheduler has been shut down
    ShutDown,

    /// Scheduler already started
    AlreadyStarted,

    /// Configuration rejected by `validate()`
    InvalidConfig(&'static str),

    /// Failed to spawn a worker thread
    WorkerSpawn,
}

impl ControlError {
    /// True for the de-duplication signal, which callers treat as a no-op
    #[inline]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, ControlError::AlreadyQueued { .. })
    }
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::QueueFull => write!(f, "job queue full, job discarded"),
            ControlError::AlreadyQueued { slot } => {
                write!(f, "equivalent job already queued in slot {}", slot)
            }
            ControlError::ReservedOutOfRange { id, max } => {
                write!(f, "reserved id {} out of range (0..{})", id, max)
            }
            ControlError::InvalidState(s) => write!(f, "invalid job state: {}", s),
            ControlError::InvalidTransition { from, to } => {
                write!(f, "invalid job transition {} -> {}", from, to)
            }
            ControlError::ShutDown => write!(f, "scheduler shut down"),
            ControlError::AlreadyStarted => write!(f, "scheduler already started"),
            ControlError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            ControlError::WorkerSpawn => write!(f, "failed to spawn worker thread"),
        }
    }
}

impl std::error::Error for ControlError {}
