//! Job state machine

use core::fmt;

/// State of a job
///
/// Moves forward only:
///
/// ```text
/// Initialized ──► Queued ──► Running ──► Finished
///      │            │           │           ▲
///      │            │           └► Cancelled ┘
///      │            └──────────► Discarded
///      └───────────────────────► Discarded
/// ```
///
/// `Cancelled` is advisory: a running job keeps running until its body
/// notices, and still ends in `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum JobState {
    /// Built by a producer, not yet submitted
    Initialized = 0,

    /// Sitting in a slot, waiting for a worker
    Queued = 1,

    /// `execute` is in progress on a worker
    Running = 2,

    /// Cancellation requested
    Cancelled = 3,

    /// `execute` returned (or the cancelled job was skipped)
    Finished = 4,

    /// Rejected for capacity, overwritten, or dropped at shutdown; never runs
    Discarded = 5,
}

impl JobState {
    /// Whether `self -> next` is a legal transition
    pub const fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Initialized, Queued)
                | (Initialized, Discarded)
                | (Queued, Running)
                | (Queued, Discarded)
                | (Running, Finished)
                | (Initialized, Cancelled)
                | (Queued, Cancelled)
                | (Running, Cancelled)
                | (Cancelled, Finished)
        )
    }

    /// No further transitions can happen
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, JobState::Finished | JobState::Discarded)
    }

    /// A worker may pick this job up
    #[inline]
    pub const fn is_runnable(&self) -> bool {
        matches!(self, JobState::Queued)
    }

    /// `cancel()` has an effect from this state
    #[inline]
    pub const fn is_cancellable(&self) -> bool {
        matches!(self, JobState::Initialized | JobState::Queued | JobState::Running)
    }
}

impl From<JobState> for u8 {
    fn from(state: JobState) -> u8 {
        state as u8
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Initialized => write!(f, "INITIALIZED"),
            JobState::Queued => write!(f, "QUEUED"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Cancelled => write!(f, "CANCELLED"),
            JobState::Finished => write!(f, "FINISHED"),
            JobState::Discarded => write!(f, "DISCARDED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use JobState::*;

    const ALL: [JobState; 6] = [Initialized, Queued, Running, Cancelled, Finished, Discarded];

    #[test]
    fn test_forward_path() {
        assert!(Initialized.can_transition_to(Queued));
        assert!(Queued.can_transition_to(Running));
        assert!(Running.can_transition_to(Finished));
        assert!(Running.can_transition_to(Cancelled));
        assert!(Cancelled.can_transition_to(Finished));
    }

    #[test]
    fn test_discard_paths() {
        assert!(Initialized.can_transition_to(Discarded));
        assert!(Queued.can_transition_to(Discarded));
        assert!(!Running.can_transition_to(Discarded));
        assert!(!Finished.can_transition_to(Discarded));
    }

    #[test]
    fn test_no_backward_transitions() {
        for to in ALL {
            assert!(!Finished.can_transition_to(to), "Finished -> {}", to);
            assert!(!Discarded.can_transition_to(to), "Discarded -> {}", to);
            assert!(!to.can_transition_to(Initialized), "{} -> Initialized", to);
        }
        assert!(!Running.can_transition_to(Queued));
        assert!(!Cancelled.can_transition_to(Running));
        assert!(!Cancelled.can_transition_to(Queued));
    }

    #[test]
    fn test_predicates() {
        assert!(Queued.is_runnable());
        assert!(!Cancelled.is_runnable());
        assert!(Finished.is_terminal());
        assert!(Discarded.is_terminal());
        assert!(!Cancelled.is_terminal());
        assert!(Running.is_cancellable());
        assert!(!Finished.is_cancellable());
        assert!(!Cancelled.is_cancellable());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Queued), "QUEUED");
        assert_eq!(u8::from(Discarded), 5);
    }
}
