//! Shared per-job state accessor
//!
//! A `JobHandle` is what a producer keeps after handing the job value to
//! the scheduler. It owns the job's own small lock (state, result and the
//! optional state-change callback) and the condition variable `wait()`
//! sleeps on. Holding it never touches the scheduler's table lock, so
//! waiting on one job does not serialize against unrelated submissions.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{ControlError, ControlResult};
use crate::id::JobId;
use crate::state::JobState;

/// Called under the job's state lock on every accepted transition.
///
/// Must not block and must not call back into the same handle. A panic is
/// caught and logged; the transition stands.
pub type StateCallback = Arc<dyn Fn(JobId, JobState) + Send + Sync>;

struct Status {
    state: JobState,
    result: Option<i32>,
    /// No worker will touch this job again
    settled: bool,
    callback: Option<StateCallback>,
}

struct Inner {
    id: JobId,
    description: String,
    status: Mutex<Status>,
    settled_cond: Condvar,
}

/// Cloneable accessor for one job's state
#[derive(Clone)]
pub struct JobHandle {
    inner: Arc<Inner>,
}

impl JobHandle {
    /// Create a handle in `Initialized` state
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: JobId::next(),
                description: description.into(),
                status: Mutex::new(Status {
                    state: JobState::Initialized,
                    result: None,
                    settled: false,
                    callback: None,
                }),
                settled_cond: Condvar::new(),
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> JobId {
        self.inner.id
    }

    #[inline]
    pub fn description(&self) -> &str {
        &self.inner.description
    }

    /// Both handles refer to the same job
    #[inline]
    pub fn same_job(&self, other: &JobHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock(&self) -> MutexGuard<'_, Status> {
        // A panicking callback must not wedge the job forever.
        self.inner.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state
    pub fn state(&self) -> JobState {
        self.lock().state
    }

    /// Result written by the worker, if the job has run
    pub fn result(&self) -> Option<i32> {
        self.lock().result
    }

    /// Cancellation was requested
    ///
    /// Job bodies poll this to cut work short.
    pub fn is_cancelled(&self) -> bool {
        self.lock().state == JobState::Cancelled
    }

    /// No worker will touch this job again
    pub fn is_settled(&self) -> bool {
        self.lock().settled
    }

    /// Install (or replace) the state-change callback
    pub fn set_state_callback<F>(&self, callback: F)
    where
        F: Fn(JobId, JobState) + Send + Sync + 'static,
    {
        self.lock().callback = Some(Arc::new(callback));
    }

    /// Request cooperative cancellation
    ///
    /// Advisory only: a queued job will be skipped by the worker that claims
    /// it, a running job keeps running until its body polls
    /// `is_cancelled()`. Returns `false` if the job was already Cancelled,
    /// Finished or Discarded.
    pub fn cancel(&self) -> bool {
        let mut st = self.lock();
        let from = st.state;
        if !from.is_cancellable() {
            return false;
        }
        self.apply(&mut st, JobState::Cancelled);
        if from == JobState::Initialized {
            // Never submitted, and can no longer be.
            st.settled = true;
            self.inner.settled_cond.notify_all();
        }
        true
    }

    /// Block until the job is settled, returning its result
    ///
    /// Returns immediately for a job that was never submitted or was
    /// discarded. `None` means the job never ran.
    pub fn wait(&self) -> Option<i32> {
        let mut st = self.lock();
        while !st.settled && st.state != JobState::Initialized {
            st = self
                .inner
                .settled_cond
                .wait(st)
                .unwrap_or_else(PoisonError::into_inner);
        }
        st.result
    }

    // ------------------------------------------------------------------
    // Scheduler side
    // ------------------------------------------------------------------

    /// Apply a transition if it is legal
    pub fn transition(&self, to: JobState) -> ControlResult<()> {
        let mut st = self.lock();
        let from = st.state;
        if !from.can_transition_to(to) {
            return Err(ControlError::InvalidTransition { from, to });
        }
        self.apply(&mut st, to);
        if to.is_terminal() {
            self.settle(&mut st);
        }
        Ok(())
    }

    /// Claim a queued job for execution: Queued -> Running
    ///
    /// Returns `false` (and changes nothing) if the job is no longer
    /// Queued, i.e. it was cancelled while waiting.
    pub fn begin_run(&self) -> bool {
        let mut st = self.lock();
        if st.state != JobState::Queued {
            return false;
        }
        self.apply(&mut st, JobState::Running);
        true
    }

    /// Record the result and move to Finished, releasing waiters
    ///
    /// Accepted from Running and from Cancelled (a cancelled job that
    /// still ran to completion).
    pub fn finish(&self, result: i32) {
        let mut st = self.lock();
        st.result = Some(result);
        if st.state.can_transition_to(JobState::Finished) {
            self.apply(&mut st, JobState::Finished);
        }
        self.settle(&mut st);
    }

    /// A claimed job was skipped because it was cancelled before it ran
    pub fn settle_skipped(&self) {
        let mut st = self.lock();
        self.settle(&mut st);
    }

    /// Move to Discarded, releasing waiters
    ///
    /// Returns `false` if the job was past the point of discarding.
    pub fn discard(&self) -> bool {
        let mut st = self.lock();
        if !st.state.can_transition_to(JobState::Discarded) {
            return false;
        }
        self.apply(&mut st, JobState::Discarded);
        self.settle(&mut st);
        true
    }

    fn apply(&self, st: &mut Status, to: JobState) {
        st.state = to;
        if let Some(cb) = &st.callback {
            let id = self.inner.id;
            if panic::catch_unwind(AssertUnwindSafe(|| cb(id, to))).is_err() {
                crate::kerror!("state callback of job {} panicked on {}", id, to);
            }
        }
    }

    fn settle(&self, st: &mut Status) {
        st.settled = true;
        self.inner.settled_cond.notify_all();
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.lock();
        f.debug_struct("JobHandle")
            .field("id", &self.inner.id)
            .field("description", &self.inner.description)
            .field("state", &st.state)
            .field("result", &st.result)
            .finish()
    }
}
