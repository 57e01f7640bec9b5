//! Job bodies and the job record
//!
//! A job body is any type implementing [`Execute`]. Producers normally use
//! one enum per scheduler, with a variant per job kind carrying that kind's
//! typed parameters. The scheduler stores `Job<E>` values inline in its
//! slot table, so submitting a job needs no allocation beyond the shared
//! [`JobHandle`].
//!
//! Two jobs are *equivalent* when their bodies compare equal; equivalence
//! drives duplicate suppression and `revive`.

use crate::handle::JobHandle;
use crate::id::{JobId, WorkerId};
use crate::state::JobState;

/// A unit of background work
pub trait Execute: Send + 'static {
    /// Run the job on a worker thread
    ///
    /// The returned code is stored as the job's result; the scheduler never
    /// interprets it. Long-running bodies should poll
    /// [`JobContext::is_cancelled`] and return early when it is set.
    fn execute(&mut self, ctx: &JobContext<'_>) -> i32;

    /// Human-readable description used in control debug logs
    fn describe(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// What a running job can see about itself
pub struct JobContext<'a> {
    handle: &'a JobHandle,
    worker: WorkerId,
}

impl<'a> JobContext<'a> {
    pub fn new(handle: &'a JobHandle, worker: WorkerId) -> Self {
        Self { handle, worker }
    }

    /// Cancellation was requested for this job
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    #[inline]
    pub fn state(&self) -> JobState {
        self.handle.state()
    }

    #[inline]
    pub fn job_id(&self) -> JobId {
        self.handle.id()
    }

    /// Worker thread executing the job
    #[inline]
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    #[inline]
    pub fn handle(&self) -> &JobHandle {
        self.handle
    }
}

/// A job body plus its shared state accessor
///
/// Owned by the producer until submitted, then by the slot that holds it.
pub struct Job<E> {
    body: E,
    handle: JobHandle,
}

impl<E: Execute> Job<E> {
    /// Wrap a body, describing it with [`Execute::describe`]
    pub fn new(body: E) -> Self {
        let handle = JobHandle::new(body.describe());
        Self { body, handle }
    }

    /// Wrap a body with an explicit description
    pub fn with_description(body: E, description: impl Into<String>) -> Self {
        Self {
            body,
            handle: JobHandle::new(description),
        }
    }

    /// Install a state-change callback before submission
    pub fn on_state_change<F>(self, callback: F) -> Self
    where
        F: Fn(JobId, JobState) + Send + Sync + 'static,
    {
        self.handle.set_state_callback(callback);
        self
    }
}

impl<E> Job<E> {
    /// Accessor to keep after submission
    #[inline]
    pub fn handle(&self) -> JobHandle {
        self.handle.clone()
    }

    #[inline]
    pub fn handle_ref(&self) -> &JobHandle {
        &self.handle
    }

    #[inline]
    pub fn body(&self) -> &E {
        &self.body
    }

    #[inline]
    pub fn body_mut(&mut self) -> &mut E {
        &mut self.body
    }

    #[inline]
    pub fn state(&self) -> JobState {
        self.handle.state()
    }
}

impl<E: PartialEq> Job<E> {
    /// Same kind and parameters
    #[inline]
    pub fn is_equivalent(&self, body: &E) -> bool {
        self.body == *body
    }
}

impl<E: std::fmt::Debug> std::fmt::Debug for Job<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("body", &self.body)
            .field("handle", &self.handle)
            .finish()
    }
}
