//! Reserved job slots
//!
//! One pending job per reserved id, each served by its own dedicated
//! worker. There is no queue: a new submission overwrites whatever is
//! still waiting in the slot (last writer wins) and the overwritten job is
//! discarded. Suited to "latest request only" work such as an import
//! refresh, where a stale pending request is worthless.

use jobctl_core::error::{ControlError, ControlResult};
use jobctl_core::handle::JobHandle;
use jobctl_core::id::ReservedId;
use jobctl_core::job::Job;
use jobctl_core::state::JobState;

/// Pending jobs, indexed by reserved id
pub struct ReservedSlots<E> {
    pending: Vec<Option<Job<E>>>,
}

impl<E> ReservedSlots<E> {
    pub fn new(count: usize) -> Self {
        Self {
            pending: (0..count).map(|_| None).collect(),
        }
    }

    fn check(&self, id: ReservedId) -> ControlResult<usize> {
        if id.as_usize() >= self.pending.len() {
            return Err(ControlError::ReservedOutOfRange {
                id: id.as_usize(),
                max: self.pending.len(),
            });
        }
        Ok(id.as_usize())
    }

    /// Install `job` as the pending job for `id`
    ///
    /// The job moves to Queued. Returns the handle of the job it displaced,
    /// which has already been moved to Discarded.
    pub fn install(&mut self, id: ReservedId, job: Job<E>) -> ControlResult<Option<JobHandle>> {
        let index = self.check(id)?;
        let state = job.state();
        if state != JobState::Initialized {
            return Err(ControlError::InvalidState(state));
        }
        job.handle_ref().transition(JobState::Queued)?;

        let displaced = self.pending[index].replace(job).map(|old| {
            let handle = old.handle();
            // A displaced job that was cancelled while pending is settled
            // as skipped rather than discarded.
            if !handle.discard() {
                handle.settle_skipped();
            }
            handle
        });
        Ok(displaced)
    }

    /// Take the pending job for `id`, leaving the slot empty
    pub fn take(&mut self, id: ReservedId) -> Option<Job<E>> {
        self.pending.get_mut(id.as_usize()).and_then(Option::take)
    }

    /// Number of slots holding a pending job
    pub fn pending_count(&self) -> usize {
        self.pending.iter().filter(|slot| slot.is_some()).count()
    }

    /// Empty every slot
    pub fn drain(&mut self) -> Vec<Job<E>> {
        self.pending.iter_mut().filter_map(Option::take).collect()
    }
}
