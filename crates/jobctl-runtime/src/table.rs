//! General job slot table
//!
//! A fixed array of job slots plus two index stacks:
//!
//! - `idle`: free slot indices, popped from the top
//! - `queued`: slots holding Queued jobs; workers pop from the top
//!
//! Dispatch is LIFO: the most recently submitted (or revived) job is the
//! next one a worker picks up. Callers needing fairness must not rely on
//! submission order.
//!
//! Every slot index is in exactly one of {idle, queued, claimed by a
//! worker}, so `idle + queued + running == capacity` at all times. The
//! table is not synchronized itself; the scheduler keeps it behind its
//! table mutex and only ever holds that for these O(n) stack operations.

use jobctl_core::error::{ControlError, ControlResult};
use jobctl_core::id::SlotIndex;
use jobctl_core::job::{Execute, Job};
use jobctl_core::state::JobState;

/// Fixed-capacity slot table with idle/queued stacks
pub struct JobSlotTable<E> {
    slots: Vec<Option<Job<E>>>,
    idle: Vec<u32>,
    queued: Vec<u32>,
}

impl<E: Execute + PartialEq> JobSlotTable<E> {
    /// Create a table with `capacity` slots, all idle
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            idle: (0..capacity as u32).collect(),
            queued: Vec::with_capacity(capacity),
        }
    }

    /// Position in `queued` of a live job equivalent to `body`
    ///
    /// Jobs cancelled while waiting are ignored; they will be skipped.
    fn find_queued(&self, body: &E) -> Option<usize> {
        self.queued.iter().position(|&i| {
            self.slots[i as usize]
                .as_ref()
                .map_or(false, |job| job.is_equivalent(body) && job.state().is_runnable())
        })
    }

    /// Install a job into a free slot and mark it Queued
    ///
    /// Fails without side effects if an equivalent job is already queued.
    /// Fails with `QueueFull` if no slot is idle, after moving the job to
    /// Discarded.
    pub fn insert(&mut self, job: Job<E>) -> ControlResult<SlotIndex> {
        let state = job.state();
        if state != JobState::Initialized {
            return Err(ControlError::InvalidState(state));
        }

        if let Some(pos) = self.find_queued(job.body()) {
            return Err(ControlError::AlreadyQueued {
                slot: SlotIndex::new(self.queued[pos]),
            });
        }

        if self.idle.is_empty() {
            job.handle_ref().discard();
            return Err(ControlError::QueueFull);
        }

        // The slot is only taken once the job is Queued, so a failed
        // transition leaves the idle stack untouched.
        job.handle_ref().transition(JobState::Queued)?;
        let Some(index) = self.idle.pop() else {
            return Err(ControlError::QueueFull);
        };
        self.slots[index as usize] = Some(job);
        self.queued.push(index);
        Ok(SlotIndex::new(index))
    }

    /// Claim the top queued job
    ///
    /// The slot stays claimed (neither idle nor queued) until `release`.
    pub fn pop_queued(&mut self) -> Option<(SlotIndex, Job<E>)> {
        let index = self.queued.pop()?;
        let job = self.slots[index as usize].take()?;
        Some((SlotIndex::new(index), job))
    }

    /// Return a claimed slot to the idle stack
    pub fn release(&mut self, slot: SlotIndex) {
        debug_assert!(self.idle.len() < self.slots.len(), "idle stack overflow");
        debug_assert!(self.slots[slot.as_usize()].is_none(), "releasing occupied slot");
        self.idle.push(slot.as_u32());
    }

    /// Move an equivalent queued job to the top of the stack
    pub fn revive(&mut self, body: &E) -> Option<SlotIndex> {
        let pos = self.find_queued(body)?;
        let index = self.queued.remove(pos);
        self.queued.push(index);
        Some(SlotIndex::new(index))
    }

    /// Remove every queued job, returning their slots to idle
    pub fn drain_queued(&mut self) -> Vec<Job<E>> {
        let mut drained = Vec::with_capacity(self.queued.len());
        while let Some(index) = self.queued.pop() {
            if let Some(job) = self.slots[index as usize].take() {
                drained.push(job);
            }
            self.idle.push(index);
        }
        drained
    }
}

impl<E> JobSlotTable<E> {
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    #[inline]
    pub fn queued_count(&self) -> usize {
        self.queued.len()
    }

    /// Slots currently claimed by workers
    #[inline]
    pub fn running_count(&self) -> usize {
        self.capacity() - self.idle.len() - self.queued.len()
    }

    /// Queued slots, bottom to top (last = next to run)
    pub fn queued_slots(&self) -> Vec<SlotIndex> {
        self.queued.iter().map(|&i| SlotIndex::new(i)).collect()
    }
}
