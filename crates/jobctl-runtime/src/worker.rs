//! Worker thread management
//!
//! Workers are named OS threads. Each one has a `WorkerState` block of
//! atomics that it updates as it runs jobs and that `Scheduler::worker_stats`
//! snapshots without taking any lock.

use jobctl_core::error::{ControlError, ControlResult};
use jobctl_core::id::{SlotIndex, WorkerId};
use jobctl_core::{kdebug, kwarn};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

const NO_SLOT: u32 = u32::MAX;

/// Live counters for one worker
pub struct WorkerState {
    id: WorkerId,
    /// Slot of the job being run (NO_SLOT if none)
    current_slot: AtomicU32,
    /// OS thread id, 0 until the thread has started
    thread_id: AtomicU64,
    is_parked: AtomicBool,
    jobs_run: AtomicU64,
    jobs_skipped: AtomicU64,
    jobs_panicked: AtomicU64,
}

impl WorkerState {
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            current_slot: AtomicU32::new(NO_SLOT),
            thread_id: AtomicU64::new(0),
            is_parked: AtomicBool::new(false),
            jobs_run: AtomicU64::new(0),
            jobs_skipped: AtomicU64::new(0),
            jobs_panicked: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Called first thing on the worker thread
    pub fn attach_current_thread(&self) {
        self.thread_id.store(os_thread_id(), Ordering::Relaxed);
    }

    #[inline]
    pub fn set_parked(&self, parked: bool) {
        self.is_parked.store(parked, Ordering::Relaxed);
    }

    #[inline]
    pub fn set_current_slot(&self, slot: Option<SlotIndex>) {
        let raw = slot.map_or(NO_SLOT, SlotIndex::as_u32);
        self.current_slot.store(raw, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_run(&self) {
        self.jobs_run.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_skipped(&self) {
        self.jobs_skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_panicked(&self) {
        self.jobs_panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> WorkerStats {
        let slot = self.current_slot.load(Ordering::Relaxed);
        WorkerStats {
            id: self.id,
            thread_id: self.thread_id.load(Ordering::Relaxed),
            is_parked: self.is_parked.load(Ordering::Relaxed),
            current_slot: (slot != NO_SLOT).then(|| SlotIndex::new(slot)),
            jobs_run: self.jobs_run.load(Ordering::Relaxed),
            jobs_skipped: self.jobs_skipped.load(Ordering::Relaxed),
            jobs_panicked: self.jobs_panicked.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of one worker's counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    pub id: WorkerId,
    pub thread_id: u64,
    pub is_parked: bool,
    /// General slot being run; always `None` for reserved workers
    pub current_slot: Option<SlotIndex>,
    /// Jobs executed to completion (including panicked ones)
    pub jobs_run: u64,
    /// Jobs claimed but skipped because they were cancelled while queued
    pub jobs_skipped: u64,
    pub jobs_panicked: u64,
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        /// OS-level id of the calling thread
        pub fn os_thread_id() -> u64 {
            unsafe { libc::gettid() as u64 }
        }
    } else if #[cfg(unix)] {
        /// OS-level id of the calling thread
        pub fn os_thread_id() -> u64 {
            unsafe { libc::pthread_self() as u64 }
        }
    } else {
        pub fn os_thread_id() -> u64 {
            0
        }
    }
}

/// Thread name for a worker
pub fn thread_name(id: WorkerId) -> String {
    format!("jobctl-{}", id)
}

/// Join handles for every spawned worker
pub struct WorkerPool {
    handles: Vec<(WorkerId, JoinHandle<()>)>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    /// Spawn one named worker thread running `body`
    pub fn spawn<F>(&mut self, id: WorkerId, body: F) -> ControlResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(thread_name(id))
            .spawn(body)
            .map_err(|_| ControlError::WorkerSpawn)?;
        self.handles.push((id, handle));
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit
    ///
    /// A worker calling this (its job dropped the last scheduler reference)
    /// is skipped and left to exit on its own.
    pub fn join(&mut self) {
        let me = thread::current().id();
        for (id, handle) in self.handles.drain(..) {
            if handle.thread().id() == me {
                kdebug!("{} not joined from its own thread", id);
                continue;
            }
            if handle.join().is_err() {
                kwarn!("{} exited by panic", id);
            }
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}
