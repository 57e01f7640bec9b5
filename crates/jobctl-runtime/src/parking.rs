//! Idle-worker parking and the scheduler run flag
//!
//! Workers with nothing to do sleep on a condition variable guarded by a
//! wake epoch. A worker samples the epoch *before* looking for work and
//! parks only if it is still unchanged, so a job submitted between the
//! look and the sleep is never missed. The sleep is also bounded by the
//! park timeout, which caps how long shutdown can go unnoticed.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Scheduler lifecycle as seen by workers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    /// Created, workers not yet started
    Idle = 0,
    Running = 1,
    /// Shutdown requested; workers exit at their next check
    Stopped = 2,
}

impl RunState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => RunState::Idle,
            1 => RunState::Running,
            _ => RunState::Stopped,
        }
    }
}

/// Wake signal shared by the scheduler and all of its workers
pub struct WorkSignal {
    epoch: Mutex<u64>,
    condvar: Condvar,
    run_state: AtomicU8,
    parked: AtomicUsize,
}

impl WorkSignal {
    pub fn new() -> Self {
        Self {
            epoch: Mutex::new(0),
            condvar: Condvar::new(),
            run_state: AtomicU8::new(RunState::Idle as u8),
            parked: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, u64> {
        self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub fn run_state(&self) -> RunState {
        RunState::from_u8(self.run_state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.run_state() == RunState::Running
    }

    /// Idle -> Running. Returns `false` if the scheduler was already
    /// started or has been stopped.
    pub fn start(&self) -> bool {
        self.run_state
            .compare_exchange(
                RunState::Idle as u8,
                RunState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to Stopped and wake every parked worker
    ///
    /// Returns `false` if already stopped.
    pub fn stop(&self) -> bool {
        let prev = self.run_state.swap(RunState::Stopped as u8, Ordering::AcqRel);
        self.notify_all();
        RunState::from_u8(prev) != RunState::Stopped
    }

    /// Current wake epoch; sample before checking for work
    #[inline]
    pub fn epoch(&self) -> u64 {
        *self.lock()
    }

    /// Bump the epoch and wake all parked workers
    pub fn notify_all(&self) {
        let mut epoch = self.lock();
        *epoch = epoch.wrapping_add(1);
        self.condvar.notify_all();
    }

    /// Sleep until the epoch moves past `seen` or `timeout` elapses
    ///
    /// Returns `true` if woken by a notification.
    pub fn park(&self, seen: u64, timeout: Duration) -> bool {
        let guard = self.lock();
        if *guard != seen {
            return true;
        }

        self.parked.fetch_add(1, Ordering::SeqCst);
        let (guard, _) = self
            .condvar
            .wait_timeout_while(guard, timeout, |epoch| *epoch == seen)
            .unwrap_or_else(PoisonError::into_inner);
        self.parked.fetch_sub(1, Ordering::SeqCst);

        *guard != seen
    }

    /// Workers currently asleep (hint, may be stale)
    #[inline]
    pub fn parked_count(&self) -> usize {
        self.parked.load(Ordering::Relaxed)
    }
}

impl Default for WorkSignal {
    fn default() -> Self {
        Self::new()
    }
}
