//! Thread-local worker identity
//!
//! Set once when a worker thread starts. Lets job bodies and log lines
//! find out which worker they are running on without threading it through.

use jobctl_core::id::WorkerId;
use jobctl_core::kprint;
use std::cell::Cell;

thread_local! {
    static CURRENT_WORKER: Cell<Option<WorkerId>> = const { Cell::new(None) };
}

/// Bind the calling thread to `id` and tag its log lines
pub fn enter_worker(id: WorkerId) {
    CURRENT_WORKER.with(|cell| cell.set(Some(id)));
    kprint::set_worker_tag(id.to_string());
}

/// Unbind the calling thread (worker exiting)
pub fn leave_worker() {
    CURRENT_WORKER.with(|cell| cell.set(None));
    kprint::clear_worker_tag();
}

/// Worker the calling thread belongs to, `None` off the pool
#[inline]
pub fn current_worker() -> Option<WorkerId> {
    CURRENT_WORKER.with(|cell| cell.get())
}
