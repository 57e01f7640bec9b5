//! Running one claimed job on a worker thread

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use jobctl_core::constants::JOB_PANICKED;
use jobctl_core::id::WorkerId;
use jobctl_core::job::{Execute, Job, JobContext};
use jobctl_core::{kdebug, kerror};

use crate::worker::WorkerState;

/// What happened to a claimed job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Body returned this code
    Ran(i32),
    /// Body panicked; result recorded as `JOB_PANICKED`
    Panicked,
    /// Cancelled before it started; body never invoked
    Skipped,
}

/// Execute a job the worker has already taken out of its slot
///
/// The job's body runs with no scheduler lock held. On return the job is
/// settled: waiters are released and the body has been dropped. The body
/// is dropped after the result is published, so whatever it owns (even the
/// last reference to the scheduler) goes away after waiters are released.
pub fn run_job<E: Execute>(
    mut job: Job<E>,
    worker: WorkerId,
    state: &WorkerState,
    debug: bool,
) -> Outcome {
    let handle = job.handle();

    if !handle.begin_run() {
        if debug {
            kdebug!("[run_job] skip {} `{}` ({})", handle.id(), handle.description(), handle.state());
        }
        state.record_skipped();
        handle.settle_skipped();
        drop_body(job, state);
        return Outcome::Skipped;
    }

    let start = Instant::now();
    if debug {
        kdebug!("[run_job+] {} `{}`", handle.id(), handle.description());
    }

    let ctx = JobContext::new(&handle, worker);
    let caught = panic::catch_unwind(AssertUnwindSafe(|| job.body_mut().execute(&ctx)));

    // Counters are updated before waiters are released.
    state.record_run();
    let outcome = match caught {
        Ok(code) => {
            handle.finish(code);
            Outcome::Ran(code)
        }
        Err(payload) => {
            kerror!(
                "job {} `{}` panicked: {}",
                handle.id(),
                handle.description(),
                panic_message(payload.as_ref())
            );
            state.record_panicked();
            handle.finish(JOB_PANICKED);
            Outcome::Panicked
        }
    };
    drop_body(job, state);

    if debug {
        kdebug!(
            "[run_job-] {} `{}` {:.3}ms",
            handle.id(),
            handle.description(),
            start.elapsed().as_secs_f64() * 1000.0
        );
    }
    outcome
}

/// Drop a job whose result is already published
///
/// A panicking `Drop` is logged and counted; the job stays as settled.
fn drop_body<E>(job: Job<E>, state: &WorkerState) {
    let handle = job.handle();
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || drop(job))) {
        kerror!(
            "job {} `{}` panicked while dropped: {}",
            handle.id(),
            handle.description(),
            panic_message(payload.as_ref())
        );
        state.record_panicked();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic>"
    }
}
