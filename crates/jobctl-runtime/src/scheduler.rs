//! Job control scheduler
//!
//! Owns the general slot table, the reserved slots, the wake signal and the
//! worker threads. One `Scheduler` is built at startup and shared by
//! reference (or `Arc`) with every producer; there is no global instance.
//!
//! Locking is two-level. The table mutex covers the general table and the
//! reserved slots and is held only for stack operations, never while a job
//! body runs. Each job additionally has its own state lock inside its
//! `JobHandle`; `wait()` and `cancel()` only ever take that one. Lock order
//! is table, then job state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jobctl_core::error::{ControlError, ControlResult};
use jobctl_core::handle::JobHandle;
use jobctl_core::id::{ReservedId, SlotIndex, WorkerId};
use jobctl_core::job::{Execute, Job};
use jobctl_core::kprint::{self, LogLevel};
use jobctl_core::state::JobState;
use jobctl_core::{kdebug, kinfo};

use crate::config::ControlConfig;
use crate::executor::run_job;
use crate::parking::{RunState, WorkSignal};
use crate::reserved::ReservedSlots;
use crate::table::JobSlotTable;
use crate::tls;
use crate::worker::{WorkerPool, WorkerState, WorkerStats};

/// Occupancy of the job tables at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// General slot count
    pub capacity: usize,
    pub idle: usize,
    pub queued: usize,
    /// General slots claimed by a worker
    pub running: usize,
    /// Reserved slots holding a job not yet claimed
    pub reserved_pending: usize,
    /// Workers asleep waiting for work
    pub parked_workers: usize,
}

struct Tables<E> {
    general: JobSlotTable<E>,
    reserved: ReservedSlots<E>,
}

struct Shared<E> {
    config: ControlConfig,
    tables: Mutex<Tables<E>>,
    signal: WorkSignal,
    /// General workers first, then reserved workers
    workers: Vec<WorkerState>,
}

impl<E> Shared<E> {
    fn lock_tables(&self) -> MutexGuard<'_, Tables<E>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn debug(&self) -> bool {
        self.config.debug_logging
    }
}

/// Background job scheduler
///
/// General jobs go through a fixed-capacity slot table and are dispatched
/// LIFO to a pool of general workers. Reserved jobs bypass the table: each
/// reserved id has one pending slot and a dedicated worker.
pub struct Scheduler<E: Execute + PartialEq> {
    shared: Arc<Shared<E>>,
    pool: Mutex<WorkerPool>,
}

impl<E: Execute + PartialEq> Scheduler<E> {
    /// Build the tables; no threads are started
    ///
    /// Jobs may be submitted before `start()` and will run once it is
    /// called.
    pub fn new(config: ControlConfig) -> ControlResult<Self> {
        config.validate()?;

        if config.debug_logging && !kprint::level_enabled(LogLevel::Debug) {
            kprint::set_log_level(LogLevel::Debug);
        }

        let workers = (0..config.num_workers)
            .map(WorkerId::General)
            .chain((0..config.num_reserved).map(|r| WorkerId::Reserved(ReservedId(r))))
            .map(WorkerState::new)
            .collect();

        let shared = Shared {
            tables: Mutex::new(Tables {
                general: JobSlotTable::new(config.max_jobs),
                reserved: ReservedSlots::new(config.num_reserved),
            }),
            signal: WorkSignal::new(),
            workers,
            config,
        };

        Ok(Self {
            shared: Arc::new(shared),
            pool: Mutex::new(WorkerPool::new()),
        })
    }

    /// Environment config with explicit worker counts, then new + start
    pub fn init(num_workers: usize, num_reserved: usize) -> ControlResult<Self> {
        let config = ControlConfig::from_env()
            .num_workers(num_workers)
            .num_reserved(num_reserved);
        let sched = Self::new(config)?;
        sched.start()?;
        Ok(sched)
    }

    /// Spawn the general and reserved workers
    pub fn start(&self) -> ControlResult<()> {
        let shared = &self.shared;
        if !shared.signal.start() {
            return match shared.signal.run_state() {
                RunState::Stopped => Err(ControlError::ShutDown),
                _ => Err(ControlError::AlreadyStarted),
            };
        }

        let mut pool = self.lock_pool();
        let num_workers = shared.config.num_workers;

        let spawned = (0..shared.workers.len()).try_for_each(|index| {
            let worker = Arc::clone(shared);
            let id = shared.workers[index].id();
            match id {
                WorkerId::General(_) => pool.spawn(id, move || general_loop(&worker, index)),
                WorkerId::Reserved(rid) => {
                    debug_assert_eq!(index, num_workers + rid.as_usize());
                    pool.spawn(id, move || reserved_loop(&worker, index, rid))
                }
            }
        });

        if let Err(e) = spawned {
            shared.signal.stop();
            pool.join();
            return Err(e);
        }

        kinfo!(
            "job control started: {} workers, {} reserved, {} slots",
            num_workers,
            shared.config.num_reserved,
            shared.config.max_jobs
        );
        Ok(())
    }

    fn lock_pool(&self) -> MutexGuard<'_, WorkerPool> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a job on the general table
    ///
    /// Returns the slot it was placed in. Fails with `AlreadyQueued` if an
    /// equivalent job is still waiting (the new job stays Initialized), or
    /// with `QueueFull` if every slot is taken (the new job is Discarded).
    pub fn submit(&self, job: Job<E>) -> ControlResult<SlotIndex> {
        let shared = &self.shared;
        let handle = job.handle();

        let result = {
            let mut tables = shared.lock_tables();
            // Checked under the table lock so shutdown's drain cannot miss it.
            if shared.signal.run_state() == RunState::Stopped {
                return Err(ControlError::ShutDown);
            }
            tables.general.insert(job)
        };

        match &result {
            Ok(slot) => {
                if shared.debug() {
                    kdebug!("[add_job] {} `{}` in slot {}", handle.id(), handle.description(), slot);
                }
                shared.signal.notify_all();
            }
            Err(ControlError::AlreadyQueued { slot }) => {
                if shared.debug() {
                    kdebug!("[add_job] `{}` already queued in slot {}", handle.description(), slot);
                }
            }
            Err(ControlError::QueueFull) => {
                if shared.debug() {
                    kdebug!("[add_job] too many jobs in queue, discarding `{}`", handle.description());
                }
            }
            Err(_) => {}
        }
        result
    }

    /// Move a queued job equivalent to `body` to the front of the queue
    ///
    /// Returns the slot it occupies, or `None` if no such job is waiting.
    /// Workers are woken either way.
    pub fn revive(&self, body: &E) -> Option<SlotIndex> {
        let shared = &self.shared;
        let found = shared.lock_tables().general.revive(body);
        if let Some(slot) = found {
            if shared.debug() {
                kdebug!("[revive_job] slot {} moved to top", slot);
            }
        }
        shared.signal.notify_all();
        found
    }

    /// Hand a job to the dedicated worker for `id`
    ///
    /// Replaces any job still pending for that id; the replaced job is
    /// Discarded and never runs.
    pub fn submit_reserved(&self, id: ReservedId, job: Job<E>) -> ControlResult<()> {
        let shared = &self.shared;
        let handle = job.handle();

        let displaced = {
            let mut tables = shared.lock_tables();
            if shared.signal.run_state() == RunState::Stopped {
                return Err(ControlError::ShutDown);
            }
            tables.reserved.install(id, job)?
        };

        if shared.debug() {
            kdebug!("[add_job_res] {} `{}` on reserved {}", handle.id(), handle.description(), id);
            if let Some(old) = displaced {
                kdebug!("[add_job_res] discarded pending {} `{}`", old.id(), old.description());
            }
        }
        shared.signal.notify_all();
        Ok(())
    }

    /// Request cooperative cancellation; see [`JobHandle::cancel`]
    pub fn cancel(&self, handle: &JobHandle) -> bool {
        handle.cancel()
    }

    #[inline]
    pub fn state(&self, handle: &JobHandle) -> JobState {
        handle.state()
    }

    /// Block until the job is settled; see [`JobHandle::wait`]
    ///
    /// Must not be called from a job body for a job that needs a worker
    /// of the same pool to make progress.
    pub fn wait(&self, handle: &JobHandle) -> Option<i32> {
        handle.wait()
    }

    /// Workers are (or may be) running jobs
    #[inline]
    pub fn is_running(&self) -> bool {
        self.shared.signal.is_running()
    }

    /// Stop all workers and discard everything still queued
    ///
    /// Jobs already running are allowed to finish; this returns once every
    /// worker thread has exited. Idempotent. Called from a worker (a job
    /// body dropping the last reference), that worker is not waited for.
    pub fn shutdown(&self) {
        let shared = &self.shared;
        if shared.signal.stop() {
            kinfo!("job control shutting down");
        }

        self.lock_pool().join();

        let leftover: Vec<Job<E>> = {
            let mut tables = shared.lock_tables();
            let mut jobs = tables.general.drain_queued();
            jobs.extend(tables.reserved.drain());
            jobs
        };

        for job in leftover {
            let handle = job.handle();
            // Cancelled-while-queued jobs cannot be discarded; just settle.
            if !handle.discard() {
                handle.settle_skipped();
            }
            if shared.debug() {
                kdebug!("[shutdown] dropped {} `{}` ({})", handle.id(), handle.description(), handle.state());
            }
            drop(job);
        }
    }

    /// Table occupancy snapshot
    pub fn stats(&self) -> QueueStats {
        let tables = self.shared.lock_tables();
        QueueStats {
            capacity: tables.general.capacity(),
            idle: tables.general.idle_count(),
            queued: tables.general.queued_count(),
            running: tables.general.running_count(),
            reserved_pending: tables.reserved.pending_count(),
            parked_workers: self.shared.signal.parked_count(),
        }
    }

    /// Queued general slots, bottom to top (last = next to run)
    pub fn queued_slots(&self) -> Vec<SlotIndex> {
        self.shared.lock_tables().general.queued_slots()
    }

    /// Per-worker counters, general workers first
    pub fn worker_stats(&self) -> Vec<WorkerStats> {
        self.shared.workers.iter().map(WorkerState::snapshot).collect()
    }

    #[inline]
    pub fn config(&self) -> &ControlConfig {
        &self.shared.config
    }
}

impl<E: Execute + PartialEq> Drop for Scheduler<E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Pop-run-release loop of a general worker
fn general_loop<E: Execute + PartialEq>(shared: &Shared<E>, index: usize) {
    let state = &shared.workers[index];
    let id = state.id();
    tls::enter_worker(id);
    state.attach_current_thread();

    if shared.debug() {
        kdebug!("started");
    }

    loop {
        // Epoch first: a stop or submit after this point makes park() return.
        let seen = shared.signal.epoch();
        if !shared.signal.is_running() {
            break;
        }

        let claimed = shared.lock_tables().general.pop_queued();
        match claimed {
            Some((slot, job)) => {
                state.set_current_slot(Some(slot));
                run_job(job, id, state, shared.debug());
                state.set_current_slot(None);
                shared.lock_tables().general.release(slot);
            }
            None => {
                state.set_parked(true);
                shared.signal.park(seen, shared.config.park_timeout);
                state.set_parked(false);
            }
        }
    }

    if shared.debug() {
        kdebug!("exiting");
    }
    tls::leave_worker();
}

/// Loop of a worker dedicated to one reserved slot
fn reserved_loop<E: Execute + PartialEq>(shared: &Shared<E>, index: usize, rid: ReservedId) {
    let state = &shared.workers[index];
    let id = state.id();
    tls::enter_worker(id);
    state.attach_current_thread();

    loop {
        let seen = shared.signal.epoch();
        if !shared.signal.is_running() {
            break;
        }

        let claimed = shared.lock_tables().reserved.take(rid);
        match claimed {
            Some(job) => {
                run_job(job, id, state, shared.debug());
            }
            None => {
                state.set_parked(true);
                shared.signal.park(seen, shared.config.park_timeout);
                state.set_parked(false);
            }
        }
    }

    tls::leave_worker();
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobctl_core::constants::JOB_PANICKED;
    use jobctl_core::job::JobContext;
    use std::fmt;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Condvar;
    use std::thread;
    use std::time::{Duration, Instant};

    /// One-shot latch a test opens to let blocked jobs proceed
    struct Gate {
        open: Mutex<bool>,
        cond: Condvar,
    }

    impl Gate {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                open: Mutex::new(false),
                cond: Condvar::new(),
            })
        }

        fn open(&self) {
            *self.open.lock().unwrap() = true;
            self.cond.notify_all();
        }

        fn wait(&self) {
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.cond.wait(open).unwrap();
            }
        }
    }

    #[derive(Clone)]
    enum Task {
        Value(i32),
        Sleep { ms: u64, result: i32 },
        Count { counter: Arc<AtomicUsize>, result: i32 },
        Record { tag: u32, log: Arc<Mutex<Vec<u32>>> },
        Block { tag: u32, gate: Arc<Gate>, started: Arc<AtomicBool> },
        Spin { tag: u32 },
        Panic,
    }

    impl PartialEq for Task {
        fn eq(&self, other: &Self) -> bool {
            match (self, other) {
                (Task::Value(a), Task::Value(b)) => a == b,
                (Task::Sleep { ms: a, result: x }, Task::Sleep { ms: b, result: y }) => a == b && x == y,
                (Task::Count { result: a, .. }, Task::Count { result: b, .. }) => a == b,
                (Task::Record { tag: a, .. }, Task::Record { tag: b, .. }) => a == b,
                (Task::Block { tag: a, .. }, Task::Block { tag: b, .. }) => a == b,
                (Task::Spin { tag: a }, Task::Spin { tag: b }) => a == b,
                (Task::Panic, Task::Panic) => true,
                _ => false,
            }
        }
    }

    impl fmt::Debug for Task {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Task::Value(v) => write!(f, "value {}", v),
                Task::Sleep { ms, .. } => write!(f, "sleep {}ms", ms),
                Task::Count { .. } => write!(f, "count"),
                Task::Record { tag, .. } => write!(f, "record {}", tag),
                Task::Block { tag, .. } => write!(f, "block {}", tag),
                Task::Spin { tag } => write!(f, "spin {}", tag),
                Task::Panic => write!(f, "panic"),
            }
        }
    }

    impl Execute for Task {
        fn execute(&mut self, ctx: &JobContext<'_>) -> i32 {
            match self {
                Task::Value(v) => *v,
                Task::Sleep { ms, result } => {
                    thread::sleep(Duration::from_millis(*ms));
                    *result
                }
                Task::Count { counter, result } => {
                    counter.fetch_add(1, Ordering::SeqCst);
                    *result
                }
                Task::Record { tag, log } => {
                    log.lock().unwrap().push(*tag);
                    *tag as i32
                }
                Task::Block { tag, gate, started } => {
                    started.store(true, Ordering::SeqCst);
                    gate.wait();
                    *tag as i32
                }
                Task::Spin { .. } => {
                    while !ctx.is_cancelled() {
                        thread::sleep(Duration::from_millis(1));
                    }
                    -1
                }
                Task::Panic => panic!("job body failure"),
            }
        }

        fn describe(&self) -> String {
            format!("{:?}", self)
        }
    }

    fn config(workers: usize, reserved: usize, slots: usize) -> ControlConfig {
        ControlConfig::new()
            .num_workers(workers)
            .num_reserved(reserved)
            .max_jobs(slots)
            .park_timeout(Duration::from_millis(20))
    }

    fn spin_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_three_job_scenario() {
        let sched = Scheduler::new(config(2, 0, 8)).unwrap();
        sched.start().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let j1 = Job::new(Task::Sleep { ms: 50, result: 1 });
        let j2 = Job::new(Task::Sleep { ms: 10, result: 2 });
        let j3 = Job::new(Task::Count { counter: Arc::clone(&counter), result: 3 });
        let (h1, h2, h3) = (j1.handle(), j2.handle(), j3.handle());

        sched.submit(j1).unwrap();
        sched.submit(j2).unwrap();
        sched.submit(j3).unwrap();

        // Two workers never report the same slot at once
        let deadline = Instant::now() + Duration::from_secs(5);
        while !(h1.is_settled() && h2.is_settled() && h3.is_settled()) {
            let slots: Vec<_> = sched
                .worker_stats()
                .into_iter()
                .filter_map(|w| w.current_slot)
                .collect();
            if slots.len() == 2 {
                assert_ne!(slots[0], slots[1]);
            }
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(sched.wait(&h1), Some(1));
        assert_eq!(sched.wait(&h2), Some(2));
        assert_eq!(sched.wait(&h3), Some(3));
        for h in [&h1, &h2, &h3] {
            assert_eq!(sched.state(h), JobState::Finished);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        sched.shutdown();
        let stats = sched.stats();
        assert_eq!(stats.idle, 8);
        assert_eq!(stats.queued + stats.running, 0);
    }

    #[test]
    fn test_lifo_dispatch() {
        let sched = Scheduler::new(config(1, 0, 8)).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (1..=3)
            .map(|tag| {
                let job = Job::new(Task::Record { tag, log: Arc::clone(&log) });
                let h = job.handle();
                sched.submit(job).unwrap();
                h
            })
            .collect();

        sched.start().unwrap();
        for h in &handles {
            h.wait();
        }
        assert_eq!(*log.lock().unwrap(), vec![3, 2, 1]);
    }

    #[test]
    fn test_revive_runs_next() {
        let sched = Scheduler::new(config(1, 0, 8)).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (1..=3)
            .map(|tag| {
                let job = Job::new(Task::Record { tag, log: Arc::clone(&log) });
                let h = job.handle();
                sched.submit(job).unwrap();
                h
            })
            .collect();

        let target = Task::Record { tag: 1, log: Arc::clone(&log) };
        let slot = sched.revive(&target).unwrap();
        assert_eq!(sched.queued_slots().last(), Some(&slot));
        assert_eq!(sched.revive(&Task::Value(9)), None);

        sched.start().unwrap();
        for h in &handles {
            h.wait();
        }
        assert_eq!(*log.lock().unwrap(), vec![1, 3, 2]);
    }

    #[test]
    fn test_capacity_and_duplicates() {
        let sched = Scheduler::new(config(1, 0, 2)).unwrap();

        sched.submit(Job::new(Task::Value(1))).unwrap();
        let dup = Job::new(Task::Value(1));
        let dup_h = dup.handle();
        assert!(sched.submit(dup).unwrap_err().is_duplicate());
        assert_eq!(dup_h.state(), JobState::Initialized);
        assert_eq!(sched.stats().queued, 1);

        sched.submit(Job::new(Task::Value(2))).unwrap();
        let extra = Job::new(Task::Value(3));
        let extra_h = extra.handle();
        assert_eq!(sched.submit(extra), Err(ControlError::QueueFull));
        assert_eq!(extra_h.state(), JobState::Discarded);
        assert_eq!(extra_h.wait(), None);

        let stats = sched.stats();
        assert_eq!(stats.queued, 2);
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.idle + stats.queued + stats.running, stats.capacity);
    }

    #[test]
    fn test_slot_reused_after_run() {
        let sched = Scheduler::new(config(1, 0, 1)).unwrap();
        sched.start().unwrap();

        for v in 0..5 {
            let job = Job::new(Task::Value(v));
            let h = job.handle();
            sched.submit(job).unwrap();
            assert_eq!(h.wait(), Some(v));
            spin_until(|| sched.stats().idle == 1);
        }
        assert_eq!(sched.worker_stats()[0].jobs_run, 5);
    }

    #[test]
    fn test_state_sequence() {
        let sched = Scheduler::new(config(1, 0, 4)).unwrap();
        sched.start().unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let rec = Arc::clone(&seen);
        let job = Job::new(Task::Value(5)).on_state_change(move |_, s| rec.lock().unwrap().push(s));
        let h = job.handle();

        sched.submit(job).unwrap();
        assert_eq!(h.wait(), Some(5));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![JobState::Queued, JobState::Running, JobState::Finished]
        );
    }

    #[test]
    fn test_discard_follows_initialized() {
        let sched = Scheduler::new(config(1, 0, 1)).unwrap();
        sched.submit(Job::new(Task::Value(1))).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let rec = Arc::clone(&seen);
        let job = Job::new(Task::Value(2)).on_state_change(move |_, s| rec.lock().unwrap().push(s));
        assert_eq!(sched.submit(job), Err(ControlError::QueueFull));
        assert_eq!(*seen.lock().unwrap(), vec![JobState::Discarded]);
    }

    #[test]
    fn test_wait_blocks_until_finished() {
        let sched = Scheduler::new(config(1, 0, 4)).unwrap();
        sched.start().unwrap();
        let gate = Gate::new();
        let started = Arc::new(AtomicBool::new(false));

        let job = Job::new(Task::Block { tag: 11, gate: Arc::clone(&gate), started: Arc::clone(&started) });
        let h = job.handle();
        sched.submit(job).unwrap();
        spin_until(|| started.load(Ordering::SeqCst));
        assert_eq!(h.state(), JobState::Running);

        let waiter = {
            let h = h.clone();
            thread::spawn(move || {
                let r = h.wait();
                (r, h.state())
            })
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());

        gate.open();
        assert_eq!(waiter.join().unwrap(), (Some(11), JobState::Finished));
    }

    #[test]
    fn test_wait_on_unsubmitted_returns() {
        let sched: Scheduler<Task> = Scheduler::new(config(1, 0, 4)).unwrap();
        let job = Job::new(Task::Value(1));
        assert_eq!(sched.wait(&job.handle()), None);
    }

    #[test]
    fn test_cancel_queued_is_skipped() {
        let sched = Scheduler::new(config(1, 0, 4)).unwrap();
        let job = Job::new(Task::Panic);
        let h = job.handle();
        sched.submit(job).unwrap();
        assert!(sched.cancel(&h));

        // An equivalent job may be queued again once the first is cancelled
        let again = Job::new(Task::Value(2));
        let again_h = again.handle();
        sched.submit(again).unwrap();

        sched.start().unwrap();
        assert_eq!(h.wait(), None);
        assert_eq!(h.state(), JobState::Cancelled);
        assert_eq!(again_h.wait(), Some(2));

        let w = sched.worker_stats()[0].clone();
        assert_eq!(w.jobs_skipped, 1);
        assert_eq!(w.jobs_run, 1);
        assert_eq!(w.jobs_panicked, 0);
    }

    #[test]
    fn test_cancel_running_is_cooperative() {
        let sched = Scheduler::new(config(1, 0, 4)).unwrap();
        sched.start().unwrap();

        let job = Job::new(Task::Spin { tag: 1 });
        let h = job.handle();
        sched.submit(job).unwrap();
        spin_until(|| h.state() == JobState::Running);

        assert!(sched.cancel(&h));
        assert_eq!(h.wait(), Some(-1));
        assert_eq!(h.state(), JobState::Finished);
        assert!(!sched.cancel(&h));
    }

    #[test]
    fn test_panic_is_contained() {
        let sched = Scheduler::new(config(1, 0, 4)).unwrap();
        sched.start().unwrap();

        let bad = Job::new(Task::Panic);
        let bad_h = bad.handle();
        sched.submit(bad).unwrap();
        assert_eq!(bad_h.wait(), Some(JOB_PANICKED));
        assert_eq!(bad_h.state(), JobState::Finished);

        // Worker survives and keeps serving
        let good = Job::new(Task::Value(4));
        let good_h = good.handle();
        sched.submit(good).unwrap();
        assert_eq!(good_h.wait(), Some(4));

        let w = sched.worker_stats()[0].clone();
        assert_eq!(w.jobs_panicked, 1);
        assert_eq!(w.jobs_run, 2);
    }

    #[test]
    fn test_reserved_last_writer_wins() {
        let sched = Scheduler::new(config(1, 2, 4)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let a = Job::new(Task::Count { counter: Arc::clone(&counter), result: 1 });
        let b = Job::new(Task::Count { counter: Arc::clone(&counter), result: 2 });
        let (ha, hb) = (a.handle(), b.handle());

        sched.submit_reserved(ReservedId(1), a).unwrap();
        sched.submit_reserved(ReservedId(1), b).unwrap();
        assert_eq!(ha.state(), JobState::Discarded);
        assert_eq!(sched.stats().reserved_pending, 1);

        sched.start().unwrap();
        assert_eq!(hb.wait(), Some(2));
        assert_eq!(ha.wait(), None);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let reserved = sched
            .worker_stats()
            .into_iter()
            .find(|w| w.id == WorkerId::Reserved(ReservedId(1)))
            .unwrap();
        assert_eq!(reserved.jobs_run, 1);
    }

    #[test]
    fn test_reserved_runs_beside_busy_pool() {
        let sched = Scheduler::new(config(1, 1, 4)).unwrap();
        sched.start().unwrap();

        let gate = Gate::new();
        let started = Arc::new(AtomicBool::new(false));
        sched
            .submit(Job::new(Task::Block { tag: 1, gate: Arc::clone(&gate), started: Arc::clone(&started) }))
            .unwrap();
        spin_until(|| started.load(Ordering::SeqCst));

        let job = Job::new(Task::Value(9));
        let h = job.handle();
        sched.submit_reserved(ReservedId(0), job).unwrap();
        assert_eq!(h.wait(), Some(9));
        gate.open();
    }

    #[test]
    fn test_reserved_out_of_range() {
        let sched = Scheduler::new(config(1, 2, 4)).unwrap();
        let err = sched.submit_reserved(ReservedId(2), Job::new(Task::Value(1))).unwrap_err();
        assert_eq!(err, ControlError::ReservedOutOfRange { id: 2, max: 2 });
    }

    #[test]
    fn test_shutdown_lets_running_finish() {
        let sched = Scheduler::new(config(1, 0, 4)).unwrap();
        sched.start().unwrap();

        let job = Job::new(Task::Sleep { ms: 50, result: 7 });
        let h = job.handle();
        sched.submit(job).unwrap();
        spin_until(|| h.state() == JobState::Running);

        let queued = Job::new(Task::Value(1));
        let queued_h = queued.handle();
        sched.submit(queued).unwrap();

        sched.shutdown();
        assert!(!sched.is_running());
        assert_eq!(h.state(), JobState::Finished);
        assert_eq!(h.result(), Some(7));

        // Either it ran before the stop was seen, or it was drained
        let s = queued_h.state();
        assert!(s == JobState::Finished || s == JobState::Discarded, "{}", s);
        assert!(queued_h.is_settled());

        let stats = sched.stats();
        assert_eq!(stats.queued, 0);
        assert_eq!(stats.running, 0);
        assert!(sched.worker_stats().iter().all(|w| w.current_slot.is_none()));
    }

    #[test]
    fn test_shutdown_discards_pending() {
        let sched = Scheduler::new(config(1, 1, 4)).unwrap();
        let job = Job::new(Task::Value(1));
        let res = Job::new(Task::Value(2));
        let (h, hr) = (job.handle(), res.handle());
        sched.submit(job).unwrap();
        sched.submit_reserved(ReservedId(0), res).unwrap();

        sched.shutdown();
        assert_eq!(h.state(), JobState::Discarded);
        assert_eq!(hr.state(), JobState::Discarded);
        assert_eq!(h.wait(), None);
        assert_eq!(sched.stats().reserved_pending, 0);
    }

    #[test]
    fn test_submit_after_shutdown() {
        let sched = Scheduler::new(config(1, 1, 4)).unwrap();
        sched.start().unwrap();
        sched.shutdown();
        sched.shutdown();

        let job = Job::new(Task::Value(1));
        let h = job.handle();
        assert_eq!(sched.submit(job), Err(ControlError::ShutDown));
        assert_eq!(h.state(), JobState::Initialized);
        assert_eq!(
            sched.submit_reserved(ReservedId(0), Job::new(Task::Value(2))),
            Err(ControlError::ShutDown)
        );
        assert_eq!(sched.start(), Err(ControlError::ShutDown));
    }

    #[test]
    fn test_double_start() {
        let sched: Scheduler<Task> = Scheduler::new(config(2, 0, 4)).unwrap();
        assert!(!sched.is_running());
        sched.start().unwrap();
        assert!(sched.is_running());
        assert_eq!(sched.start(), Err(ControlError::AlreadyStarted));
    }

    #[test]
    fn test_worker_threads_recorded() {
        let sched: Scheduler<Task> = Scheduler::new(config(2, 1, 4)).unwrap();
        sched.start().unwrap();
        spin_until(|| sched.worker_stats().iter().all(|w| w.thread_id != 0 || cfg!(not(unix))));

        let stats = sched.worker_stats();
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].id, WorkerId::General(0));
        assert_eq!(stats[2].id, WorkerId::Reserved(ReservedId(0)));
    }

    #[test]
    fn test_invalid_config() {
        let bad = ControlConfig::new().max_jobs(0);
        assert!(matches!(
            Scheduler::<Task>::new(bad),
            Err(ControlError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_concurrent_producers() {
        let sched = Arc::new(Scheduler::new(config(4, 0, 64)).unwrap());
        sched.start().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let sched = Arc::clone(&sched);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    let mut handles = Vec::new();
                    for i in 0..10 {
                        let job = Job::new(Task::Count {
                            counter: Arc::clone(&counter),
                            result: p * 100 + i,
                        });
                        handles.push(job.handle());
                        sched.submit(job).unwrap();
                    }
                    handles.into_iter().map(|h| h.wait()).collect::<Vec<_>>()
                })
            })
            .collect();

        for (p, t) in producers.into_iter().enumerate() {
            let results = t.join().unwrap();
            let expected: Vec<_> = (0..10).map(|i| Some(p as i32 * 100 + i)).collect();
            assert_eq!(results, expected);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 40);
    }

    #[test]
    fn test_revive_miss_still_wakes() {
        let sched: Scheduler<Task> = Scheduler::new(config(1, 0, 4)).unwrap();
        sched.submit(Job::new(Task::Value(1))).unwrap();

        let before = sched.shared.signal.epoch();
        assert_eq!(sched.revive(&Task::Value(99)), None);
        assert_ne!(sched.shared.signal.epoch(), before);

        let before = sched.shared.signal.epoch();
        assert!(sched.revive(&Task::Value(1)).is_some());
        assert_ne!(sched.shared.signal.epoch(), before);
    }

    #[test]
    fn test_panicking_callback_does_not_wedge_worker() {
        let sched = Scheduler::new(config(1, 0, 2)).unwrap();
        sched.start().unwrap();

        let bad = Job::new(Task::Value(3)).on_state_change(|_, s| {
            if s == JobState::Finished {
                panic!("finished callback failed");
            }
        });
        let bad_h = bad.handle();
        sched.submit(bad).unwrap();
        assert_eq!(bad_h.wait(), Some(3));
        assert_eq!(bad_h.state(), JobState::Finished);

        let good = Job::new(Task::Value(4));
        let good_h = good.handle();
        sched.submit(good).unwrap();
        assert_eq!(good_h.wait(), Some(4));

        spin_until(|| sched.stats().idle == 2);
        let w = sched.worker_stats()[0].clone();
        assert_eq!(w.jobs_run, 2);
        assert_eq!(w.jobs_panicked, 0);
    }

    #[test]
    fn test_panicking_queued_callback_keeps_slot_accounting() {
        let sched = Scheduler::new(config(1, 0, 2)).unwrap();

        let job = Job::new(Task::Value(6)).on_state_change(|_, s| {
            if s == JobState::Queued {
                panic!("queued callback failed");
            }
        });
        let h = job.handle();
        let slot = sched.submit(job).unwrap();
        assert_eq!(h.state(), JobState::Queued);
        assert_eq!(sched.queued_slots(), vec![slot]);
        let stats = sched.stats();
        assert_eq!((stats.idle, stats.queued, stats.running), (1, 1, 0));

        sched.start().unwrap();
        assert_eq!(h.wait(), Some(6));
        spin_until(|| sched.stats().idle == 2);
    }

    /// Holds the scheduler it runs on
    struct Owner {
        sched: Option<Arc<Scheduler<Owner>>>,
        gate: Arc<Gate>,
    }

    impl PartialEq for Owner {
        fn eq(&self, _other: &Self) -> bool {
            false
        }
    }

    impl Execute for Owner {
        fn execute(&mut self, _ctx: &JobContext<'_>) -> i32 {
            self.gate.wait();
            if self.sched.is_some() { 0 } else { -1 }
        }
    }

    #[test]
    fn test_job_holding_last_scheduler_reference() {
        let sched = Arc::new(Scheduler::new(config(1, 0, 2)).unwrap());
        sched.start().unwrap();
        let gate = Gate::new();

        let job = Job::new(Owner { sched: Some(Arc::clone(&sched)), gate: Arc::clone(&gate) });
        let h = job.handle();
        sched.submit(job).unwrap();
        spin_until(|| h.state() == JobState::Running);

        let weak = Arc::downgrade(&sched);
        drop(sched);
        gate.open();

        assert_eq!(h.wait(), Some(0));
        assert_eq!(h.state(), JobState::Finished);
        spin_until(|| weak.upgrade().is_none());
    }

    #[test]
    fn test_stats_report_parked_workers() {
        let sched: Scheduler<Task> = Scheduler::new(config(2, 1, 4)).unwrap();
        assert_eq!(sched.stats().parked_workers, 0);
        sched.start().unwrap();
        spin_until(|| sched.stats().parked_workers == 3);

        sched.shutdown();
        spin_until(|| sched.stats().parked_workers == 0);
    }
}
