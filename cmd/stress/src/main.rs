//! Stress test - flooding the job tables
//!
//! Several producer threads submit far more jobs than the table holds,
//! with deliberate duplicates, revives and cancellations, then check the
//! accounting adds up.

use jobctl::{ControlConfig, ControlError, Execute, Job, JobContext, JobHandle, JobState, Scheduler};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

struct Spin {
    key: u64,
    rounds: u32,
    executed: Arc<AtomicU64>,
}

impl PartialEq for Spin {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Execute for Spin {
    fn execute(&mut self, ctx: &JobContext<'_>) -> i32 {
        let mut acc = self.key;
        for i in 0..self.rounds {
            if i % 64 == 0 && ctx.is_cancelled() {
                return -1;
            }
            acc = acc.wrapping_mul(6364136223846793005).wrapping_add(1);
        }
        self.executed.fetch_add(1, Ordering::Relaxed);
        (acc & 0xff) as i32
    }
}

#[derive(Default)]
struct Tally {
    queued: u64,
    duplicate: u64,
    full: u64,
    revived: u64,
    cancelled: u64,
}

fn main() {
    println!("=== Job Control Stress Test ===\n");

    let per_producer: u64 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(10_000);
    let producers: u64 = 4;

    let config = ControlConfig::from_env().num_workers(8).max_jobs(256);
    config.print();

    let sched: Arc<Scheduler<Spin>> = match Scheduler::new(config) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("scheduler: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = sched.start() {
        eprintln!("start: {}", e);
        std::process::exit(1);
    }

    let executed = Arc::new(AtomicU64::new(0));
    let start = Instant::now();

    let threads: Vec<_> = (0..producers)
        .map(|p| {
            let sched = Arc::clone(&sched);
            let executed = Arc::clone(&executed);
            thread::spawn(move || {
                let mut tally = Tally::default();
                let mut accepted: Vec<JobHandle> = Vec::new();
                for i in 0..per_producer {
                    // Every 8th key repeats the previous one
                    let n = if i % 8 == 7 { i - 1 } else { i };
                    let key = (p << 32) | n;
                    let job = Job::new(Spin { key, rounds: 2_000, executed: Arc::clone(&executed) });
                    let handle = job.handle();
                    match sched.submit(job) {
                        Ok(_) => {
                            tally.queued += 1;
                            if i % 16 == 0 {
                                handle.cancel();
                                tally.cancelled += 1;
                            }
                            accepted.push(handle);
                        }
                        Err(ControlError::AlreadyQueued { .. }) => tally.duplicate += 1,
                        Err(ControlError::QueueFull) => tally.full += 1,
                        Err(e) => panic!("unexpected submit error: {}", e),
                    }

                    if i % 10 == 0 && i > 0 {
                        let wanted = Spin { key: (p << 32) | (i - 5), rounds: 0, executed: Arc::clone(&executed) };
                        if sched.revive(&wanted).is_some() {
                            tally.revived += 1;
                        }
                    }
                    if i % 1000 == 0 {
                        thread::yield_now();
                    }
                }
                let finished = accepted
                    .iter()
                    .filter(|h| {
                        h.wait();
                        h.state() == JobState::Finished
                    })
                    .count() as u64;
                (tally, finished)
            })
        })
        .collect();

    let mut total = Tally::default();
    let mut finished = 0;
    for t in threads {
        let Ok((tally, f)) = t.join() else {
            println!("\nFAILED: producer panicked");
            std::process::exit(1);
        };
        total.queued += tally.queued;
        total.duplicate += tally.duplicate;
        total.full += tally.full;
        total.revived += tally.revived;
        total.cancelled += tally.cancelled;
        finished += f;
    }
    let elapsed = start.elapsed();
    let stats = sched.stats();
    let workers = sched.worker_stats();
    sched.shutdown();

    let submitted = producers * per_producer;
    let run: u64 = workers.iter().map(|w| w.jobs_run).sum();
    let skipped: u64 = workers.iter().map(|w| w.jobs_skipped).sum();

    println!("\n=== Results ===");
    println!("Submitted:   {}", submitted);
    println!("Queued:      {}", total.queued);
    println!("Duplicates:  {}", total.duplicate);
    println!("Queue full:  {}", total.full);
    println!("Revived:     {}", total.revived);
    println!("Cancelled:   {}", total.cancelled);
    println!("Finished:    {}", finished);
    println!("Run/skipped: {}/{}", run, skipped);
    println!("Executed:    {}", executed.load(Ordering::Relaxed));
    println!("Elapsed:     {:?}", elapsed);
    println!("Rate:        {:.0} submits/sec", submitted as f64 / elapsed.as_secs_f64());
    println!("Final slots: {:?}", stats);
    for w in &workers {
        println!(
            "  {:<12} tid={:<8} run={:<7} skipped={:<5} panicked={}",
            w.id.to_string(),
            w.thread_id,
            w.jobs_run,
            w.jobs_skipped,
            w.jobs_panicked
        );
    }

    let accounted = total.queued + total.duplicate + total.full;
    if accounted != submitted || run + skipped != total.queued {
        println!("\nFAILED: accounting mismatch");
        std::process::exit(1);
    }
    println!("\nPASSED");
}
