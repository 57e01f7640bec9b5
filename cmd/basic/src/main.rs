//! Basic job control example
//!
//! Two general workers run three jobs of different lengths; a reserved
//! worker handles an import refresh that gets superseded before it runs.
//!
//! # Environment Variables
//!
//! - `JOBCTL_FLUSH_EPRINT=1` - Flush debug output immediately
//! - `JOBCTL_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)
//! - `JOBCTL_DEBUG=1` - Emit `[add_job]` / `[run_job]` control traces

use jobctl::{
    block_on, ControlConfig, ControlResult, Execute, Job, JobContext, ReservedId, Scheduler,
};
use jobctl::{kdebug, kinfo};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const IMPORT_WORKER: ReservedId = ReservedId(0);

enum Work {
    Develop { image: u32, ms: u64 },
    Tag { image: u32, tagged: Arc<AtomicUsize> },
    Import { folder: &'static str },
}

// Jobs are equivalent when they act on the same target
impl PartialEq for Work {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Work::Develop { image: a, .. }, Work::Develop { image: b, .. }) => a == b,
            (Work::Tag { image: a, .. }, Work::Tag { image: b, .. }) => a == b,
            (Work::Import { folder: a }, Work::Import { folder: b }) => a == b,
            _ => false,
        }
    }
}

impl Execute for Work {
    fn execute(&mut self, ctx: &JobContext<'_>) -> i32 {
        match self {
            Work::Develop { image, ms } => {
                kdebug!("developing image {}", image);
                thread::sleep(Duration::from_millis(*ms));
                *image as i32
            }
            Work::Tag { image, tagged } => {
                tagged.fetch_add(1, Ordering::SeqCst);
                *image as i32
            }
            Work::Import { folder } => {
                if ctx.is_cancelled() {
                    return 1;
                }
                kinfo!("importing {}", folder);
                0
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            Work::Develop { image, .. } => format!("develop image {}", image),
            Work::Tag { image, .. } => format!("tag image {}", image),
            Work::Import { folder } => format!("import {}", folder),
        }
    }
}

fn main() -> ControlResult<()> {
    println!("=== Job Control Basic Example ===\n");

    let config = ControlConfig::from_env()
        .num_workers(2)
        .num_reserved(1)
        .max_jobs(8);
    config.print();

    let tagged = Arc::new(AtomicUsize::new(0));

    block_on(config, |sched: &Scheduler<Work>| -> ControlResult<()> {
        let jobs = vec![
            Job::new(Work::Develop { image: 1, ms: 50 }),
            Job::new(Work::Develop { image: 2, ms: 10 }),
            Job::new(Work::Tag { image: 3, tagged: Arc::clone(&tagged) }),
        ];
        let handles: Vec<_> = jobs.iter().map(Job::handle).collect();
        for job in jobs {
            let slot = sched.submit(job)?;
            println!("queued in slot {}", slot);
        }

        // Only the latest import request matters
        let stale = Job::new(Work::Import { folder: "/photos/old" });
        let fresh = Job::new(Work::Import { folder: "/photos/2026" });
        let (stale_h, fresh_h) = (stale.handle(), fresh.handle());
        sched.submit_reserved(IMPORT_WORKER, stale)?;
        sched.submit_reserved(IMPORT_WORKER, fresh)?;

        for h in &handles {
            let result = sched.wait(h);
            println!("{} `{}` -> {:?} ({})", h.id(), h.description(), result, h.state());
        }
        println!("{} `{}` -> {}", stale_h.id(), stale_h.description(), stale_h.state());
        println!("{} `{}` -> {:?}", fresh_h.id(), fresh_h.description(), fresh_h.wait());

        let stats = sched.stats();
        println!(
            "\nslots: {} idle, {} queued, {} running (capacity {})",
            stats.idle, stats.queued, stats.running, stats.capacity
        );
        Ok(())
    })??;

    println!("tagged: {}", tagged.load(Ordering::SeqCst));
    println!("\n=== Done ===");
    Ok(())
}
