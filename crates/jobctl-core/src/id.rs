//! Identifier types
//!
//! Plain newtypes over the indices the scheduler hands out. None of them
//! own anything; they are only meaningful against the scheduler that
//! produced them.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Index of a cell in the general job slot table
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SlotIndex(u32);

impl SlotIndex {
    #[inline]
    pub const fn new(index: u32) -> Self {
        SlotIndex(index)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Get as usize for indexing
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotIndex({})", self.0)
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a reserved worker, one per long-lived external resource
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ReservedId(pub usize);

impl ReservedId {
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl From<usize> for ReservedId {
    #[inline]
    fn from(id: usize) -> Self {
        ReservedId(id)
    }
}

impl fmt::Display for ReservedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which worker thread is executing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkerId {
    /// Member of the general pool, servicing the shared queue
    General(usize),
    /// Worker permanently bound to one reserved slot
    Reserved(ReservedId),
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerId::General(i) => write!(f, "worker-{}", i),
            WorkerId::Reserved(id) => write!(f, "reserved-{}", id.0),
        }
    }
}

/// Process-unique job identifier, assigned when a `Job` is created
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct JobId(u64);

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

impl JobId {
    /// Allocate the next id
    pub fn next() -> Self {
        JobId(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
