//! Kernel-style print macros for jobctl
//!
//! Locked, optionally flushed lines on stderr, similar to the kernel's
//! printk. Lines printed from a worker thread carry that worker's tag, and
//! can carry a wall-clock offset so control traces from different workers
//! line up.
//!
//! # Environment Variables
//!
//! - `JOBCTL_LOG_LEVEL=<level>` - off, error, warn, info, debug, trace (or 0-5)
//! - `JOBCTL_FLUSH_EPRINT=1` - Flush stderr after each line (useful when a job crashes)
//! - `JOBCTL_LOG_TIME=1` - Prefix lines with seconds since the first log
//!
//! # Usage
//!
//! ```ignore
//! use jobctl_core::{kdebug, kinfo, kwarn, kerror};
//!
//! kinfo!("{} workers started", n);
//! kdebug!("[add_job] {} {}", idle, desc);
//! kwarn!("too many jobs in queue");
//! kerror!("job {} panicked", id);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Once, OnceLock};
use std::time::Instant;

use crate::env::env_get_bool;

/// Log levels, most severe first
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    const ALL: [LogLevel; 6] = [
        LogLevel::Off,
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    /// Out-of-range values saturate to `Trace`
    pub fn from_u8(v: u8) -> Self {
        Self::ALL[(v as usize).min(Self::ALL.len() - 1)]
    }

    pub fn name(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Level name or digit, as accepted in `JOBCTL_LOG_LEVEL`
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(n) = s.parse::<u8>() {
            return Self::ALL.get(n as usize).copied();
        }
        Self::ALL
            .iter()
            .copied()
            .find(|level| level.name().eq_ignore_ascii_case(s))
    }

    /// Fixed-width tag written before each leveled line
    pub fn prefix(self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "[ERROR]",
            LogLevel::Warn => "[WARN] ",
            LogLevel::Info => "[INFO] ",
            LogLevel::Debug => "[DEBUG]",
            LogLevel::Trace => "[TRACE]",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

struct Settings {
    level: AtomicU8,
    flush: AtomicBool,
    time: AtomicBool,
}

static SETTINGS: Settings = Settings {
    level: AtomicU8::new(LogLevel::Info as u8),
    flush: AtomicBool::new(false),
    time: AtomicBool::new(false),
};
static ENV_LOADED: Once = Once::new();
static START: OnceLock<Instant> = OnceLock::new();

thread_local! {
    static WORKER_TAG: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Load settings from the environment
///
/// Runs once, on first use; explicit setters called afterwards win.
pub fn init() {
    ENV_LOADED.call_once(|| {
        START.get_or_init(Instant::now);
        if let Ok(val) = std::env::var("JOBCTL_LOG_LEVEL") {
            let level = LogLevel::parse(&val).unwrap_or(LogLevel::Info);
            SETTINGS.level.store(level as u8, Ordering::Relaxed);
        }
        SETTINGS
            .flush
            .store(env_get_bool("JOBCTL_FLUSH_EPRINT", false), Ordering::Relaxed);
        SETTINGS
            .time
            .store(env_get_bool("JOBCTL_LOG_TIME", false), Ordering::Relaxed);
    });
}

#[inline]
fn settings() -> &'static Settings {
    init();
    &SETTINGS
}

#[inline]
pub fn log_level() -> LogLevel {
    LogLevel::from_u8(settings().level.load(Ordering::Relaxed))
}

/// Override the level from `JOBCTL_LOG_LEVEL`
pub fn set_log_level(level: LogLevel) {
    settings().level.store(level as u8, Ordering::Relaxed);
}

#[inline]
pub fn flush_enabled() -> bool {
    settings().flush.load(Ordering::Relaxed)
}

pub fn set_flush_enabled(enabled: bool) {
    settings().flush.store(enabled, Ordering::Relaxed);
}

pub fn set_time_enabled(enabled: bool) {
    settings().time.store(enabled, Ordering::Relaxed);
}

/// `Off` is a threshold, never a line level
#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    level != LogLevel::Off && level <= log_level()
}

/// Tag every line printed from this thread (called once per worker)
pub fn set_worker_tag(tag: impl Into<String>) {
    let tag = tag.into();
    WORKER_TAG.with(|cell| *cell.borrow_mut() = Some(tag));
}

pub fn clear_worker_tag() {
    WORKER_TAG.with(|cell| *cell.borrow_mut() = None);
}

fn write_header(out: &mut impl Write, level: Option<LogLevel>) {
    if let Some(level) = level {
        let _ = write!(out, "{} ", level.prefix());
    }
    if SETTINGS.time.load(Ordering::Relaxed) {
        let start = START.get_or_init(Instant::now);
        let _ = write!(out, "{:>12.6} ", start.elapsed().as_secs_f64());
    }
    WORKER_TAG.with(|cell| {
        if let Some(tag) = cell.borrow().as_deref() {
            let _ = write!(out, "[{}] ", tag);
        }
    });
}

/// Backend of every macro in this module
///
/// `level` filters and prefixes the line; `line` adds the header and the
/// trailing newline.
#[doc(hidden)]
pub fn _emit(level: Option<LogLevel>, line: bool, args: fmt::Arguments<'_>) {
    if let Some(level) = level {
        if !level_enabled(level) {
            return;
        }
    }
    let flush = flush_enabled();

    let stderr = io::stderr();
    let mut out = stderr.lock();
    if line {
        write_header(&mut out, level);
    }
    let _ = out.write_fmt(args);
    if line {
        let _ = out.write_all(b"\n");
    }
    if flush {
        let _ = out.flush();
    }
}

// ============================================================================
// Public Macros
// ============================================================================

/// Print to stderr (no newline, no header)
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => {
        $crate::kprint::_emit(None, false, format_args!($($arg)*))
    };
}

/// Print a line to stderr, prefixed by the worker tag if any
#[macro_export]
macro_rules! kprintln {
    () => {
        $crate::kprint::_emit(None, true, format_args!(""))
    };
    ($($arg:tt)*) => {
        $crate::kprint::_emit(None, true, format_args!($($arg)*))
    };
}

/// Leveled line: `klog!(Debug, "...", args)`
#[macro_export]
macro_rules! klog {
    ($level:ident, $($arg:tt)*) => {
        $crate::kprint::_emit(
            Some($crate::kprint::LogLevel::$level),
            true,
            format_args!($($arg)*),
        )
    };
}

#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => { $crate::klog!(Error, $($arg)*) };
}

#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => { $crate::klog!(Warn, $($arg)*) };
}

#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => { $crate::klog!(Info, $($arg)*) };
}

/// Control traces (`[add_job]`, `[run_job+]`, ...) go here
#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => { $crate::klog!(Debug, $($arg)*) };
}

#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => { $crate::klog!(Trace, $($arg)*) };
}
