//! Time sources.
//!
//! Wall-clock acquisition (NTP, RTC) is owned by the host firmware; the engine
//! only asks a [`Clock`] for "now" in nanoseconds since the Unix epoch.

use std::sync::atomic::{AtomicU64, Ordering};

/// Supplies the current time in nanoseconds since the Unix epoch.
pub trait Clock: Send {
    /// Returns the current time.
    fn now_nanos(&self) -> u64;
}

/// Clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_nanos(&self) -> u64 {
        chrono::Utc::now()
            .timestamp_nanos_opt()
            .and_then(|nanos| u64::try_from(nanos).ok())
            .unwrap_or(0)
    }
}

/// Deterministic clock for tests and replay.
///
/// Every read returns the current value and then advances it by `step`
/// nanoseconds (zero by default, meaning time only moves through
/// [`ManualClock::set`] and [`ManualClock::advance`]).
///
/// # Example
///
/// ```rust
/// use otel_edge::infrastructure::{Clock, ManualClock};
///
/// let clock = ManualClock::with_step(1_000, 10);
/// assert_eq!(clock.now_nanos(), 1_000);
/// assert_eq!(clock.now_nanos(), 1_010);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
    step: u64,
}

impl ManualClock {
    /// Creates a clock frozen at `start` nanoseconds.
    #[must_use]
    pub const fn new(start: u64) -> Self {
        Self::with_step(start, 0)
    }

    /// Creates a clock that advances by `step` on every read.
    #[must_use]
    pub const fn with_step(start: u64, step: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
            step,
        }
    }

    /// Jumps to an absolute time.
    pub fn set(&self, nanos: u64) {
        self.now.store(nanos, Ordering::SeqCst);
    }

    /// Moves time forward.
    pub fn advance(&self, nanos: u64) {
        self.now.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> u64 {
        self.now.fetch_add(self.step, Ordering::SeqCst)
    }
}

impl<C: Clock + Sync> Clock for std::sync::Arc<C> {
    fn now_nanos(&self) -> u64 {
        (**self).now_nanos()
    }
}
