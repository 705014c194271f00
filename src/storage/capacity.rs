//! Occupancy-driven relief for the span store.
//!
//! When the store crosses the trigger threshold the policy runs a fixed cascade:
//!
//! 1. Flush: export every completed span.
//! 2. If occupancy is still at or above the eviction threshold, drop every
//!    closed span whether or not it was exported.
//! 3. If occupancy is still at or above the leak threshold, the remaining
//!    spans are all active and are assumed leaked: force-close the oldest
//!    until closing them would bring occupancy down to the target, then
//!    flush again. If occupancy stays at or above the eviction threshold,
//!    evict again.
//!
//! Thresholds are integer percentages of capacity, rounded down.

use tracing::Level;

use crate::infrastructure::Clock;
use crate::observability::Logger;

use super::SpanStore;

/// Percent thresholds that drive the relief cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityPolicy {
    /// Occupancy at which relief starts.
    pub trigger_percent: usize,
    /// Occupancy after a flush at which closed spans are evicted.
    pub evict_percent: usize,
    /// Occupancy after eviction at which active spans are considered leaked.
    pub leak_percent: usize,
    /// Occupancy the leak handler force-closes down to.
    pub target_percent: usize,
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        Self {
            trigger_percent: 75,
            evict_percent: 60,
            leak_percent: 80,
            target_percent: 50,
        }
    }
}

/// What a relief pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleanupReport {
    /// Whether the trigger threshold was reached at all.
    pub triggered: bool,
    /// Number of flush attempts made.
    pub flushes: usize,
    /// Closed spans discarded without a confirmed export.
    pub evicted: usize,
    /// Active spans force-closed as presumed leaks.
    pub force_closed: usize,
    /// Spans held after the pass.
    pub remaining: usize,
}

impl CapacityPolicy {
    /// `percent` of `capacity`, rounded down.
    #[must_use]
    pub const fn threshold(capacity: usize, percent: usize) -> usize {
        capacity * percent / 100
    }

    /// Whether `store` has reached the trigger threshold.
    #[must_use]
    pub fn should_relieve(&self, store: &SpanStore) -> bool {
        store.len() >= Self::threshold(store.capacity(), self.trigger_percent)
    }

    /// Runs the relief cascade if the trigger threshold is reached.
    ///
    /// `flush` exports completed spans out of the store; its outcome is read
    /// back from the store's occupancy, so failures need not be reported.
    pub fn relieve<F>(
        &self,
        store: &mut SpanStore,
        clock: &dyn Clock,
        logger: &dyn Logger,
        mut flush: F,
    ) -> CleanupReport
    where
        F: FnMut(&mut SpanStore),
    {
        let capacity = store.capacity();
        let mut report = CleanupReport {
            remaining: store.len(),
            ..CleanupReport::default()
        };
        if !self.should_relieve(store) {
            return report;
        }
        report.triggered = true;

        let evict_at = Self::threshold(capacity, self.evict_percent);
        let leak_at = Self::threshold(capacity, self.leak_percent);
        let target = Self::threshold(capacity, self.target_percent);

        logger.log(
            Level::WARN,
            &format!(
                "span store at {}% ({}/{capacity}), exporting completed spans",
                store.len() * 100 / capacity.max(1),
                store.len()
            ),
        );
        flush(store);
        report.flushes += 1;

        if store.len() >= evict_at {
            report.evicted += self.evict(store, logger);

            if store.len() >= leak_at {
                logger.log(
                    Level::WARN,
                    &format!(
                        "{} active spans after eviction, possible span leak",
                        store.len()
                    ),
                );
                let closed = store.force_complete_oldest(clock.now_nanos(), target);
                report.force_closed = closed;

                if closed > 0 {
                    logger.log(
                        Level::WARN,
                        &format!("force-closed {closed} oldest active spans"),
                    );
                    flush(store);
                    report.flushes += 1;

                    if store.len() >= evict_at {
                        report.evicted += self.evict(store, logger);
                    }
                }
            }
        }

        report.remaining = store.len();
        logger.log(
            Level::INFO,
            &format!(
                "span cleanup finished: {} spans remain, {} evicted, {} force-closed",
                report.remaining, report.evicted, report.force_closed
            ),
        );
        report
    }

    fn evict(&self, store: &mut SpanStore, logger: &dyn Logger) -> usize {
        let evicted = store.evict_completed();
        if evicted > 0 {
            logger.log(
                Level::WARN,
                &format!("evicted {evicted} closed spans without export"),
            );
        }
        evicted
    }
}
