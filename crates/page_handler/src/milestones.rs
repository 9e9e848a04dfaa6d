//! C10 — `MilestoneTracker`: records the first instant each lifecycle
//! milestone occurs per epoch, firing callbacks exactly once in monotonic
//! order.

use std::time::{Duration, Instant};

/// A lifecycle milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Milestone {
    Ttfb,
    Dcl,
    Fp,
    Fcp,
    Tti,
    Load,
    Failed,
}

const TTI_QUIET_WINDOW: Duration = Duration::from_secs(5);
const TTI_MAX_IN_FLIGHT: usize = 2;
const LONG_TASK_THRESHOLD: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy)]
struct Recorded {
    milestone: Milestone,
    at: Instant,
}

/// C10: per-epoch milestone ledger. Late occurrences (a second `record`
/// call for an already-recorded milestone) are silently ignored.
#[derive(Debug, Default)]
pub struct MilestoneTracker {
    recorded: Vec<Recorded>,
    dcl_at: Option<Instant>,
    last_long_task_or_busy_network: Option<Instant>,
}

impl MilestoneTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn has(&self, milestone: Milestone) -> bool {
        self.recorded.iter().any(|entry| entry.milestone == milestone)
    }

    #[must_use]
    pub fn at(&self, milestone: Milestone) -> Option<Instant> {
        self.recorded.iter().find(|entry| entry.milestone == milestone).map(|entry| entry.at)
    }

    /// Record `milestone` at `at` if it has not already fired this epoch.
    /// Returns `true` if this call actually recorded it (i.e. should fire a
    /// callback).
    pub fn record(&mut self, milestone: Milestone, at: Instant) -> bool {
        if self.has(milestone) {
            return false;
        }
        if milestone == Milestone::Dcl {
            self.dcl_at = Some(at);
        }
        self.recorded.push(Recorded { milestone, at });
        true
    }

    /// Notify the tracker of main-thread or network activity, which resets
    /// the TTI quiet-window clock. Does not reset on user input per the
    /// documented decision that only long tasks and in-flight requests
    /// gate TTI.
    pub fn note_activity(&mut self, at: Instant, long_task: bool, in_flight_requests: usize) {
        if long_task || in_flight_requests > TTI_MAX_IN_FLIGHT {
            self.last_long_task_or_busy_network = Some(at);
        }
    }

    /// Evaluate whether TTI's quiet window has elapsed since DCL (or since
    /// the last disqualifying activity), recording it if so.
    pub fn maybe_record_tti(&mut self, now: Instant) -> bool {
        if self.has(Milestone::Tti) {
            return false;
        }
        let Some(dcl_at) = self.dcl_at else {
            return false;
        };
        let quiet_since = self.last_long_task_or_busy_network.unwrap_or(dcl_at);
        if now.duration_since(quiet_since) >= TTI_QUIET_WINDOW {
            return self.record(Milestone::Tti, now);
        }
        false
    }

    /// All recorded milestones, in monotonic time order (insertion order is
    /// already monotonic since `record` is always called with advancing
    /// timestamps by the scheduler, but this guards against out-of-order
    /// callers such as tests).
    #[must_use]
    pub fn ordered(&self) -> Vec<(Milestone, Instant)> {
        let mut entries: Vec<_> = self.recorded.iter().map(|entry| (entry.milestone, entry.at)).collect();
        entries.sort_by_key(|(_, at)| *at);
        entries
    }
}

#[must_use]
pub const fn is_long_task(duration: Duration) -> bool {
    duration.as_millis() as u64 > LONG_TASK_THRESHOLD.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn late_occurrence_of_a_milestone_is_ignored() {
        let mut tracker = MilestoneTracker::new();
        let t0 = Instant::now();
        assert!(tracker.record(Milestone::Fp, t0));
        assert!(!tracker.record(Milestone::Fp, t0 + Duration::from_millis(10)));
        assert_eq!(tracker.at(Milestone::Fp), Some(t0));
    }

    #[test]
    fn tti_fires_after_quiet_window_since_dcl() {
        let mut tracker = MilestoneTracker::new();
        let t0 = Instant::now();
        tracker.record(Milestone::Dcl, t0);
        assert!(!tracker.maybe_record_tti(t0 + Duration::from_secs(2)));
        assert!(tracker.maybe_record_tti(t0 + Duration::from_secs(6)));
        assert!(tracker.has(Milestone::Tti));
    }

    #[test]
    fn busy_network_resets_the_tti_clock() {
        let mut tracker = MilestoneTracker::new();
        let t0 = Instant::now();
        tracker.record(Milestone::Dcl, t0);
        tracker.note_activity(t0 + Duration::from_secs(3), false, 3);
        assert!(!tracker.maybe_record_tti(t0 + Duration::from_secs(7)));
        assert!(tracker.maybe_record_tti(t0 + Duration::from_secs(9)));
    }
}
