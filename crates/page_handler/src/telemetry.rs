//! Telemetry: an append-only event log per epoch with a cheap derived
//! snapshot, modeled on the counters/JSON-emission pattern used elsewhere
//! in this codebase for frame and layout statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters the scheduler updates as it processes commands. Cheap to
/// read concurrently with the scheduler task; snapshotting never blocks it.
#[derive(Debug, Default)]
pub struct ScheduleCounters {
    pub resources_discovered: AtomicU64,
    pub resources_loaded: AtomicU64,
    pub resources_failed: AtomicU64,
    pub resources_canceled: AtomicU64,
    pub bytes_transferred: AtomicU64,
    pub prefetches_admitted: AtomicU64,
    pub prefetches_downgraded: AtomicU64,
    pub preconnects_started: AtomicU64,
    pub policy_ticks: AtomicU64,
    pub retries_attempted: AtomicU64,
}

impl ScheduleCounters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, amount: u64) {
        counter.fetch_add(amount, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> ScheduleStats {
        ScheduleStats {
            resources_discovered: self.resources_discovered.load(Ordering::Relaxed),
            resources_loaded: self.resources_loaded.load(Ordering::Relaxed),
            resources_failed: self.resources_failed.load(Ordering::Relaxed),
            resources_canceled: self.resources_canceled.load(Ordering::Relaxed),
            bytes_transferred: self.bytes_transferred.load(Ordering::Relaxed),
            prefetches_admitted: self.prefetches_admitted.load(Ordering::Relaxed),
            prefetches_downgraded: self.prefetches_downgraded.load(Ordering::Relaxed),
            preconnects_started: self.preconnects_started.load(Ordering::Relaxed),
            policy_ticks: self.policy_ticks.load(Ordering::Relaxed),
            retries_attempted: self.retries_attempted.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time, serializable snapshot of [`ScheduleCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ScheduleStats {
    pub resources_discovered: u64,
    pub resources_loaded: u64,
    pub resources_failed: u64,
    pub resources_canceled: u64,
    pub bytes_transferred: u64,
    pub prefetches_admitted: u64,
    pub prefetches_downgraded: u64,
    pub preconnects_started: u64,
    pub policy_ticks: u64,
    pub retries_attempted: u64,
}

/// Emit `stats` as a single-line JSON log record, if telemetry is enabled.
///
/// # Errors
/// Returns an error if `stats` cannot be serialized (never expected for
/// this plain-data struct, but the signature stays fallible since
/// `serde_json::to_string` is).
pub fn maybe_emit(enabled: bool, stats: &ScheduleStats) -> Result<(), serde_json::Error> {
    if enabled {
        let json = serde_json::to_string(stats)?;
        log::info!("{json}");
    }
    Ok(())
}
