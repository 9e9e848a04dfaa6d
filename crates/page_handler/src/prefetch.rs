//! C5 — `PrefetchQueue`: priority queue of speculative fetches with a byte
//! budget and concurrency cap.

use crate::catalog::Priority;
use std::collections::BinaryHeap;

/// Whether a speculative fetch downloads the full body or only warms the
/// connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchKind {
    Full,
    PreconnectOnly,
}

#[derive(Debug, Clone)]
struct Entry {
    url: String,
    kind: PrefetchKind,
    priority: Priority,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}
impl Eq for Entry {}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // `Priority`'s derived Ord ranks Critical as the smallest value (it's
        // the first enum variant); BinaryHeap is a max-heap, so the
        // comparison is reversed here to pop Critical entries first.
        other.priority.cmp(&self.priority)
    }
}

/// Why an admission attempt was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionRejection {
    SaveData,
    PolicyForbidsHost,
}

/// Outcome of attempting to enqueue a speculative fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionOutcome {
    Admitted(PrefetchKind),
    Rejected(AdmissionRejection),
}

/// C5: holds pending speculative fetches ordered by priority, with a global
/// byte budget charged only by `Full` completions.
#[derive(Debug)]
pub struct PrefetchQueue {
    pending: BinaryHeap<Entry>,
    in_flight: Vec<Entry>,
    remaining_budget: i64,
    concurrency_cap: usize,
}

impl PrefetchQueue {
    #[must_use]
    pub fn new(byte_budget: u64, concurrency_cap: usize) -> Self {
        Self {
            pending: BinaryHeap::new(),
            in_flight: Vec::new(),
            remaining_budget: i64::try_from(byte_budget).unwrap_or(i64::MAX),
            concurrency_cap: concurrency_cap.max(1),
        }
    }

    #[must_use]
    pub const fn remaining_budget(&self) -> i64 {
        self.remaining_budget
    }

    /// Evaluate admission rules 1-2 (budget exhaustion and save-data) and
    /// enqueue if admitted. Rule 3 (policy/host deny) is evaluated by the
    /// caller via `policy_allows`, since it requires an external collaborator.
    pub fn try_enqueue(
        &mut self,
        url: &str,
        mut kind: PrefetchKind,
        priority: Priority,
        save_data: bool,
        disable_on_save_data: bool,
        policy_allows: bool,
    ) -> AdmissionOutcome {
        if !policy_allows {
            return AdmissionOutcome::Rejected(AdmissionRejection::PolicyForbidsHost);
        }
        if save_data && disable_on_save_data {
            return AdmissionOutcome::Rejected(AdmissionRejection::SaveData);
        }
        if kind == PrefetchKind::Full && self.remaining_budget <= 0 {
            kind = PrefetchKind::PreconnectOnly;
        }
        self.pending.push(Entry {
            url: url.to_owned(),
            kind,
            priority,
        });
        AdmissionOutcome::Admitted(kind)
    }

    /// Pop the highest-priority pending entry into in-flight, if the
    /// concurrency cap allows.
    pub fn admit_next(&mut self) -> Option<(String, PrefetchKind)> {
        if self.in_flight.len() >= self.concurrency_cap {
            return None;
        }
        let entry = self.pending.pop()?;
        let result = (entry.url.clone(), entry.kind);
        self.in_flight.push(entry);
        Some(result)
    }

    /// Charge the budget for a completed `Full` fetch. A no-op for URLs that
    /// were never admitted through this queue (e.g. a render-blocking
    /// resource fetched via the direct admission path), so the speculative
    /// budget is only ever charged for genuinely speculative bytes.
    pub fn complete(&mut self, url: &str, bytes: u64) {
        let was_tracked = self.in_flight.iter().any(|entry| entry.url == url);
        self.in_flight.retain(|entry| entry.url != url);
        if was_tracked {
            self.remaining_budget -= i64::try_from(bytes).unwrap_or(i64::MAX);
        }
    }

    /// Drop a tracked in-flight entry without charging the budget, for a
    /// fetch that failed rather than completed.
    pub fn remove(&mut self, url: &str) {
        self.in_flight.retain(|entry| entry.url != url);
    }

    /// Cancel the lowest-priority in-flight item to make room for a newly
    /// arrived `Critical` item. Canceled bytes are not refunded.
    pub fn cancel_lowest_priority(&mut self) -> Option<String> {
        // `Priority`'s derived Ord ranks Critical smallest, so the least
        // urgent in-flight entry is the maximum, not the minimum.
        let (index, _) = self
            .in_flight
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.priority.cmp(&b.priority))?;
        Some(self.in_flight.remove(index).url)
    }

    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    #[must_use]
    pub fn is_saturated(&self) -> bool {
        self.in_flight.len() >= self.concurrency_cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PriorityLevel;

    fn priority(level: PriorityLevel, seq: u64) -> Priority {
        Priority {
            level,
            in_viewport: false,
            render_blocking: false,
            score: 0.0,
            insertion_seq: seq,
        }
    }

    #[test]
    fn budget_exhaustion_downgrades_full_to_preconnect_only() {
        let mut queue = PrefetchQueue::new(100, 10);
        queue.complete("http://ex/a", 150);
        let outcome = queue.try_enqueue(
            "http://ex/b",
            PrefetchKind::Full,
            priority(PriorityLevel::Low, 0),
            false,
            true,
            true,
        );
        assert_eq!(outcome, AdmissionOutcome::Admitted(PrefetchKind::PreconnectOnly));
    }

    #[test]
    fn save_data_rejects_when_disabled() {
        let mut queue = PrefetchQueue::new(1_000, 10);
        let outcome =
            queue.try_enqueue("http://ex/a", PrefetchKind::Full, priority(PriorityLevel::Low, 0), true, true, true);
        assert_eq!(outcome, AdmissionOutcome::Rejected(AdmissionRejection::SaveData));
    }

    #[test]
    fn admission_respects_priority_order() {
        let mut queue = PrefetchQueue::new(1_000, 10);
        queue.try_enqueue("http://ex/low", PrefetchKind::Full, priority(PriorityLevel::Low, 0), false, true, true);
        queue.try_enqueue(
            "http://ex/critical",
            PrefetchKind::Full,
            priority(PriorityLevel::Critical, 1),
            false,
            true,
            true,
        );
        let admitted = queue.admit_next();
        assert_eq!(admitted.map(|(url, _)| url), Some("http://ex/critical".to_owned()));
    }

    #[test]
    fn cancel_lowest_priority_cancels_correct_entry() {
        let mut queue = PrefetchQueue::new(1_000, 10);
        queue.try_enqueue("http://ex/low", PrefetchKind::Full, priority(PriorityLevel::Low, 0), false, true, true);
        queue.try_enqueue("http://ex/high", PrefetchKind::Full, priority(PriorityLevel::High, 1), false, true, true);
        queue.admit_next();
        queue.admit_next();
        let canceled = queue.cancel_lowest_priority();
        assert_eq!(canceled, Some("http://ex/low".to_owned()));
    }
}
