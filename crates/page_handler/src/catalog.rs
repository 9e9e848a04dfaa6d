//! C1 — `ResourceCatalog`: the authoritative map of URL to `ResourceRecord`
//! for the current navigation epoch.

use crate::error::ScheduleError;
use html::ResourceKind;
use std::collections::HashMap;
use std::time::Instant;

/// Coarse scheduling priority tier, most to least urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityLevel {
    Critical,
    High,
    Medium,
    Low,
    Lazy,
}

/// A resource's structured priority. Ordered by `(level, !in_viewport,
/// !render_blocking, score, insertion_seq)`, matching the total order the
/// catalog's priority iteration relies on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Priority {
    pub level: PriorityLevel,
    pub in_viewport: bool,
    pub render_blocking: bool,
    pub score: f32,
    pub insertion_seq: u64,
}

impl Priority {
    fn sort_key(self) -> (PriorityLevel, bool, bool, ordered_float::NotNan, u64) {
        (
            self.level,
            !self.in_viewport,
            !self.render_blocking,
            ordered_float::NotNan::new(self.score),
            self.insertion_seq,
        )
    }
}

/// A total-order-friendly float wrapper, since `f32` has no `Ord`. Kept
/// local rather than pulling in a crate for a single comparison need.
mod ordered_float {
    #[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
    pub struct NotNan(f32);

    impl NotNan {
        pub fn new(value: f32) -> Self {
            Self(if value.is_nan() { 0.0 } else { value })
        }
    }

    impl Eq for NotNan {}

    #[allow(clippy::derive_ord_xor_partial_ord, reason = "NaN is normalized away in `new`")]
    impl Ord for NotNan {
        fn cmp(&self, other: &Self) -> std::cmp::Ordering {
            self.0.partial_cmp(&other.0).unwrap_or(std::cmp::Ordering::Equal)
        }
    }
}

impl Eq for Priority {}
impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Priority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Lifecycle state of a single resource, per the state diagram in the data
/// model: transitions are monotonic except `Queued -> Canceled` and
/// `Failed -> Queued` on retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    Discovered,
    Queued,
    Connecting,
    Transferring,
    Loaded,
    Failed,
    Canceled,
}

impl ResourceState {
    fn can_transition_to(self, to: Self) -> bool {
        use ResourceState::{Canceled, Connecting, Discovered, Failed, Loaded, Queued, Transferring};
        match (self, to) {
            (Discovered, Queued)
            | (Queued, Connecting | Canceled)
            | (Connecting, Transferring | Failed)
            | (Transferring, Loaded | Failed | Canceled)
            | (Failed, Queued) => true,
            (same, to) if same == to => true,
            _ => false,
        }
    }
}

/// Opaque identifier for a record within its catalog. Stable for the
/// lifetime of the epoch that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(u64);

/// One per distinct URL in the current navigation epoch.
#[derive(Debug, Clone)]
pub struct ResourceRecord {
    pub url: String,
    pub origin: String,
    pub kind: ResourceKind,
    pub priority: Priority,
    pub state: ResourceState,
    pub requested_at: Option<Instant>,
    pub first_byte_at: Option<Instant>,
    pub completed_at: Option<Instant>,
    pub bytes_transferred: u64,
    pub bytes_total: Option<u64>,
    pub mime: Option<String>,
    pub dependents: Vec<String>,
    pub attempt_count: u32,
    pub last_error: Option<String>,
    epoch: u64,
    insertion_seq: u64,
}

impl ResourceRecord {
    /// # Errors
    /// Returns `IllegalTransition` if `to` violates the state diagram, or
    /// if `bytes_transferred` would exceed a known `bytes_total`.
    fn transition(&mut self, to: ResourceState) -> Result<(), ScheduleError> {
        if !self.state.can_transition_to(to) {
            return Err(crate::error::illegal_transition(format!(
                "{:?} -> {:?} for {}",
                self.state, to, self.url
            )));
        }
        self.state = to;
        if matches!(to, ResourceState::Connecting) && self.requested_at.is_none() {
            self.requested_at = Some(Instant::now());
        }
        if matches!(to, ResourceState::Loaded | ResourceState::Failed) {
            self.completed_at = Some(Instant::now());
        }
        Ok(())
    }
}

fn origin_of(url: &str) -> String {
    url::Url::parse(url).map_or_else(|_| url.to_owned(), |parsed| parsed.origin().ascii_serialization())
}

/// A mutation applied to a record via [`ResourceCatalog::update`].
#[derive(Debug, Clone)]
pub enum Mutation {
    SetState(ResourceState),
    RecordFirstByte,
    RecordBytes { delta: u64, total: Option<u64> },
    SetMime(String),
    Fail(String),
    Retry,
    AddDependent(String),
    Reprioritize(Priority),
}

/// C1: maps URL to `ResourceRecord`, enforcing the invariants over state and
/// priority from the data model. Owned exclusively by the scheduler.
#[derive(Debug, Default)]
pub struct ResourceCatalog {
    records: HashMap<RecordId, ResourceRecord>,
    by_url: HashMap<String, RecordId>,
    epoch: u64,
    next_id: u64,
    next_seq: u64,
}

/// Outcome of [`ResourceCatalog::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(RecordId),
    AlreadyPresent(RecordId),
}

impl ResourceCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Idempotent per epoch: a second `insert` for the same URL returns the
    /// existing record rather than creating a duplicate.
    pub fn insert(&mut self, url: &str, kind: ResourceKind, priority: Priority) -> InsertOutcome {
        if let Some(existing) = self.by_url.get(url) {
            return InsertOutcome::AlreadyPresent(*existing);
        }
        let id = RecordId(self.next_id);
        self.next_id += 1;
        let insertion_seq = self.next_seq;
        self.next_seq += 1;
        let mut priority = priority;
        priority.insertion_seq = insertion_seq;
        let record = ResourceRecord {
            url: url.to_owned(),
            origin: origin_of(url),
            kind,
            priority,
            state: ResourceState::Discovered,
            requested_at: None,
            first_byte_at: None,
            completed_at: None,
            bytes_transferred: 0,
            bytes_total: None,
            mime: None,
            dependents: Vec::new(),
            attempt_count: 0,
            last_error: None,
            epoch: self.epoch,
            insertion_seq,
        };
        self.records.insert(id, record);
        self.by_url.insert(url.to_owned(), id);
        InsertOutcome::Inserted(id)
    }

    /// # Errors
    /// Returns `IllegalTransition` if the mutation is invalid for the
    /// record's current state, or if it is not found.
    pub fn update(&mut self, id: RecordId, mutation: Mutation) -> Result<(), ScheduleError> {
        let record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| crate::error::illegal_transition("update on unknown record"))?;
        match mutation {
            Mutation::SetState(to) => record.transition(to)?,
            Mutation::RecordFirstByte => {
                if record.first_byte_at.is_none() {
                    record.first_byte_at = Some(Instant::now());
                }
            }
            Mutation::RecordBytes { delta, total } => {
                record.bytes_transferred = record.bytes_transferred.saturating_add(delta);
                if total.is_some() {
                    record.bytes_total = total;
                }
                if let Some(known_total) = record.bytes_total {
                    if record.bytes_transferred > known_total {
                        return Err(crate::error::illegal_transition(format!(
                            "bytes_transferred exceeded bytes_total for {}",
                            record.url
                        )));
                    }
                }
            }
            Mutation::SetMime(mime) => record.mime = Some(mime),
            Mutation::Fail(reason) => {
                record.last_error = Some(reason);
                record.attempt_count += 1;
                record.transition(ResourceState::Failed)?;
            }
            Mutation::Retry => {
                record.transition(ResourceState::Queued)?;
            }
            Mutation::AddDependent(url) => {
                if !record.dependents.contains(&url) {
                    record.dependents.push(url);
                }
            }
            Mutation::Reprioritize(mut priority) => {
                priority.insertion_seq = record.priority.insertion_seq;
                record.priority = priority;
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&ResourceRecord> {
        self.records.get(&id)
    }

    #[must_use]
    pub fn id_for_url(&self, url: &str) -> Option<RecordId> {
        self.by_url.get(url).copied()
    }

    pub fn iter_by_state(&self, state: ResourceState) -> impl Iterator<Item = (RecordId, &ResourceRecord)> {
        self.records.iter().filter(move |(_, record)| record.state == state).map(|(id, record)| (*id, record))
    }

    /// Records in descending priority order (stable tie-break: insertion
    /// order, via `Priority`'s total order).
    #[must_use]
    pub fn iter_by_priority(&self) -> Vec<(RecordId, &ResourceRecord)> {
        let mut all: Vec<_> = self.records.iter().map(|(id, record)| (*id, record)).collect();
        all.sort_by_key(|(_, record)| record.priority);
        all
    }

    /// Bump the epoch: records from the old epoch become unreachable by URL
    /// lookup (so new navigations never mutate them) and are dropped lazily
    /// from storage here.
    pub fn reset_epoch(&mut self, new_epoch: u64) {
        self.epoch = new_epoch;
        self.by_url.clear();
        self.records.retain(|_, record| record.epoch >= new_epoch);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priority(level: PriorityLevel) -> Priority {
        Priority {
            level,
            in_viewport: false,
            render_blocking: false,
            score: 0.0,
            insertion_seq: 0,
        }
    }

    fn inserted_id(outcome: InsertOutcome) -> Result<RecordId, anyhow::Error> {
        match outcome {
            InsertOutcome::Inserted(id) => Ok(id),
            InsertOutcome::AlreadyPresent(_) => Err(anyhow::anyhow!("expected a fresh insert")),
        }
    }

    #[test]
    fn insert_is_idempotent_per_url() -> Result<(), anyhow::Error> {
        let mut catalog = ResourceCatalog::new();
        let first = inserted_id(catalog.insert("http://ex/a.js", ResourceKind::Script, priority(PriorityLevel::High)))?;
        let second = catalog.insert("http://ex/a.js", ResourceKind::Script, priority(PriorityLevel::High));
        assert_eq!(second, InsertOutcome::AlreadyPresent(first));
        assert_eq!(catalog.len(), 1);
        Ok(())
    }

    #[test]
    fn priority_orders_critical_before_low() -> Result<(), anyhow::Error> {
        let mut catalog = ResourceCatalog::new();
        let low = inserted_id(catalog.insert("http://ex/low.png", ResourceKind::Image, priority(PriorityLevel::Low)))?;
        let critical = inserted_id(catalog.insert(
            "http://ex/main.html",
            ResourceKind::Html,
            priority(PriorityLevel::Critical),
        ))?;
        let ordered = catalog.iter_by_priority();
        assert_eq!(ordered[0].0, critical);
        assert_eq!(ordered[1].0, low);
        Ok(())
    }

    #[test]
    fn illegal_transition_is_rejected() -> Result<(), anyhow::Error> {
        let mut catalog = ResourceCatalog::new();
        let id = inserted_id(catalog.insert("http://ex/a.js", ResourceKind::Script, priority(PriorityLevel::High)))?;
        // Discovered -> Transferring skips Queued/Connecting and must fail.
        let result = catalog.update(id, Mutation::SetState(ResourceState::Transferring));
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn bytes_transferred_cannot_exceed_total() -> Result<(), anyhow::Error> {
        let mut catalog = ResourceCatalog::new();
        let id = inserted_id(catalog.insert("http://ex/a.png", ResourceKind::Image, priority(PriorityLevel::Low)))?;
        let result = catalog.update(
            id,
            Mutation::RecordBytes {
                delta: 200,
                total: Some(100),
            },
        );
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn reset_epoch_hides_old_records_from_url_lookup() {
        let mut catalog = ResourceCatalog::new();
        catalog.insert("http://ex/a.js", ResourceKind::Script, priority(PriorityLevel::High));
        catalog.reset_epoch(1);
        assert!(catalog.id_for_url("http://ex/a.js").is_none());
    }

    #[test]
    fn connecting_records_request_start_time() -> Result<(), anyhow::Error> {
        let mut catalog = ResourceCatalog::new();
        let id = inserted_id(catalog.insert("http://ex/a.js", ResourceKind::Script, priority(PriorityLevel::High)))?;
        catalog.update(id, Mutation::SetState(ResourceState::Queued))?;
        catalog.update(id, Mutation::SetState(ResourceState::Connecting))?;
        assert!(catalog.get(id).is_some_and(|record| record.requested_at.is_some()));
        Ok(())
    }

    proptest::proptest! {
        /// `iter_by_priority` always yields a non-decreasing sequence of
        /// `PriorityLevel` discriminants (property 5, spec.md §8): the
        /// coarsest component of the tuple order can never be violated by
        /// insertion order or score.
        #[test]
        fn iter_by_priority_is_monotonic_by_level(levels in proptest::collection::vec(0u8..5, 1..20)) {
            let mut catalog = ResourceCatalog::new();
            for (idx, level) in levels.iter().enumerate() {
                let level = match level {
                    0 => PriorityLevel::Critical,
                    1 => PriorityLevel::High,
                    2 => PriorityLevel::Medium,
                    3 => PriorityLevel::Low,
                    _ => PriorityLevel::Lazy,
                };
                catalog.insert(&format!("http://ex/{idx}"), ResourceKind::Other, priority(level));
            }
            let ordered = catalog.iter_by_priority();
            for pair in ordered.windows(2) {
                proptest::prop_assert!(pair[0].1.priority.level <= pair[1].1.priority.level);
            }
        }
    }
}
