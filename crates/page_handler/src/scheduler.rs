//! C12 — `Scheduler`: the single-owner root composing C1-C11. The only
//! point that mutates the catalog, queues, and pools; every other
//! subsystem observes it through read snapshots or submits work by
//! message.

use crate::bandwidth::BandwidthMonitor;
use crate::catalog::Mutation as CatalogMutation;
use crate::catalog::{InsertOutcome, Priority, PriorityLevel, RecordId, ResourceCatalog, ResourceState};
use crate::command::{Command, DiscoverHint, PreconnectOutcome};
use crate::config::SchedulerConfig;
use crate::error::ScheduleError;
use crate::hints::{HintGenerator, Prediction, ResourceHint};
use crate::milestones::{Milestone, MilestoneTracker};
use crate::network_profile::{LinkSignals, NetworkProfile};
use crate::page_state::{LoadState, NavigationKind, PageStateMachine};
use crate::policy::{builtin_policies, PolicyContext, PolicyEngine, PolicySettings};
use crate::preconnect::PreconnectPool;
use crate::prefetch::{AdmissionOutcome, AdmissionRejection, PrefetchKind, PrefetchQueue};
use crate::prioritizer::{PrioritizationContext, Prioritizer};
use crate::render_gate::{ProgressiveRenderGate, RenderGateContext};
use crate::snapshot::PageStateSnapshot;
use crate::telemetry::{maybe_emit, ScheduleCounters, ScheduleStats};
use crate::transport::{TransferTotals, TransportErrorKind};
use html::ResourceKind;
use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};

const MAX_TRANSIENT_RETRIES: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(200);
const MAX_BACKOFF: Duration = Duration::from_millis(800);

/// Exponential backoff (200/400/800ms) with +-20% jitter, per the retry
/// policy in the error taxonomy.
fn backoff_for(attempt: u32) -> Duration {
    let doublings = attempt.saturating_sub(1).min(2);
    let base_millis = (BASE_BACKOFF.as_millis() as u64 * 2u64.saturating_pow(doublings)).min(MAX_BACKOFF.as_millis() as u64);
    let jitter_pct = rand::rng().random_range(-20i64..=20i64);
    let jittered_millis = (base_millis as i64 * (100 + jitter_pct)) / 100;
    Duration::from_millis(jittered_millis.max(0) as u64)
}

fn origin_of(url: &str) -> String {
    url::Url::parse(url).map_or_else(|_| url.to_owned(), |parsed| parsed.origin().ascii_serialization())
}

/// Whether `level` is admitted through C5 (the speculative prefetch queue)
/// rather than the direct admission path.
const fn is_speculative_priority(level: PriorityLevel) -> bool {
    matches!(level, PriorityLevel::Low | PriorityLevel::Lazy)
}

/// Event delivered to milestone subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilestoneEvent {
    Ttfb,
    Dcl,
    Fp,
    Fcp,
    Tti,
    Load,
    Failed,
}

impl From<Milestone> for MilestoneEvent {
    fn from(milestone: Milestone) -> Self {
        match milestone {
            Milestone::Ttfb => Self::Ttfb,
            Milestone::Dcl => Self::Dcl,
            Milestone::Fp => Self::Fp,
            Milestone::Fcp => Self::Fcp,
            Milestone::Tti => Self::Tti,
            Milestone::Load => Self::Load,
            Milestone::Failed => Self::Failed,
        }
    }
}

/// The speculative-navigation/origin prediction feed driving `HintGenerator`.
/// A real embedding would derive this from navigation history; kept as an
/// explicit input here since predicting future navigations is outside this
/// crate's scope.
#[derive(Debug, Default, Clone)]
pub struct PredictionFeed {
    pub origins: Vec<Prediction>,
    pub navigations: Vec<Prediction>,
}

/// Ambient power/data-saver signals, folded into `PolicyContext` on each
/// policy tick.
#[derive(Debug, Clone, Copy)]
struct PowerContext {
    battery_level: f64,
    charging: bool,
}

impl Default for PowerContext {
    fn default() -> Self {
        Self {
            battery_level: 1.0,
            charging: true,
        }
    }
}

struct RetryState {
    attempt: u32,
    retry_not_before: Instant,
}

/// C12: single-owner scheduler core. Not `Clone`: all mutation happens
/// through `&mut self`. An async wrapper is what actually crosses task
/// boundaries, via channel messages, never a shared reference to this type.
pub struct Scheduler {
    config: SchedulerConfig,
    epoch: u64,
    catalog: ResourceCatalog,
    bandwidth: BandwidthMonitor,
    network_profile: NetworkProfile,
    preconnect: PreconnectPool,
    prefetch: PrefetchQueue,
    prioritizer: Prioritizer,
    policy_engine: PolicyEngine,
    settings: PolicySettings,
    hint_generator: HintGenerator,
    page_state: PageStateMachine,
    milestones: MilestoneTracker,
    render_gate: ProgressiveRenderGate,
    counters: ScheduleCounters,
    retries: HashMap<String, RetryState>,
    subscribers: Vec<Box<dyn FnMut(MilestoneEvent) + Send>>,
    predictions: PredictionFeed,
    power: PowerContext,
    save_data: bool,
    layout_complete: bool,
    rendering_in_progress: bool,
}

impl Scheduler {
    #[must_use]
    pub fn new(config: SchedulerConfig, initial_url: &str) -> Self {
        let settings = PolicySettings::baseline(config.max_concurrent_connections, config.viewport_boost);
        let prefetch = PrefetchQueue::new(config.prefetch_byte_budget, config.max_concurrent_connections);
        let preconnect = PreconnectPool::new(config.preconnect_expiry, config.max_concurrent_connections);
        let hint_generator = HintGenerator::new(
            config.preconnect_hint_threshold,
            config.dns_prefetch_hint_threshold,
            config.speculation_confidence_threshold,
            &origin_of(initial_url),
        );
        let render_gate = ProgressiveRenderGate::new(config.progressive_min_interval);
        Self {
            preconnect,
            prefetch,
            prioritizer: Prioritizer::new(config.viewport_boost),
            policy_engine: PolicyEngine::new(builtin_policies(), settings),
            hint_generator,
            page_state: PageStateMachine::new(0, initial_url),
            milestones: MilestoneTracker::new(),
            render_gate,
            counters: ScheduleCounters::default(),
            retries: HashMap::new(),
            subscribers: Vec::new(),
            predictions: PredictionFeed::default(),
            power: PowerContext::default(),
            save_data: false,
            layout_complete: false,
            rendering_in_progress: false,
            catalog: ResourceCatalog::new(),
            bandwidth: BandwidthMonitor::new(10.0),
            network_profile: NetworkProfile::new(crate::network_profile::LinkClass::Good),
            settings,
            epoch: 0,
            config,
        }
    }

    /// Register a callback invoked synchronously, in milestone order, on
    /// this scheduler's own task — preserving the ordering guarantee that
    /// milestones for an epoch are dispatched in monotonic time order.
    pub fn subscribe(&mut self, callback: impl FnMut(MilestoneEvent) + Send + 'static) {
        self.subscribers.push(Box::new(callback));
    }

    fn fire(&mut self, milestone: Milestone) {
        let event = MilestoneEvent::from(milestone);
        for subscriber in &mut self.subscribers {
            subscriber(event);
        }
    }

    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn state(&self) -> LoadState {
        self.page_state.state()
    }

    #[must_use]
    pub const fn milestones(&self) -> &MilestoneTracker {
        &self.milestones
    }

    /// Dispatch a single command. This is the scheduler's only mutation
    /// entry point; all twelve components are only ever touched from here.
    ///
    /// # Errors
    /// Returns the first `ScheduleError` hit while processing; the
    /// scheduler itself is left in a consistent state regardless (a failed
    /// mutation is a no-op on the subsystem it targeted).
    pub fn process(&mut self, command: Command) -> Result<(), ScheduleError> {
        match command {
            Command::StartNavigation { url, kind } => self.start_navigation(&url, kind),
            Command::Discover { url, kind, hint } => self.discover(&url, kind, hint),
            Command::RecordByte { url, delta } => self.record_byte(&url, delta),
            Command::CompleteFetch { url, totals } => self.complete_fetch(&url, totals),
            Command::FailFetch { url, message, kind } => self.fail_fetch(&url, &message, kind),
            Command::Hover { url } => self.on_hover(&url),
            Command::Click { url } => self.on_click(&url),
            Command::UpdateNetwork {
                signals,
                save_data,
                battery_level,
                charging,
            } => self.update_network(signals, save_data, battery_level, charging),
            Command::PreconnectResult { origin, outcome } => {
                self.notify_preconnect_result(&origin, outcome);
                Ok(())
            }
            Command::TickPolicies => self.tick_policies(),
            Command::Stop => Ok(()),
        }
    }

    /// Resets C1/C5/C10, transitions C9 to Loading, warms the primary
    /// origin, and feeds a policy tick so the initial admission window
    /// reflects the most recently known network conditions.
    ///
    /// # Errors
    /// Propagates a `PageStateMachine` transition error, e.g. `BackForward`
    /// with empty history.
    pub fn start_navigation(&mut self, url: &str, kind: NavigationKind) -> Result<(), ScheduleError> {
        self.epoch += 1;
        self.catalog.reset_epoch(self.epoch);
        self.prefetch = PrefetchQueue::new(self.config.prefetch_byte_budget, self.settings.prefetch_concurrency.max(1));
        self.milestones = MilestoneTracker::new();
        self.render_gate = ProgressiveRenderGate::new(self.config.progressive_min_interval);
        self.layout_complete = false;
        self.rendering_in_progress = false;
        self.retries.clear();

        self.page_state.start_navigation(self.epoch, url, kind)?;
        self.preconnect.preconnect(&origin_of(url), Instant::now());
        ScheduleCounters::incr(&self.counters.preconnects_started);
        self.tick_policies()
    }

    /// Admit a discovered resource: prioritize it, insert it into the
    /// catalog, record a dependent edge on its parent if one was given, and
    /// route it into either the direct admission path or C5 (the speculative
    /// prefetch queue) depending on its priority level.
    ///
    /// # Errors
    /// Propagates catalog invariant violations.
    pub fn discover(&mut self, url: &str, kind: ResourceKind, hint: DiscoverHint) -> Result<(), ScheduleError> {
        let ctx = PrioritizationContext {
            in_head: hint.in_head,
            render_blocking: hint.render_blocking,
            in_viewport: hint.in_viewport,
            parser_inserted: hint.parser_inserted,
            async_or_defer: hint.async_or_defer,
            lazy: hint.lazy,
            preload_as: None,
        };
        let priority = self.prioritizer.assign_with_boost(kind, ctx, 0, self.settings.viewport_boost);
        let outcome = self.catalog.insert(url, kind, priority);
        let id = match outcome {
            InsertOutcome::Inserted(id) | InsertOutcome::AlreadyPresent(id) => id,
        };

        if let Some(parent_url) = hint.parent_url.as_deref() {
            if let Some(parent_id) = self.catalog.id_for_url(parent_url) {
                self.catalog.update(parent_id, CatalogMutation::AddDependent(url.to_owned()))?;
            }
        }

        if matches!(outcome, InsertOutcome::AlreadyPresent(_)) {
            return Ok(());
        }

        log::trace!("discovered {url} ({kind:?}), priority level {:?}", priority.level);
        ScheduleCounters::incr(&self.counters.resources_discovered);

        if is_speculative_priority(priority.level) {
            self.enqueue_speculative(id, url, priority)?;
        } else {
            self.catalog.update(id, CatalogMutation::SetState(ResourceState::Queued))?;
        }
        self.admit_ready_resources()
    }

    /// Evaluate C5 admission rules 1-3 for a speculative (Low/Lazy) resource
    /// and apply the outcome to its catalog record. A rejected candidate
    /// moves straight to `Canceled`, since `Queued` can only legally
    /// transition to `Connecting` or `Canceled`.
    fn enqueue_speculative(&mut self, id: RecordId, url: &str, priority: Priority) -> Result<(), ScheduleError> {
        let outcome = self.prefetch.try_enqueue(
            url,
            PrefetchKind::Full,
            priority,
            self.save_data,
            self.config.disable_on_save_data,
            self.settings.speculative_enabled,
        );
        match outcome {
            AdmissionOutcome::Admitted(PrefetchKind::PreconnectOnly) => {
                log::debug!("{}", ScheduleError::BudgetExhausted { url: url.to_owned() });
                ScheduleCounters::incr(&self.counters.prefetches_downgraded);
                self.catalog.update(id, CatalogMutation::SetState(ResourceState::Queued))?;
            }
            AdmissionOutcome::Admitted(PrefetchKind::Full) => {
                self.catalog.update(id, CatalogMutation::SetState(ResourceState::Queued))?;
            }
            AdmissionOutcome::Rejected(reason) => {
                let detail = match reason {
                    AdmissionRejection::SaveData => "save-data active".to_owned(),
                    AdmissionRejection::PolicyForbidsHost => "policy forbids host".to_owned(),
                };
                log::debug!(
                    "{}",
                    ScheduleError::PolicyViolation {
                        url: url.to_owned(),
                        reason: detail
                    }
                );
                self.catalog.update(id, CatalogMutation::SetState(ResourceState::Queued))?;
                self.catalog.update(id, CatalogMutation::SetState(ResourceState::Canceled))?;
                ScheduleCounters::incr(&self.counters.resources_canceled);
            }
        }
        Ok(())
    }

    /// Move `Queued` resources into `Connecting` up to the concurrency cap
    /// (direct path, Critical/Medium/High only), then admit queued
    /// speculative fetches from C5. Critical/High admission is gated by the
    /// bandwidth-utilization throttle; a Critical arrival that finds no free
    /// slot preempts the lowest-priority in-flight speculative fetch.
    fn admit_ready_resources(&mut self) -> Result<(), ScheduleError> {
        let strict_mode = self.settings.high_priority_only
            || self
                .catalog
                .iter_by_state(ResourceState::Queued)
                .chain(self.catalog.iter_by_state(ResourceState::Connecting))
                .chain(self.catalog.iter_by_state(ResourceState::Transferring))
                .any(|(_, record)| record.priority.level == PriorityLevel::Critical);

        let throttled = self.bandwidth.utilization() > 0.85;
        if throttled {
            log::debug!("bandwidth utilization above 0.85, throttling new admissions");
        }

        // iter_by_priority() is already ascending by sort_key, which places
        // Critical (the lowest PriorityLevel discriminant) first, so the
        // admission order below is highest-priority-first without reversal.
        let candidates: Vec<_> = self
            .catalog
            .iter_by_priority()
            .into_iter()
            .filter(|(_, record)| record.state == ResourceState::Queued)
            .filter(|(_, record)| !is_speculative_priority(record.priority.level))
            .filter(|(_, record)| {
                !strict_mode || matches!(record.priority.level, PriorityLevel::Critical | PriorityLevel::High)
            })
            .filter(|(_, record)| {
                self.retries.get(&record.url).is_none_or(|state| state.retry_not_before <= Instant::now())
            })
            .map(|(id, record)| (id, record.priority.level))
            .collect();

        let in_flight = self
            .catalog
            .iter_by_state(ResourceState::Connecting)
            .chain(self.catalog.iter_by_state(ResourceState::Transferring))
            .count();
        let mut free_slots = if throttled { 0 } else { self.config.max_concurrent_connections.saturating_sub(in_flight) };

        for (id, level) in candidates {
            if free_slots == 0 && level == PriorityLevel::Critical {
                if let Some(canceled_url) = self.prefetch.cancel_lowest_priority() {
                    if let Some(canceled_id) = self.catalog.id_for_url(&canceled_url) {
                        if matches!(
                            self.catalog.get(canceled_id).map(|record| record.state),
                            Some(ResourceState::Connecting | ResourceState::Transferring)
                        ) {
                            self.catalog.update(canceled_id, CatalogMutation::SetState(ResourceState::Canceled))?;
                            ScheduleCounters::incr(&self.counters.resources_canceled);
                            free_slots += 1;
                        }
                    }
                }
            }
            if free_slots == 0 {
                break;
            }
            self.catalog.update(id, CatalogMutation::SetState(ResourceState::Connecting))?;
            free_slots -= 1;
        }

        if self.settings.prefetch_enabled && self.settings.speculative_enabled && !strict_mode && !throttled {
            while let Some((url, _kind)) = self.prefetch.admit_next() {
                if let Some(speculative_id) = self.catalog.id_for_url(&url) {
                    if self.catalog.get(speculative_id).is_some_and(|record| record.state == ResourceState::Queued) {
                        self.catalog.update(speculative_id, CatalogMutation::SetState(ResourceState::Connecting))?;
                    }
                }
                log::debug!("admitted speculative fetch {url}");
                ScheduleCounters::incr(&self.counters.prefetches_admitted);
            }
        }
        Ok(())
    }

    /// Whether any of `id`'s dependents are currently `Transferring`,
    /// meaning a render-blocking `id` must not be requeued yet (invariant
    /// iv).
    fn has_transferring_dependents(&self, id: RecordId) -> bool {
        let Some(record) = self.catalog.get(id) else {
            return false;
        };
        record.dependents.iter().any(|dep_url| {
            self.catalog
                .id_for_url(dep_url)
                .and_then(|dep_id| self.catalog.get(dep_id))
                .is_some_and(|dep| dep.state == ResourceState::Transferring)
        })
    }

    /// # Errors
    /// Propagates catalog invariant violations.
    pub fn record_byte(&mut self, url: &str, delta: u64) -> Result<(), ScheduleError> {
        let Some(id) = self.catalog.id_for_url(url) else {
            return Ok(());
        };
        self.catalog.update(id, CatalogMutation::RecordFirstByte)?;
        self.catalog.update(id, CatalogMutation::RecordBytes { delta, total: None })?;
        ScheduleCounters::add(&self.counters.bytes_transferred, delta);

        let is_main_document = self.catalog.get(id).is_some_and(|record| record.kind == ResourceKind::Html);
        if is_main_document && self.milestones.record(Milestone::Ttfb, Instant::now()) {
            self.fire(Milestone::Ttfb);
        }
        Ok(())
    }

    /// # Errors
    /// Propagates catalog invariant violations.
    pub fn complete_fetch(&mut self, url: &str, totals: TransferTotals) -> Result<(), ScheduleError> {
        let Some(id) = self.catalog.id_for_url(url) else {
            return Ok(());
        };
        let kind = self.catalog.get(id).map(|record| record.kind);
        if self.catalog.get(id).is_some_and(|record| record.state == ResourceState::Connecting) {
            self.catalog.update(id, CatalogMutation::SetState(ResourceState::Transferring))?;
        }
        self.catalog.update(id, CatalogMutation::SetState(ResourceState::Loaded))?;
        if let Some(mime) = totals.mime {
            self.catalog.update(id, CatalogMutation::SetMime(mime))?;
        }
        self.retries.remove(url);
        self.prefetch.complete(url, totals.bytes);
        self.bandwidth.record_sample(totals.bytes, Duration::from_millis(1));
        ScheduleCounters::incr(&self.counters.resources_loaded);

        if kind == Some(ResourceKind::Html) && self.milestones.record(Milestone::Fp, Instant::now()) {
            self.fire(Milestone::Fp);
        }
        self.maybe_complete_load()?;
        self.maybe_render_intermediate();
        Ok(())
    }

    fn maybe_complete_load(&mut self) -> Result<(), ScheduleError> {
        let any_critical_outstanding = self.catalog.iter_by_priority().into_iter().any(|(_, record)| {
            record.priority.level == PriorityLevel::Critical
                && !matches!(record.state, ResourceState::Loaded | ResourceState::Failed | ResourceState::Canceled)
        });

        if !any_critical_outstanding && self.page_state.state() == LoadState::Interactive {
            self.page_state.on_load_dispatched()?;
            if self.milestones.record(Milestone::Load, Instant::now()) {
                self.fire(Milestone::Load);
            }
        }
        Ok(())
    }

    fn maybe_render_intermediate(&mut self) {
        let critical_loaded = !self.catalog.iter_by_priority().into_iter().any(|(_, record)| {
            record.priority.level == PriorityLevel::Critical && !matches!(record.state, ResourceState::Loaded | ResourceState::Failed)
        });
        let ctx = RenderGateContext {
            progressive_enabled: self.config.progressive_enabled,
            layout_complete: self.layout_complete,
            critical_resources_loaded: critical_loaded,
            rendering_in_progress: self.rendering_in_progress,
        };
        if self.render_gate.should_render_intermediate(ctx, Instant::now()) && self.milestones.record(Milestone::Fcp, Instant::now()) {
            self.fire(Milestone::Fcp);
        }
    }

    /// Signal that the layout solver has produced a complete layout,
    /// making intermediate rendering eligible.
    pub fn notify_layout_complete(&mut self) {
        self.layout_complete = true;
        self.maybe_render_intermediate();
    }

    /// Mark a rasterizer pass as started/finished, so the gate doesn't
    /// queue overlapping paint requests.
    pub fn notify_render_started(&mut self) {
        self.rendering_in_progress = true;
    }

    pub fn notify_render_finished(&mut self) {
        self.rendering_in_progress = false;
        self.maybe_render_intermediate();
    }

    /// The `DomBuilder` fired `DOMContentLoaded`.
    ///
    /// # Errors
    /// Propagates a `PageStateMachine` transition error.
    pub fn notify_dom_content_loaded(&mut self) -> Result<(), ScheduleError> {
        self.page_state.on_dom_content_loaded()?;
        if self.milestones.record(Milestone::Dcl, Instant::now()) {
            self.fire(Milestone::Dcl);
        }
        Ok(())
    }

    /// Evaluate whether the TTI quiet window has elapsed; intended to be
    /// polled by the embedder's idle callback. Also sweeps expired/timed-out
    /// preconnects, fails any request past `request_timeout`, and re-runs
    /// admission so retries whose backoff has elapsed get a chance to start.
    ///
    /// # Errors
    /// Propagates catalog invariant violations hit while expiring timed-out
    /// requests or re-admitting resources.
    pub fn notify_tick(&mut self, now: Instant, long_task: bool, in_flight_requests: usize) -> Result<(), ScheduleError> {
        self.milestones.note_activity(now, long_task, in_flight_requests);
        if self.milestones.maybe_record_tti(now) {
            self.fire(Milestone::Tti);
        }
        self.preconnect.sweep_expired(now);
        self.preconnect.sweep_timeouts(now, self.config.preconnect_timeout);
        self.expire_timed_out_requests(now)?;
        self.admit_ready_resources()
    }

    /// Fail any `Connecting`/`Transferring` resource whose `request_timeout`
    /// has elapsed since it started, so a stalled transfer doesn't hold its
    /// slot forever.
    fn expire_timed_out_requests(&mut self, now: Instant) -> Result<(), ScheduleError> {
        let timed_out: Vec<(String, u64)> = self
            .catalog
            .iter_by_state(ResourceState::Connecting)
            .chain(self.catalog.iter_by_state(ResourceState::Transferring))
            .filter_map(|(_, record)| {
                let requested_at = record.requested_at?;
                let elapsed = now.saturating_duration_since(requested_at);
                (elapsed >= self.config.request_timeout).then(|| (record.url.clone(), elapsed.as_millis() as u64))
            })
            .collect();

        for (url, millis) in timed_out {
            log::warn!("{}", ScheduleError::Timeout { url: url.clone(), millis });
            self.fail_fetch(&url, "request timed out", TransportErrorKind::Transient)?;
        }
        Ok(())
    }

    /// A preconnect attempt reported success or failure from the network
    /// layer.
    pub fn notify_preconnect_result(&mut self, origin: &str, outcome: PreconnectOutcome) {
        match outcome {
            PreconnectOutcome::Warm => self.preconnect.report_warm(origin, Instant::now()),
            PreconnectOutcome::Failed => self.preconnect.report_failed(origin, Instant::now()),
        }
    }

    /// The parser reported a fatal error for the main document or a
    /// subresource.
    ///
    /// # Errors
    /// Propagates a `PageStateMachine` transition error when `main_document`
    /// is set.
    pub fn notify_parse_error(&mut self, url: &str, message: &str, main_document: bool) -> Result<(), ScheduleError> {
        let parse_error = if main_document {
            ScheduleError::ParseErrorDoc { message: message.to_owned() }
        } else {
            ScheduleError::ParseErrorSub {
                url: url.to_owned(),
                message: message.to_owned(),
            }
        };
        log::warn!("{parse_error}");

        if let Some(id) = self.catalog.id_for_url(url) {
            if matches!(
                self.catalog.get(id).map(|record| record.state),
                Some(ResourceState::Connecting | ResourceState::Transferring)
            ) {
                self.catalog.update(id, CatalogMutation::Fail(message.to_owned()))?;
                ScheduleCounters::incr(&self.counters.resources_failed);
            }
        }

        if main_document {
            self.page_state.on_fatal_error()?;
            if self.milestones.record(Milestone::Failed, Instant::now()) {
                self.fire(Milestone::Failed);
            }
        }
        Ok(())
    }

    /// Restore a previously captured [`PageStateSnapshot`].
    ///
    /// # Errors
    /// Returns `IncompatibleSnapshot` if the snapshot's version isn't
    /// supported, or `IllegalTransition` if the page hasn't yet reached
    /// `Interactive`.
    pub fn restore_snapshot(&mut self, snapshot: PageStateSnapshot, nav_kind: NavigationKind) -> Result<(), ScheduleError> {
        let page_state = snapshot.into_page_state(nav_kind)?;
        self.page_state.restore_state(page_state)
    }

    /// Every failure — transient or permanent — first transitions the
    /// record to `Failed`, matching the state diagram's requirement that
    /// `Failed -> Queued` is the only path back to retrying; a transient
    /// failure within the retry budget is then requeued behind a jittered
    /// backoff delay rather than retried immediately. A render-blocking
    /// resource with dependents still `Transferring` is left `Failed`
    /// rather than requeued, since requeuing it would violate invariant
    /// (iv).
    ///
    /// # Errors
    /// Propagates catalog invariant violations or a fatal page failure.
    pub fn fail_fetch(&mut self, url: &str, message: &str, kind: TransportErrorKind) -> Result<(), ScheduleError> {
        let Some(id) = self.catalog.id_for_url(url) else {
            return Ok(());
        };
        let is_main_document = self.catalog.get(id).is_some_and(|record| record.kind == ResourceKind::Html);
        let render_blocking = self.catalog.get(id).is_some_and(|record| record.priority.render_blocking);

        let typed_error = if kind == TransportErrorKind::Transient {
            ScheduleError::NetworkTransient {
                url: url.to_owned(),
                message: message.to_owned(),
            }
        } else {
            ScheduleError::NetworkPermanent {
                url: url.to_owned(),
                message: message.to_owned(),
            }
        };
        log::warn!("{typed_error}");

        self.catalog.update(id, CatalogMutation::Fail(message.to_owned()))?;
        self.prefetch.remove(url);

        let blocked_by_dependents = render_blocking && self.has_transferring_dependents(id);
        if kind == TransportErrorKind::Transient && !blocked_by_dependents {
            let attempt = self.retries.get(url).map_or(1, |state| state.attempt + 1);
            if attempt <= MAX_TRANSIENT_RETRIES {
                ScheduleCounters::incr(&self.counters.retries_attempted);
                let backoff = backoff_for(attempt);
                self.retries.insert(
                    url.to_owned(),
                    RetryState {
                        attempt,
                        retry_not_before: Instant::now() + backoff,
                    },
                );
                self.catalog.update(id, CatalogMutation::Retry)?;
                log::debug!("retrying {url} (attempt {attempt}) after {backoff:?}");

                let priority = self.catalog.get(id).map(|record| record.priority);
                if let Some(priority) = priority {
                    if is_speculative_priority(priority.level) {
                        self.prefetch.try_enqueue(
                            url,
                            PrefetchKind::Full,
                            priority,
                            self.save_data,
                            self.config.disable_on_save_data,
                            self.settings.speculative_enabled,
                        );
                    }
                }
                return Ok(());
            }
        }

        ScheduleCounters::incr(&self.counters.resources_failed);
        self.retries.remove(url);

        if is_main_document {
            self.page_state.on_fatal_error()?;
            if self.milestones.record(Milestone::Failed, Instant::now()) {
                self.fire(Milestone::Failed);
            }
        }
        Ok(())
    }

    /// # Errors
    /// Never fails; returns `Result` for uniformity with `process`.
    pub fn on_hover(&mut self, url: &str) -> Result<(), ScheduleError> {
        self.preconnect.preconnect(&origin_of(url), Instant::now());
        Ok(())
    }

    /// # Errors
    /// Never fails; returns `Result` for uniformity with `process`.
    pub fn on_click(&mut self, url: &str) -> Result<(), ScheduleError> {
        self.predictions.navigations.push(Prediction {
            target: url.to_owned(),
            confidence: 1.0,
        });
        Ok(())
    }

    /// # Errors
    /// Propagates catalog invariant violations from the policy re-admission
    /// pass.
    pub fn update_network(&mut self, signals: LinkSignals, save_data: bool, battery_level: f64, charging: bool) -> Result<(), ScheduleError> {
        self.network_profile.evaluate(signals, Instant::now());
        self.save_data = save_data;
        self.power = PowerContext { battery_level, charging };
        self.tick_policies()
    }

    /// Evaluate policies against the current context and apply effects to
    /// scheduler settings, then re-run admission under the new settings.
    ///
    /// # Errors
    /// Propagates catalog invariant violations hit while re-admitting
    /// resources under new settings.
    pub fn tick_policies(&mut self) -> Result<(), ScheduleError> {
        let _span = tracing::info_span!("tick_policies", epoch = self.epoch).entered();
        let ctx = PolicyContext {
            link_class: self.network_profile.current(),
            downlink_mbps: self.bandwidth.available_bps() * 8.0 / 1_000_000.0,
            save_data: self.save_data,
            charging: self.power.charging,
            battery_level: self.power.battery_level,
            any_critical_outstanding: self.page_state.state() != LoadState::Complete,
        };
        self.settings = self.policy_engine.evaluate(&ctx);
        ScheduleCounters::incr(&self.counters.policy_ticks);
        log::debug!(
            "policy tick: prefetch_enabled={} speculative_enabled={} high_priority_only={}",
            self.settings.prefetch_enabled,
            self.settings.speculative_enabled,
            self.settings.high_priority_only,
        );

        let stats = self.counters.snapshot();
        if let Err(err) = maybe_emit(self.config.telemetry_enabled, &stats) {
            log::warn!("failed to serialize telemetry snapshot: {err}");
        }
        self.admit_ready_resources()
    }

    #[must_use]
    pub fn snapshot(&self) -> PageStateSnapshot {
        PageStateSnapshot::from_page_state(self.page_state.current_page())
    }

    #[must_use]
    pub fn stats(&self) -> ScheduleStats {
        self.counters.snapshot()
    }

    #[must_use]
    pub fn hints(&self) -> Vec<ResourceHint> {
        let mut hints = self.hint_generator.preload_hints(&self.catalog);
        hints.extend(self.hint_generator.preconnect_hints(&self.predictions.origins));
        hints.extend(self.hint_generator.dns_prefetch_hints(&self.predictions.origins));
        hints.extend(self.hint_generator.prefetch_hints(&self.predictions.navigations));
        hints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hint(render_blocking: bool) -> DiscoverHint {
        DiscoverHint {
            render_blocking,
            in_head: render_blocking,
            parser_inserted: true,
            async_or_defer: false,
            in_viewport: false,
            lazy: false,
            parent_url: None,
        }
    }

    fn lazy_hint() -> DiscoverHint {
        DiscoverHint {
            render_blocking: false,
            in_head: false,
            parser_inserted: false,
            async_or_defer: false,
            in_viewport: false,
            lazy: true,
            parent_url: None,
        }
    }

    #[test]
    fn s1_simple_page_fires_milestones_in_order() -> Result<(), ScheduleError> {
        let mut scheduler = Scheduler::new(SchedulerConfig::default(), "http://ex/");
        scheduler.start_navigation("http://ex/", NavigationKind::Navigate)?;
        scheduler.discover("http://ex/", ResourceKind::Html, hint(true))?;
        scheduler.record_byte("http://ex/", 1_500)?;
        scheduler.notify_dom_content_loaded()?;
        scheduler.complete_fetch(
            "http://ex/",
            TransferTotals {
                bytes: 1_500,
                mime: Some("text/html".to_owned()),
            },
        )?;
        scheduler.notify_layout_complete();

        let order: Vec<_> = scheduler.milestones().ordered().into_iter().map(|(milestone, _)| milestone).collect();
        assert!(order.contains(&Milestone::Ttfb));
        assert!(order.contains(&Milestone::Dcl));
        assert!(order.contains(&Milestone::Fp));
        assert!(order.contains(&Milestone::Load));
        Ok(())
    }

    #[test]
    fn s2_exhausting_retries_on_the_main_document_fails_the_page() -> Result<(), ScheduleError> {
        let mut scheduler = Scheduler::new(SchedulerConfig::default(), "http://ex/");
        scheduler.start_navigation("http://ex/", NavigationKind::Navigate)?;
        scheduler.discover("http://ex/", ResourceKind::Html, hint(true))?;
        let mut now = Instant::now();
        for _ in 0..=MAX_TRANSIENT_RETRIES {
            scheduler.fail_fetch("http://ex/", "connection reset", TransportErrorKind::Transient)?;
            now += Duration::from_secs(2);
            scheduler.notify_tick(now, false, 0)?;
        }
        assert_eq!(scheduler.state(), LoadState::Failed);
        Ok(())
    }

    #[test]
    fn s3_back_forward_restores_prior_url() -> Result<(), ScheduleError> {
        let mut scheduler = Scheduler::new(SchedulerConfig::default(), "http://ex/a");
        scheduler.start_navigation("http://ex/a", NavigationKind::Navigate)?;
        scheduler.start_navigation("http://ex/b", NavigationKind::Navigate)?;
        scheduler.start_navigation("http://ex/b", NavigationKind::BackForward)?;
        assert_eq!(scheduler.snapshot().url(), "http://ex/a");
        Ok(())
    }

    #[test]
    fn s4_each_navigation_isolates_the_previous_epoch() -> Result<(), ScheduleError> {
        let mut scheduler = Scheduler::new(SchedulerConfig::default(), "http://ex/a");
        scheduler.start_navigation("http://ex/a", NavigationKind::Navigate)?;
        scheduler.discover("http://ex/a/app.js", ResourceKind::Script, hint(true))?;
        let first_epoch = scheduler.epoch();
        scheduler.start_navigation("http://ex/b", NavigationKind::Navigate)?;
        assert_ne!(scheduler.epoch(), first_epoch);
        assert!(scheduler.catalog.id_for_url("http://ex/a/app.js").is_none());
        Ok(())
    }

    #[test]
    fn s5_save_data_policy_tick_disables_prefetch_admission() -> Result<(), ScheduleError> {
        let mut scheduler = Scheduler::new(SchedulerConfig::default(), "http://ex/");
        scheduler.start_navigation("http://ex/", NavigationKind::Navigate)?;
        scheduler.update_network(
            LinkSignals {
                downlink_mbps: 5.0,
                rtt_ms: 50.0,
                jitter_ms: 5.0,
                loss: 0.0,
            },
            true,
            1.0,
            true,
        )?;
        assert!(!scheduler.settings.prefetch_enabled);

        // With prefetch disabled by save-data, a freshly discovered Lazy
        // image is rejected by C5 outright rather than merely left Queued.
        scheduler.discover("http://ex/lazy.png", ResourceKind::Image, lazy_hint())?;
        let id = scheduler.catalog.id_for_url("http://ex/lazy.png");
        assert!(id.is_some_and(|id| scheduler.catalog.get(id).is_some_and(|record| record.state == ResourceState::Canceled)));
        Ok(())
    }

    #[test]
    fn prefetch_budget_exhaustion_downgrades_subsequent_admission() -> Result<(), ScheduleError> {
        let mut config = SchedulerConfig::new(10, 100);
        config.disable_on_save_data = false;
        let mut scheduler = Scheduler::new(config, "http://ex/");
        scheduler.start_navigation("http://ex/", NavigationKind::Navigate)?;
        scheduler.discover("http://ex/a.png", ResourceKind::Image, lazy_hint())?;
        scheduler.complete_fetch(
            "http://ex/a.png",
            TransferTotals {
                bytes: 500,
                mime: None,
            },
        )?;
        scheduler.discover("http://ex/b.png", ResourceKind::Image, lazy_hint())?;
        assert!(scheduler.stats().prefetches_downgraded >= 1);
        Ok(())
    }

    #[test]
    fn critical_arrival_preempts_lowest_priority_in_flight_prefetch() -> Result<(), ScheduleError> {
        let mut config = SchedulerConfig::new(10, 10_000_000);
        config.disable_on_save_data = false;
        let mut scheduler = Scheduler::new(config, "http://ex/");
        scheduler.start_navigation("http://ex/", NavigationKind::Navigate)?;
        for i in 0..10 {
            scheduler.discover(&format!("http://ex/img{i}.png"), ResourceKind::Image, lazy_hint())?;
        }
        assert_eq!(scheduler.stats().prefetches_admitted, 10);

        scheduler.discover("http://ex/app.js", ResourceKind::Script, hint(true))?;
        assert_eq!(scheduler.stats().resources_canceled, 1);
        let script_id = scheduler.catalog.id_for_url("http://ex/app.js");
        assert!(script_id.is_some_and(|id| scheduler.catalog.get(id).is_some_and(|record| record.state == ResourceState::Connecting)));
        Ok(())
    }

    #[test]
    fn discover_with_parent_url_wires_dependent_edge() -> Result<(), anyhow::Error> {
        let mut scheduler = Scheduler::new(SchedulerConfig::default(), "http://ex/");
        scheduler.start_navigation("http://ex/", NavigationKind::Navigate)?;
        scheduler.discover("http://ex/", ResourceKind::Html, hint(true))?;
        let mut child_hint = hint(false);
        child_hint.parent_url = Some("http://ex/".to_owned());
        scheduler.discover("http://ex/app.js", ResourceKind::Script, child_hint)?;

        let parent_id = scheduler.catalog.id_for_url("http://ex/").ok_or_else(|| anyhow::anyhow!("missing parent"))?;
        let dependents = scheduler.catalog.get(parent_id).map(|record| record.dependents.clone()).unwrap_or_default();
        assert!(dependents.iter().any(|dep| dep.as_str() == "http://ex/app.js"));
        Ok(())
    }

    #[test]
    fn restore_snapshot_round_trips_after_interactive() -> Result<(), anyhow::Error> {
        let mut scheduler = Scheduler::new(SchedulerConfig::default(), "http://ex/");
        scheduler.start_navigation("http://ex/", NavigationKind::Navigate)?;
        scheduler.notify_dom_content_loaded()?;
        let snapshot = scheduler.snapshot();
        let json = snapshot.to_json()?;
        let restored = PageStateSnapshot::from_json(&json)?;
        scheduler.restore_snapshot(restored, NavigationKind::Reload)?;
        assert_eq!(scheduler.snapshot().url(), "http://ex/");
        Ok(())
    }

    #[test]
    fn notify_tick_expires_requests_past_request_timeout() -> Result<(), anyhow::Error> {
        let mut config = SchedulerConfig::default();
        config.request_timeout = Duration::from_millis(10);
        let mut scheduler = Scheduler::new(config, "http://ex/");
        scheduler.start_navigation("http://ex/", NavigationKind::Navigate)?;
        scheduler.discover("http://ex/", ResourceKind::Html, hint(true))?;
        let id = scheduler.catalog.id_for_url("http://ex/").ok_or_else(|| anyhow::anyhow!("missing record"))?;
        assert_eq!(scheduler.catalog.get(id).map(|record| record.state), Some(ResourceState::Connecting));

        scheduler.notify_tick(Instant::now() + Duration::from_millis(50), false, 0)?;
        assert_eq!(scheduler.stats().retries_attempted, 1);
        Ok(())
    }

    #[test]
    fn notify_tick_fails_a_preconnect_that_never_resolves() -> Result<(), anyhow::Error> {
        let mut config = SchedulerConfig::default();
        config.preconnect_timeout = Duration::from_millis(5);
        let mut scheduler = Scheduler::new(config, "http://ex/");
        scheduler.start_navigation("http://ex/", NavigationKind::Navigate)?;

        scheduler.notify_tick(Instant::now() + Duration::from_millis(50), false, 0)?;
        assert!(matches!(
            scheduler.preconnect.state("http://ex"),
            crate::preconnect::OriginState::Failed { .. }
        ));
        Ok(())
    }
}
