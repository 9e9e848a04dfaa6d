//! C4 — `PreconnectPool`: idle, warm origin connections with expiry, at most
//! one warming in flight per origin.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// State of a single origin's connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OriginState {
    Cold,
    Warming { started_at: Instant },
    Warm { expires_at: Instant },
    Failed { retry_after: Instant },
}

/// C4: tracks per-origin connection state. Exclusively owned by the
/// scheduler; `preconnect` is idempotent while an origin is warming.
#[derive(Debug)]
pub struct PreconnectPool {
    origins: HashMap<String, OriginState>,
    expiry: Duration,
    max_concurrent_warming: usize,
}

/// Result of requesting a preconnect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PreconnectRequest {
    /// A new warming attempt was started.
    Started,
    /// The origin was already warming or warm; no new attempt was made.
    AlreadyInProgress,
    /// The warming pool is saturated; the request was dropped.
    Rejected,
}

impl PreconnectPool {
    #[must_use]
    pub fn new(expiry: Duration, max_concurrent_warming: usize) -> Self {
        Self {
            origins: HashMap::new(),
            expiry,
            max_concurrent_warming: max_concurrent_warming.max(1),
        }
    }

    fn warming_count(&self) -> usize {
        self.origins.values().filter(|state| matches!(state, OriginState::Warming { .. })).count()
    }

    /// Request that `origin` be warmed. Idempotent: a second call while
    /// already `Warming` or `Warm` makes no new attempt.
    pub fn preconnect(&mut self, origin: &str, now: Instant) -> PreconnectRequest {
        match self.origins.get(origin) {
            Some(OriginState::Warming { .. }) => PreconnectRequest::AlreadyInProgress,
            Some(OriginState::Warm { expires_at }) if *expires_at > now => {
                PreconnectRequest::AlreadyInProgress
            }
            _ => {
                if self.warming_count() >= self.max_concurrent_warming {
                    return PreconnectRequest::Rejected;
                }
                self.origins.insert(origin.to_owned(), OriginState::Warming { started_at: now });
                PreconnectRequest::Started
            }
        }
    }

    /// Report a successful warm, moving the origin to `Warm` with a fresh
    /// expiry from `now`. Last writer wins if called multiple times.
    pub fn report_warm(&mut self, origin: &str, now: Instant) {
        self.origins.insert(
            origin.to_owned(),
            OriginState::Warm {
                expires_at: now + self.expiry,
            },
        );
    }

    pub fn report_failed(&mut self, origin: &str, retry_after: Instant) {
        self.origins.insert(origin.to_owned(), OriginState::Failed { retry_after });
    }

    #[must_use]
    pub fn state(&self, origin: &str) -> OriginState {
        self.origins.get(origin).copied().unwrap_or(OriginState::Cold)
    }

    /// Sweep expired `Warm` entries back to `Cold`.
    pub fn sweep_expired(&mut self, now: Instant) {
        for state in self.origins.values_mut() {
            if let OriginState::Warm { expires_at } = state {
                if *expires_at <= now {
                    *state = OriginState::Cold;
                }
            }
        }
    }

    /// Sweep origins that have been `Warming` longer than `timeout`,
    /// marking them `Failed` so a caller can retry preconnecting rather
    /// than waiting on a warm that will never arrive.
    pub fn sweep_timeouts(&mut self, now: Instant, timeout: Duration) {
        for state in self.origins.values_mut() {
            if let OriginState::Warming { started_at } = state {
                if now.saturating_duration_since(*started_at) >= timeout {
                    *state = OriginState::Failed { retry_after: now };
                }
            }
        }
    }
}
