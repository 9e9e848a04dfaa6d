//! Error taxonomy for the scheduler and its subsystems.

use thiserror::Error;

/// Whether an error is worth retrying automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retriable {
    Yes,
    No,
}

/// Errors the scheduler surfaces to callers or records against a resource.
///
/// Collaborator-originated errors (network, parse, policy) never panic the
/// scheduler; only `IllegalTransition` indicates an internal bug, and is
/// logged-and-recovered in release builds rather than propagated.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("network error for {url}: {message}")]
    NetworkTransient { url: String, message: String },

    #[error("network error for {url}: {message}")]
    NetworkPermanent { url: String, message: String },

    #[error("failed to parse main document: {message}")]
    ParseErrorDoc { message: String },

    #[error("failed to parse subresource {url}: {message}")]
    ParseErrorSub { url: String, message: String },

    #[error("resource {url} rejected by policy: {reason}")]
    PolicyViolation { url: String, reason: String },

    #[error("operation on {url} timed out after {millis} ms")]
    Timeout { url: String, millis: u64 },

    #[error("illegal state transition: {detail}")]
    IllegalTransition { detail: String },

    #[error("prefetch budget exhausted for {url}, downgraded to preconnect-only")]
    BudgetExhausted { url: String },

    #[error("snapshot version {found} is not supported (expected {expected})")]
    IncompatibleSnapshot { found: u32, expected: u32 },
}

impl ScheduleError {
    #[must_use]
    pub const fn retriable(&self) -> Retriable {
        match self {
            Self::NetworkTransient { .. } | Self::Timeout { .. } => Retriable::Yes,
            _ => Retriable::No,
        }
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::NetworkTransient { url, .. }
            | Self::NetworkPermanent { url, .. }
            | Self::ParseErrorSub { url, .. }
            | Self::PolicyViolation { url, .. }
            | Self::Timeout { url, .. }
            | Self::BudgetExhausted { url } => Some(url),
            Self::ParseErrorDoc { .. }
            | Self::IllegalTransition { .. }
            | Self::IncompatibleSnapshot { .. } => None,
        }
    }
}

/// Build an `IllegalTransition` error for a rejected state change, logging
/// it so the violation is visible even where the caller only inspects
/// success/failure (e.g. a command processed fire-and-forget).
#[track_caller]
pub fn illegal_transition(detail: impl Into<String>) -> ScheduleError {
    let detail = detail.into();
    log::error!("illegal transition rejected: {detail}");
    ScheduleError::IllegalTransition { detail }
}
