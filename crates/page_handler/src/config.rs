//! Runtime configuration for the scheduler.
//!
//! Constructed programmatically via [`SchedulerConfig::new`] (which clamps
//! inputs to sane ranges) or loaded from `PAGE_ENGINE_*` environment
//! variables via [`SchedulerConfig::from_env`].

use core::time::Duration;
use std::env;

/// Tunables for the scheduler and its subsystems.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Maximum concurrent network transfers.
    pub max_concurrent_connections: usize,
    /// Global byte budget for speculative (prefetch) fetches.
    pub prefetch_byte_budget: u64,
    /// Whether prefetching is disabled while `save_data` is signaled.
    pub disable_on_save_data: bool,
    /// Preconnect warm-connection expiry.
    pub preconnect_expiry: Duration,
    /// Preconnect attempt timeout.
    pub preconnect_timeout: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Minimum interval between intermediate (progressive) renders.
    pub progressive_min_interval: Duration,
    /// Whether progressive rendering is enabled at all.
    pub progressive_enabled: bool,
    /// Multiplier applied to priority score for in-viewport resources.
    pub viewport_boost: f32,
    /// Minimum confidence to emit a preconnect hint.
    pub preconnect_hint_threshold: f32,
    /// Minimum confidence to emit a dns-prefetch hint.
    pub dns_prefetch_hint_threshold: f32,
    /// Minimum confidence to speculatively prefetch a predicted navigation.
    pub speculation_confidence_threshold: f32,
    /// Whether to emit telemetry snapshots to the log.
    pub telemetry_enabled: bool,
    /// Command channel capacity.
    pub command_channel_capacity: usize,
}

impl SchedulerConfig {
    /// Build a configuration from explicit values, clamping each to a valid
    /// range rather than accepting nonsensical settings (e.g. zero
    /// concurrency).
    #[must_use]
    pub fn new(max_concurrent_connections: usize, prefetch_byte_budget: u64) -> Self {
        Self {
            max_concurrent_connections: max_concurrent_connections.max(1),
            prefetch_byte_budget,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    ///
    /// - `PAGE_ENGINE_MAX_CONNECTIONS` (default 10)
    /// - `PAGE_ENGINE_PREFETCH_BUDGET_BYTES` (default 2,000,000)
    /// - `PAGE_ENGINE_DISABLE_PREFETCH_ON_SAVE_DATA` (`1` to enable, default enabled)
    /// - `PAGE_ENGINE_PRECONNECT_EXPIRY_MS` (default 45,000)
    /// - `PAGE_ENGINE_REQUEST_TIMEOUT_MS` (default 30,000)
    /// - `PAGE_ENGINE_PROGRESSIVE_MIN_INTERVAL_MS` (default 100)
    /// - `PAGE_ENGINE_TELEMETRY` (`1` to enable, default disabled)
    #[must_use]
    pub fn from_env() -> Self {
        let max_concurrent_connections = env_parse("PAGE_ENGINE_MAX_CONNECTIONS", 10usize).max(1);
        let prefetch_byte_budget = env_parse("PAGE_ENGINE_PREFETCH_BUDGET_BYTES", 2_000_000u64);
        let disable_on_save_data = env::var("PAGE_ENGINE_DISABLE_PREFETCH_ON_SAVE_DATA")
            .ok()
            .map_or(true, |val| val != "0");
        let preconnect_expiry =
            Duration::from_millis(env_parse("PAGE_ENGINE_PRECONNECT_EXPIRY_MS", 45_000u64));
        let preconnect_timeout =
            Duration::from_millis(env_parse("PAGE_ENGINE_PRECONNECT_TIMEOUT_MS", 4_000u64));
        let request_timeout =
            Duration::from_millis(env_parse("PAGE_ENGINE_REQUEST_TIMEOUT_MS", 30_000u64));
        let progressive_min_interval = Duration::from_millis(env_parse(
            "PAGE_ENGINE_PROGRESSIVE_MIN_INTERVAL_MS",
            100u64,
        ));
        let telemetry_enabled = env::var("PAGE_ENGINE_TELEMETRY").ok().as_deref() == Some("1");
        Self {
            max_concurrent_connections,
            prefetch_byte_budget,
            disable_on_save_data,
            preconnect_expiry,
            preconnect_timeout,
            request_timeout,
            progressive_min_interval,
            telemetry_enabled,
            ..Self::default()
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_connections: 10,
            prefetch_byte_budget: 2_000_000,
            disable_on_save_data: true,
            preconnect_expiry: Duration::from_secs(45),
            preconnect_timeout: Duration::from_secs(4),
            request_timeout: Duration::from_secs(30),
            progressive_min_interval: Duration::from_millis(100),
            progressive_enabled: true,
            viewport_boost: 1.5,
            preconnect_hint_threshold: 0.7,
            dns_prefetch_hint_threshold: 0.5,
            speculation_confidence_threshold: 0.7,
            telemetry_enabled: false,
            command_channel_capacity: 1024,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|val| val.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_zero_concurrency_to_one() {
        let config = SchedulerConfig::new(0, 1_000);
        assert_eq!(config.max_concurrent_connections, 1);
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_concurrent_connections, 10);
        assert!((config.viewport_boost - 1.5).abs() < f32::EPSILON);
    }
}
