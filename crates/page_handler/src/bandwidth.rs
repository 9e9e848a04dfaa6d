//! C2 — `BandwidthMonitor`: rolling throughput samples feeding an EWMA
//! estimate of current and available bandwidth.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

const MAX_SAMPLES: usize = 30;
const SMOOTHING_FACTOR: f64 = 0.3;
const AVAILABLE_DECAY: f64 = 0.9;

/// A single observed transfer: `bytes` over `duration`.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub timestamp: Instant,
    pub bytes: u64,
    pub duration: Duration,
}

/// Per-resource timing spans, populated when the transport supplies them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceTiming {
    pub dns: Option<Duration>,
    pub connect: Option<Duration>,
    pub tls: Option<Duration>,
    pub request: Option<Duration>,
    pub response: Option<Duration>,
}

/// C2: maintains a ring of recent transfer samples and derives `current_bps`
/// (EWMA, smoothing 0.3) and `available_bps` (seeded from the network
/// context's advertised downlink, decayed towards observed throughput).
#[derive(Debug)]
pub struct BandwidthMonitor {
    samples: VecDeque<Sample>,
    current_bps: f64,
    available_bps: f64,
    timings: Vec<(String, ResourceTiming)>,
}

impl BandwidthMonitor {
    #[must_use]
    pub fn new(seed_downlink_mbps: f64) -> Self {
        Self {
            samples: VecDeque::with_capacity(MAX_SAMPLES),
            current_bps: seed_downlink_mbps * 1_000_000.0 / 8.0,
            available_bps: seed_downlink_mbps * 1_000_000.0 / 8.0,
            timings: Vec::new(),
        }
    }

    /// Record a completed transfer and update the EWMA estimates.
    pub fn record_sample(&mut self, bytes: u64, duration: Duration) {
        if self.samples.len() == MAX_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample {
            timestamp: Instant::now(),
            bytes,
            duration,
        });
        if duration.as_secs_f64() > 0.0 {
            let observed_bps = bytes as f64 / duration.as_secs_f64();
            self.current_bps = SMOOTHING_FACTOR.mul_add(observed_bps, (1.0 - SMOOTHING_FACTOR) * self.current_bps);
            self.available_bps = self.current_bps.max(AVAILABLE_DECAY * self.available_bps);
        }
    }

    /// Record per-resource timing spans for diagnostics.
    pub fn record_timing(&mut self, url: &str, timing: ResourceTiming) {
        self.timings.push((url.to_owned(), timing));
    }

    #[must_use]
    pub fn current_bps(&self) -> f64 {
        self.current_bps
    }

    #[must_use]
    pub fn available_bps(&self) -> f64 {
        self.available_bps
    }

    /// Fraction of available bandwidth currently in use; the scheduler
    /// throttles new admissions above 0.85.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.available_bps <= 0.0 {
            return 0.0;
        }
        (self.current_bps / self.available_bps).min(1.0)
    }

    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_from_downlink() {
        let monitor = BandwidthMonitor::new(10.0);
        assert!((monitor.current_bps() - 1_250_000.0).abs() < 1.0);
    }

    #[test]
    fn recording_samples_moves_current_towards_observed() {
        let mut monitor = BandwidthMonitor::new(1.0);
        for _ in 0..20 {
            monitor.record_sample(10_000_000, Duration::from_secs(1));
        }
        assert!(monitor.current_bps() > 1_000_000.0);
        assert_eq!(monitor.sample_count(), 20);
    }

    #[test]
    fn ring_buffer_caps_at_thirty_samples() {
        let mut monitor = BandwidthMonitor::new(1.0);
        for _ in 0..40 {
            monitor.record_sample(1_000, Duration::from_millis(10));
        }
        assert_eq!(monitor.sample_count(), 30);
    }
}
