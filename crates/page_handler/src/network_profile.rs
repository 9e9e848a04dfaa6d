//! C3 — `NetworkProfile`: classifies the current link quality from
//! throughput/RTT/jitter/loss, debounced against flapping.

use std::time::{Duration, Instant};

/// Link quality classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkClass {
    Excellent,
    Good,
    Moderate,
    Poor,
    Offline,
}

/// Raw signals used to score link quality.
#[derive(Debug, Clone, Copy)]
pub struct LinkSignals {
    pub downlink_mbps: f64,
    pub rtt_ms: f64,
    pub jitter_ms: f64,
    pub loss: f64,
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Score the given signals on a 0-100 scale per the documented formula.
#[must_use]
pub fn score(signals: LinkSignals) -> f64 {
    if signals.downlink_mbps <= 0.0 {
        return 0.0;
    }
    40.0 * (signals.downlink_mbps / 10.0).min(1.0)
        + 30.0 * clamp01(1.0 - (signals.rtt_ms - 10.0) / 490.0)
        + 15.0 * clamp01(1.0 - signals.jitter_ms / 100.0)
        + 15.0 * clamp01(1.0 - 10.0 * signals.loss)
}

#[must_use]
pub fn classify_score(score: f64) -> LinkClass {
    if score >= 85.0 {
        LinkClass::Excellent
    } else if score >= 65.0 {
        LinkClass::Good
    } else if score >= 40.0 {
        LinkClass::Moderate
    } else if score > 0.0 {
        LinkClass::Poor
    } else {
        LinkClass::Offline
    }
}

const DEBOUNCE_WINDOW: Duration = Duration::from_secs(10);

/// C3: holds the currently-effective class plus a debounce window requiring
/// a candidate class to hold across two evaluations at least 10 s apart
/// before the scheduler reacts to the transition.
#[derive(Debug)]
pub struct NetworkProfile {
    effective: LinkClass,
    pending: Option<(LinkClass, Instant)>,
}

impl NetworkProfile {
    #[must_use]
    pub const fn new(initial: LinkClass) -> Self {
        Self {
            effective: initial,
            pending: None,
        }
    }

    #[must_use]
    pub const fn current(&self) -> LinkClass {
        self.effective
    }

    /// Evaluate new signals. Returns `true` if the effective class changed.
    pub fn evaluate(&mut self, signals: LinkSignals, now: Instant) -> bool {
        let candidate = classify_score(score(signals));
        if candidate == self.effective {
            self.pending = None;
            return false;
        }
        match self.pending {
            Some((pending_class, observed_at)) if pending_class == candidate => {
                if now.duration_since(observed_at) >= DEBOUNCE_WINDOW {
                    self.effective = candidate;
                    self.pending = None;
                    true
                } else {
                    false
                }
            }
            _ => {
                self.pending = Some((candidate, now));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(downlink: f64, rtt: f64) -> LinkSignals {
        LinkSignals {
            downlink_mbps: downlink,
            rtt_ms: rtt,
            jitter_ms: 0.0,
            loss: 0.0,
        }
    }

    #[test]
    fn excellent_link_scores_at_ceiling() {
        let class = classify_score(score(signals(10.0, 10.0)));
        assert_eq!(class, LinkClass::Excellent);
    }

    #[test]
    fn zero_downlink_is_offline() {
        let class = classify_score(score(signals(0.0, 10.0)));
        assert_eq!(class, LinkClass::Offline);
    }

    #[test]
    fn transition_requires_two_evaluations_ten_seconds_apart() {
        let mut profile = NetworkProfile::new(LinkClass::Excellent);
        let t0 = Instant::now();
        let poor = signals(0.8, 600.0);
        assert!(!profile.evaluate(poor, t0));
        assert_eq!(profile.current(), LinkClass::Excellent);
        // Too soon: still Excellent.
        assert!(!profile.evaluate(poor, t0 + Duration::from_secs(2)));
        assert_eq!(profile.current(), LinkClass::Excellent);
        // Past the debounce window: transition commits.
        assert!(profile.evaluate(poor, t0 + Duration::from_secs(11)));
        assert_eq!(profile.current(), LinkClass::Poor);
    }

    #[test]
    fn a_third_differing_candidate_resets_the_debounce_timer() {
        let mut profile = NetworkProfile::new(LinkClass::Excellent);
        let t0 = Instant::now();
        assert!(!profile.evaluate(signals(0.8, 600.0), t0));
        assert!(!profile.evaluate(signals(5.0, 50.0), t0 + Duration::from_secs(5)));
        assert_eq!(profile.current(), LinkClass::Excellent);
    }
}
