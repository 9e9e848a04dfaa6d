//! C8 — `HintGenerator`: emits preload / preconnect / prefetch /
//! dns-prefetch hints from current catalog state, capped per tick.

use crate::catalog::{PriorityLevel, ResourceCatalog, ResourceState};
use html::ResourceKind;

const MAX_PRELOAD: usize = 10;
const MAX_PRECONNECT: usize = 8;
const MAX_PREFETCH: usize = 5;
const MAX_DNS_PREFETCH: usize = 10;

/// A single emitted hint.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceHint {
    Preload { url: String, crossorigin: bool },
    Preconnect { origin: String, crossorigin: bool },
    Prefetch { url: String, crossorigin: bool },
    DnsPrefetch { origin: String },
}

/// A predicted origin or navigation target with a confidence in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub target: String,
    pub confidence: f32,
}

fn preloadable_kind(kind: ResourceKind) -> bool {
    matches!(kind, ResourceKind::Font | ResourceKind::Css | ResourceKind::Script)
}

/// C8: stateless generator, driven by a read view of the catalog plus
/// predicted origins/navigations from the bandwidth/network subsystems.
#[derive(Debug, Default)]
pub struct HintGenerator {
    preconnect_threshold: f32,
    dns_prefetch_threshold: f32,
    speculation_threshold: f32,
    document_origin: String,
}

impl HintGenerator {
    #[must_use]
    pub fn new(preconnect_threshold: f32, dns_prefetch_threshold: f32, speculation_threshold: f32, document_origin: &str) -> Self {
        Self {
            preconnect_threshold,
            dns_prefetch_threshold,
            speculation_threshold,
            document_origin: document_origin.to_owned(),
        }
    }

    fn crossorigin(&self, target_origin: &str) -> bool {
        target_origin != self.document_origin
    }

    /// Preload hints for Critical/High resources of preloadable kinds that
    /// have not started transferring yet.
    #[must_use]
    pub fn preload_hints(&self, catalog: &ResourceCatalog) -> Vec<ResourceHint> {
        let mut records = catalog
            .iter_by_state(ResourceState::Discovered)
            .chain(catalog.iter_by_state(ResourceState::Queued))
            .filter(|(_, record)| {
                matches!(record.priority.level, PriorityLevel::Critical | PriorityLevel::High)
                    && preloadable_kind(record.kind)
            })
            .collect::<Vec<_>>();
        records.sort_by_key(|(_, record)| record.priority);
        records
            .into_iter()
            .take(MAX_PRELOAD)
            .map(|(_, record)| ResourceHint::Preload {
                url: record.url.clone(),
                crossorigin: self.crossorigin(&record.origin),
            })
            .collect()
    }

    /// Preconnect hints for predicted origins at or above the configured
    /// likelihood threshold.
    #[must_use]
    pub fn preconnect_hints(&self, predictions: &[Prediction]) -> Vec<ResourceHint> {
        predictions
            .iter()
            .filter(|prediction| prediction.confidence >= self.preconnect_threshold)
            .take(MAX_PRECONNECT)
            .map(|prediction| ResourceHint::Preconnect {
                crossorigin: self.crossorigin(&prediction.target),
                origin: prediction.target.clone(),
            })
            .collect()
    }

    /// DNS-prefetch hints for origins between the dns and preconnect
    /// thresholds (a weaker signal than preconnect-worthy).
    #[must_use]
    pub fn dns_prefetch_hints(&self, predictions: &[Prediction]) -> Vec<ResourceHint> {
        predictions
            .iter()
            .filter(|prediction| {
                prediction.confidence >= self.dns_prefetch_threshold
                    && prediction.confidence < self.preconnect_threshold
            })
            .take(MAX_DNS_PREFETCH)
            .map(|prediction| ResourceHint::DnsPrefetch {
                origin: prediction.target.clone(),
            })
            .collect()
    }

    /// Prefetch hints for predicted next-document navigations above the
    /// speculation confidence threshold.
    #[must_use]
    pub fn prefetch_hints(&self, predictions: &[Prediction]) -> Vec<ResourceHint> {
        predictions
            .iter()
            .filter(|prediction| prediction.confidence >= self.speculation_threshold)
            .take(MAX_PREFETCH)
            .map(|prediction| ResourceHint::Prefetch {
                crossorigin: self.crossorigin(&prediction.target),
                url: prediction.target.clone(),
            })
            .collect()
    }
}
