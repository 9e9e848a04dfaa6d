//! C6 — `Prioritizer`: assigns and recomputes priority from resource kind,
//! viewport membership, render-blocking status, and parser context.

use crate::catalog::{Priority, PriorityLevel};
use html::ResourceKind;

/// Context a resource was discovered under, affecting its base priority.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrioritizationContext {
    pub in_head: bool,
    pub render_blocking: bool,
    pub in_viewport: bool,
    pub parser_inserted: bool,
    pub async_or_defer: bool,
    pub lazy: bool,
    /// Set when discovered via `<link rel=preload as=...>`.
    pub preload_as: Option<ResourceKind>,
}

const VIEWPORT_BOOST: f32 = 1.5;

fn base_level(kind: ResourceKind, ctx: PrioritizationContext) -> PriorityLevel {
    match kind {
        ResourceKind::Html => PriorityLevel::Critical,
        ResourceKind::Css => {
            if ctx.in_head {
                PriorityLevel::Critical
            } else {
                PriorityLevel::High
            }
        }
        ResourceKind::Script => {
            if ctx.render_blocking {
                PriorityLevel::Critical
            } else if ctx.parser_inserted {
                PriorityLevel::High
            } else if ctx.async_or_defer {
                PriorityLevel::Medium
            } else {
                PriorityLevel::High
            }
        }
        ResourceKind::Font => {
            if ctx.render_blocking {
                PriorityLevel::High
            } else {
                PriorityLevel::Medium
            }
        }
        ResourceKind::Image => {
            if ctx.lazy {
                PriorityLevel::Lazy
            } else if ctx.in_viewport {
                PriorityLevel::High
            } else {
                PriorityLevel::Low
            }
        }
        ResourceKind::Media => PriorityLevel::Low,
        ResourceKind::Xhr | ResourceKind::Other => PriorityLevel::Medium,
    }
}

/// C6: derives a [`Priority`] for a resource. Stateless aside from the
/// configured viewport boost, since priority is a pure function of kind and
/// context; the catalog stores the result alongside the record.
#[derive(Debug, Clone, Copy)]
pub struct Prioritizer {
    viewport_boost: f32,
}

impl Prioritizer {
    #[must_use]
    pub const fn new(viewport_boost: f32) -> Self {
        Self { viewport_boost }
    }

    /// Compute a priority for a freshly discovered resource, using the
    /// viewport boost this `Prioritizer` was constructed with.
    #[must_use]
    pub fn assign(&self, kind: ResourceKind, ctx: PrioritizationContext, insertion_seq: u64) -> Priority {
        self.assign_with_boost(kind, ctx, insertion_seq, self.viewport_boost)
    }

    /// Compute a priority for a freshly discovered resource using an
    /// explicit viewport boost, overriding the one fixed at construction.
    /// Lets a caller apply a live `PolicySettings::viewport_boost` (which may
    /// change between ticks) without reconstructing the `Prioritizer`.
    #[must_use]
    pub fn assign_with_boost(
        &self,
        kind: ResourceKind,
        ctx: PrioritizationContext,
        insertion_seq: u64,
        viewport_boost: f32,
    ) -> Priority {
        let level = ctx.preload_as.map_or_else(|| base_level(kind, ctx), |as_kind| base_level(as_kind, ctx));
        let mut score = 1.0_f32;
        if ctx.in_viewport {
            score *= viewport_boost;
        }
        Priority {
            level,
            in_viewport: ctx.in_viewport,
            render_blocking: ctx.render_blocking,
            score,
            insertion_seq,
        }
    }

    /// Recompute priority for a resource whose viewport membership or
    /// render-blocking status changed (e.g. after a layout pass).
    #[must_use]
    pub fn recompute(&self, existing: Priority, kind: ResourceKind, ctx: PrioritizationContext) -> Priority {
        let mut updated = self.assign(kind, ctx, existing.insertion_seq);
        updated.insertion_seq = existing.insertion_seq;
        updated
    }
}

impl Default for Prioritizer {
    fn default() -> Self {
        Self::new(VIEWPORT_BOOST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_is_always_critical() {
        let prioritizer = Prioritizer::default();
        let priority = prioritizer.assign(ResourceKind::Html, PrioritizationContext::default(), 0);
        assert_eq!(priority.level, PriorityLevel::Critical);
    }

    #[test]
    fn head_css_outranks_body_css() {
        let prioritizer = Prioritizer::default();
        let head = prioritizer.assign(
            ResourceKind::Css,
            PrioritizationContext {
                in_head: true,
                ..Default::default()
            },
            0,
        );
        let body = prioritizer.assign(ResourceKind::Css, PrioritizationContext::default(), 1);
        assert!(head.level < body.level);
    }

    #[test]
    fn viewport_boost_raises_score() {
        let prioritizer = Prioritizer::new(2.0);
        let boosted = prioritizer.assign(
            ResourceKind::Image,
            PrioritizationContext {
                in_viewport: true,
                ..Default::default()
            },
            0,
        );
        let plain = prioritizer.assign(ResourceKind::Image, PrioritizationContext::default(), 1);
        assert!(boosted.score > plain.score);
    }

    #[test]
    fn explicit_boost_overrides_constructed_boost() {
        let prioritizer = Prioritizer::new(1.0);
        let ctx = PrioritizationContext {
            in_viewport: true,
            ..Default::default()
        };
        let default_boost = prioritizer.assign(ResourceKind::Image, ctx, 0);
        let overridden = prioritizer.assign_with_boost(ResourceKind::Image, ctx, 1, 3.0);
        assert!(overridden.score > default_boost.score);
    }

    #[test]
    fn lazy_images_rank_below_non_viewport_images() {
        let prioritizer = Prioritizer::default();
        let lazy = prioritizer.assign(
            ResourceKind::Image,
            PrioritizationContext {
                lazy: true,
                ..Default::default()
            },
            0,
        );
        let eager = prioritizer.assign(ResourceKind::Image, PrioritizationContext::default(), 1);
        assert!(lazy.level > eager.level);
    }
}
