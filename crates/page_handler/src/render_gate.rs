//! C11 — `ProgressiveRenderGate`: decides when to request an intermediate
//! paint during loading.

use std::time::{Duration, Instant};

/// Inputs the gate consults on each evaluation.
#[derive(Debug, Clone, Copy)]
pub struct RenderGateContext {
    pub progressive_enabled: bool,
    pub layout_complete: bool,
    pub critical_resources_loaded: bool,
    pub rendering_in_progress: bool,
}

/// C11: debounces intermediate-render requests by a minimum interval,
/// modeled on a frame-budget scheduler: it coalesces repeated eligibility
/// checks within a window rather than firing on every tick.
#[derive(Debug)]
pub struct ProgressiveRenderGate {
    min_interval: Duration,
    last_render: Option<Instant>,
    render_count: u64,
}

impl ProgressiveRenderGate {
    #[must_use]
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_render: None,
            render_count: 0,
        }
    }

    /// Evaluate whether an intermediate render should happen now. If so,
    /// marks the render as having occurred at `now` and increments the
    /// count; callers should treat a `true` result as committing to paint.
    pub fn should_render_intermediate(&mut self, ctx: RenderGateContext, now: Instant) -> bool {
        let eligible = ctx.progressive_enabled
            && ctx.layout_complete
            && ctx.critical_resources_loaded
            && !ctx.rendering_in_progress
            && self.last_render.is_none_or(|last| now.duration_since(last) >= self.min_interval);
        if eligible {
            self.last_render = Some(now);
            self.render_count += 1;
        }
        eligible
    }

    #[must_use]
    pub const fn render_count(&self) -> u64 {
        self.render_count
    }

    /// Whether this would be the first intermediate render, which should
    /// also trigger First Contentful Paint if not already recorded.
    #[must_use]
    pub const fn is_first_render(&self) -> bool {
        self.render_count == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eligible_context() -> RenderGateContext {
        RenderGateContext {
            progressive_enabled: true,
            layout_complete: true,
            critical_resources_loaded: true,
            rendering_in_progress: false,
        }
    }

    #[test]
    fn first_eligible_tick_renders_immediately() {
        let mut gate = ProgressiveRenderGate::new(Duration::from_millis(100));
        let now = Instant::now();
        assert!(gate.should_render_intermediate(eligible_context(), now));
        assert!(gate.is_first_render());
    }

    #[test]
    fn renders_within_min_interval_are_suppressed() {
        let mut gate = ProgressiveRenderGate::new(Duration::from_millis(100));
        let t0 = Instant::now();
        assert!(gate.should_render_intermediate(eligible_context(), t0));
        assert!(!gate.should_render_intermediate(eligible_context(), t0 + Duration::from_millis(50)));
        assert!(gate.should_render_intermediate(eligible_context(), t0 + Duration::from_millis(150)));
        assert_eq!(gate.render_count(), 2);
    }

    #[test]
    fn disabled_progressive_rendering_never_fires() {
        let mut gate = ProgressiveRenderGate::new(Duration::from_millis(100));
        let mut ctx = eligible_context();
        ctx.progressive_enabled = false;
        assert!(!gate.should_render_intermediate(ctx, Instant::now()));
    }
}
