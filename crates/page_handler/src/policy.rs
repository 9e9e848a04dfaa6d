//! C7 — `PolicyEngine`: ordered policy rules, each a predicate over context
//! plus an effect mutating scheduler settings.

use crate::network_profile::LinkClass;

/// Ambient signals a policy predicate reads. Mirrors `NetworkContext` from
/// the data model, trimmed to what policies actually consult.
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext {
    pub link_class: LinkClass,
    pub downlink_mbps: f64,
    pub save_data: bool,
    pub charging: bool,
    pub battery_level: f64,
    pub any_critical_outstanding: bool,
}

/// Scheduler-visible settings a policy effect may mutate. Policies never see
/// the catalog or queues directly; they only adjust these knobs, which the
/// scheduler consults on its next admission decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicySettings {
    pub prefetch_concurrency: usize,
    pub high_priority_only: bool,
    pub prefetch_enabled: bool,
    pub speculative_enabled: bool,
    pub viewport_boost: f32,
}

impl PolicySettings {
    #[must_use]
    pub const fn baseline(default_concurrency: usize, viewport_boost: f32) -> Self {
        Self {
            prefetch_concurrency: default_concurrency,
            high_priority_only: false,
            prefetch_enabled: true,
            speculative_enabled: true,
            viewport_boost,
        }
    }
}

/// A single named, prioritized rule. `predicate` and `effect` must both be
/// pure and idempotent: re-applying the same policy to unchanged settings
/// must not compound its effect.
pub struct Policy {
    pub name: &'static str,
    pub priority: i32,
    pub predicate: fn(&PolicyContext) -> bool,
    pub effect: fn(&mut PolicySettings),
}

fn critical_resources_first(_ctx: &PolicyContext) -> bool {
    true
}
fn critical_resources_first_effect(_settings: &mut PolicySettings) {}

fn limit_prefetch_on_slow_networks(ctx: &PolicyContext) -> bool {
    matches!(ctx.link_class, LinkClass::Poor | LinkClass::Moderate) && ctx.downlink_mbps < 3.0
}
fn limit_prefetch_on_slow_networks_effect(settings: &mut PolicySettings) {
    settings.prefetch_concurrency = 1;
    settings.high_priority_only = true;
}

fn viewport_boost_always_on(_ctx: &PolicyContext) -> bool {
    true
}
fn viewport_boost_effect(_settings: &mut PolicySettings) {}

fn battery_saving(ctx: &PolicyContext) -> bool {
    !ctx.charging && ctx.battery_level < 0.2
}
fn battery_saving_effect(settings: &mut PolicySettings) {
    settings.prefetch_enabled = false;
    settings.speculative_enabled = false;
}

fn save_data_respect(ctx: &PolicyContext) -> bool {
    ctx.save_data
}
fn save_data_respect_effect(settings: &mut PolicySettings) {
    settings.prefetch_enabled = false;
}

/// Build the required built-in policy set, in descending priority order.
#[must_use]
pub fn builtin_policies() -> Vec<Policy> {
    vec![
        Policy {
            name: "CriticalResourcesFirst",
            priority: 100,
            predicate: critical_resources_first,
            effect: critical_resources_first_effect,
        },
        Policy {
            name: "LimitPrefetchOnSlowNetworks",
            priority: 90,
            predicate: limit_prefetch_on_slow_networks,
            effect: limit_prefetch_on_slow_networks_effect,
        },
        Policy {
            name: "ViewportBoost",
            priority: 85,
            predicate: viewport_boost_always_on,
            effect: viewport_boost_effect,
        },
        Policy {
            name: "BatterySaving",
            priority: 80,
            predicate: battery_saving,
            effect: battery_saving_effect,
        },
        Policy {
            name: "SaveDataRespect",
            priority: 75,
            predicate: save_data_respect,
            effect: save_data_respect_effect,
        },
    ]
}

/// C7: holds an immutable, priority-sorted policy list and evaluates it on
/// every context tick.
pub struct PolicyEngine {
    policies: Vec<Policy>,
    default_settings: PolicySettings,
}

impl PolicyEngine {
    #[must_use]
    pub fn new(mut policies: Vec<Policy>, default_settings: PolicySettings) -> Self {
        policies.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self {
            policies,
            default_settings,
        }
    }

    /// Evaluate all policies against `ctx`, starting from the default
    /// settings each time so repeated ticks without context change are
    /// idempotent by construction.
    #[must_use]
    pub fn evaluate(&self, ctx: &PolicyContext) -> PolicySettings {
        let mut settings = self.default_settings;
        for policy in &self.policies {
            if (policy.predicate)(ctx) {
                (policy.effect)(&mut settings);
            }
        }
        settings
    }

    #[must_use]
    pub fn policy_names(&self) -> Vec<&'static str> {
        self.policies.iter().map(|policy| policy.name).collect()
    }
}
