//! Rule-based alert lifecycle with fire/resolve hysteresis and cooldown.
//!
//! Grounded on `conductor/core/src/routing/metrics.rs`'s `RouterMetrics`
//! global summary rollup for the idea of deriving alerts from a metrics
//! snapshot, and on `conductor/core/src/routing/connection_pool.rs`'s
//! `PoolStats`/staleness-check convention for per-key state tracked in a
//! `RwLock`-guarded map.

use std::collections::HashMap;

use chatrt_types::Platform;
use tracing::{debug, info};

use crate::collector::MetricsSnapshot;

/// The metric an [`AlertCondition`] reads off a [`MetricsSnapshot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKey {
    /// `MetricsSnapshot::connected`, coerced to `0`/`1`.
    Connected,
    /// `MetricsSnapshot::avg_latency_ms`.
    AvgLatencyMs,
    /// `MetricsSnapshot::p99_latency_ms`.
    P99LatencyMs,
    /// `MetricsSnapshot::success_rate`.
    SuccessRate,
    /// `MetricsSnapshot::error_rate`.
    ErrorRate,
    /// `MetricsSnapshot::captcha_encountered`, coerced to `0`/`1`.
    CaptchaEncountered,
    /// `MetricsSnapshot::rate_limited`, coerced to `0`/`1`.
    RateLimited,
    /// `MetricsSnapshot::suspected_detection`, coerced to `0`/`1`.
    SuspectedDetection,
    /// `MetricsSnapshot::sample_count`.
    SampleCount,
}

impl MetricKey {
    fn read(self, snapshot: &MetricsSnapshot) -> f64 {
        match self {
            MetricKey::Connected => f64::from(snapshot.connected),
            MetricKey::AvgLatencyMs => snapshot.avg_latency_ms,
            MetricKey::P99LatencyMs => snapshot.p99_latency_ms as f64,
            MetricKey::SuccessRate => snapshot.success_rate,
            MetricKey::ErrorRate => snapshot.error_rate,
            MetricKey::CaptchaEncountered => f64::from(snapshot.captcha_encountered),
            MetricKey::RateLimited => f64::from(snapshot.rate_limited),
            MetricKey::SuspectedDetection => f64::from(snapshot.suspected_detection),
            MetricKey::SampleCount => snapshot.sample_count as f64,
        }
    }
}

/// A numeric comparator; booleans in a [`MetricsSnapshot`] coerce to `0`/`1`
/// via [`MetricKey::read`] before comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Equal to (exact floating-point comparison; intended for the
    /// boolean-coerced and `sample_count` metrics).
    Eq,
}

impl Op {
    fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Op::Gt => lhs > rhs,
            Op::Gte => lhs >= rhs,
            Op::Lt => lhs < rhs,
            Op::Lte => lhs <= rhs,
            Op::Eq => (lhs - rhs).abs() < f64::EPSILON,
        }
    }

    fn negate(self) -> Op {
        match self {
            Op::Gt => Op::Lte,
            Op::Gte => Op::Lt,
            Op::Lt => Op::Gte,
            Op::Lte => Op::Gt,
            Op::Eq => Op::Eq,
        }
    }
}

/// A single clause: `metric op threshold`.
#[derive(Clone, Copy, Debug)]
pub struct Condition {
    /// Which metric to read.
    pub metric: MetricKey,
    /// The comparator.
    pub op: Op,
    /// The threshold to compare against.
    pub threshold: f64,
}

impl Condition {
    fn holds(self, snapshot: &MetricsSnapshot) -> bool {
        self.op.apply(self.metric.read(snapshot), self.threshold)
    }

    /// The logical negation of this condition, used as the resolve
    /// condition fallback when a rule specifies none.
    fn negated(self) -> Condition {
        Condition { metric: self.metric, op: self.op.negate(), threshold: self.threshold }
    }
}

/// How urgently an alert should be treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertSeverity {
    /// Informational; no immediate action implied.
    Info,
    /// Worth noticing but not yet actionable.
    Warning,
    /// Requires attention.
    Critical,
}

/// A named alert rule.
#[derive(Clone, Debug)]
pub struct AlertRule {
    /// Stable identifier, unique within an [`AlertManager`].
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Severity assigned to events this rule fires.
    pub severity: AlertSeverity,
    /// Platforms this rule evaluates against; empty means all platforms.
    pub platforms: Vec<Platform>,
    /// Conjunction of conditions that must all hold to fire.
    pub conditions: Vec<Condition>,
    /// Conditions that, if all hold while firing, resolve the alert. If
    /// empty, the negation of `conditions` is used instead.
    pub resolve_conditions: Vec<Condition>,
    /// Minimum time between a resolve and the next fire, in ms.
    pub cooldown_ms: u64,
}

impl AlertRule {
    fn applies_to(&self, platform: Platform) -> bool {
        self.platforms.is_empty() || self.platforms.contains(&platform)
    }

    fn fire_conditions_hold(&self, snapshot: &MetricsSnapshot) -> bool {
        self.conditions.iter().all(|c| c.holds(snapshot))
    }

    fn resolve_conditions_hold(&self, snapshot: &MetricsSnapshot) -> bool {
        if self.resolve_conditions.is_empty() {
            self.conditions.iter().all(|c| c.negated().holds(snapshot))
        } else {
            self.resolve_conditions.iter().all(|c| c.holds(snapshot))
        }
    }
}

/// Whether an alert is currently firing or has resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertState {
    /// The rule's fire conditions currently hold for this platform.
    Firing,
    /// The alert is not currently firing (either it never fired, or it
    /// fired and has since resolved).
    Resolved,
}

/// An emitted transition, the output of [`AlertManager::evaluate`].
#[derive(Clone, Debug)]
pub struct AlertEvent {
    /// The rule that produced this event.
    pub rule_id: String,
    /// The platform the event pertains to.
    pub platform: Platform,
    /// The rule's configured severity.
    pub severity: AlertSeverity,
    /// The new state.
    pub state: AlertState,
    /// When the underlying fire transition happened, in ms. For a
    /// `Resolved` event this is the `firedAt` of the fire it resolves.
    pub fired_at_ms: u64,
    /// The metrics snapshot that triggered this transition.
    pub metrics: MetricsSnapshot,
}

#[derive(Clone, Copy, Debug)]
struct FireState {
    firing: bool,
    fired_at_ms: Option<u64>,
    resolved_at_ms: Option<u64>,
}

impl Default for FireState {
    fn default() -> Self {
        Self { firing: false, fired_at_ms: None, resolved_at_ms: None }
    }
}

/// Owns a set of [`AlertRule`]s and per-`(rule_id, platform)` fire state,
/// driving the fire → resolve lifecycle with cooldown suppression.
pub struct AlertManager {
    rules: Vec<AlertRule>,
    state: HashMap<(String, Platform), FireState>,
}

impl AlertManager {
    /// Construct a manager with no rules.
    #[must_use]
    pub fn new() -> Self {
        Self { rules: Vec::new(), state: HashMap::new() }
    }

    /// Add a rule. Rule IDs are assumed unique; adding a duplicate ID
    /// shadows the prior rule's definition but keeps its fire state.
    pub fn add_rule(&mut self, rule: AlertRule) {
        self.rules.retain(|r| r.id != rule.id);
        self.rules.push(rule);
    }

    /// Evaluate every rule applicable to `platform` against `metrics`,
    /// as of `now_ms`, returning any state-transition events produced.
    pub fn evaluate(&mut self, platform: Platform, metrics: &MetricsSnapshot, now_ms: u64) -> Vec<AlertEvent> {
        let mut events = Vec::new();

        for rule in self.rules.iter().filter(|r| r.applies_to(platform)) {
            let key = (rule.id.clone(), platform);
            let mut entry = self.state.get(&key).copied().unwrap_or_default();

            if entry.firing {
                if rule.resolve_conditions_hold(metrics) {
                    let fired_at_ms = entry.fired_at_ms.unwrap_or(now_ms);
                    entry.firing = false;
                    entry.resolved_at_ms = Some(now_ms);
                    info!(rule = %rule.id, ?platform, "alert resolved");
                    events.push(AlertEvent {
                        rule_id: rule.id.clone(),
                        platform,
                        severity: rule.severity,
                        state: AlertState::Resolved,
                        fired_at_ms,
                        metrics: metrics.clone(),
                    });
                }
            } else if rule.fire_conditions_hold(metrics) {
                let in_cooldown = entry
                    .fired_at_ms
                    .is_some_and(|fired_at| now_ms.saturating_sub(fired_at) < rule.cooldown_ms);
                if in_cooldown {
                    debug!(rule = %rule.id, ?platform, "alert fire suppressed by cooldown");
                } else {
                    entry.firing = true;
                    entry.fired_at_ms = Some(now_ms);
                    info!(rule = %rule.id, ?platform, "alert firing");
                    events.push(AlertEvent {
                        rule_id: rule.id.clone(),
                        platform,
                        severity: rule.severity,
                        state: AlertState::Firing,
                        fired_at_ms: now_ms,
                        metrics: metrics.clone(),
                    });
                }
            }

            self.state.insert(key, entry);
        }

        events
    }

    /// Manually clear fire state for `(rule_id, platform)`, as if it had
    /// resolved, without requiring a metrics snapshot.
    pub fn resolve(&mut self, rule_id: &str, platform: Platform, now_ms: u64) {
        if let Some(entry) = self.state.get_mut(&(rule_id.to_string(), platform)) {
            entry.firing = false;
            entry.resolved_at_ms = Some(now_ms);
        }
    }

    /// Clear all fire state for every rule and platform.
    pub fn reset(&mut self) {
        self.state.clear();
    }

    /// Every `(rule_id, platform)` pair currently firing.
    #[must_use]
    pub fn get_active_alerts(&self) -> Vec<(String, Platform)> {
        self.state.iter().filter(|(_, s)| s.firing).map(|(k, _)| k.clone()).collect()
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(error_rate: f64, connected: bool) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp_ms: 0,
            connected,
            last_success_at_ms: None,
            avg_latency_ms: 0.0,
            p99_latency_ms: 0,
            success_rate: 1.0 - error_rate,
            error_rate,
            error_types: HashMap::new(),
            captcha_encountered: false,
            rate_limited: false,
            suspected_detection: false,
            sample_count: 10,
        }
    }

    fn high_error_rate_rule() -> AlertRule {
        AlertRule {
            id: "high-error-rate".into(),
            name: "High error rate".into(),
            severity: AlertSeverity::Warning,
            platforms: Vec::new(),
            conditions: vec![Condition { metric: MetricKey::ErrorRate, op: Op::Gt, threshold: 0.5 }],
            resolve_conditions: Vec::new(),
            cooldown_ms: 1_000,
        }
    }

    #[test]
    fn fires_when_conditions_hold_and_stays_quiet_once_resolved_unless_refired() {
        let mut manager = AlertManager::new();
        manager.add_rule(high_error_rate_rule());

        let events = manager.evaluate(Platform::BotApi, &snapshot_with(0.9, true), 0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, AlertState::Firing);

        let events = manager.evaluate(Platform::BotApi, &snapshot_with(0.9, true), 10);
        assert!(events.is_empty(), "already firing, should not refire");
    }

    #[test]
    fn resolves_via_negated_fire_conditions_when_no_resolve_conditions_given() {
        let mut manager = AlertManager::new();
        manager.add_rule(high_error_rate_rule());

        manager.evaluate(Platform::BotApi, &snapshot_with(0.9, true), 0);
        let events = manager.evaluate(Platform::BotApi, &snapshot_with(0.1, true), 10);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, AlertState::Resolved);
    }

    #[test]
    fn cooldown_suppresses_refiring_immediately_after_resolve() {
        let mut manager = AlertManager::new();
        manager.add_rule(high_error_rate_rule());

        manager.evaluate(Platform::BotApi, &snapshot_with(0.9, true), 0);
        manager.evaluate(Platform::BotApi, &snapshot_with(0.1, true), 10);

        let events = manager.evaluate(Platform::BotApi, &snapshot_with(0.9, true), 50);
        assert!(events.is_empty(), "within cooldown window, fire should be suppressed");

        let events = manager.evaluate(Platform::BotApi, &snapshot_with(0.9, true), 2_000);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, AlertState::Firing);
    }

    #[test]
    fn explicit_resolve_conditions_override_negation() {
        let mut manager = AlertManager::new();
        manager.add_rule(AlertRule {
            id: "disconnect".into(),
            name: "Disconnected".into(),
            severity: AlertSeverity::Critical,
            platforms: Vec::new(),
            conditions: vec![Condition { metric: MetricKey::Connected, op: Op::Eq, threshold: 0.0 }],
            resolve_conditions: vec![Condition { metric: MetricKey::SampleCount, op: Op::Gte, threshold: 20.0 }],
            cooldown_ms: 0,
        });

        manager.evaluate(Platform::Mobile, &snapshot_with(0.0, false), 0);
        // connected flips true but resolve condition (sample_count>=20) not met yet.
        let mut snap = snapshot_with(0.0, true);
        snap.sample_count = 5;
        let events = manager.evaluate(Platform::Mobile, &snap, 10);
        assert!(events.is_empty());

        snap.sample_count = 20;
        let events = manager.evaluate(Platform::Mobile, &snap, 20);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, AlertState::Resolved);
    }

    #[test]
    fn rule_scoped_to_platforms_ignores_others() {
        let mut manager = AlertManager::new();
        let mut rule = high_error_rate_rule();
        rule.platforms = vec![Platform::Browser];
        manager.add_rule(rule);

        let events = manager.evaluate(Platform::BotApi, &snapshot_with(0.9, true), 0);
        assert!(events.is_empty());

        let events = manager.evaluate(Platform::Browser, &snapshot_with(0.9, true), 0);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn manual_resolve_clears_fire_state() {
        let mut manager = AlertManager::new();
        manager.add_rule(high_error_rate_rule());
        manager.evaluate(Platform::BotApi, &snapshot_with(0.9, true), 0);
        assert_eq!(manager.get_active_alerts().len(), 1);

        manager.resolve("high-error-rate", Platform::BotApi, 5);
        assert!(manager.get_active_alerts().is_empty());
    }

    #[test]
    fn reset_clears_all_state() {
        let mut manager = AlertManager::new();
        manager.add_rule(high_error_rate_rule());
        manager.evaluate(Platform::BotApi, &snapshot_with(0.9, true), 0);
        manager.reset();
        assert!(manager.get_active_alerts().is_empty());
    }
}
