//! Deterministic-given-seed computation of read/think/type delays.
//!
//! Grounded on `conductor/core/src/backend/traits.rs`'s `LlmRequest` builder
//! (`with_*` methods over clamped knobs) for the [`ResponseProfile`] shape,
//! and on `conductor/core/src/routing/policy.rs`'s threshold/heuristic
//! scoring for the per-component delay formulas.

use std::sync::Arc;

use crate::time_of_day::ActivityPeriod;

/// Lower/upper clamp for a computed delay, in milliseconds.
#[derive(Clone, Copy, Debug)]
pub struct DelayBounds {
    /// Minimum allowed delay.
    pub min_ms: u64,
    /// Maximum allowed delay.
    pub max_ms: u64,
}

impl DelayBounds {
    fn clamp_ms(self, value_ms: f64) -> u64 {
        let value_ms = value_ms.max(0.0) as u64;
        value_ms.clamp(self.min_ms, self.max_ms)
    }
}

/// Read-delay bounds named by the specification.
pub const READ_DELAY_BOUNDS: DelayBounds = DelayBounds { min_ms: 300, max_ms: 20_000 };
/// Think-delay bounds named by the specification.
pub const THINK_DELAY_BOUNDS: DelayBounds = DelayBounds { min_ms: 200, max_ms: 15_000 };
/// Type-duration bounds named by the specification.
pub const TYPE_DELAY_BOUNDS: DelayBounds = DelayBounds { min_ms: 150, max_ms: 30_000 };

/// A human-response profile. Every knob is clamped to `[0, 1]` at
/// construction so downstream formulas never see an out-of-range value.
#[derive(Clone, Copy, Debug)]
pub struct ResponseProfile {
    /// How fast the simulated user reads; higher is faster.
    pub reading_speed: f64,
    /// How much the simulated user deliberates before responding.
    pub deliberation: f64,
    /// General activity level, driving typing speed.
    pub activity_level: f64,
    /// Tendency to go idle rather than respond immediately (informational;
    /// consumed by the behavioural state machine, not by the delay formulas
    /// below, but carried on the profile since both subsystems share one
    /// persona definition).
    pub idle_tendency: f64,
}

impl ResponseProfile {
    /// Construct a profile, clamping every knob to `[0, 1]`.
    #[must_use]
    pub fn new(reading_speed: f64, deliberation: f64, activity_level: f64, idle_tendency: f64) -> Self {
        Self {
            reading_speed: reading_speed.clamp(0.0, 1.0),
            deliberation: deliberation.clamp(0.0, 1.0),
            activity_level: activity_level.clamp(0.0, 1.0),
            idle_tendency: idle_tendency.clamp(0.0, 1.0),
        }
    }

    /// A "typical" profile with every knob at its midpoint.
    #[must_use]
    pub fn baseline() -> Self {
        Self::new(0.5, 0.5, 0.5, 0.5)
    }

    fn reading_wpm(self) -> f64 {
        // 150 wpm for a torpid reader, 400 wpm for a fast one.
        150.0 + self.reading_speed * 250.0
    }

    fn typing_wpm(self) -> f64 {
        // 20 wpm hunt-and-peck up to 70 wpm fluent.
        20.0 + self.activity_level * 50.0
    }
}

/// The three component delays and their sum, returned by [`plan_response`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResponsePlan {
    /// Time spent reading the incoming message, in ms.
    pub read_delay_ms: u64,
    /// Time spent deciding how to respond, in ms.
    pub think_delay_ms: u64,
    /// Time spent typing the response, in ms.
    pub typing_duration_ms: u64,
    /// Sum of the three components.
    pub total_delay_ms: u64,
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Compute the read delay for a word count under a profile and
/// jitter/time-of-day, clamped to [`READ_DELAY_BOUNDS`].
#[must_use]
fn read_delay_ms(words: usize, profile: ResponseProfile, jitter: f64, period: ActivityPeriod) -> u64 {
    let base_minutes = words as f64 / profile.reading_wpm();
    let base_ms = base_minutes * 60_000.0;
    let jittered = base_ms * (1.0 + jitter);
    let scaled = jittered * period.delay_multiplier();
    READ_DELAY_BOUNDS.clamp_ms(scaled)
}

/// Compute the think delay under a profile and jitter/time-of-day, clamped
/// to [`THINK_DELAY_BOUNDS`].
#[must_use]
fn think_delay_ms(profile: ResponseProfile, jitter: f64, period: ActivityPeriod) -> u64 {
    const BASELINE_MS: f64 = 1_500.0;
    let scaled_by_deliberation = BASELINE_MS * (0.4 + profile.deliberation * 1.6);
    let jittered = scaled_by_deliberation * (1.0 + jitter);
    let scaled = jittered * period.delay_multiplier();
    THINK_DELAY_BOUNDS.clamp_ms(scaled)
}

/// Compute the typing duration for a response word count under a profile
/// and jitter/time-of-day, clamped to [`TYPE_DELAY_BOUNDS`]. An empty
/// response returns the bounds' minimum.
#[must_use]
fn typing_duration_ms(words: usize, profile: ResponseProfile, jitter: f64, period: ActivityPeriod) -> u64 {
    if words == 0 {
        return TYPE_DELAY_BOUNDS.min_ms;
    }
    let base_minutes = words as f64 / profile.typing_wpm();
    let base_ms = base_minutes * 60_000.0;
    let jittered = base_ms * (1.0 + jitter);
    let scaled = jittered * period.delay_multiplier();
    TYPE_DELAY_BOUNDS.clamp_ms(scaled)
}

/// A deterministic-given-seed human-response simulator.
///
/// `random` is called once per delay component and must return a jitter
/// fraction in `[-0.2, 0.2]` (applied as `1 + jitter`); `clock_hour` returns
/// the current hour of day (`0..=23`) used to pick the [`ActivityPeriod`].
/// Supplying the same profile, the same `random`/`clock_hour` outputs, and
/// the same message/response text always yields the same [`ResponsePlan`].
pub struct HumanResponseSimulator {
    profile: ResponseProfile,
    random: Arc<dyn Fn() -> f64 + Send + Sync>,
    clock_hour: Arc<dyn Fn() -> u32 + Send + Sync>,
}

impl HumanResponseSimulator {
    /// Construct a simulator for `profile` with injected jitter/clock
    /// sources.
    #[must_use]
    pub fn new(
        profile: ResponseProfile,
        random: Arc<dyn Fn() -> f64 + Send + Sync>,
        clock_hour: Arc<dyn Fn() -> u32 + Send + Sync>,
    ) -> Self {
        Self { profile, random, clock_hour }
    }

    /// Plan the full response timing for an incoming message and the text
    /// the simulated user will send back.
    #[must_use]
    pub fn plan_response(&self, incoming_text: &str, response_text: &str) -> ResponsePlan {
        let period = ActivityPeriod::from_hour((self.clock_hour)());
        let read = read_delay_ms(word_count(incoming_text), self.profile, (self.random)(), period);
        let think = think_delay_ms(self.profile, (self.random)(), period);
        let typing = typing_duration_ms(word_count(response_text), self.profile, (self.random)(), period);
        ResponsePlan {
            read_delay_ms: read,
            think_delay_ms: think,
            typing_duration_ms: typing,
            total_delay_ms: read + think + typing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulator(profile: ResponseProfile, random: f64, hour: u32) -> HumanResponseSimulator {
        HumanResponseSimulator::new(profile, Arc::new(move || random), Arc::new(move || hour))
    }

    #[test]
    fn identical_inputs_produce_identical_plans() {
        let sim = simulator(ResponseProfile::baseline(), 0.0, 10);
        let a = sim.plan_response("hello there friend", "sure, sounds good");
        let b = sim.plan_response("hello there friend", "sure, sounds good");
        assert_eq!(a, b);
    }

    #[test]
    fn total_delay_is_sum_of_components() {
        let sim = simulator(ResponseProfile::baseline(), 0.1, 14);
        let plan = sim.plan_response("a longer message with many words in it", "a reply");
        assert_eq!(
            plan.total_delay_ms,
            plan.read_delay_ms + plan.think_delay_ms + plan.typing_duration_ms
        );
    }

    #[test]
    fn empty_response_types_at_the_minimum_bound() {
        let sim = simulator(ResponseProfile::baseline(), 0.0, 10);
        let plan = sim.plan_response("anything", "");
        assert_eq!(plan.typing_duration_ms, TYPE_DELAY_BOUNDS.min_ms);
    }

    #[test]
    fn delays_are_clamped_to_their_bounds() {
        let sim = simulator(ResponseProfile::new(0.0, 1.0, 0.0, 0.0), 0.2, 3);
        let plan = sim.plan_response(&"word ".repeat(5000), &"word ".repeat(5000));
        assert!(plan.read_delay_ms <= READ_DELAY_BOUNDS.max_ms);
        assert!(plan.think_delay_ms <= THINK_DELAY_BOUNDS.max_ms);
        assert!(plan.typing_duration_ms <= TYPE_DELAY_BOUNDS.max_ms);
    }

    #[test]
    fn dormant_hours_slow_responses_relative_to_peak() {
        let peak = simulator(ResponseProfile::baseline(), 0.0, 9).plan_response("hello there", "hi");
        let dormant = simulator(ResponseProfile::baseline(), 0.0, 3).plan_response("hello there", "hi");
        assert!(dormant.read_delay_ms >= peak.read_delay_ms);
    }
}
