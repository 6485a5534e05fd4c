//! Exponential backoff with jitter for mobile-protocol reconnects.
//!
//! The teacher's `routing/policy.rs` reaches for `rand` for non-deterministic
//! choices; this module follows the same dependency but the backoff formula
//! itself has no direct teacher analog — the teacher pools/retires
//! connections by staleness rather than reconnecting a single failed one.
//! Implemented directly from `delay = clamp(base · 2^(attempt-1) · (1 + U(−0.25, +0.25)), 0, max)`.

use rand::Rng;

/// Compute the delay before the next reconnect attempt, jittered by up to
/// ±25% of the unjittered exponential value.
#[must_use]
pub fn reconnect_delay_ms(attempt: u32, base_ms: u64, max_ms: u64) -> u64 {
    reconnect_delay_ms_with(attempt, base_ms, max_ms, || rand::thread_rng().gen_range(-0.25..=0.25))
}

/// Same as [`reconnect_delay_ms`] but with the jitter source injected, for
/// deterministic tests.
#[must_use]
pub fn reconnect_delay_ms_with(attempt: u32, base_ms: u64, max_ms: u64, jitter: impl FnOnce() -> f64) -> u64 {
    let attempt = attempt.max(1);
    let exponent = u32::min(attempt - 1, 32);
    let unjittered = (base_ms as f64) * 2f64.powi(exponent as i32);
    let jittered = unjittered * (1.0 + jitter());
    jittered.clamp(0.0, max_ms as f64).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_attempt_is_base_delay_with_zero_jitter() {
        assert_eq!(reconnect_delay_ms_with(1, 1000, 30_000, || 0.0), 1000);
    }

    #[test]
    fn doubles_per_attempt() {
        assert_eq!(reconnect_delay_ms_with(2, 1000, 60_000, || 0.0), 2000);
        assert_eq!(reconnect_delay_ms_with(3, 1000, 60_000, || 0.0), 4000);
    }

    #[test]
    fn clamps_to_max() {
        assert_eq!(reconnect_delay_ms_with(10, 1000, 30_000, || 0.0), 30_000);
    }

    #[test]
    fn positive_jitter_increases_delay() {
        assert_eq!(reconnect_delay_ms_with(1, 1000, 30_000, || 0.25), 1250);
    }

    #[test]
    fn negative_jitter_decreases_delay() {
        assert_eq!(reconnect_delay_ms_with(1, 1000, 30_000, || -0.25), 750);
    }

    #[test]
    fn zero_attempt_is_treated_as_first() {
        assert_eq!(reconnect_delay_ms_with(0, 1000, 30_000, || 0.0), reconnect_delay_ms_with(1, 1000, 30_000, || 0.0));
    }

    #[test]
    fn real_jitter_stays_within_bounds() {
        for attempt in 1..5 {
            let delay = reconnect_delay_ms(attempt, 500, 20_000);
            assert!(delay <= 20_000);
        }
    }
}
