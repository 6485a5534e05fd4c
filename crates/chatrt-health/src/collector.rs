//! Per-platform sliding-window action-outcome collector.
//!
//! Grounded on `conductor/core/src/routing/metrics.rs`'s `RouterMetrics`
//! (atomic `Counter`/`Gauge` wrappers, lazy per-key collector, `to_prometheus`
//! export convention), but the percentile mechanism differs: the teacher
//! buckets latencies into fixed histogram boundaries, while this collector
//! needs the specification's exact `sorted[ceil(n*0.99)-1]` order statistic
//! over a true `[now-window, now)` sliding window, so samples are held in a
//! timestamp-ordered `Vec` rather than fixed buckets.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Whether a recorded action succeeded or failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action completed successfully.
    Success,
    /// The action failed.
    Failure,
}

/// Anti-detection signals an action may have surfaced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DetectionFlags {
    /// A CAPTCHA challenge was encountered.
    pub captcha_encountered: bool,
    /// The backend signalled rate limiting.
    pub rate_limited: bool,
    /// Some other signal suggests automated-use detection.
    pub suspected_detection: bool,
}

impl DetectionFlags {
    fn any(self) -> bool {
        self.captcha_encountered || self.rate_limited || self.suspected_detection
    }

    fn merge(self, other: Self) -> Self {
        Self {
            captcha_encountered: self.captcha_encountered || other.captcha_encountered,
            rate_limited: self.rate_limited || other.rate_limited,
            suspected_detection: self.suspected_detection || other.suspected_detection,
        }
    }
}

/// A single recorded action outcome, the unit the collector ingests.
#[derive(Clone, Debug)]
pub struct ActionResult {
    /// When the action completed, in epoch milliseconds.
    pub timestamp_ms: u64,
    /// How long the action took.
    pub latency_ms: u64,
    /// Success or failure.
    pub outcome: ActionOutcome,
    /// A free-form error classification, present only on failure.
    pub error_type: Option<String>,
    /// Anti-detection signals surfaced by this specific action.
    pub detection: DetectionFlags,
}

impl ActionResult {
    /// Construct a successful result with no detection signals.
    #[must_use]
    pub fn success(timestamp_ms: u64, latency_ms: u64) -> Self {
        Self {
            timestamp_ms,
            latency_ms,
            outcome: ActionOutcome::Success,
            error_type: None,
            detection: DetectionFlags::default(),
        }
    }

    /// Construct a failed result carrying an error classification.
    #[must_use]
    pub fn failure(timestamp_ms: u64, latency_ms: u64, error_type: impl Into<String>) -> Self {
        Self {
            timestamp_ms,
            latency_ms,
            outcome: ActionOutcome::Failure,
            error_type: Some(error_type.into()),
            detection: DetectionFlags::default(),
        }
    }

    /// Attach detection flags to this result (builder-style).
    #[must_use]
    pub fn with_detection(mut self, detection: DetectionFlags) -> Self {
        self.detection = detection;
        self
    }
}

/// A point-in-time read of a collector's sliding window.
#[derive(Clone, Debug)]
pub struct MetricsSnapshot {
    /// When this snapshot was taken.
    pub timestamp_ms: u64,
    /// Whether the platform is considered connected (a success landed
    /// recently enough).
    pub connected: bool,
    /// When the most recent success happened, if ever.
    pub last_success_at_ms: Option<u64>,
    /// Mean latency over the window, in ms. `0.0` if the window is empty.
    pub avg_latency_ms: f64,
    /// 99th-percentile latency order statistic over the window, in ms.
    pub p99_latency_ms: u64,
    /// `successes / samples`. `0.0` if the window is empty.
    pub success_rate: f64,
    /// `1 - success_rate`. `0.0` if the window is empty.
    pub error_rate: f64,
    /// Count of failures in the window by `error_type`.
    pub error_types: HashMap<String, u64>,
    /// A CAPTCHA challenge landed on some sample still in the window.
    pub captcha_encountered: bool,
    /// A rate-limit signal landed on some sample still in the window.
    pub rate_limited: bool,
    /// Any detection signal landed on some sample still in the window.
    pub suspected_detection: bool,
    /// Number of samples currently in the window.
    pub sample_count: usize,
}

/// Configuration shared by every collector a [`crate::monitor::HealthMonitor`]
/// creates.
#[derive(Clone, Copy, Debug)]
pub struct CollectorConfig {
    /// Width of the sliding window, in ms.
    pub window_ms: u64,
    /// Hard cap on retained samples regardless of window width; the oldest
    /// are dropped first.
    pub max_window_size: usize,
    /// How long since the last success before `connected` flips to `false`.
    pub disconnect_threshold_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            window_ms: 5 * 60 * 1000,
            max_window_size: 10_000,
            disconnect_threshold_ms: 2 * 60 * 1000,
        }
    }
}

/// A single platform's sliding-window action-outcome collector.
///
/// Samples are assumed to be recorded in non-decreasing timestamp order
/// (the natural order actions complete in); eviction of samples older than
/// `now - window_ms` uses a binary search (`partition_point`) against that
/// invariant rather than a linear scan, and only happens lazily, on
/// [`PlatformCollector::record`] and [`PlatformCollector::snapshot`] — there
/// is no background timer.
pub struct PlatformCollector {
    config: CollectorConfig,
    results: Mutex<Vec<ActionResult>>,
    last_success_at_ms: Mutex<Option<u64>>,
}

impl PlatformCollector {
    /// Construct an empty collector.
    #[must_use]
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            config,
            results: Mutex::new(Vec::new()),
            last_success_at_ms: Mutex::new(None),
        }
    }

    /// Record an action outcome and evict anything that has fallen out of
    /// the window as of `result.timestamp_ms`.
    pub fn record(&self, result: ActionResult) {
        let now = result.timestamp_ms;
        if result.outcome == ActionOutcome::Success {
            *self.last_success_at_ms.lock() = Some(result.timestamp_ms);
        }

        let mut results = self.results.lock();
        Self::evict(&mut results, now, self.config.window_ms);
        results.push(result);
        if results.len() > self.config.max_window_size {
            let overflow = results.len() - self.config.max_window_size;
            results.drain(0..overflow);
        }
    }

    /// Evict stale samples as of `now_ms` and compute a fresh snapshot.
    #[must_use]
    pub fn snapshot(&self, now_ms: u64) -> MetricsSnapshot {
        let mut results = self.results.lock();
        Self::evict(&mut results, now_ms, self.config.window_ms);

        let sample_count = results.len();
        let success_count = results.iter().filter(|r| r.outcome == ActionOutcome::Success).count();

        let mut latencies: Vec<u64> = results.iter().map(|r| r.latency_ms).collect();
        latencies.sort_unstable();

        let avg_latency_ms = if sample_count == 0 {
            0.0
        } else {
            latencies.iter().sum::<u64>() as f64 / sample_count as f64
        };

        let p99_latency_ms = Self::p99(&latencies);

        let success_rate = if sample_count == 0 { 0.0 } else { success_count as f64 / sample_count as f64 };
        let error_rate = if sample_count == 0 { 0.0 } else { 1.0 - success_rate };

        let mut error_types: HashMap<String, u64> = HashMap::new();
        let mut detection = DetectionFlags::default();
        for result in results.iter() {
            if let Some(ref error_type) = result.error_type {
                *error_types.entry(error_type.clone()).or_insert(0) += 1;
            }
            detection = detection.merge(result.detection);
        }

        let last_success_at_ms = *self.last_success_at_ms.lock();
        let connected = match last_success_at_ms {
            Some(t) => now_ms.saturating_sub(t) < self.config.disconnect_threshold_ms,
            None => false,
        };

        MetricsSnapshot {
            timestamp_ms: now_ms,
            connected,
            last_success_at_ms,
            avg_latency_ms,
            p99_latency_ms,
            success_rate,
            error_rate,
            error_types,
            captcha_encountered: detection.captcha_encountered,
            rate_limited: detection.rate_limited,
            suspected_detection: detection.any(),
            sample_count,
        }
    }

    /// Clear all recorded samples and detection stickiness.
    pub fn reset(&self) {
        self.results.lock().clear();
        *self.last_success_at_ms.lock() = None;
    }

    fn evict(results: &mut Vec<ActionResult>, now_ms: u64, window_ms: u64) {
        let cutoff = now_ms.saturating_sub(window_ms);
        let keep_from = results.partition_point(|r| r.timestamp_ms < cutoff);
        if keep_from > 0 {
            results.drain(0..keep_from);
        }
    }

    /// `sorted[min(ceil(n*0.99)-1, n-1)]`, with a `minSamples` guard: below
    /// five samples the order-statistic formula degenerates to the maximum
    /// for any realistic window size anyway, so this collector makes that
    /// degeneracy an explicit, tested case rather than an accident of
    /// `ceil` arithmetic (see `DESIGN.md`).
    fn p99(sorted_latencies: &[u64]) -> u64 {
        let n = sorted_latencies.len();
        if n == 0 {
            return 0;
        }
        if n < 5 {
            return *sorted_latencies.last().expect("non-empty");
        }
        let rank = ((n as f64) * 0.99).ceil() as usize;
        let index = rank.saturating_sub(1).min(n - 1);
        sorted_latencies[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_collector_reports_zeroed_snapshot() {
        let collector = PlatformCollector::new(CollectorConfig::default());
        let snap = collector.snapshot(1_000);
        assert_eq!(snap.sample_count, 0);
        assert_eq!(snap.avg_latency_ms, 0.0);
        assert_eq!(snap.p99_latency_ms, 0);
        assert!(!snap.connected);
    }

    #[test]
    fn window_retains_only_recent_samples() {
        let config = CollectorConfig { window_ms: 1_000, ..CollectorConfig::default() };
        let collector = PlatformCollector::new(config);
        collector.record(ActionResult::success(0, 10));
        collector.record(ActionResult::success(500, 20));
        collector.record(ActionResult::success(1_500, 30));

        let snap = collector.snapshot(1_600);
        // cutoff = 1600 - 1000 = 600, so only the t=1500 sample survives.
        assert_eq!(snap.sample_count, 1);
    }

    #[test]
    fn max_window_size_drops_oldest_first() {
        let config = CollectorConfig { max_window_size: 2, window_ms: 1_000_000, ..CollectorConfig::default() };
        let collector = PlatformCollector::new(config);
        collector.record(ActionResult::success(0, 1));
        collector.record(ActionResult::success(1, 2));
        collector.record(ActionResult::success(2, 3));

        let snap = collector.snapshot(10);
        assert_eq!(snap.sample_count, 2);
        assert_eq!(snap.avg_latency_ms, 2.5);
    }

    #[test]
    fn success_rate_and_error_rate_are_complementary() {
        let collector = PlatformCollector::new(CollectorConfig::default());
        collector.record(ActionResult::success(0, 10));
        collector.record(ActionResult::success(1, 10));
        collector.record(ActionResult::failure(2, 10, "timeout"));

        let snap = collector.snapshot(100);
        assert!((snap.success_rate - (2.0 / 3.0)).abs() < 1e-9);
        assert!((snap.error_rate - (1.0 / 3.0)).abs() < 1e-9);
        assert_eq!(snap.error_types.get("timeout"), Some(&1));
    }

    #[test]
    fn p99_matches_order_statistic_formula_at_n_100() {
        let collector = PlatformCollector::new(CollectorConfig { max_window_size: 200, ..CollectorConfig::default() });
        for i in 0..100u64 {
            collector.record(ActionResult::success(i, i + 1));
        }
        let snap = collector.snapshot(1_000);
        // n=100: ceil(100*0.99)-1 = 98 -> sorted[98] = 99 (latencies 1..=100).
        assert_eq!(snap.p99_latency_ms, 99);
    }

    #[test]
    fn p99_falls_back_to_max_below_five_samples() {
        let collector = PlatformCollector::new(CollectorConfig::default());
        collector.record(ActionResult::success(0, 5));
        collector.record(ActionResult::success(1, 50));
        collector.record(ActionResult::success(2, 9));
        let snap = collector.snapshot(100);
        assert_eq!(snap.p99_latency_ms, 50);
    }

    #[test]
    fn connected_is_false_if_never_succeeded() {
        let collector = PlatformCollector::new(CollectorConfig::default());
        collector.record(ActionResult::failure(0, 10, "boom"));
        let snap = collector.snapshot(10);
        assert!(!snap.connected);
    }

    #[test]
    fn connected_flips_false_once_threshold_elapses() {
        let config = CollectorConfig { disconnect_threshold_ms: 100, ..CollectorConfig::default() };
        let collector = PlatformCollector::new(config);
        collector.record(ActionResult::success(0, 10));
        assert!(collector.snapshot(50).connected);
        assert!(!collector.snapshot(200).connected);
    }

    #[test]
    fn detection_flag_is_sticky_only_while_carrying_sample_in_window() {
        let config = CollectorConfig { window_ms: 1_000, ..CollectorConfig::default() };
        let collector = PlatformCollector::new(config);
        collector.record(
            ActionResult::success(0, 10)
                .with_detection(DetectionFlags { captcha_encountered: true, ..Default::default() }),
        );
        assert!(collector.snapshot(500).captcha_encountered);
        assert!(!collector.snapshot(1_200).captcha_encountered);
    }

    #[test]
    fn reset_clears_samples_and_stickiness() {
        let collector = PlatformCollector::new(CollectorConfig::default());
        collector.record(ActionResult::success(0, 10));
        collector.reset();
        let snap = collector.snapshot(10);
        assert_eq!(snap.sample_count, 0);
        assert!(!snap.connected);
    }
}
