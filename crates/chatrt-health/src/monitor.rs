//! Cross-platform orchestration of [`PlatformCollector`]s.
//!
//! Grounded on `conductor/core/src/routing/metrics.rs`'s `RouterMetrics`:
//! a `DashMap`-backed lazy per-key collector registry, a `global_summary`
//! rollup and a `to_prometheus` text exporter.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chatrt_types::Platform;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::collector::{ActionResult, CollectorConfig, MetricsSnapshot, PlatformCollector};

/// A listener invoked with each platform's freshly computed snapshot on
/// [`HealthMonitor::snapshot_all`].
pub type SnapshotListener = Arc<dyn Fn(Platform, &MetricsSnapshot) + Send + Sync>;

/// Orchestrates one [`PlatformCollector`] per [`Platform`], creating them
/// lazily on first use.
pub struct HealthMonitor {
    config: CollectorConfig,
    collectors: DashMap<Platform, Arc<PlatformCollector>>,
    listeners: parking_lot::Mutex<Vec<SnapshotListener>>,
    snapshots_emitted: AtomicU64,
}

impl HealthMonitor {
    /// Construct a monitor; every platform's collector will share `config`.
    #[must_use]
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            config,
            collectors: DashMap::new(),
            listeners: parking_lot::Mutex::new(Vec::new()),
            snapshots_emitted: AtomicU64::new(0),
        }
    }

    /// Eagerly create a platform's collector, if not already present.
    pub fn register_platform(&self, platform: Platform) {
        self.collectors.entry(platform).or_insert_with(|| Arc::new(PlatformCollector::new(self.config)));
    }

    /// Register a listener invoked per platform on every [`Self::snapshot_all`].
    pub fn on_snapshot(&self, listener: SnapshotListener) {
        self.listeners.lock().push(listener);
    }

    /// Record an action outcome for `platform`, creating its collector
    /// lazily if this is the platform's first record.
    pub fn record(&self, platform: Platform, result: ActionResult) {
        let collector =
            self.collectors.entry(platform).or_insert_with(|| Arc::new(PlatformCollector::new(self.config)));
        collector.record(result);
    }

    /// Snapshot every registered platform as of `now_ms`, notifying
    /// listeners per platform. A panicking listener is caught and logged;
    /// iteration of the remaining listeners and platforms continues.
    #[must_use]
    pub fn snapshot_all(&self, now_ms: u64) -> HashMap<Platform, MetricsSnapshot> {
        let mut out = HashMap::new();
        for entry in &self.collectors {
            let platform = *entry.key();
            let snapshot = entry.value().snapshot(now_ms);

            let listeners = self.listeners.lock().clone();
            for listener in &listeners {
                let listener = listener.clone();
                let snap_for_listener = snapshot.clone();
                let result = catch_unwind(AssertUnwindSafe(|| listener(platform, &snap_for_listener)));
                if let Err(_panic) = result {
                    warn!(?platform, "health snapshot listener panicked");
                }
            }

            out.insert(platform, snapshot);
        }
        self.snapshots_emitted.fetch_add(1, Ordering::Relaxed);
        debug!(platforms = out.len(), "computed health snapshot for all platforms");
        out
    }

    /// Snapshot a single platform, if registered.
    #[must_use]
    pub fn snapshot(&self, platform: Platform, now_ms: u64) -> Option<MetricsSnapshot> {
        self.collectors.get(&platform).map(|c| c.snapshot(now_ms))
    }

    /// True if any registered platform's current snapshot carries a
    /// detection signal.
    #[must_use]
    pub fn has_detection_signal(&self, now_ms: u64) -> bool {
        self.collectors.iter().any(|entry| {
            let snap = entry.value().snapshot(now_ms);
            snap.captcha_encountered || snap.rate_limited || snap.suspected_detection
        })
    }

    /// Every registered platform whose current snapshot reports
    /// `connected = false`.
    #[must_use]
    pub fn get_disconnected_platforms(&self, now_ms: u64) -> Vec<Platform> {
        self.collectors
            .iter()
            .filter_map(|entry| {
                let snap = entry.value().snapshot(now_ms);
                (!snap.connected).then_some(*entry.key())
            })
            .collect()
    }

    /// Reset every registered platform's collector.
    pub fn reset_all(&self) {
        for entry in &self.collectors {
            entry.value().reset();
        }
    }

    /// Render a Prometheus-style text exposition of every registered
    /// platform's current snapshot.
    #[must_use]
    pub fn to_prometheus_text(&self, now_ms: u64) -> String {
        let mut out = String::new();
        out.push_str("# HELP chatrt_health_connected Whether the platform's last success was within the disconnect threshold.\n");
        out.push_str("# TYPE chatrt_health_connected gauge\n");
        for entry in &self.collectors {
            let platform = entry.key();
            let snap = entry.value().snapshot(now_ms);
            out.push_str(&format!(
                "chatrt_health_connected{{platform=\"{platform}\"}} {}\n",
                i32::from(snap.connected)
            ));
        }

        out.push_str("# HELP chatrt_health_avg_latency_ms Mean action latency over the sliding window.\n");
        out.push_str("# TYPE chatrt_health_avg_latency_ms gauge\n");
        for entry in &self.collectors {
            let platform = entry.key();
            let snap = entry.value().snapshot(now_ms);
            out.push_str(&format!("chatrt_health_avg_latency_ms{{platform=\"{platform}\"}} {}\n", snap.avg_latency_ms));
        }

        out.push_str("# HELP chatrt_health_p99_latency_ms 99th-percentile action latency over the sliding window.\n");
        out.push_str("# TYPE chatrt_health_p99_latency_ms gauge\n");
        for entry in &self.collectors {
            let platform = entry.key();
            let snap = entry.value().snapshot(now_ms);
            out.push_str(&format!("chatrt_health_p99_latency_ms{{platform=\"{platform}\"}} {}\n", snap.p99_latency_ms));
        }

        out.push_str("# HELP chatrt_health_error_rate Fraction of actions that failed over the sliding window.\n");
        out.push_str("# TYPE chatrt_health_error_rate gauge\n");
        for entry in &self.collectors {
            let platform = entry.key();
            let snap = entry.value().snapshot(now_ms);
            out.push_str(&format!("chatrt_health_error_rate{{platform=\"{platform}\"}} {}\n", snap.error_rate));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn collectors_are_created_lazily_on_record() {
        let monitor = HealthMonitor::new(CollectorConfig::default());
        assert!(monitor.snapshot(Platform::BotApi, 10).is_none());
        monitor.record(Platform::BotApi, ActionResult::success(0, 10));
        assert!(monitor.snapshot(Platform::BotApi, 10).is_some());
    }

    #[test]
    fn register_platform_creates_an_empty_collector_eagerly() {
        let monitor = HealthMonitor::new(CollectorConfig::default());
        monitor.register_platform(Platform::Mobile);
        let snap = monitor.snapshot(Platform::Mobile, 10).unwrap();
        assert_eq!(snap.sample_count, 0);
    }

    #[test]
    fn snapshot_all_notifies_listeners_per_platform() {
        let monitor = HealthMonitor::new(CollectorConfig::default());
        monitor.record(Platform::BotApi, ActionResult::success(0, 10));
        monitor.record(Platform::Mobile, ActionResult::success(0, 20));

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = seen.clone();
        monitor.on_snapshot(Arc::new(move |platform, _snap| {
            seen_clone.lock().unwrap().push(platform);
        }));

        let all = monitor.snapshot_all(100);
        assert_eq!(all.len(), 2);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn panicking_listener_does_not_abort_snapshot_all() {
        let monitor = HealthMonitor::new(CollectorConfig::default());
        monitor.record(Platform::BotApi, ActionResult::success(0, 10));
        monitor.on_snapshot(Arc::new(|_platform, _snap| panic!("boom")));

        let all = monitor.snapshot_all(100);
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn has_detection_signal_reflects_any_platform() {
        let monitor = HealthMonitor::new(CollectorConfig::default());
        monitor.record(Platform::BotApi, ActionResult::success(0, 10));
        assert!(!monitor.has_detection_signal(10));

        monitor.record(
            Platform::Mobile,
            ActionResult::success(0, 10).with_detection(crate::collector::DetectionFlags {
                rate_limited: true,
                ..Default::default()
            }),
        );
        assert!(monitor.has_detection_signal(10));
    }

    #[test]
    fn disconnected_platforms_lists_only_those_without_recent_success() {
        let config = CollectorConfig { disconnect_threshold_ms: 50, ..CollectorConfig::default() };
        let monitor = HealthMonitor::new(config);
        monitor.record(Platform::BotApi, ActionResult::success(0, 10));
        monitor.record(Platform::Mobile, ActionResult::failure(0, 10, "boom"));

        let disconnected = monitor.get_disconnected_platforms(1_000);
        assert!(disconnected.contains(&Platform::Mobile));
        assert!(disconnected.contains(&Platform::BotApi));
    }

    #[test]
    fn prometheus_text_contains_one_line_per_registered_platform() {
        let monitor = HealthMonitor::new(CollectorConfig::default());
        monitor.record(Platform::BotApi, ActionResult::success(0, 10));
        let text = monitor.to_prometheus_text(100);
        assert!(text.contains("chatrt_health_connected{platform=\"bot_api\"}"));
    }

    #[test]
    fn reset_all_clears_every_collector() {
        let monitor = HealthMonitor::new(CollectorConfig::default());
        monitor.record(Platform::BotApi, ActionResult::success(0, 10));
        monitor.reset_all();
        assert_eq!(monitor.snapshot(Platform::BotApi, 10).unwrap().sample_count, 0);
    }
}
