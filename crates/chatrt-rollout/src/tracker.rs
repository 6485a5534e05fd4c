//! Staged-rollout state tracking.
//!
//! Grounded on `conductor/core/src/routing/connection_pool.rs`'s
//! `PoolStats`/`PoolStatsAtomic` pattern of carrying explicit progress
//! state alongside the pool itself, adapted here to a small ordered list
//! of traffic-percentage stages rather than connection counts.

use crate::strategy::DeployStrategy;

/// A rollout's current position through its traffic-percentage stages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RolloutState {
    /// The traffic percentage currently live, e.g. `10`, `50`, `100`.
    pub stage: u8,
    /// The full ordered stage list this rollout will walk through.
    pub stages: Vec<u8>,
    /// Set once `stage` reaches the final entry of `stages`.
    pub completed_at_ms: Option<u64>,
}

/// Drives a [`RolloutState`] through its stages one advance at a time.
pub struct RolloutTracker {
    state: RolloutState,
}

impl RolloutTracker {
    /// Construct a tracker for `strategy`, starting at the first stage.
    /// `Auto` walks `[100]`; `Staged` walks `[10, 50, 100]`. A `Manual`
    /// strategy has no rollout stages of its own — this tracker should
    /// not be constructed for one.
    #[must_use]
    pub fn new(strategy: DeployStrategy, now_ms: u64) -> Self {
        let stages = match strategy {
            DeployStrategy::Auto => vec![100],
            DeployStrategy::Staged => vec![10, 50, 100],
            DeployStrategy::Manual => vec![100],
        };
        let stage = stages[0];
        let completed_at_ms = (stage == *stages.last().expect("non-empty")).then_some(now_ms);
        Self { state: RolloutState { stage, stages, completed_at_ms } }
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> &RolloutState {
        &self.state
    }

    /// True once the rollout has reached its final stage.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state.completed_at_ms.is_some()
    }

    /// Advance to the next stage. A no-op once complete.
    pub fn advance(&mut self, now_ms: u64) {
        if self.is_complete() {
            return;
        }
        let current_index = self.state.stages.iter().position(|s| *s == self.state.stage).unwrap_or(0);
        let next_index = (current_index + 1).min(self.state.stages.len() - 1);
        self.state.stage = self.state.stages[next_index];
        if next_index == self.state.stages.len() - 1 {
            self.state.completed_at_ms = Some(now_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_strategy_starts_and_stays_at_100() {
        let mut tracker = RolloutTracker::new(DeployStrategy::Auto, 0);
        assert_eq!(tracker.state().stage, 100);
        assert!(tracker.is_complete());
        tracker.advance(10);
        assert_eq!(tracker.state().stage, 100);
    }

    #[test]
    fn staged_strategy_walks_through_every_stage() {
        let mut tracker = RolloutTracker::new(DeployStrategy::Staged, 0);
        assert_eq!(tracker.state().stage, 10);
        assert!(!tracker.is_complete());

        tracker.advance(1);
        assert_eq!(tracker.state().stage, 50);
        assert!(!tracker.is_complete());

        tracker.advance(2);
        assert_eq!(tracker.state().stage, 100);
        assert!(tracker.is_complete());
        assert_eq!(tracker.state().completed_at_ms, Some(2));
    }

    #[test]
    fn advance_past_completion_is_a_no_op() {
        let mut tracker = RolloutTracker::new(DeployStrategy::Staged, 0);
        tracker.advance(1);
        tracker.advance(2);
        let completed_at = tracker.state().completed_at_ms;
        tracker.advance(3);
        assert_eq!(tracker.state().stage, 100);
        assert_eq!(tracker.state().completed_at_ms, completed_at);
    }
}
