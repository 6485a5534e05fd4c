//! A probabilistic, time-of-day-modulated Markov state machine modelling a
//! human user's presence (`idle/active/reading/thinking/away/scrolling`).
//!
//! Grounded on `conductor/core/src/session.rs`'s closed lifecycle enum with
//! explicit transition methods (`SessionState::{Active,Busy,Paused,Ended}`)
//! for the enum shape, and on `conductor/core/src/streaming/stream_manager.rs`'s
//! `Instant`-based dwell/throttle bookkeeping for the dual tick/timer
//! operating modes. The weighted-edge classification itself mirrors the
//! threshold/heuristic structuring of `conductor/core/src/routing/policy.rs`'s
//! `RoutingRequest::classify`, adapted from keyword scoring to transition
//! weight scoring.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::time_of_day::TimeOfDay;

/// A behavioural presence state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BehaviouralState {
    /// Not engaging with the conversation.
    Idle,
    /// Actively engaged (composing, navigating).
    Active,
    /// Reading incoming content.
    Reading,
    /// Paused to consider a response.
    Thinking,
    /// Away from the device entirely.
    Away,
    /// Passively scrolling without deep engagement.
    Scrolling,
}

impl BehaviouralState {
    const ALL: [BehaviouralState; 6] = [
        BehaviouralState::Idle,
        BehaviouralState::Active,
        BehaviouralState::Reading,
        BehaviouralState::Thinking,
        BehaviouralState::Away,
        BehaviouralState::Scrolling,
    ];
}

/// The inclusive dwell-duration bounds for a state, in milliseconds, before
/// per-profile scaling.
#[derive(Clone, Copy, Debug)]
pub struct DwellBounds {
    /// Minimum dwell, in ms.
    pub min_ms: u64,
    /// Maximum dwell, in ms.
    pub max_ms: u64,
}

/// Default dwell ranges from the specification.
#[must_use]
pub fn default_dwell_bounds() -> HashMap<BehaviouralState, DwellBounds> {
    use BehaviouralState::{Active, Away, Idle, Reading, Scrolling, Thinking};
    HashMap::from([
        (Idle, DwellBounds { min_ms: 2_000, max_ms: 30_000 }),
        (Active, DwellBounds { min_ms: 10_000, max_ms: 120_000 }),
        (Reading, DwellBounds { min_ms: 3_000, max_ms: 45_000 }),
        (Thinking, DwellBounds { min_ms: 1_000, max_ms: 10_000 }),
        (Away, DwellBounds { min_ms: 300_000, max_ms: 1_800_000 }),
        (Scrolling, DwellBounds { min_ms: 5_000, max_ms: 60_000 }),
    ])
}

/// A weighted outgoing edge from one state to another.
#[derive(Clone, Copy, Debug)]
pub struct TransitionEdge {
    /// Destination state.
    pub target: BehaviouralState,
    /// Relative weight (need not sum to 1 across a state's edges).
    pub weight: f64,
}

/// Default transition graph. Every state's outgoing weights sum to 1.0
/// before time-of-day modulation, though the sampler doesn't require that.
#[must_use]
pub fn default_transitions() -> HashMap<BehaviouralState, Vec<TransitionEdge>> {
    use BehaviouralState::{Active, Away, Idle, Reading, Scrolling, Thinking};
    fn edge(target: BehaviouralState, weight: f64) -> TransitionEdge {
        TransitionEdge { target, weight }
    }
    HashMap::from([
        (
            Idle,
            vec![
                edge(Active, 0.40),
                edge(Reading, 0.25),
                edge(Thinking, 0.10),
                edge(Away, 0.15),
                edge(Scrolling, 0.10),
            ],
        ),
        (
            Active,
            vec![
                edge(Idle, 0.30),
                edge(Reading, 0.25),
                edge(Thinking, 0.15),
                edge(Scrolling, 0.20),
                edge(Away, 0.10),
            ],
        ),
        (
            Reading,
            vec![
                edge(Active, 0.30),
                edge(Thinking, 0.25),
                edge(Idle, 0.20),
                edge(Scrolling, 0.15),
                edge(Away, 0.10),
            ],
        ),
        (
            Thinking,
            vec![
                edge(Active, 0.45),
                edge(Idle, 0.25),
                edge(Reading, 0.20),
                edge(Away, 0.10),
            ],
        ),
        (
            Away,
            vec![edge(Idle, 0.60), edge(Active, 0.25), edge(Reading, 0.15)],
        ),
        (
            Scrolling,
            vec![
                edge(Reading, 0.35),
                edge(Active, 0.25),
                edge(Idle, 0.20),
                edge(Thinking, 0.10),
                edge(Away, 0.10),
            ],
        ),
    ])
}

/// Default time-of-day weight multiplier for transitioning *into* `target`.
///
/// Night suppresses active engagement and favours `Away`; morning favours
/// getting active; evening favours passive scrolling/reading. All other
/// combinations are neutral (`1.0`).
#[must_use]
pub fn default_time_of_day_multiplier(target: BehaviouralState, time_of_day: TimeOfDay) -> f64 {
    use BehaviouralState::{Active, Away, Reading, Scrolling};
    use TimeOfDay::{Afternoon, Evening, Morning, Night};
    match (time_of_day, target) {
        (Night, Active) => 0.3,
        (Night, Reading) => 0.5,
        (Night, Scrolling) => 0.7,
        (Night, Away) => 3.0,
        (Morning, Active) => 1.3,
        (Morning, Reading) => 1.1,
        (Evening, Scrolling) => 1.3,
        (Evening, Reading) => 1.2,
        (Evening, Active) => 0.8,
        (Afternoon, _) => 1.0,
        _ => 1.0,
    }
}

/// A completed (or forced) transition, delivered to listeners.
#[derive(Clone, Copy, Debug)]
pub struct TransitionEvent {
    /// The state left.
    pub from: BehaviouralState,
    /// The state entered.
    pub to: BehaviouralState,
    /// The dwell budget sampled for the newly entered state.
    pub dwell_ms: u64,
}

/// Errors the state machine's computational API can raise.
#[derive(Clone, Copy, Debug, thiserror::Error, PartialEq, Eq)]
pub enum BehaviorError {
    /// `tick()` was called while the machine is in timer mode.
    #[error("tick() is disallowed while the state machine is running in timer mode")]
    TickWhileRunning,
}

/// Handle returned by [`BehaviouralStateMachine::on_transition`], usable
/// with [`BehaviouralStateMachine::unsubscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type RandomFn = Arc<dyn Fn() -> f64 + Send + Sync>;
type ClockFn = Arc<dyn Fn() -> u64 + Send + Sync>;
type Listener = Arc<dyn Fn(&TransitionEvent) + Send + Sync>;

/// The behavioural session state machine.
///
/// `random` must return a value in `[0, 1)`; `clock` must return the current
/// time as milliseconds since an arbitrary but consistent epoch (the hour of
/// day used for time-of-day modulation is derived as
/// `(clock_ms / 3_600_000) % 24`, so production callers should supply real
/// UTC epoch milliseconds while tests can supply any synthetic value that
/// lands in the desired hour bucket).
pub struct BehaviouralStateMachine {
    state: Mutex<BehaviouralState>,
    dwell_ms: AtomicU64,
    entered_at_ms: AtomicU64,
    scale: f64,
    random: RandomFn,
    clock: ClockFn,
    dwell_bounds: HashMap<BehaviouralState, DwellBounds>,
    transitions: HashMap<BehaviouralState, Vec<TransitionEdge>>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_listener_id: AtomicU64,
    running: AtomicBool,
    timer_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl BehaviouralStateMachine {
    /// Construct a machine with the default dwell bounds and transition
    /// graph, a given per-profile `scale` factor, and injected `random`
    /// (`[0,1)`) and `clock` (ms) functions.
    #[must_use]
    pub fn new(scale: f64, random: RandomFn, clock: ClockFn) -> Arc<Self> {
        let dwell_bounds = default_dwell_bounds();
        let transitions = default_transitions();
        let now = clock();
        let initial_dwell = Self::sample_dwell_with(&dwell_bounds, BehaviouralState::Idle, scale, &random);
        Arc::new(Self {
            state: Mutex::new(BehaviouralState::Idle),
            dwell_ms: AtomicU64::new(initial_dwell),
            entered_at_ms: AtomicU64::new(now),
            scale,
            random,
            clock,
            dwell_bounds,
            transitions,
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            running: AtomicBool::new(false),
            timer_handle: Mutex::new(None),
        })
    }

    /// Override the default dwell-bounds table (for tests that need tight,
    /// deterministic windows).
    #[must_use]
    pub fn with_dwell_bounds(mut self: Arc<Self>, bounds: HashMap<BehaviouralState, DwellBounds>) -> Arc<Self> {
        Arc::get_mut(&mut self)
            .expect("with_dwell_bounds must be called before sharing the machine")
            .dwell_bounds = bounds;
        self
    }

    /// Override the default transition graph.
    #[must_use]
    pub fn with_transitions(mut self: Arc<Self>, transitions: HashMap<BehaviouralState, Vec<TransitionEdge>>) -> Arc<Self> {
        Arc::get_mut(&mut self)
            .expect("with_transitions must be called before sharing the machine")
            .transitions = transitions;
        self
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> BehaviouralState {
        *self.state.lock()
    }

    /// The remaining dwell budget sampled for the current state.
    #[must_use]
    pub fn current_dwell_ms(&self) -> u64 {
        self.dwell_ms.load(Ordering::SeqCst)
    }

    /// Whether the machine is running in timer mode.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Register a transition listener.
    pub fn on_transition<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&TransitionEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().push((id, Arc::new(handler)));
        id
    }

    /// Remove a previously registered listener.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.lock().retain(|(existing, _)| *existing != id);
    }

    /// Advance the machine if the sampled dwell has elapsed. Fails with
    /// [`BehaviorError::TickWhileRunning`] while the machine is in timer
    /// mode (`start()`-ed); timer mode drives transitions on its own.
    pub fn tick(&self) -> Result<(), BehaviorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(BehaviorError::TickWhileRunning);
        }
        let now = (self.clock)();
        let entered_at = self.entered_at_ms.load(Ordering::SeqCst);
        let dwell = self.dwell_ms.load(Ordering::SeqCst);
        if now.saturating_sub(entered_at) >= dwell {
            self.advance(now);
        }
        Ok(())
    }

    /// Immediately transition to `target`, resetting the dwell budget and
    /// notifying listeners, regardless of elapsed time or operating mode.
    pub fn force_transition(&self, target: BehaviouralState) {
        let now = (self.clock)();
        let from = *self.state.lock();
        self.transition_to(from, target, now);
    }

    /// Start timer mode: an internal one-shot timer fires when the current
    /// dwell elapses, advances the state, and reschedules itself. `tick()`
    /// is disallowed for the duration. No-op if already running.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let machine = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                let dwell = machine.dwell_ms.load(Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(dwell)).await;
                if !machine.running.load(Ordering::SeqCst) {
                    break;
                }
                let now = (machine.clock)();
                machine.advance(now);
            }
        });
        *self.timer_handle.lock() = Some(handle);
    }

    /// Stop timer mode, cancelling the pending timer. No-op if not running.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.timer_handle.lock().take() {
            handle.abort();
        }
    }

    fn advance(&self, now_ms: u64) {
        let hour = ((now_ms / 3_600_000) % 24) as u32;
        let time_of_day = TimeOfDay::from_hour(hour);
        let from = *self.state.lock();
        let to = self.pick_next(from, time_of_day);
        self.transition_to(from, to, now_ms);
    }

    fn transition_to(&self, from: BehaviouralState, to: BehaviouralState, now_ms: u64) {
        let dwell = Self::sample_dwell_with(&self.dwell_bounds, to, self.scale, &self.random);
        *self.state.lock() = to;
        self.dwell_ms.store(dwell, Ordering::SeqCst);
        self.entered_at_ms.store(now_ms, Ordering::SeqCst);
        let event = TransitionEvent { from, to, dwell_ms: dwell };
        debug!(?from, ?to, dwell_ms = dwell, "behavioural state transition");
        let listeners: Vec<Listener> = self.listeners.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in listeners {
            listener(&event);
        }
    }

    fn pick_next(&self, current: BehaviouralState, time_of_day: TimeOfDay) -> BehaviouralState {
        let edges = self
            .transitions
            .get(&current)
            .cloned()
            .unwrap_or_else(|| BehaviouralState::ALL.iter().map(|s| TransitionEdge { target: *s, weight: 1.0 }).collect());

        let modulated: Vec<(BehaviouralState, f64)> = edges
            .iter()
            .map(|e| (e.target, e.weight * default_time_of_day_multiplier(e.target, time_of_day)))
            .collect();
        let modulated_total: f64 = modulated.iter().map(|(_, w)| w).sum();

        let (pool, total) = if modulated_total > 0.0 {
            (modulated, modulated_total)
        } else {
            let raw: Vec<(BehaviouralState, f64)> = edges.iter().map(|e| (e.target, e.weight)).collect();
            let raw_total: f64 = raw.iter().map(|(_, w)| w).sum();
            (raw, raw_total)
        };

        if total <= 0.0 {
            return current;
        }

        let roll = (self.random)() * total;
        let mut cumulative = 0.0;
        for (target, weight) in &pool {
            cumulative += weight;
            if roll < cumulative {
                return *target;
            }
        }
        pool.last().map(|(target, _)| *target).unwrap_or(current)
    }

    fn sample_dwell_with(
        bounds: &HashMap<BehaviouralState, DwellBounds>,
        state: BehaviouralState,
        scale: f64,
        random: &RandomFn,
    ) -> u64 {
        let b = bounds.get(&state).copied().unwrap_or(DwellBounds { min_ms: 1_000, max_ms: 5_000 });
        let min = (b.min_ms as f64 * scale).max(0.0);
        let max = (b.max_ms as f64 * scale).max(min);
        let span = max - min;
        (min + span * random()) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64 as StdAtomicU64;

    fn fixed_random(value: f64) -> RandomFn {
        Arc::new(move || value)
    }

    fn fixed_clock_sequence(start_ms: u64, step_ms: u64) -> ClockFn {
        let counter = Arc::new(StdAtomicU64::new(start_ms));
        Arc::new(move || counter.fetch_add(step_ms, Ordering::SeqCst))
    }

    #[test]
    fn starts_idle_with_a_sampled_dwell_in_bounds() {
        let machine = BehaviouralStateMachine::new(1.0, fixed_random(0.0), fixed_clock_sequence(0, 1));
        assert_eq!(machine.state(), BehaviouralState::Idle);
        assert_eq!(machine.current_dwell_ms(), 2_000);
    }

    #[test]
    fn tick_before_dwell_elapses_does_not_transition() {
        let clock = fixed_clock_sequence(1_000_000, 1);
        let machine = BehaviouralStateMachine::new(1.0, fixed_random(0.0), clock);
        machine.tick().unwrap();
        assert_eq!(machine.state(), BehaviouralState::Idle);
    }

    #[test]
    fn tick_after_dwell_elapses_transitions() {
        let base = Arc::new(StdAtomicU64::new(0));
        let base_clone = Arc::clone(&base);
        let clock: ClockFn = Arc::new(move || base_clone.load(Ordering::SeqCst));
        let machine = BehaviouralStateMachine::new(1.0, fixed_random(0.0), clock);
        assert_eq!(machine.current_dwell_ms(), 2_000);
        base.store(5_000, Ordering::SeqCst);
        machine.tick().unwrap();
        assert_ne!(machine.state(), BehaviouralState::Idle, "should have left idle once dwell elapsed");
    }

    #[test]
    fn tick_is_rejected_while_running() {
        let machine = BehaviouralStateMachine::new(1.0, fixed_random(0.5), fixed_clock_sequence(0, 0));
        machine.start();
        let err = machine.tick().unwrap_err();
        assert_eq!(err, BehaviorError::TickWhileRunning);
        machine.stop();
    }

    #[test]
    fn force_transition_notifies_listeners_and_resets_dwell() {
        let machine = BehaviouralStateMachine::new(1.0, fixed_random(0.0), fixed_clock_sequence(0, 1));
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        machine.on_transition(move |event| {
            *seen_clone.lock() = Some(*event);
        });
        machine.force_transition(BehaviouralState::Away);
        assert_eq!(machine.state(), BehaviouralState::Away);
        let event = seen.lock().expect("listener should have fired");
        assert_eq!(event.from, BehaviouralState::Idle);
        assert_eq!(event.to, BehaviouralState::Away);
        assert_eq!(event.dwell_ms, 300_000);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let machine = BehaviouralStateMachine::new(1.0, fixed_random(0.0), fixed_clock_sequence(0, 1));
        let count = Arc::new(StdAtomicU64::new(0));
        let count_clone = Arc::clone(&count);
        let id = machine.on_transition(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        machine.unsubscribe(id);
        machine.force_transition(BehaviouralState::Active);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn single_edge_is_always_picked_regardless_of_modulation() {
        let machine = BehaviouralStateMachine::new(1.0, fixed_random(0.5), fixed_clock_sequence(0, 1))
            .with_transitions(HashMap::from([(
                BehaviouralState::Idle,
                vec![TransitionEdge { target: BehaviouralState::Active, weight: 1.0 }],
            )]));
        let next = machine.pick_next(BehaviouralState::Idle, TimeOfDay::Night);
        assert_eq!(next, BehaviouralState::Active);
    }
}
