//! The behavioural session state machine and human-response simulator.
//!
//! Two related but independent subsystems live here: [`state_machine`]
//! drives a persona's presence (idle/active/reading/...) over time, and
//! [`human_response`] converts a profile and a message into realistic
//! read/think/type delays. The browser-automation adapter is the primary
//! consumer of both, but neither depends on any adapter crate.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod human_response;
pub mod state_machine;
pub mod time_of_day;

pub use human_response::{DelayBounds, HumanResponseSimulator, ResponsePlan, ResponseProfile};
pub use state_machine::{BehaviorError, BehaviouralState, BehaviouralStateMachine, SubscriptionId, TransitionEvent};
pub use time_of_day::{ActivityPeriod, TimeOfDay};
