//! Fix-deployment strategy evaluation, staged rollout tracking, and
//! patch apply/test/revert execution.
//!
//! This is a deliberately bounded subsystem: it evaluates and deploys a
//! fix candidate someone else generated, it does not generate fixes
//! itself.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod deploy;
pub mod error;
pub mod fix;
pub mod strategy;
pub mod tracker;

pub use deploy::{execute_deploy, CommandOutput, CommandRunner, DeployOutcome};
pub use error::RolloutError;
pub use fix::{FixCandidate, Patch, TestFile};
pub use strategy::{evaluate_deployment, DeployStrategy, DeploymentDecision};
pub use tracker::{RolloutState, RolloutTracker};
