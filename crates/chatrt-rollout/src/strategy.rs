//! Deployment-strategy evaluation: given a fix candidate and a confidence
//! threshold, decide whether it ships automatically, in stages, or only by
//! hand.

use crate::fix::FixCandidate;

/// How a fix should be deployed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeployStrategy {
    /// Ship to 100% immediately.
    Auto,
    /// Ship through intermediate traffic stages before 100%.
    Staged,
    /// Requires a human to apply and deploy.
    Manual,
}

/// The outcome of [`evaluate_deployment`]: a strategy and why it was
/// chosen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeploymentDecision {
    /// The chosen strategy.
    pub strategy: DeployStrategy,
    /// A short, human-readable justification.
    pub reason: String,
}

/// Decide how `fix` should be deployed given a confidence `threshold` for
/// automatic rollout.
///
/// - `Manual` if there are no patches, or `confidence < 0.4`.
/// - `Auto` if `confidence >= threshold` and the fix carries tests.
/// - `Staged` otherwise.
#[must_use]
pub fn evaluate_deployment(fix: &FixCandidate, threshold: f64) -> DeploymentDecision {
    if fix.patches.is_empty() {
        return DeploymentDecision {
            strategy: DeployStrategy::Manual,
            reason: "fix carries no patches".to_string(),
        };
    }

    if fix.confidence < 0.4 {
        return DeploymentDecision {
            strategy: DeployStrategy::Manual,
            reason: format!("confidence {:.2} is below the manual-review floor of 0.40", fix.confidence),
        };
    }

    if fix.confidence >= threshold && fix.has_tests {
        return DeploymentDecision {
            strategy: DeployStrategy::Auto,
            reason: format!(
                "confidence {:.2} meets the auto-deploy threshold of {:.2} and tests are present",
                fix.confidence, threshold
            ),
        };
    }

    DeploymentDecision {
        strategy: DeployStrategy::Staged,
        reason: if fix.has_tests {
            format!("confidence {:.2} is below the auto-deploy threshold of {:.2}", fix.confidence, threshold)
        } else {
            "fix carries no tests, staging for gradual validation".to_string()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::Patch;
    use std::path::PathBuf;

    fn patched(confidence: f64, has_tests: bool) -> FixCandidate {
        let patches = vec![Patch {
            file: PathBuf::from("src/lib.rs"),
            original_code: "old".to_string(),
            new_code: "new".to_string(),
        }];
        let tests = if has_tests {
            vec![crate::fix::TestFile { path: PathBuf::from("tests/fix.rs"), content: String::new() }]
        } else {
            Vec::new()
        };
        FixCandidate::new(confidence, patches, tests)
    }

    #[test]
    fn no_patches_is_always_manual() {
        let fix = FixCandidate::new(0.99, Vec::new(), Vec::new());
        let decision = evaluate_deployment(&fix, 0.8);
        assert_eq!(decision.strategy, DeployStrategy::Manual);
    }

    #[test]
    fn low_confidence_is_manual_regardless_of_tests() {
        let fix = patched(0.1, true);
        assert_eq!(evaluate_deployment(&fix, 0.8).strategy, DeployStrategy::Manual);
    }

    #[test]
    fn high_confidence_with_tests_is_auto() {
        let fix = patched(0.9, true);
        assert_eq!(evaluate_deployment(&fix, 0.8).strategy, DeployStrategy::Auto);
    }

    #[test]
    fn high_confidence_without_tests_is_staged() {
        let fix = patched(0.9, false);
        assert_eq!(evaluate_deployment(&fix, 0.8).strategy, DeployStrategy::Staged);
    }

    #[test]
    fn mid_confidence_with_tests_is_staged() {
        let fix = patched(0.5, true);
        assert_eq!(evaluate_deployment(&fix, 0.8).strategy, DeployStrategy::Staged);
    }

    #[test]
    fn boundary_confidence_exactly_at_threshold_is_auto() {
        let fix = patched(0.8, true);
        assert_eq!(evaluate_deployment(&fix, 0.8).strategy, DeployStrategy::Auto);
    }

    #[test]
    fn boundary_confidence_exactly_at_manual_floor_is_not_manual() {
        let fix = patched(0.4, false);
        assert_eq!(evaluate_deployment(&fix, 0.8).strategy, DeployStrategy::Staged);
    }
}
