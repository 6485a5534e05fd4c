//! Patch application, test-file materialization, and test-command execution
//! with automatic revert on failure.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::RolloutError;
use crate::fix::FixCandidate;
use crate::tracker::RolloutTracker;

/// The result of running the injected test command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOutput {
    /// The process's exit code.
    pub exit_code: i32,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

/// Runs a shell command against a working directory. Injected so deploy
/// logic is testable without actually invoking a test suite.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command args...` with `cwd` as the working directory.
    async fn run(&self, command: &str, args: &[String], cwd: &Path) -> Result<CommandOutput, RolloutError>;
}

/// What happened when [`execute_deploy`] ran.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployOutcome {
    /// Whether the rollout tracker was advanced a stage.
    pub advanced: bool,
    /// Whether patches were reverted because the test command failed.
    pub reverted: bool,
    /// The test command's exit code.
    pub exit_code: i32,
}

async fn read_file(path: &Path) -> Result<String, RolloutError> {
    tokio::fs::read_to_string(path).await.map_err(|source| RolloutError::Io { path: path.to_path_buf(), source })
}

async fn write_file(path: &Path, content: &str) -> Result<(), RolloutError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| RolloutError::Io { path: parent.to_path_buf(), source })?;
        }
    }
    tokio::fs::write(path, content).await.map_err(|source| RolloutError::Io { path: path.to_path_buf(), source })
}

/// Apply `fix`'s patches under `root`, write its test files, run the test
/// command via `runner`, and either advance `tracker` (exit code `0`) or
/// revert every applied patch in reverse order (non-zero exit code).
///
/// Patches are applied in order; if one's `original_code` cannot be found
/// in its target file, patches already applied in this call are reverted
/// and an error is returned — the test command never runs against a
/// partially-applied fix.
pub async fn execute_deploy(
    root: &Path,
    fix: &FixCandidate,
    test_command: &str,
    test_args: &[String],
    runner: &dyn CommandRunner,
    tracker: &mut RolloutTracker,
    now_ms: u64,
) -> Result<DeployOutcome, RolloutError> {
    let mut applied: Vec<(PathBuf, String)> = Vec::new();

    for patch in &fix.patches {
        let path = root.join(&patch.file);
        let original_content = match read_file(&path).await {
            Ok(content) => content,
            Err(err) => {
                revert(&applied).await;
                return Err(err);
            }
        };

        let Some(pos) = original_content.find(&patch.original_code) else {
            revert(&applied).await;
            return Err(RolloutError::PatchTargetNotFound(patch.file.clone()));
        };

        let mut patched = String::with_capacity(original_content.len());
        patched.push_str(&original_content[..pos]);
        patched.push_str(&patch.new_code);
        patched.push_str(&original_content[pos + patch.original_code.len()..]);

        if let Err(err) = write_file(&path, &patched).await {
            revert(&applied).await;
            return Err(err);
        }

        applied.push((path, original_content));
    }

    for test in &fix.tests {
        let path = root.join(&test.path);
        if let Err(err) = write_file(&path, &test.content).await {
            revert(&applied).await;
            return Err(err);
        }
    }

    let output = runner
        .run(test_command, test_args, root)
        .await
        .map_err(|err| RolloutError::CommandRunnerFailed(err.to_string()))?;

    if output.exit_code == 0 {
        tracker.advance(now_ms);
        info!(stage = tracker.state().stage, "deploy test command passed, rollout advanced");
        Ok(DeployOutcome { advanced: true, reverted: false, exit_code: output.exit_code })
    } else {
        warn!(exit_code = output.exit_code, "deploy test command failed, reverting patches");
        revert(&applied).await;
        Ok(DeployOutcome { advanced: false, reverted: true, exit_code: output.exit_code })
    }
}

async fn revert(applied: &[(PathBuf, String)]) {
    for (path, original_content) in applied.iter().rev() {
        if let Err(source) = tokio::fs::write(path, original_content).await {
            warn!(?path, %source, "failed to restore original content during revert");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::{Patch, TestFile};
    use crate::strategy::DeployStrategy;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct ScriptedRunner {
        exit_code: i32,
        calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl ScriptedRunner {
        fn new(exit_code: i32) -> Self {
            Self { exit_code, calls: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, command: &str, args: &[String], _cwd: &Path) -> Result<CommandOutput, RolloutError> {
            self.calls.lock().unwrap().push((command.to_string(), args.to_vec()));
            Ok(CommandOutput { exit_code: self.exit_code, stdout: String::new(), stderr: String::new() })
        }
    }

    #[tokio::test]
    async fn successful_test_command_applies_patch_and_advances_rollout() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("lib.rs"), "fn broken() { 1 }").await.unwrap();

        let fix = FixCandidate::new(
            0.9,
            vec![Patch {
                file: PathBuf::from("lib.rs"),
                original_code: "1".to_string(),
                new_code: "2".to_string(),
            }],
            vec![TestFile { path: PathBuf::from("tests/fix_test.rs"), content: "// test".to_string() }],
        );

        let runner = ScriptedRunner::new(0);
        let mut tracker = RolloutTracker::new(DeployStrategy::Staged, 0);

        let outcome =
            execute_deploy(dir.path(), &fix, "cargo", &["test".to_string()], &runner, &mut tracker, 10).await.unwrap();

        assert!(outcome.advanced);
        assert!(!outcome.reverted);
        assert_eq!(tracker.state().stage, 50);

        let patched = tokio::fs::read_to_string(dir.path().join("lib.rs")).await.unwrap();
        assert_eq!(patched, "fn broken() { 2 }");

        assert!(dir.path().join("tests/fix_test.rs").exists());
    }

    #[tokio::test]
    async fn failing_test_command_reverts_patch_and_does_not_advance() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("lib.rs"), "fn broken() { 1 }").await.unwrap();

        let fix = FixCandidate::new(
            0.9,
            vec![Patch {
                file: PathBuf::from("lib.rs"),
                original_code: "1".to_string(),
                new_code: "2".to_string(),
            }],
            Vec::new(),
        );

        let runner = ScriptedRunner::new(1);
        let mut tracker = RolloutTracker::new(DeployStrategy::Staged, 0);

        let outcome =
            execute_deploy(dir.path(), &fix, "cargo", &["test".to_string()], &runner, &mut tracker, 10).await.unwrap();

        assert!(!outcome.advanced);
        assert!(outcome.reverted);
        assert_eq!(tracker.state().stage, 10);

        let content = tokio::fs::read_to_string(dir.path().join("lib.rs")).await.unwrap();
        assert_eq!(content, "fn broken() { 1 }");
    }

    #[tokio::test]
    async fn missing_patch_target_reverts_prior_patches_in_the_same_call() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.rs"), "alpha").await.unwrap();
        tokio::fs::write(dir.path().join("b.rs"), "beta").await.unwrap();

        let fix = FixCandidate::new(
            0.9,
            vec![
                Patch { file: PathBuf::from("a.rs"), original_code: "alpha".to_string(), new_code: "ALPHA".to_string() },
                Patch {
                    file: PathBuf::from("b.rs"),
                    original_code: "does-not-exist".to_string(),
                    new_code: "BETA".to_string(),
                },
            ],
            Vec::new(),
        );

        let runner = ScriptedRunner::new(0);
        let mut tracker = RolloutTracker::new(DeployStrategy::Staged, 0);

        let result = execute_deploy(dir.path(), &fix, "cargo", &[], &runner, &mut tracker, 10).await;
        assert!(result.is_err());

        let content = tokio::fs::read_to_string(dir.path().join("a.rs")).await.unwrap();
        assert_eq!(content, "alpha", "patch to a.rs should have been reverted");
        assert_eq!(tracker.state().stage, 10);
    }
}
