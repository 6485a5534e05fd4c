//! The error taxonomy for patch application and deploy execution.

use std::path::PathBuf;

/// Errors raised while applying, testing, or reverting a [`crate::fix::FixCandidate`].
#[derive(Debug, thiserror::Error)]
pub enum RolloutError {
    /// Reading or writing a patch target or test file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file being read or written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A patch's `original_code` was not found in its target file.
    #[error("patch target not found in {0}")]
    PatchTargetNotFound(PathBuf),

    /// The injected test command exited non-zero.
    #[error("test command exited with code {exit_code}")]
    TestCommandFailed {
        /// The process's exit code, if it terminated normally.
        exit_code: i32,
    },

    /// The injected test command could not be spawned or awaited.
    #[error("test command failed to run: {0}")]
    CommandRunnerFailed(String),
}
