//! Error taxonomy for the subprocess-RPC process manager and adapter.

use thiserror::Error;

/// Errors raised by the [`crate::process::ProcessManager`].
#[derive(Debug, Error)]
pub enum RpcError {
    /// `start()` was called on a process manager that is already running.
    #[error("process manager already started")]
    AlreadyStarted,

    /// `request()` was called before `start()`.
    #[error("process manager is not running")]
    NotRunning,

    /// The child process exited (or errored) while requests were pending;
    /// every pending request is rejected with this variant.
    #[error("subprocess terminated: {0}")]
    Terminated(String),

    /// A request was not answered within its configured timeout.
    #[error("request `{method}` timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The method name that timed out.
        method: String,
        /// The configured per-request timeout.
        timeout_ms: u64,
    },

    /// The subprocess returned a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// The JSON-RPC error code.
        code: i64,
        /// The JSON-RPC error message.
        message: String,
    },

    /// Spawning the child process failed.
    #[error("failed to spawn subprocess: {0}")]
    Spawn(#[source] std::io::Error),

    /// Writing a request to the child's stdin failed.
    #[error("failed to write to subprocess stdin: {0}")]
    Write(#[source] std::io::Error),
}
