//! Shared error taxonomy used by every adapter crate.

use thiserror::Error;

/// Errors a unified adapter operation can fail with.
///
/// Adapter crates wrap their backend-specific errors (HTTP, WebSocket,
/// subprocess I/O, ...) into [`AdapterError::Transport`] via `#[from]` at
/// their own boundary; this enum only names the cases every adapter shares.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// An operation was attempted while the adapter wasn't connected.
    #[error("adapter is not connected")]
    NotConnected,

    /// `connect()` was called on an adapter that is already connected.
    #[error("adapter is already connected")]
    AlreadyConnected,

    /// An awaited condition (e.g. connection open, QR scan) did not occur
    /// within the configured budget.
    #[error("operation timed out after {0}ms")]
    Timeout(u64),

    /// The requested capability isn't meaningful on this platform.
    #[error("operation `{0}` is not supported on this platform")]
    UnsupportedOperation(&'static str),

    /// The backend's authenticated session is permanently invalid and
    /// requires re-authentication from scratch.
    #[error("session expired and must be re-established")]
    SessionExpired,

    /// Input failed structural or semantic validation before being sent.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The underlying transport (HTTP client, WebSocket, subprocess pipe,
    /// browser driver) reported an error.
    #[error("transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_operation_names_the_operation() {
        let err = AdapterError::UnsupportedOperation("markRead");
        assert!(err.to_string().contains("markRead"));
    }
}
