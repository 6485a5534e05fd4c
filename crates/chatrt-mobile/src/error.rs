//! Error taxonomy for the mobile-protocol session manager and adapter.

use thiserror::Error;

/// Errors raised by [`crate::session::SessionManager`], the file-backed
/// [`crate::auth::AuthStore`], and the mobile-protocol adapter.
#[derive(Debug, Error)]
pub enum MobileError {
    /// `connect()` was called while the session was anywhere other than
    /// `disconnected`.
    #[error("session must be disconnected before connecting")]
    AlreadyConnecting,

    /// A pairing-code request arrived with no active transport.
    #[error("no active socket")]
    NoActiveSocket,

    /// The session is permanently expired; an explicit `connect()` is
    /// required before anything else will succeed.
    #[error("session expired, reconnect explicitly")]
    SessionExpired,

    /// The injected transport reported a failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The file-backed auth store hit an I/O error.
    #[error("auth store io error: {0}")]
    Io(#[from] std::io::Error),

    /// The file-backed auth store failed to (de)serialize state.
    #[error("auth store serialization error: {0}")]
    Serialization(String),
}
