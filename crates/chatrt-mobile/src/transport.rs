//! The transport contract [`crate::session::SessionManager`] drives.
//!
//! Grounded on `conductor/core/src/backend/traits.rs`'s `LlmBackend`: an
//! `async_trait` seam the core depends on without naming a concrete
//! implementation. Here it stands in for whatever paired-WebSocket client
//! library backs the mobile protocol — no pack repo carries one, so the
//! session manager is built against this trait the same way the teacher
//! builds its routing layer against `LlmBackend` rather than a concrete
//! Ollama/OpenAI client.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::auth::AuthState;
use crate::error::MobileError;

/// An event the transport pushes up to the session manager as it happens.
#[derive(Clone, Debug)]
pub enum TransportEvent {
    /// A fresh QR code to display/scan.
    Qr {
        /// Opaque QR payload.
        code: String,
    },
    /// The socket finished opening.
    Open {
        /// Set when this open follows a fresh pairing rather than a session
        /// restore.
        is_new_login: bool,
        /// The paired device's identifier.
        jid: String,
    },
    /// The socket closed.
    Close {
        /// The backend's status code, when one was given.
        status_code: Option<i32>,
        /// Free-form close reason, used to disambiguate status 408.
        reason: Option<String>,
    },
    /// Updated credential material to persist.
    CredsUpdate(Value),
    /// An inbound protocol payload (message, reaction, receipt, presence, ...).
    Message(Value),
}

/// Callback the transport invokes for every [`TransportEvent`] it produces.
pub type TransportEventCallback = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// The pluggable mobile-protocol transport.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Open the socket using the given stored auth state, delivering every
    /// subsequent event through `on_event` until [`SessionTransport::close`]
    /// is called.
    async fn connect(&self, auth: AuthState, on_event: TransportEventCallback) -> Result<(), MobileError>;

    /// Send a raw protocol payload (the mapped outbound message).
    async fn send_message(&self, payload: Value) -> Result<Value, MobileError>;

    /// Request a numeric pairing code for `phone_number` in place of a QR
    /// scan.
    async fn request_pairing_code(&self, phone_number: &str) -> Result<String, MobileError>;

    /// Close the socket. Idempotent.
    async fn close(&self);
}
