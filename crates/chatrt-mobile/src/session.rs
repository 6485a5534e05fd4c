//! The connect/QR/reconnect lifecycle, the hardest subsystem in this
//! workspace.
//!
//! Grounded on `conductor/core/src/session.rs`'s closed-enum lifecycle
//! (`SessionState::{Active,Busy,Paused,Ended}` with explicit transition
//! methods) for the `SessionState` enum and transition-method style, and on
//! `conductor/core/src/routing/connection_pool.rs`'s atomics-backed slot
//! bookkeeping for the reconnect-attempt counter. Timer scheduling follows
//! `chatrt_behavior::BehaviouralStateMachine`'s `Arc<Self>` + `tokio::spawn`
//! pattern.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::auth::AuthStore;
use crate::backoff::reconnect_delay_ms;
use crate::disconnect::classify_disconnect;
use crate::error::MobileError;
use crate::transport::{SessionTransport, TransportEvent, TransportEventCallback};

/// Lifecycle state of a mobile-protocol session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No transport is active and none is being established.
    Disconnected,
    /// `connect()` has been called; waiting for a QR challenge or an
    /// immediate session restore.
    Connecting,
    /// A QR code has been issued and not yet scanned.
    WaitingForQr,
    /// The socket is open and authenticated.
    Connected,
    /// A reconnectable disconnect occurred; a backoff timer is pending.
    Reconnecting,
    /// A permanent disconnect occurred, or reconnect attempts were
    /// exhausted. Only an explicit `connect()` leaves this state.
    SessionExpired,
}

/// Events emitted by the session manager. Distinct from the adapter-facing
/// `message/reaction/typing/...` vocabulary in `chatrt_core::event` — this
/// is the `qr, authenticated, connected, disconnected, reconnecting,
/// session-expired` surface the specification names for the session layer.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// A fresh QR code was issued.
    Qr {
        /// How many QR codes have been issued since the last successful
        /// open, including this one.
        attempt: u32,
        /// The QR payload.
        code: String,
    },
    /// The socket opened and authenticated.
    Authenticated {
        /// `true` iff this followed a fresh pairing rather than a session
        /// restore.
        is_new_login: bool,
    },
    /// The session is fully connected.
    Connected {
        /// The paired device's identifier.
        jid: String,
    },
    /// The session closed, with no further reconnect scheduled.
    Disconnected {
        /// Close reason, when known.
        reason: Option<String>,
    },
    /// A reconnect attempt was scheduled.
    Reconnecting {
        /// The attempt number about to run (1-based).
        attempt: u32,
        /// The configured attempt cap.
        max_attempts: u32,
        /// How long until the attempt fires.
        delay_ms: u64,
    },
    /// Reconnect attempts were exhausted, or a non-reconnectable disconnect
    /// occurred.
    SessionExpired,
    /// A background operation (credential save) failed without tearing down
    /// the live session.
    Error {
        /// Human-readable description.
        message: String,
    },
    /// A raw inbound protocol payload, forwarded as-is for the adapter layer
    /// to translate into unified events.
    Inbound(serde_json::Value),
}

/// Opaque handle returned by [`SessionManager::on`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionListenerId(u64);

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

type SessionListener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Tunables for reconnect behaviour and pairing.
#[derive(Clone, Debug)]
pub struct SessionManagerConfig {
    /// Reconnect attempts allowed after a reconnectable disconnect. `0`
    /// disables reconnection entirely.
    pub max_reconnect_attempts: u32,
    /// The unjittered delay for the first reconnect attempt.
    pub base_reconnect_delay_ms: u64,
    /// The clamp ceiling for the backoff formula.
    pub max_reconnect_delay_ms: u64,
    /// How long `waiting_for_qr` may persist before being treated as a
    /// timed-out attempt.
    pub qr_timeout_ms: u64,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            base_reconnect_delay_ms: 1_000,
            max_reconnect_delay_ms: 30_000,
            qr_timeout_ms: 60_000,
        }
    }
}

/// Drives a [`SessionTransport`] through connect/QR/reconnect, persisting
/// credentials through an [`AuthStore`] and notifying [`SessionEvent`]
/// listeners.
pub struct SessionManager {
    config: SessionManagerConfig,
    auth_store: Arc<dyn AuthStore>,
    transport: Arc<dyn SessionTransport>,
    state: Mutex<SessionState>,
    reconnect_attempt: AtomicU32,
    qr_attempt: AtomicU32,
    generation: AtomicU64,
    listeners: Mutex<HashMap<SessionListenerId, SessionListener>>,
    reconnect_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    qr_timeout_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl SessionManager {
    /// Construct a manager over the given transport and auth store, not yet
    /// connected.
    #[must_use]
    pub fn new(config: SessionManagerConfig, auth_store: Arc<dyn AuthStore>, transport: Arc<dyn SessionTransport>) -> Arc<Self> {
        Arc::new(Self {
            config,
            auth_store,
            transport,
            state: Mutex::new(SessionState::Disconnected),
            reconnect_attempt: AtomicU32::new(0),
            qr_attempt: AtomicU32::new(0),
            generation: AtomicU64::new(0),
            listeners: Mutex::new(HashMap::new()),
            reconnect_task: Mutex::new(None),
            qr_timeout_task: Mutex::new(None),
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Register a session-event listener.
    pub fn on<F>(&self, handler: F) -> SessionListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = SessionListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().insert(id, Arc::new(handler));
        id
    }

    /// Unregister a previously registered listener.
    pub fn off(&self, id: SessionListenerId) {
        self.listeners.lock().remove(&id);
    }

    fn emit(&self, event: SessionEvent) {
        let listeners: Vec<SessionListener> = self.listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener(&event);
        }
    }

    /// Open the transport. Rejects with [`MobileError::AlreadyConnecting`]
    /// unless the session is currently `disconnected`.
    pub async fn connect(self: &Arc<Self>) -> Result<(), MobileError> {
        if *self.state.lock() != SessionState::Disconnected {
            return Err(MobileError::AlreadyConnecting);
        }
        self.begin_connect_attempt().await
    }

    async fn begin_connect_attempt(self: &Arc<Self>) -> Result<(), MobileError> {
        *self.state.lock() = SessionState::Connecting;
        let auth = self.auth_store.load_state().await?;

        let manager = Arc::clone(self);
        let generation = self.generation.load(Ordering::SeqCst);
        let on_event: TransportEventCallback = Arc::new(move |event| {
            manager.clone().handle_transport_event(generation, event);
        });

        self.transport.connect(auth, on_event).await
    }

    /// Request a numeric pairing code in place of a QR scan. Fails with
    /// [`MobileError::NoActiveSocket`] if no transport is currently active.
    pub async fn pairing_code(&self, phone_number: &str) -> Result<String, MobileError> {
        if *self.state.lock() == SessionState::Disconnected {
            return Err(MobileError::NoActiveSocket);
        }
        self.transport.request_pairing_code(phone_number).await
    }

    /// Send a raw outbound payload through the transport.
    pub async fn send_message(&self, payload: serde_json::Value) -> Result<serde_json::Value, MobileError> {
        if *self.state.lock() != SessionState::Connected {
            return Err(MobileError::NoActiveSocket);
        }
        self.transport.send_message(payload).await
    }

    /// Idempotent user-initiated disconnect. Clears all timers and the
    /// reconnect counter, and never schedules a reconnect.
    pub async fn disconnect(self: &Arc<Self>) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cancel_timers();
        self.reconnect_attempt.store(0, Ordering::SeqCst);
        self.qr_attempt.store(0, Ordering::SeqCst);

        let was_connected = *self.state.lock() != SessionState::Disconnected;
        if was_connected {
            self.transport.close().await;
            *self.state.lock() = SessionState::Disconnected;
            self.emit(SessionEvent::Disconnected { reason: None });
        }
    }

    fn cancel_timers(&self) {
        if let Some(handle) = self.reconnect_task.lock().take() {
            handle.abort();
        }
        if let Some(handle) = self.qr_timeout_task.lock().take() {
            handle.abort();
        }
    }

    /// Dispatch a transport event. `generation` must match the manager's
    /// current generation (bumped on every `connect()`/`disconnect()`) or
    /// the event is a stale callback from a superseded transport and is
    /// dropped.
    fn handle_transport_event(self: Arc<Self>, generation: u64, event: TransportEvent) {
        if generation != self.generation.load(Ordering::SeqCst) {
            debug!("dropping transport event from a superseded generation");
            return;
        }

        match event {
            TransportEvent::Qr { code } => self.on_qr(code),
            TransportEvent::Open { is_new_login, jid } => self.on_open(is_new_login, jid),
            TransportEvent::Close { status_code, reason } => self.on_close(status_code, reason),
            TransportEvent::CredsUpdate(creds) => self.on_creds_update(creds),
            TransportEvent::Message(payload) => self.emit(SessionEvent::Inbound(payload)),
        }
    }

    fn on_qr(self: &Arc<Self>, code: String) {
        let attempt = self.qr_attempt.fetch_add(1, Ordering::SeqCst) + 1;
        *self.state.lock() = SessionState::WaitingForQr;
        self.schedule_qr_timeout();
        self.emit(SessionEvent::Qr { attempt, code });
    }

    fn schedule_qr_timeout(self: &Arc<Self>) {
        if let Some(handle) = self.qr_timeout_task.lock().take() {
            handle.abort();
        }
        let manager = Arc::clone(self);
        let generation = self.generation.load(Ordering::SeqCst);
        let timeout_ms = self.config.qr_timeout_ms;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
            if generation != manager.generation.load(Ordering::SeqCst) {
                return;
            }
            if *manager.state.lock() == SessionState::WaitingForQr {
                manager.on_close(Some(408), Some("QR refresh attempts exhausted".to_string()));
            }
        });
        *self.qr_timeout_task.lock() = Some(handle);
    }

    fn on_open(self: &Arc<Self>, is_new_login: bool, jid: String) {
        self.cancel_timers();
        self.qr_attempt.store(0, Ordering::SeqCst);
        self.reconnect_attempt.store(0, Ordering::SeqCst);
        *self.state.lock() = SessionState::Connected;
        self.emit(SessionEvent::Authenticated { is_new_login });
        self.emit(SessionEvent::Connected { jid });
    }

    fn on_close(self: &Arc<Self>, status_code: Option<i32>, reason: Option<String>) {
        let classification = classify_disconnect(status_code, reason.as_deref());

        if classification.clear_session {
            let auth_store = Arc::clone(&self.auth_store);
            tokio::spawn(async move {
                if let Err(err) = auth_store.clear_state().await {
                    error!(%err, "failed to clear auth state after permanent disconnect");
                }
            });
        }

        let attempt = self.reconnect_attempt.fetch_add(1, Ordering::SeqCst) + 1;
        let reconnectable = classification.should_reconnect && self.config.max_reconnect_attempts > 0 && attempt <= self.config.max_reconnect_attempts;

        if reconnectable {
            let delay_ms = reconnect_delay_ms(attempt, self.config.base_reconnect_delay_ms, self.config.max_reconnect_delay_ms);
            *self.state.lock() = SessionState::Reconnecting;
            self.emit(SessionEvent::Reconnecting {
                attempt,
                max_attempts: self.config.max_reconnect_attempts,
                delay_ms,
            });
            self.schedule_reconnect(delay_ms);
        } else {
            self.reconnect_attempt.store(0, Ordering::SeqCst);
            *self.state.lock() = SessionState::SessionExpired;
            self.emit(SessionEvent::SessionExpired);
            self.emit(SessionEvent::Disconnected { reason });
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, delay_ms: u64) {
        let manager = Arc::clone(self);
        let generation = self.generation.load(Ordering::SeqCst);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            if generation != manager.generation.load(Ordering::SeqCst) {
                return;
            }
            if let Err(err) = manager.begin_connect_attempt().await {
                warn!(%err, "reconnect attempt failed to start");
                manager.on_close(None, Some(err.to_string()));
            }
        });
        *self.reconnect_task.lock() = Some(handle);
    }

    fn on_creds_update(self: &Arc<Self>, creds: serde_json::Value) {
        let auth_store = Arc::clone(&self.auth_store);
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = auth_store.save_creds(creds).await {
                manager.emit(SessionEvent::Error {
                    message: format!("failed to persist credentials: {err}"),
                });
            }
        });
    }
}
