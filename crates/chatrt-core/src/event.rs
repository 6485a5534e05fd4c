//! Unified adapter event model and the re-entrancy-guarded emitter.
//!
//! Grounded on `conductor/core/src/events.rs`'s tagged `SurfaceEvent` enum
//! and its atomic id generator, and on `conductor/core/src/surface_registry.rs`'s
//! listener-registry shape. Emission here is synchronous rather than
//! channel-based: a throwing listener must not abort delivery to the rest,
//! and must not be allowed to re-enter emission and loop forever, so the
//! emitter tracks an `emitting` flag instead of handing events to a channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chatrt_types::{Message, Platform, Reaction, ScopedId, User};
use parking_lot::Mutex;

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

/// A monotonically increasing id assigned to every emitted event, useful for
/// logging and for detecting duplicate delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventId(pub u64);

impl EventId {
    fn next() -> Self {
        Self(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Direction of a presence change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresenceKind {
    /// The user came online.
    Online,
    /// The user went offline.
    Offline,
}

/// The unified event surface every adapter emits.
#[derive(Clone, Debug)]
pub enum AdapterEvent {
    /// A new or edited message arrived.
    Message {
        /// Event id.
        id: EventId,
        /// Owning platform.
        platform: Platform,
        /// The message.
        message: Message,
    },
    /// A reaction was applied to a message.
    Reaction {
        /// Event id.
        id: EventId,
        /// Owning platform.
        platform: Platform,
        /// The reaction.
        reaction: Reaction,
        /// The message reacted to, by reference (may be a stub).
        target_message_id: ScopedId,
    },
    /// A user started or stopped typing.
    Typing {
        /// Event id.
        id: EventId,
        /// Owning platform.
        platform: Platform,
        /// Conversation the typing indicator belongs to.
        conversation_id: ScopedId,
        /// Who is typing.
        user: User,
    },
    /// A user's presence changed.
    Presence {
        /// Event id.
        id: EventId,
        /// Owning platform.
        platform: Platform,
        /// Who changed presence.
        user: User,
        /// Which way.
        kind: PresenceKind,
    },
    /// A message was read.
    Read {
        /// Event id.
        id: EventId,
        /// Owning platform.
        platform: Platform,
        /// The message that was read.
        message_id: ScopedId,
        /// When it was read.
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// The adapter encountered a background error (connection hiccup,
    /// credential-save failure, listener exception) that doesn't map to a
    /// synchronous call failing.
    Error {
        /// Event id.
        id: EventId,
        /// Owning platform.
        platform: Platform,
        /// Human-readable description.
        message: String,
    },
    /// The adapter finished connecting.
    Connected {
        /// Event id.
        id: EventId,
        /// Owning platform.
        platform: Platform,
    },
    /// The adapter disconnected (intentionally or not).
    Disconnected {
        /// Event id.
        id: EventId,
        /// Owning platform.
        platform: Platform,
        /// Reason, when known.
        reason: Option<String>,
    },
}

impl AdapterEvent {
    /// The id assigned at emission time.
    #[must_use]
    pub fn id(&self) -> EventId {
        match self {
            AdapterEvent::Message { id, .. }
            | AdapterEvent::Reaction { id, .. }
            | AdapterEvent::Typing { id, .. }
            | AdapterEvent::Presence { id, .. }
            | AdapterEvent::Read { id, .. }
            | AdapterEvent::Error { id, .. }
            | AdapterEvent::Connected { id, .. }
            | AdapterEvent::Disconnected { id, .. } => *id,
        }
    }

    /// The stable event name used for filtering/logging, matching the
    /// external interface's `message, reaction, typing, presence, read,
    /// error, connected, disconnected` vocabulary.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            AdapterEvent::Message { .. } => "message",
            AdapterEvent::Reaction { .. } => "reaction",
            AdapterEvent::Typing { .. } => "typing",
            AdapterEvent::Presence { .. } => "presence",
            AdapterEvent::Read { .. } => "read",
            AdapterEvent::Error { .. } => "error",
            AdapterEvent::Connected { .. } => "connected",
            AdapterEvent::Disconnected { .. } => "disconnected",
        }
    }
}

/// Builder helpers that stamp a fresh [`EventId`] on construction, mirroring
/// `SurfaceEvent::new_event_id()`.
pub struct EventBuilder;

impl EventBuilder {
    /// Build a `message` event.
    #[must_use]
    pub fn message(platform: Platform, message: Message) -> AdapterEvent {
        AdapterEvent::Message {
            id: EventId::next(),
            platform,
            message,
        }
    }

    /// Build a `reaction` event.
    #[must_use]
    pub fn reaction(platform: Platform, reaction: Reaction, target_message_id: ScopedId) -> AdapterEvent {
        AdapterEvent::Reaction {
            id: EventId::next(),
            platform,
            reaction,
            target_message_id,
        }
    }

    /// Build a `typing` event.
    #[must_use]
    pub fn typing(platform: Platform, conversation_id: ScopedId, user: User) -> AdapterEvent {
        AdapterEvent::Typing {
            id: EventId::next(),
            platform,
            conversation_id,
            user,
        }
    }

    /// Build a `presence` event.
    #[must_use]
    pub fn presence(platform: Platform, user: User, kind: PresenceKind) -> AdapterEvent {
        AdapterEvent::Presence {
            id: EventId::next(),
            platform,
            user,
            kind,
        }
    }

    /// Build a `read` event.
    #[must_use]
    pub fn read(platform: Platform, message_id: ScopedId, timestamp: chrono::DateTime<chrono::Utc>) -> AdapterEvent {
        AdapterEvent::Read {
            id: EventId::next(),
            platform,
            message_id,
            timestamp,
        }
    }

    /// Build an `error` event.
    #[must_use]
    pub fn error(platform: Platform, message: impl Into<String>) -> AdapterEvent {
        AdapterEvent::Error {
            id: EventId::next(),
            platform,
            message: message.into(),
        }
    }

    /// Build a `connected` event.
    #[must_use]
    pub fn connected(platform: Platform) -> AdapterEvent {
        AdapterEvent::Connected {
            id: EventId::next(),
            platform,
        }
    }

    /// Build a `disconnected` event.
    #[must_use]
    pub fn disconnected(platform: Platform, reason: Option<String>) -> AdapterEvent {
        AdapterEvent::Disconnected {
            id: EventId::next(),
            platform,
            reason,
        }
    }
}

/// Opaque handle returned by [`EventEmitter::on`], passed to
/// [`EventEmitter::off`] to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

type Listener = Arc<dyn Fn(&AdapterEvent) + Send + Sync>;

/// A synchronous, re-entrancy-guarded event emitter.
///
/// Every adapter owns one of these. Emission walks the listener list in
/// registration order; a listener that panics is not caught (panics are a
/// programming error, not a runtime condition), but a listener that merely
/// triggers another `emit()` re-enters safely: the nested emission still
/// delivers to all listeners, but any `error`-event emitted *during* a
/// nested emission is swallowed rather than re-broadcast, which is what
/// stops a misbehaving `error` listener from causing an infinite cascade.
pub struct EventEmitter {
    listeners: Mutex<HashMap<ListenerId, Listener>>,
    emitting: std::sync::atomic::AtomicBool,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventEmitter {
    /// Construct an emitter with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            emitting: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Register a listener, returning a handle usable with [`Self::off`].
    pub fn on<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&AdapterEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().insert(id, Arc::new(handler));
        id
    }

    /// Remove a previously registered listener. No-op if already removed.
    pub fn off(&self, id: ListenerId) {
        self.listeners.lock().remove(&id);
    }

    /// Deliver `event` to every registered listener.
    ///
    /// If this call is itself happening as a side effect of a listener
    /// invoked by an outer `emit()` (i.e. `emitting` was already `true`),
    /// any `error` event produced here is swallowed instead of delivered,
    /// to prevent a listener whose error handling re-triggers emission from
    /// looping.
    pub fn emit(&self, event: AdapterEvent) {
        let nested = self.emitting.swap(true, Ordering::SeqCst);
        if nested && matches!(event, AdapterEvent::Error { .. }) {
            self.emitting.store(nested, Ordering::SeqCst);
            return;
        }

        let listeners: Vec<Listener> = self.listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener(&event);
        }

        if !nested {
            self.emitting.store(false, Ordering::SeqCst);
        }
    }

    /// Number of currently registered listeners, for tests/diagnostics.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn emits_to_all_listeners_in_any_order() {
        let emitter = EventEmitter::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = Arc::clone(&count);
            emitter.on(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        emitter.emit(EventBuilder::connected(Platform::BotApi));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn off_stops_delivery() {
        let emitter = EventEmitter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let id = emitter.on(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        emitter.off(id);
        emitter.emit(EventBuilder::connected(Platform::BotApi));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn nested_error_emission_is_swallowed_not_rebroadcast() {
        let emitter = Arc::new(EventEmitter::new());
        let error_deliveries = Arc::new(AtomicUsize::new(0));

        let emitter_clone = Arc::clone(&emitter);
        let deliveries = Arc::clone(&error_deliveries);
        emitter.on(move |event| {
            deliveries.fetch_add(1, Ordering::SeqCst);
            if matches!(event, AdapterEvent::Connected { .. }) {
                // A listener that reacts to `connected` by emitting an
                // `error` nested inside the same call stack.
                emitter_clone.emit(EventBuilder::error(Platform::BotApi, "boom"));
            }
        });

        emitter.emit(EventBuilder::connected(Platform::BotApi));
        // One delivery for `connected`, zero for the nested `error` (it was
        // swallowed), so exactly 1.
        assert_eq!(error_deliveries.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn event_name_matches_vocabulary() {
        assert_eq!(EventBuilder::connected(Platform::Mobile).name(), "connected");
        assert_eq!(
            EventBuilder::disconnected(Platform::Mobile, None).name(),
            "disconnected"
        );
    }
}
