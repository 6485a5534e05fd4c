//! The unified adapter contract every platform backend implements.
//!
//! Grounded on `conductor/core/src/backend/traits.rs`'s `LlmBackend`: a
//! `#[async_trait]` trait with a small set of backend-supplied required
//! methods plus default-impl convenience methods built atop them. Here the
//! required surface is the full chat contract (connect/send/react/query);
//! the conveniences are the connection assertion and the voice→audio
//! graceful-degradation path the specification calls out explicitly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use chatrt_types::{Conversation, Message, MessageContent, Platform};

use crate::error::AdapterError;
use crate::event::{AdapterEvent, EventEmitter, ListenerId};

/// A binary attachment to send, either already hosted (`Url`) or to be
/// uploaded by the adapter (`Bytes`).
#[derive(Clone, Debug)]
pub enum Attachment {
    /// A URL the backend can fetch or reference directly.
    Url(String),
    /// Raw bytes the adapter must upload itself.
    Bytes(Vec<u8>),
}

/// The unified contract every platform adapter satisfies.
///
/// Implementations own their transport (socket, subprocess, browser
/// instance) and must release it on [`Adapter::disconnect`]. All I/O-bearing
/// operations are asynchronous; all of them first assert the adapter is
/// connected via [`Adapter::is_connected`], failing with
/// [`AdapterError::NotConnected`] when it is not. That assertion is provided
/// as [`Adapter::ensure_connected`] so implementations share one definition
/// of "connected enough to act".
#[async_trait]
pub trait Adapter: Send + Sync {
    /// The platform this adapter speaks for.
    fn platform(&self) -> Platform;

    /// The event emitter backing [`Adapter::on`]/[`Adapter::off`].
    fn events(&self) -> &EventEmitter;

    /// Open the backend-specific transport and begin translating inbound
    /// payloads into unified events.
    ///
    /// Fails with [`AdapterError::AlreadyConnected`] if already connected,
    /// or [`AdapterError::Timeout`] if the backend requires an
    /// acknowledgement (e.g. a WebSocket `open`) that doesn't arrive within
    /// budget.
    async fn connect(&self) -> Result<(), AdapterError>;

    /// Close the transport. Idempotent: calling this on an adapter that is
    /// already disconnected is a no-op, not an error.
    async fn disconnect(&self);

    /// Whether the adapter currently holds a live transport.
    fn is_connected(&self) -> bool;

    /// Shared connection assertion used by every I/O-bearing operation.
    fn ensure_connected(&self) -> Result<(), AdapterError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(AdapterError::NotConnected)
        }
    }

    /// Send a plain-text message.
    async fn send_text(&self, conversation: &Conversation, text: &str) -> Result<Message, AdapterError>;

    /// Send an image, with an optional caption.
    async fn send_image(
        &self,
        conversation: &Conversation,
        attachment: Attachment,
        caption: Option<&str>,
    ) -> Result<Message, AdapterError>;

    /// Send a video, with an optional caption.
    async fn send_video(
        &self,
        conversation: &Conversation,
        attachment: Attachment,
        caption: Option<&str>,
    ) -> Result<Message, AdapterError>;

    /// Send a non-voice audio clip.
    async fn send_audio(
        &self,
        conversation: &Conversation,
        attachment: Attachment,
        duration_ms: u64,
    ) -> Result<Message, AdapterError>;

    /// Send a voice note. The default implementation degrades to
    /// [`Adapter::send_audio`], which is the graceful-degradation path the
    /// specification permits for platforms without a distinct voice-note
    /// type; adapters that do support voice notes natively should override
    /// this.
    async fn send_voice(
        &self,
        conversation: &Conversation,
        attachment: Attachment,
        duration_ms: u64,
    ) -> Result<Message, AdapterError> {
        self.send_audio(conversation, attachment, duration_ms).await
    }

    /// Send an arbitrary file.
    async fn send_file(
        &self,
        conversation: &Conversation,
        attachment: Attachment,
        filename: &str,
    ) -> Result<Message, AdapterError>;

    /// Send a location share.
    async fn send_location(&self, conversation: &Conversation, lat: f64, lng: f64) -> Result<Message, AdapterError>;

    /// React to a message with an emoji (or platform reaction token).
    async fn react(&self, message: &Message, emoji: &str) -> Result<(), AdapterError>;

    /// Reply to a message with new content.
    async fn reply(&self, message: &Message, content: MessageContent) -> Result<Message, AdapterError>;

    /// Forward a message to another conversation.
    async fn forward(&self, message: &Message, target: &Conversation) -> Result<Message, AdapterError>;

    /// Delete a message.
    async fn delete(&self, message: &Message) -> Result<(), AdapterError>;

    /// Signal (or stop signalling) that the local user is typing.
    ///
    /// `duration_ms`, when given, is a hint for how long to hold the
    /// indicator before it auto-clears; `None` clears it immediately.
    async fn set_typing(&self, conversation: &Conversation, duration_ms: Option<u64>) -> Result<(), AdapterError>;

    /// Mark a message as read. Platforms without read receipts may treat
    /// this as a silent no-op rather than [`AdapterError::UnsupportedOperation`]
    /// (see `DESIGN.md` for why this specific degradation was chosen).
    async fn mark_read(&self, message: &Message) -> Result<(), AdapterError>;

    /// Enumerate known conversations. May return an empty vector when the
    /// backend disallows enumeration (e.g. a browser-automation adapter
    /// with no conversation-list scrape implemented).
    async fn get_conversations(&self) -> Result<Vec<Conversation>, AdapterError>;

    /// Fetch messages from a conversation, most recent first.
    ///
    /// `before`, when given, bounds the query to messages strictly older
    /// than that timestamp (for pagination). May return an empty vector for
    /// the same reasons as [`Adapter::get_conversations`].
    async fn get_messages(
        &self,
        conversation: &Conversation,
        limit: Option<usize>,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>, AdapterError>;

    /// Register a listener for the named event
    /// (`message, reaction, typing, presence, read, error, connected, disconnected`).
    fn on<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&AdapterEvent) + Send + Sync + 'static,
        Self: Sized,
    {
        self.events().on(handler)
    }

    /// Unregister a previously registered listener.
    fn off(&self, id: ListenerId) {
        self.events().off(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use chatrt_types::{ConversationType, ScopedId, User};

    /// A minimal adapter used only to exercise the default-impl
    /// connection-assertion and voice-degradation behaviour.
    struct StubAdapter {
        connected: AtomicBool,
        events: EventEmitter,
    }

    #[async_trait]
    impl Adapter for StubAdapter {
        fn platform(&self) -> Platform {
            Platform::BotApi
        }

        fn events(&self) -> &EventEmitter {
            &self.events
        }

        async fn connect(&self) -> Result<(), AdapterError> {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn disconnect(&self) {
            self.connected.store(false, Ordering::SeqCst);
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn send_text(&self, conversation: &Conversation, text: &str) -> Result<Message, AdapterError> {
            self.ensure_connected()?;
            Ok(Message::new(
                ScopedId::generate(),
                conversation.id.clone(),
                User::new(ScopedId::from("self"), self.platform()),
                Utc::now(),
                MessageContent::text(text),
            ))
        }

        async fn send_image(
            &self,
            _conversation: &Conversation,
            _attachment: Attachment,
            _caption: Option<&str>,
        ) -> Result<Message, AdapterError> {
            Err(AdapterError::UnsupportedOperation("sendImage"))
        }

        async fn send_video(
            &self,
            _conversation: &Conversation,
            _attachment: Attachment,
            _caption: Option<&str>,
        ) -> Result<Message, AdapterError> {
            Err(AdapterError::UnsupportedOperation("sendVideo"))
        }

        async fn send_audio(
            &self,
            conversation: &Conversation,
            _attachment: Attachment,
            duration_ms: u64,
        ) -> Result<Message, AdapterError> {
            self.ensure_connected()?;
            Ok(Message::new(
                ScopedId::generate(),
                conversation.id.clone(),
                User::new(ScopedId::from("self"), self.platform()),
                Utc::now(),
                MessageContent::Audio {
                    url: "stub://audio".into(),
                    duration_ms,
                },
            ))
        }

        async fn send_file(
            &self,
            _conversation: &Conversation,
            _attachment: Attachment,
            _filename: &str,
        ) -> Result<Message, AdapterError> {
            Err(AdapterError::UnsupportedOperation("sendFile"))
        }

        async fn send_location(&self, _conversation: &Conversation, _lat: f64, _lng: f64) -> Result<Message, AdapterError> {
            Err(AdapterError::UnsupportedOperation("sendLocation"))
        }

        async fn react(&self, _message: &Message, _emoji: &str) -> Result<(), AdapterError> {
            self.ensure_connected()
        }

        async fn reply(&self, message: &Message, content: MessageContent) -> Result<Message, AdapterError> {
            self.ensure_connected()?;
            Ok(Message::new(
                ScopedId::generate(),
                message.conversation_id.clone(),
                User::new(ScopedId::from("self"), self.platform()),
                Utc::now(),
                content,
            ))
        }

        async fn forward(&self, message: &Message, target: &Conversation) -> Result<Message, AdapterError> {
            self.ensure_connected()?;
            Ok(Message::new(
                ScopedId::generate(),
                target.id.clone(),
                User::new(ScopedId::from("self"), self.platform()),
                Utc::now(),
                message.content.clone(),
            ))
        }

        async fn delete(&self, _message: &Message) -> Result<(), AdapterError> {
            self.ensure_connected()
        }

        async fn set_typing(&self, _conversation: &Conversation, _duration_ms: Option<u64>) -> Result<(), AdapterError> {
            self.ensure_connected()
        }

        async fn mark_read(&self, _message: &Message) -> Result<(), AdapterError> {
            Ok(())
        }

        async fn get_conversations(&self) -> Result<Vec<Conversation>, AdapterError> {
            self.ensure_connected()?;
            Ok(Vec::new())
        }

        async fn get_messages(
            &self,
            _conversation: &Conversation,
            _limit: Option<usize>,
            _before: Option<DateTime<Utc>>,
        ) -> Result<Vec<Message>, AdapterError> {
            self.ensure_connected()?;
            Ok(Vec::new())
        }
    }

    fn conversation() -> Conversation {
        Conversation::new(ScopedId::from("c1"), Platform::BotApi, ConversationType::Dm)
    }

    #[tokio::test]
    async fn send_before_connect_fails_not_connected() {
        let adapter = StubAdapter {
            connected: AtomicBool::new(false),
            events: EventEmitter::new(),
        };
        let err = adapter.send_text(&conversation(), "hi").await.unwrap_err();
        assert!(matches!(err, AdapterError::NotConnected));
    }

    #[tokio::test]
    async fn send_after_connect_succeeds() {
        let adapter = StubAdapter {
            connected: AtomicBool::new(false),
            events: EventEmitter::new(),
        };
        adapter.connect().await.unwrap();
        let msg = adapter.send_text(&conversation(), "hello").await.unwrap();
        assert_eq!(msg.content, MessageContent::text("hello"));
        assert_eq!(msg.sender.platform, Platform::BotApi);
    }

    #[tokio::test]
    async fn voice_degrades_to_audio_by_default() {
        let adapter = StubAdapter {
            connected: AtomicBool::new(true),
            events: EventEmitter::new(),
        };
        let msg = adapter
            .send_voice(&conversation(), Attachment::Url("x".into()), 1200)
            .await
            .unwrap();
        match msg.content {
            MessageContent::Audio { duration_ms, .. } => assert_eq!(duration_ms, 1200),
            other => panic!("expected audio degradation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn on_off_round_trip_through_adapter_trait() {
        let adapter = StubAdapter {
            connected: AtomicBool::new(true),
            events: EventEmitter::new(),
        };
        let seen = Arc::new(AtomicBool::new(false));
        let seen2 = Arc::clone(&seen);
        let id = adapter.on(move |_| {
            seen2.store(true, Ordering::SeqCst);
        });
        adapter.events().emit(crate::event::EventBuilder::connected(Platform::BotApi));
        assert!(seen.load(Ordering::SeqCst));
        adapter.off(id);
    }
}
