//! The mobile-protocol platform adapter, built atop [`crate::session::SessionManager`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::warn;

use chatrt_core::{Adapter, AdapterError, AdapterEvent, Attachment, EventBuilder, EventEmitter};
use chatrt_types::{Conversation, ConversationType, Message, MessageContent, Platform, ScopedId, User};

use crate::auth::FileAuthStore;
use crate::config::MobileConfig;
use crate::mapper::{self, InboundEvent};
use crate::session::{SessionEvent, SessionManager, SessionState};
use crate::transport::SessionTransport;

fn outbound_payload(conversation: &Conversation, content: &MessageContent) -> serde_json::Value {
    let to = conversation.id.0.clone();
    let inner = match content {
        MessageContent::Text { text } => serde_json::json!({ "conversation": text }),
        MessageContent::Image { url, caption } => serde_json::json!({ "imageMessage": { "url": url, "caption": caption } }),
        MessageContent::Video { url, caption } => serde_json::json!({ "videoMessage": { "url": url, "caption": caption } }),
        MessageContent::Audio { url, duration_ms } => {
            serde_json::json!({ "audioMessage": { "url": url, "seconds": duration_ms / 1000, "ptt": false } })
        }
        MessageContent::Voice { url, duration_ms } => {
            serde_json::json!({ "audioMessage": { "url": url, "seconds": duration_ms / 1000, "ptt": true } })
        }
        MessageContent::File { url, filename, size } => {
            serde_json::json!({ "documentMessage": { "url": url, "fileName": filename, "fileLength": size } })
        }
        MessageContent::Sticker { id, url } => serde_json::json!({ "stickerMessage": { "fileSha256": id, "url": url } }),
        MessageContent::Location { lat, lng, name } => {
            serde_json::json!({ "locationMessage": { "degreesLatitude": lat, "degreesLongitude": lng, "name": name } })
        }
        MessageContent::Contact { name, phone } => serde_json::json!({ "contactMessage": { "displayName": name, "vcard": phone } }),
        MessageContent::Link { url } => serde_json::json!({ "conversation": url }),
    };
    serde_json::json!({ "to": to, "message": inner })
}

/// Adapter over a [`SessionManager`]-driven mobile-protocol socket.
pub struct MobileAdapter {
    config: MobileConfig,
    manager: Arc<SessionManager>,
    events: Arc<EventEmitter>,
    typing_timers: Mutex<HashMap<ScopedId, tokio::task::JoinHandle<()>>>,
}

impl MobileAdapter {
    /// Construct an adapter with a file-backed auth store rooted at the
    /// configured (or default) data directory.
    #[must_use]
    pub fn new(config: MobileConfig, transport: Arc<dyn SessionTransport>) -> Arc<Self> {
        let auth_store: Arc<dyn crate::auth::AuthStore> = match &config.data_dir {
            Some(dir) => Arc::new(FileAuthStore::new(dir.clone())),
            None => Arc::new(FileAuthStore::default_for(&config.phone_number)),
        };
        let manager = SessionManager::new(config.session.clone(), auth_store, transport);
        Self::wire(config, manager)
    }

    /// Construct an adapter directly over an already-built session manager
    /// and auth store (used by tests to inject a stub transport/store).
    #[must_use]
    pub fn with_manager(config: MobileConfig, manager: Arc<SessionManager>) -> Arc<Self> {
        Self::wire(config, manager)
    }

    fn wire(config: MobileConfig, manager: Arc<SessionManager>) -> Arc<Self> {
        let events = Arc::new(EventEmitter::new());
        let adapter = Arc::new(Self {
            config,
            manager,
            events,
            typing_timers: Mutex::new(HashMap::new()),
        });

        let events_for_session = Arc::clone(&adapter.events);
        adapter.manager.on(move |event| {
            let platform = Platform::Mobile;
            match event {
                SessionEvent::Connected { .. } => {
                    events_for_session.emit(EventBuilder::connected(platform));
                }
                SessionEvent::Disconnected { reason } => {
                    events_for_session.emit(EventBuilder::disconnected(platform, reason.clone()));
                }
                SessionEvent::SessionExpired => {
                    events_for_session.emit(EventBuilder::error(platform, "session expired"));
                }
                SessionEvent::Error { message } => {
                    events_for_session.emit(EventBuilder::error(platform, message.clone()));
                }
                SessionEvent::Inbound(payload) => {
                    if let Some(inbound) = mapper::map_inbound_payload(platform, payload) {
                        match inbound {
                            InboundEvent::Message(message) => {
                                events_for_session.emit(EventBuilder::message(platform, message));
                            }
                            InboundEvent::Reaction { reaction, target } => {
                                events_for_session.emit(EventBuilder::reaction(platform, reaction, target.id));
                            }
                            InboundEvent::Typing { conversation_id, user } => {
                                events_for_session.emit(EventBuilder::typing(platform, conversation_id, user));
                            }
                            InboundEvent::Presence { user, kind } => {
                                events_for_session.emit(EventBuilder::presence(platform, user, kind));
                            }
                            InboundEvent::Read { message_id, timestamp } => {
                                events_for_session.emit(EventBuilder::read(platform, message_id, timestamp));
                            }
                        }
                    }
                }
                SessionEvent::Qr { .. } | SessionEvent::Authenticated { .. } | SessionEvent::Reconnecting { .. } => {}
            }
        });

        adapter
    }

    fn conversation_for(&self, jid: &str) -> Conversation {
        Conversation::new(ScopedId::from(jid), self.platform(), ConversationType::Dm)
    }

    async fn send(&self, conversation: &Conversation, content: MessageContent) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        let payload = outbound_payload(conversation, &content);
        let response = self
            .manager
            .send_message(payload)
            .await
            .map_err(|err| AdapterError::Transport(err.to_string()))?;

        let id = response
            .get("key")
            .and_then(|k| k.get("id"))
            .and_then(serde_json::Value::as_str)
            .map_or_else(ScopedId::generate, ScopedId::from);
        let self_id = ScopedId::from(self.config.phone_number.clone());
        Ok(Message::new(id, conversation.id.clone(), User::new(self_id, self.platform()), Utc::now(), content))
    }
}

#[async_trait]
impl Adapter for MobileAdapter {
    fn platform(&self) -> Platform {
        Platform::Mobile
    }

    fn events(&self) -> &EventEmitter {
        self.events.as_ref()
    }

    async fn connect(&self) -> Result<(), AdapterError> {
        if self.is_connected() {
            return Err(AdapterError::AlreadyConnected);
        }
        self.manager.connect().await.map_err(|err| AdapterError::Transport(err.to_string()))
    }

    async fn disconnect(&self) {
        for (_, handle) in self.typing_timers.lock().drain() {
            handle.abort();
        }
        self.manager.disconnect().await;
    }

    fn is_connected(&self) -> bool {
        self.manager.state() == SessionState::Connected
    }

    async fn send_text(&self, conversation: &Conversation, text: &str) -> Result<Message, AdapterError> {
        self.send(conversation, MessageContent::text(text)).await
    }

    async fn send_image(&self, conversation: &Conversation, attachment: Attachment, caption: Option<&str>) -> Result<Message, AdapterError> {
        let url = attachment_url(attachment);
        self.send(conversation, MessageContent::Image { url, caption: caption.map(str::to_string) }).await
    }

    async fn send_video(&self, conversation: &Conversation, attachment: Attachment, caption: Option<&str>) -> Result<Message, AdapterError> {
        let url = attachment_url(attachment);
        self.send(conversation, MessageContent::Video { url, caption: caption.map(str::to_string) }).await
    }

    async fn send_audio(&self, conversation: &Conversation, attachment: Attachment, duration_ms: u64) -> Result<Message, AdapterError> {
        let url = attachment_url(attachment);
        self.send(conversation, MessageContent::Audio { url, duration_ms }).await
    }

    async fn send_voice(&self, conversation: &Conversation, attachment: Attachment, duration_ms: u64) -> Result<Message, AdapterError> {
        let url = attachment_url(attachment);
        self.send(conversation, MessageContent::Voice { url, duration_ms }).await
    }

    async fn send_file(&self, conversation: &Conversation, attachment: Attachment, filename: &str) -> Result<Message, AdapterError> {
        let url = attachment_url(attachment);
        self.send(conversation, MessageContent::File { url, filename: filename.to_string(), size: None }).await
    }

    async fn send_location(&self, conversation: &Conversation, lat: f64, lng: f64) -> Result<Message, AdapterError> {
        self.send(conversation, MessageContent::Location { lat, lng, name: None }).await
    }

    async fn react(&self, message: &Message, emoji: &str) -> Result<(), AdapterError> {
        self.ensure_connected()?;
        let payload = serde_json::json!({
            "to": message.conversation_id.0,
            "message": { "reactionMessage": { "key": { "id": message.id.0 }, "text": emoji } }
        });
        self.manager.send_message(payload).await.map_err(|err| AdapterError::Transport(err.to_string()))?;
        Ok(())
    }

    async fn reply(&self, message: &Message, content: MessageContent) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        let conversation = self.conversation_for(&message.conversation_id.0);
        let mut sent = self.send(&conversation, content).await?;
        sent.reply_to = Some(message.as_stub());
        Ok(sent)
    }

    async fn forward(&self, message: &Message, target: &Conversation) -> Result<Message, AdapterError> {
        self.send(target, message.content.clone()).await
    }

    async fn delete(&self, message: &Message) -> Result<(), AdapterError> {
        self.ensure_connected()?;
        let payload = serde_json::json!({
            "to": message.conversation_id.0,
            "message": { "protocolMessage": { "key": { "id": message.id.0 }, "type": "REVOKE" } }
        });
        self.manager.send_message(payload).await.map_err(|err| AdapterError::Transport(err.to_string()))?;
        Ok(())
    }

    async fn set_typing(&self, conversation: &Conversation, duration_ms: Option<u64>) -> Result<(), AdapterError> {
        self.ensure_connected()?;
        let state = if duration_ms.is_some() { "composing" } else { "paused" };
        let payload = serde_json::json!({ "to": conversation.id.0, "presence": state });
        self.manager.send_message(payload).await.map_err(|err| AdapterError::Transport(err.to_string()))?;

        if let Some(ms) = duration_ms {
            let conversation_id = conversation.id.clone();
            let events = Arc::clone(&self.events);
            let manager = Arc::clone(&self.manager);
            let platform = self.platform();
            let target = conversation.id.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
                let stop_payload = serde_json::json!({ "to": target.0, "presence": "paused" });
                if manager.send_message(stop_payload).await.is_err() {
                    events.emit(EventBuilder::error(platform, "failed to clear typing indicator"));
                }
            });
            self.typing_timers.lock().insert(conversation_id, handle);
        } else if let Some(handle) = self.typing_timers.lock().remove(&conversation.id) {
            handle.abort();
        }
        Ok(())
    }

    async fn mark_read(&self, message: &Message) -> Result<(), AdapterError> {
        self.ensure_connected()?;
        let payload = serde_json::json!({
            "readMessages": [{ "remoteJid": message.conversation_id.0, "id": message.id.0 }]
        });
        if let Err(err) = self.manager.send_message(payload).await {
            warn!(%err, "failed to send read receipt, continuing");
        }
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

fn attachment_url(attachment: Attachment) -> String {
    match attachment {
        Attachment::Url(url) => url,
        Attachment::Bytes(bytes) => format!("data:application/octet-stream;base64,{}", base64_encode(&bytes)),
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity((bytes.len() + 2) / 3 * 4);
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0];
        let b1 = chunk.get(1).copied().unwrap_or(0);
        let b2 = chunk.get(2).copied().unwrap_or(0);
        out.push(ALPHABET[(b0 >> 2) as usize] as char);
        out.push(ALPHABET[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize] as char);
        out.push(if chunk.len() > 1 { ALPHABET[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize] as char } else { '=' });
        out.push(if chunk.len() > 2 { ALPHABET[(b2 & 0x3f) as usize] as char } else { '=' });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthState;
    use crate::error::MobileError;
    use crate::session::SessionManagerConfig;
    use crate::transport::{TransportEvent, TransportEventCallback};
    use std::sync::atomic::Ordering;
    use std::sync::Mutex as StdMutex;

    struct StubTransport {
        callback: StdMutex<Option<TransportEventCallback>>,
    }

    impl StubTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self { callback: StdMutex::new(None) })
        }

        fn open(&self) {
            let callback = self.callback.lock().unwrap().clone().unwrap();
            callback(TransportEvent::Open { is_new_login: false, jid: "15550000001@s.whatsapp.net".into() });
        }
    }

    #[async_trait::async_trait]
    impl SessionTransport for StubTransport {
        async fn connect(&self, _auth: AuthState, on_event: TransportEventCallback) -> Result<(), MobileError> {
            *self.callback.lock().unwrap() = Some(on_event);
            Ok(())
        }

        async fn send_message(&self, payload: serde_json::Value) -> Result<serde_json::Value, MobileError> {
            Ok(serde_json::json!({ "key": { "id": "sent-1" }, "echo": payload }))
        }

        async fn request_pairing_code(&self, _phone_number: &str) -> Result<String, MobileError> {
            Ok("000-000".into())
        }

        async fn close(&self) {}
    }

    struct NoopAuthStore;

    #[async_trait::async_trait]
    impl crate::auth::AuthStore for NoopAuthStore {
        async fn load_state(&self) -> Result<AuthState, MobileError> {
            Ok(AuthState::default())
        }
        async fn save_creds(&self, _creds: serde_json::Value) -> Result<(), MobileError> {
            Ok(())
        }
        async fn clear_state(&self) -> Result<(), MobileError> {
            Ok(())
        }
        async fn has_existing_state(&self) -> bool {
            false
        }
    }

    fn adapter() -> (Arc<MobileAdapter>, Arc<StubTransport>) {
        let transport = StubTransport::new();
        let manager = SessionManager::new(SessionManagerConfig::default(), Arc::new(NoopAuthStore), transport.clone());
        let adapter = MobileAdapter::with_manager(MobileConfig::new("+15550000001"), manager);
        (adapter, transport)
    }

    #[tokio::test]
    async fn send_before_connect_fails_not_connected() {
        let (adapter, _transport) = adapter();
        let conversation = adapter.conversation_for("15550000002@s.whatsapp.net");
        let err = adapter.send_text(&conversation, "hi").await.unwrap_err();
        assert!(matches!(err, AdapterError::NotConnected));
    }

    #[tokio::test]
    async fn connect_then_send_succeeds() {
        let (adapter, transport) = adapter();
        adapter.connect().await.unwrap();
        transport.open();
        assert!(adapter.is_connected());

        let conversation = adapter.conversation_for("15550000002@s.whatsapp.net");
        let msg = adapter.send_text(&conversation, "hello").await.unwrap();
        assert_eq!(msg.content, MessageContent::text("hello"));
        assert_eq!(msg.id, ScopedId::from("sent-1"));
    }

    #[tokio::test]
    async fn connected_event_forwards_to_adapter_listeners() {
        let (adapter, transport) = adapter();
        let seen = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let seen2 = Arc::clone(&seen);
        adapter.events().on(move |event| {
            if matches!(event, AdapterEvent::Connected { .. }) {
                seen2.store(true, Ordering::SeqCst);
            }
        });

        adapter.connect().await.unwrap();
        transport.open();
        assert!(seen.load(Ordering::SeqCst));
    }

    #[test]
    fn base64_encode_matches_known_vector() {
        assert_eq!(base64_encode(b"man"), "bWFu");
        assert_eq!(base64_encode(b"ma"), "bWE=");
    }
}
