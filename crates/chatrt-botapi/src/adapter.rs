//! The bot-API platform adapter: a thin wrapper over `teloxide::Bot`
//! handling connect/send/event wiring, by long polling or webhook.
//!
//! Grounded on `conductor/core/src/backend/ollama.rs`'s HTTP-client wrapper
//! shape (`from_config`/`from_env` construction, base-URL resolution) for
//! the construction and config-resolution style, adapted to a
//! library-backed client instead of raw `reqwest` calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use chrono::{DateTime, Utc};
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, MessageId, ReactionType, UpdateKind};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use chatrt_core::{Adapter, AdapterError, Attachment, EventBuilder, EventEmitter};
use chatrt_types::{Conversation, ConversationType, Message, MessageContent, Platform, ScopedId};

use crate::config::BotApiConfig;
use crate::mapper::{self, InboundEvent};

fn allowed_update_from_str(name: &str) -> Option<teloxide::types::AllowedUpdate> {
    use teloxide::types::AllowedUpdate::*;
    match name {
        "message" => Some(Message),
        "edited_message" => Some(EditedMessage),
        "channel_post" => Some(ChannelPost),
        "edited_channel_post" => Some(EditedChannelPost),
        "message_reaction" => Some(MessageReaction),
        "message_reaction_count" => Some(MessageReactionCount),
        "callback_query" => Some(CallbackQuery),
        "inline_query" => Some(InlineQuery),
        "poll" => Some(Poll),
        "poll_answer" => Some(PollAnswer),
        _ => None,
    }
}

fn chat_id_from(id: &ScopedId) -> Result<ChatId, AdapterError> {
    id.0.parse::<i64>().map(ChatId).map_err(|_| AdapterError::Validation(format!("not a telegram chat id: {}", id.0)))
}

fn message_id_from(id: &ScopedId) -> Result<MessageId, AdapterError> {
    id.0.parse::<i32>().map(MessageId).map_err(|_| AdapterError::Validation(format!("not a telegram message id: {}", id.0)))
}

fn input_file_from(attachment: Attachment) -> Result<InputFile, AdapterError> {
    match attachment {
        Attachment::Url(url) => url
            .parse()
            .map(InputFile::url)
            .map_err(|_| AdapterError::Validation(format!("not a valid url: {url}"))),
        Attachment::Bytes(bytes) => Ok(InputFile::memory(bytes)),
    }
}

/// Adapter over a `teloxide::Bot`, dispatching inbound updates via long
/// polling (default) or a webhook server.
pub struct BotApiAdapter {
    config: BotApiConfig,
    bot: Bot,
    events: Arc<EventEmitter>,
    connected: AtomicBool,
    listener: AsyncMutex<Option<tokio::task::JoinHandle<()>>>,
    known_chats: Arc<parking_lot::Mutex<HashMap<ScopedId, Conversation>>>,
    typing_timers: parking_lot::Mutex<HashMap<ScopedId, tokio::task::JoinHandle<()>>>,
}

impl BotApiAdapter {
    /// Construct an adapter over a fresh `teloxide::Bot`, not yet connected.
    #[must_use]
    pub fn new(config: BotApiConfig) -> Arc<Self> {
        let mut bot = Bot::new(config.token.clone());
        if let Some(root) = &config.api_root {
            if let Ok(url) = root.parse() {
                bot = bot.set_api_url(url);
            } else {
                warn!(root, "ignoring invalid api_root");
            }
        }
        Arc::new(Self {
            config,
            bot,
            events: Arc::new(EventEmitter::new()),
            connected: AtomicBool::new(false),
            listener: AsyncMutex::new(None),
            known_chats: Arc::new(parking_lot::Mutex::new(HashMap::new())),
            typing_timers: parking_lot::Mutex::new(HashMap::new()),
        })
    }

    fn conversation_for(&self, chat_id: i64) -> Conversation {
        self.known_chats
            .lock()
            .get(&ScopedId::from(chat_id.to_string()))
            .cloned()
            .unwrap_or_else(|| mapper::conversation_from_chat(chat_id, ConversationType::Dm))
    }

    async fn spawn_polling(&self) {
        let bot = self.bot.clone();
        let events = Arc::clone(&self.events);
        let known_chats = Arc::clone(&self.known_chats);
        let allowed_updates = self.config.allowed_updates.clone();
        let handle = tokio::spawn(async move {
            let mut offset = 0i32;
            loop {
                let mut request = bot.get_updates().offset(offset).timeout(30);
                if let Some(updates) = &allowed_updates {
                    request = request.allowed_updates(updates.iter().filter_map(|u| allowed_update_from_str(u)));
                }
                match request.send().await {
                    Ok(updates) => {
                        for update in updates {
                            offset = update.id.0 + 1;
                            handle_update(&events, &known_chats, update);
                        }
                    }
                    Err(err) => {
                        warn!(%err, "get_updates failed, backing off");
                        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                    }
                }
            }
        });
        *self.listener.lock().await = Some(handle);
    }

    async fn spawn_webhook(&self) -> Result<(), crate::error::BotApiError> {
        let domain = self.config.webhook_domain.clone().ok_or(crate::error::BotApiError::WebhookConfigIncomplete)?;
        let port = self.config.webhook_port.ok_or(crate::error::BotApiError::WebhookConfigIncomplete)?;

        let url: teloxide::types::Url = format!("https://{domain}/webhook")
            .parse()
            .map_err(|_| crate::error::BotApiError::Webhook(format!("invalid webhook domain: {domain}")))?;
        let mut set_webhook = self.bot.set_webhook(url);
        if let Some(secret) = &self.config.webhook_secret_token {
            set_webhook = set_webhook.secret_token(secret.clone());
        }
        if let Some(updates) = &self.config.allowed_updates {
            set_webhook = set_webhook.allowed_updates(updates.iter().filter_map(|u| allowed_update_from_str(u)));
        }
        set_webhook.send().await?;

        let state = WebhookState {
            events: Arc::clone(&self.events),
            known_chats: Arc::clone(&self.known_chats),
            secret_token: self.config.webhook_secret_token.clone(),
        };
        let app = Router::new().route("/webhook", post(handle_webhook)).with_state(state);
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        let handle = tokio::spawn(async move {
            match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => {
                    if let Err(err) = axum::serve(listener, app).await {
                        warn!(%err, "webhook server exited");
                    }
                }
                Err(err) => warn!(%err, "failed to bind webhook listener"),
            }
        });
        *self.listener.lock().await = Some(handle);
        Ok(())
    }
}

#[derive(Clone)]
struct WebhookState {
    events: Arc<EventEmitter>,
    known_chats: Arc<parking_lot::Mutex<HashMap<ScopedId, Conversation>>>,
    secret_token: Option<String>,
}

async fn handle_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> StatusCode {
    if let Some(expected) = &state.secret_token {
        let provided = headers.get("X-Telegram-Bot-Api-Secret-Token").and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            return StatusCode::UNAUTHORIZED;
        }
    }
    match serde_json::from_slice(&body) {
        Ok(update) => {
            handle_update(&state.events, &state.known_chats, update);
            StatusCode::OK
        }
        Err(err) => {
            warn!(%err, "failed to parse webhook update");
            StatusCode::BAD_REQUEST
        }
    }
}

fn handle_update(
    events: &Arc<EventEmitter>,
    known_chats: &Arc<parking_lot::Mutex<HashMap<ScopedId, Conversation>>>,
    update: teloxide::types::Update,
) {
    match update.kind {
        UpdateKind::Message(msg) | UpdateKind::EditedMessage(msg) => {
            let chat_id = ScopedId::from(msg.chat.id.0.to_string());
            known_chats
                .lock()
                .entry(chat_id)
                .or_insert_with(|| mapper::conversation_from_chat(msg.chat.id.0, mapper::conversation_type_for(&msg.chat)));

            match mapper::map_update_message(&msg) {
                Some(InboundEvent::Message(message)) => {
                    events.emit(EventBuilder::message(Platform::BotApi, message));
                }
                Some(InboundEvent::Reaction { reaction, target }) => {
                    events.emit(EventBuilder::reaction(Platform::BotApi, reaction, target.id));
                }
                None => debug!(message_id = msg.id.0, "skipping service message with no unified content"),
            }
        }
        UpdateKind::MessageReaction(reaction_update) => {
            if let Some(InboundEvent::Reaction { reaction, target }) = mapper::map_reaction_update(&reaction_update) {
                events.emit(EventBuilder::reaction(Platform::BotApi, reaction, target.id));
            }
        }
        _ => {}
    }
}

#[async_trait]
impl Adapter for BotApiAdapter {
    fn platform(&self) -> Platform {
        Platform::BotApi
    }

    fn events(&self) -> &EventEmitter {
        self.events.as_ref()
    }

    async fn connect(&self) -> Result<(), AdapterError> {
        if self.is_connected() {
            return Err(AdapterError::AlreadyConnected);
        }
        self.bot.get_me().send().await.map_err(|err| AdapterError::Transport(err.to_string()))?;

        if self.config.use_webhook {
            self.spawn_webhook().await.map_err(|err| AdapterError::Transport(err.to_string()))?;
        } else {
            self.spawn_polling().await;
        }
        self.connected.store(true, Ordering::SeqCst);
        self.events.emit(EventBuilder::connected(self.platform()));
        Ok(())
    }

    async fn disconnect(&self) {
        if let Some(handle) = self.listener.lock().await.take() {
            handle.abort();
        }
        for (_, handle) in self.typing_timers.lock().drain() {
            handle.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
        self.events.emit(EventBuilder::disconnected(self.platform(), None));
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_text(&self, conversation: &Conversation, text: &str) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        let chat_id = chat_id_from(&conversation.id)?;
        let sent = self.bot.send_message(chat_id, text).send().await.map_err(|err| AdapterError::Transport(err.to_string()))?;
        mapper::map_message(&sent).ok_or_else(|| AdapterError::Transport("bot echoed an unmappable message".into()))
    }

    async fn send_image(&self, conversation: &Conversation, attachment: Attachment, caption: Option<&str>) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        let chat_id = chat_id_from(&conversation.id)?;
        let file = input_file_from(attachment)?;
        let mut request = self.bot.send_photo(chat_id, file);
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        let sent = request.send().await.map_err(|err| AdapterError::Transport(err.to_string()))?;
        mapper::map_message(&sent).ok_or_else(|| AdapterError::Transport("bot echoed an unmappable message".into()))
    }

    async fn send_video(&self, conversation: &Conversation, attachment: Attachment, caption: Option<&str>) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        let chat_id = chat_id_from(&conversation.id)?;
        let file = input_file_from(attachment)?;
        let mut request = self.bot.send_video(chat_id, file);
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        let sent = request.send().await.map_err(|err| AdapterError::Transport(err.to_string()))?;
        mapper::map_message(&sent).ok_or_else(|| AdapterError::Transport("bot echoed an unmappable message".into()))
    }

    async fn send_audio(&self, conversation: &Conversation, attachment: Attachment, _duration_ms: u64) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        let chat_id = chat_id_from(&conversation.id)?;
        let file = input_file_from(attachment)?;
        let sent = self.bot.send_audio(chat_id, file).send().await.map_err(|err| AdapterError::Transport(err.to_string()))?;
        mapper::map_message(&sent).ok_or_else(|| AdapterError::Transport("bot echoed an unmappable message".into()))
    }

    async fn send_voice(&self, conversation: &Conversation, attachment: Attachment, _duration_ms: u64) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        let chat_id = chat_id_from(&conversation.id)?;
        let file = input_file_from(attachment)?;
        let sent = self.bot.send_voice(chat_id, file).send().await.map_err(|err| AdapterError::Transport(err.to_string()))?;
        mapper::map_message(&sent).ok_or_else(|| AdapterError::Transport("bot echoed an unmappable message".into()))
    }

    async fn send_file(&self, conversation: &Conversation, attachment: Attachment, filename: &str) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        let chat_id = chat_id_from(&conversation.id)?;
        let file = input_file_from(attachment)?.file_name(filename.to_string());
        let sent = self.bot.send_document(chat_id, file).send().await.map_err(|err| AdapterError::Transport(err.to_string()))?;
        mapper::map_message(&sent).ok_or_else(|| AdapterError::Transport("bot echoed an unmappable message".into()))
    }

    async fn send_location(&self, conversation: &Conversation, lat: f64, lng: f64) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        let chat_id = chat_id_from(&conversation.id)?;
        let sent = self.bot.send_location(chat_id, lat, lng).send().await.map_err(|err| AdapterError::Transport(err.to_string()))?;
        mapper::map_message(&sent).ok_or_else(|| AdapterError::Transport("bot echoed an unmappable message".into()))
    }

    async fn react(&self, message: &Message, emoji: &str) -> Result<(), AdapterError> {
        self.ensure_connected()?;
        let chat_id = chat_id_from(&message.conversation_id)?;
        let message_id = message_id_from(&message.id)?;
        self.bot
            .set_message_reaction(chat_id, message_id)
            .reaction(vec![ReactionType::Emoji { emoji: emoji.to_string() }])
            .send()
            .await
            .map_err(|err| AdapterError::Transport(err.to_string()))?;
        Ok(())
    }

    async fn reply(&self, message: &Message, content: MessageContent) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        let chat_id = chat_id_from(&message.conversation_id)?;
        let reply_to = message_id_from(&message.id)?;
        let sent = match content {
            MessageContent::Text { text } => self
                .bot
                .send_message(chat_id, text)
                .reply_to_message_id(reply_to)
                .send()
                .await
                .map_err(|err| AdapterError::Transport(err.to_string()))?,
            other => return self.send(&self.conversation_for(chat_id.0), other).await,
        };
        let mut unified = mapper::map_message(&sent).ok_or_else(|| AdapterError::Transport("bot echoed an unmappable message".into()))?;
        unified.reply_to = Some(message.as_stub());
        Ok(unified)
    }

    async fn forward(&self, message: &Message, target: &Conversation) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        let from_chat_id = chat_id_from(&message.conversation_id)?;
        let to_chat_id = chat_id_from(&target.id)?;
        let message_id = message_id_from(&message.id)?;
        let sent = self
            .bot
            .forward_message(to_chat_id, from_chat_id, message_id)
            .send()
            .await
            .map_err(|err| AdapterError::Transport(err.to_string()))?;
        mapper::map_message(&sent).ok_or_else(|| AdapterError::Transport("bot echoed an unmappable message".into()))
    }

    async fn delete(&self, message: &Message) -> Result<(), AdapterError> {
        self.ensure_connected()?;
        let chat_id = chat_id_from(&message.conversation_id)?;
        let message_id = message_id_from(&message.id)?;
        self.bot.delete_message(chat_id, message_id).send().await.map_err(|err| AdapterError::Transport(err.to_string()))?;
        Ok(())
    }

    async fn set_typing(&self, conversation: &Conversation, duration_ms: Option<u64>) -> Result<(), AdapterError> {
        self.ensure_connected()?;
        let chat_id = chat_id_from(&conversation.id)?;
        self.bot
            .send_chat_action(chat_id, ChatAction::Typing)
            .send()
            .await
            .map_err(|err| AdapterError::Transport(err.to_string()))?;

        if let Some(handle) = self.typing_timers.lock().remove(&conversation.id) {
            handle.abort();
        }
        if let Some(ms) = duration_ms {
            let bot = self.bot.clone();
            let handle = tokio::spawn(async move {
                let mut elapsed = 0u64;
                while elapsed < ms {
                    tokio::time::sleep(std::time::Duration::from_secs(4)).await;
                    elapsed += 4_000;
                    if bot.send_chat_action(chat_id, ChatAction::Typing).send().await.is_err() {
                        break;
                    }
                }
            });
            self.typing_timers.lock().insert(conversation.id.clone(), handle);
        }
        Ok(())
    }

    /// Telegram's Bot API gives bots no read-receipt surface, so this is an
    /// intentional no-op rather than `UnsupportedOperation`.
    async fn mark_read(&self, _message: &Message) -> Result<(), AdapterError> {
        self.ensure_connected()
    }

    async fn get_conversations(&self) -> Result<Vec<Conversation>, AdapterError> {
        self.ensure_connected()?;
        Ok(self.known_chats.lock().values().cloned().collect())
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

impl BotApiAdapter {
    async fn send(&self, conversation: &Conversation, content: MessageContent) -> Result<Message, AdapterError> {
        match content {
            MessageContent::Text { text } => self.send_text(conversation, &text).await,
            MessageContent::Image { url, caption } => {
                self.send_image(conversation, Attachment::Url(url), caption.as_deref()).await
            }
            MessageContent::Video { url, caption } => {
                self.send_video(conversation, Attachment::Url(url), caption.as_deref()).await
            }
            MessageContent::Audio { url, duration_ms } => self.send_audio(conversation, Attachment::Url(url), duration_ms).await,
            MessageContent::Voice { url, duration_ms } => self.send_voice(conversation, Attachment::Url(url), duration_ms).await,
            MessageContent::File { url, filename, .. } => self.send_file(conversation, Attachment::Url(url), &filename).await,
            MessageContent::Location { lat, lng, .. } => self.send_location(conversation, lat, lng).await,
            other => Err(AdapterError::UnsupportedOperation(other.kind_name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_id_from_rejects_non_numeric_id() {
        let err = chat_id_from(&ScopedId::from("not-a-number")).unwrap_err();
        assert!(matches!(err, AdapterError::Validation(_)));
    }

    #[test]
    fn chat_id_from_parses_numeric_id() {
        let chat_id = chat_id_from(&ScopedId::from("-100123")).unwrap();
        assert_eq!(chat_id.0, -100123);
    }

    #[tokio::test]
    async fn send_before_connect_fails_not_connected() {
        let adapter = BotApiAdapter::new(BotApiConfig::new("test-token"));
        let conversation = Conversation::new(ScopedId::from("1"), Platform::BotApi, ConversationType::Dm);
        let err = adapter.send_text(&conversation, "hi").await.unwrap_err();
        assert!(matches!(err, AdapterError::NotConnected));
    }

    #[test]
    fn new_adapter_starts_disconnected() {
        let adapter = BotApiAdapter::new(BotApiConfig::new("test-token"));
        assert!(!adapter.is_connected());
    }
}
