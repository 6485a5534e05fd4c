//! The subprocess-RPC platform adapter, built on [`crate::process::ProcessManager`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

use chatrt_core::{Adapter, AdapterError, AdapterEvent, Attachment, EventBuilder, EventEmitter};
use chatrt_types::{Conversation, Message, MessageContent, Platform, ScopedId};

use crate::config::SubprocessConfig;
use crate::mapper::{self, InboundEvent};
use crate::process::ProcessManager;

/// Adapter over a long-running `signal-cli jsonRpc` subprocess.
pub struct SubprocessAdapter {
    config: SubprocessConfig,
    process: Arc<ProcessManager>,
    events: Arc<EventEmitter>,
    self_id: ScopedId,
}

impl SubprocessAdapter {
    /// Construct an adapter that has not yet spawned its subprocess.
    #[must_use]
    pub fn new(config: SubprocessConfig) -> Self {
        let self_id = ScopedId::from(config.phone_number.clone());
        Self {
            process: Arc::new(ProcessManager::new(config.request_timeout_ms)),
            config,
            events: Arc::new(EventEmitter::new()),
            self_id,
        }
    }

    fn conversation_for(&self, phone_number: &str) -> Conversation {
        mapper::dm_conversation(self.platform(), phone_number)
    }

    async fn send(&self, conversation: &Conversation, content: MessageContent, text: &str) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        let params = mapper::send_text_params(conversation, text);
        let result = self
            .process
            .request("send", Some(params))
            .await
            .map_err(|err| AdapterError::Transport(err.to_string()))?;

        let response_timestamp = result.get("timestamp").and_then(serde_json::Value::as_i64);
        Ok(mapper::synthesize_sent_message(
            self.platform(),
            conversation,
            content,
            &self.self_id,
            response_timestamp,
        ))
    }
}

#[async_trait]
impl Adapter for SubprocessAdapter {
    fn platform(&self) -> Platform {
        Platform::Subprocess
    }

    fn events(&self) -> &EventEmitter {
        self.events.as_ref()
    }

    async fn connect(&self) -> Result<(), AdapterError> {
        if self.process.is_running() {
            return Err(AdapterError::AlreadyConnected);
        }

        let events_for_notification = Arc::clone(&self.events);
        let platform = self.platform();
        let on_notification = Arc::new(move |raw: serde_json::Value| {
            match mapper::map_inbound_notification(platform, raw) {
                Some(InboundEvent::Message(message)) => {
                    events_for_notification.emit(EventBuilder::message(platform, message));
                }
                Some(InboundEvent::Reaction { reaction, target }) => {
                    events_for_notification.emit(EventBuilder::reaction(platform, reaction, target.id));
                }
                None => {}
            }
        });

        let events_for_error = Arc::clone(&self.events);
        let on_process_error = Arc::new(move |err: &crate::error::RpcError| {
            events_for_error.emit(EventBuilder::error(platform, err.to_string()));
            events_for_error.emit(EventBuilder::disconnected(platform, Some(err.to_string())));
        });

        self.process
            .start(&self.config.signal_cli_bin, &self.config.cli_args(), on_notification, on_process_error)
            .await
            .map_err(|err| AdapterError::Transport(err.to_string()))?;

        self.events.emit(EventBuilder::connected(self.platform()));
        Ok(())
    }

    async fn disconnect(&self) {
        self.process.stop().await;
        self.events.emit(EventBuilder::disconnected(self.platform(), None));
    }

    fn is_connected(&self) -> bool {
        self.process.is_running()
    }

    async fn send_text(&self, conversation: &Conversation, text: &str) -> Result<Message, AdapterError> {
        self.send(conversation, MessageContent::text(text), text).await
    }

    async fn send_image(
        &self,
        _conversation: &Conversation,
        _attachment: Attachment,
        _caption: Option<&str>,
    ) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        Err(AdapterError::UnsupportedOperation("sendImage"))
    }

    async fn send_video(
        &self,
        _conversation: &Conversation,
        _attachment: Attachment,
        _caption: Option<&str>,
    ) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        Err(AdapterError::UnsupportedOperation("sendVideo"))
    }

    async fn send_audio(
        &self,
        _conversation: &Conversation,
        _attachment: Attachment,
        _duration_ms: u64,
    ) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        Err(AdapterError::UnsupportedOperation("sendAudio"))
    }

    async fn send_file(
        &self,
        _conversation: &Conversation,
        _attachment: Attachment,
        _filename: &str,
    ) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        Err(AdapterError::UnsupportedOperation("sendFile"))
    }

    async fn send_location(&self, _conversation: &Conversation, _lat: f64, _lng: f64) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        Err(AdapterError::UnsupportedOperation("sendLocation"))
    }

    async fn react(&self, message: &Message, emoji: &str) -> Result<(), AdapterError> {
        self.ensure_connected()?;
        let params = serde_json::json!({
            "recipient": [message.conversation_id.0],
            "targetAuthor": message.sender.id.0,
            "targetTimestamp": message.id.0,
            "emoji": emoji,
            "reaction": true,
        });
        self.process.request("sendReaction", Some(params)).await.map_err(|err| AdapterError::Transport(err.to_string()))?;
        Ok(())
    }

    async fn reply(&self, message: &Message, content: MessageContent) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        let conversation = self.conversation_for(&message.conversation_id.0);
        let text = match &content {
            MessageContent::Text { text } => text.clone(),
            other => other.kind_name().to_string(),
        };
        self.send(&conversation, content, &text).await
    }

    async fn forward(&self, message: &Message, target: &Conversation) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        let text = match &message.content {
            MessageContent::Text { text } => text.clone(),
            other => other.kind_name().to_string(),
        };
        self.send(target, message.content.clone(), &text).await
    }

    async fn delete(&self, message: &Message) -> Result<(), AdapterError> {
        self.ensure_connected()?;
        let params = serde_json::json!({
            "recipient": [message.conversation_id.0],
            "targetTimestamp": message.id.0,
        });
        self.process.request("remoteDelete", Some(params)).await.map_err(|err| AdapterError::Transport(err.to_string()))?;
        Ok(())
    }

    async fn set_typing(&self, conversation: &Conversation, duration_ms: Option<u64>) -> Result<(), AdapterError> {
        self.ensure_connected()?;
        let params = serde_json::json!({ "recipient": [conversation.id.0] });
        let method = if duration_ms.is_some() { "sendTyping" } else { "sendTypingStop" };
        self.process.request(method, Some(params)).await.map_err(|err| AdapterError::Transport(err.to_string()))?;
        Ok(())
    }

    async fn mark_read(&self, message: &Message) -> Result<(), AdapterError> {
        self.ensure_connected()?;
        let params = serde_json::json!({
            "recipient": [message.sender.id.0],
            "targetTimestamps": [message.id.0],
        });
        if let Err(err) = self.process.request("sendReceipt", Some(params)).await {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_adapter_starts_disconnected() {
        let adapter = SubprocessAdapter::new(SubprocessConfig::new("+15550000001"));
        assert!(!adapter.is_connected());
    }

    #[tokio::test]
    async fn send_before_connect_fails_not_connected() {
        let adapter = SubprocessAdapter::new(SubprocessConfig::new("+15550000001"));
        let conversation = adapter.conversation_for("+15550000002");
        let err = adapter.send_text(&conversation, "hi").await.unwrap_err();
        assert!(matches!(err, AdapterError::NotConnected));
    }
}
