//! Pure translation between `teloxide`'s update/message types and the
//! unified domain types. No I/O; file attachments are mapped to a
//! `telegram://file/{file_id}` pseudo-URL rather than resolved eagerly,
//! mirroring `chatrt-rpc`'s `signal://attachment/{id}` convention for a
//! backend that requires a follow-up call to fetch attachment bytes.

use teloxide::types::{
    Message as TgMessage, MessageKind, MessageReactionUpdated, ReactionType, User as TgUser,
};

use chatrt_types::{
    Conversation, ConversationType, Message, MessageContent, MessageStub, Platform, Reaction, ScopedId, User,
};

fn file_url(file_id: &str) -> String {
    format!("telegram://file/{file_id}")
}

/// Translate a `teloxide` user into a unified [`User`].
#[must_use]
pub fn user_from_telegram(user: &TgUser) -> User {
    User {
        id: ScopedId::from(user.id.0.to_string()),
        platform: Platform::BotApi,
        username: user.username.clone(),
        display_name: Some(user.full_name()),
        avatar: None,
    }
}

/// Translate a chat id into a unified [`Conversation`], with no known
/// participants (Telegram doesn't hand the bot a member list inline).
#[must_use]
pub fn conversation_from_chat(chat_id: i64, conversation_type: ConversationType) -> Conversation {
    Conversation::new(ScopedId::from(chat_id.to_string()), Platform::BotApi, conversation_type)
}

/// Classify a `teloxide` chat into the unified conversation-kind vocabulary.
#[must_use]
pub fn conversation_type_for(chat: &teloxide::types::Chat) -> ConversationType {
    if chat.is_private() {
        ConversationType::Dm
    } else if chat.is_channel() {
        ConversationType::Channel
    } else {
        ConversationType::Group
    }
}

/// The result of translating one inbound update.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// A regular (non-reaction) message.
    Message(Message),
    /// A reaction applied to an existing message.
    Reaction {
        /// The reaction itself.
        reaction: Reaction,
        /// A stub referencing the reacted-to message.
        target: MessageStub,
    },
}

/// Translate an inbound `teloxide` message into a unified [`Message`], or
/// `None` for message kinds with no unified counterpart (service messages:
/// pinned/left/new chat members, ...).
#[must_use]
pub fn map_message(msg: &TgMessage) -> Option<Message> {
    let sender = msg.from().map(user_from_telegram).unwrap_or_else(|| User::new(ScopedId::from("unknown"), Platform::BotApi));
    let conversation_id = ScopedId::from(msg.chat.id.0.to_string());
    let content = content_from_message(msg)?;

    let mut unified = Message::new(
        ScopedId::from(msg.id.0.to_string()),
        conversation_id.clone(),
        sender,
        msg.date,
        content,
    );

    if let Some(reply) = msg.reply_to_message() {
        unified.reply_to = Some(MessageStub {
            id: ScopedId::from(reply.id.0.to_string()),
            conversation_id,
            sender: reply.from().map(user_from_telegram),
        });
    }

    Some(unified)
}

fn content_from_message(msg: &TgMessage) -> Option<MessageContent> {
    if let Some(text) = msg.text() {
        return Some(MessageContent::text(text));
    }
    if let Some(photo) = msg.photo() {
        let largest = photo.last()?;
        return Some(MessageContent::Image {
            url: file_url(&largest.file.id),
            caption: msg.caption().map(str::to_string),
        });
    }
    if let Some(video) = msg.video() {
        return Some(MessageContent::Video {
            url: file_url(&video.file.id),
            caption: msg.caption().map(str::to_string),
        });
    }
    if let Some(voice) = msg.voice() {
        return Some(MessageContent::Voice {
            url: file_url(&voice.file.id),
            duration_ms: u64::from(voice.duration.seconds()) * 1000,
        });
    }
    if let Some(audio) = msg.audio() {
        return Some(MessageContent::Audio {
            url: file_url(&audio.file.id),
            duration_ms: u64::from(audio.duration.seconds()) * 1000,
        });
    }
    if let Some(document) = msg.document() {
        return Some(MessageContent::File {
            url: file_url(&document.file.id),
            filename: document.file_name.clone().unwrap_or_else(|| document.file.id.clone()),
            size: Some(document.file.size.into()),
        });
    }
    if let Some(sticker) = msg.sticker() {
        return Some(MessageContent::Sticker {
            id: sticker.file.id.clone(),
            url: None,
        });
    }
    if let Some(location) = msg.location() {
        return Some(MessageContent::Location {
            lat: location.latitude,
            lng: location.longitude,
            name: None,
        });
    }
    if let Some(contact) = msg.contact() {
        return Some(MessageContent::Contact {
            name: contact.first_name.clone(),
            phone: contact.phone_number.clone(),
        });
    }
    None
}

/// Translate a `message_reaction` update into an [`InboundEvent::Reaction`],
/// using the first emoji in the new reaction set (Telegram reports the full
/// current set, not a single delta, on every change).
#[must_use]
pub fn map_reaction_update(update: &MessageReactionUpdated) -> Option<InboundEvent> {
    let emoji = update.new_reaction.iter().find_map(|reaction| match reaction {
        ReactionType::Emoji { emoji } => Some(emoji.clone()),
        _ => None,
    })?;
    let user = update.actor_chat.as_ref().map(|_| User::new(ScopedId::from("channel"), Platform::BotApi)).or_else(|| {
        update.user.as_ref().map(user_from_telegram)
    })?;
    let conversation_id = ScopedId::from(update.chat.id.0.to_string());
    Some(InboundEvent::Reaction {
        reaction: Reaction {
            emoji,
            user,
            timestamp: update.date,
        },
        target: MessageStub {
            id: ScopedId::from(update.message_id.0.to_string()),
            conversation_id,
            sender: None,
        },
    })
}

/// Classify an inbound `teloxide` message for dispatch, skipping service
/// messages with no unified representation.
#[must_use]
pub fn map_update_message(msg: &TgMessage) -> Option<InboundEvent> {
    if !matches!(msg.kind, MessageKind::Common(_)) {
        return None;
    }
    map_message(msg).map(InboundEvent::Message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn file_url_uses_telegram_scheme() {
        assert_eq!(file_url("abc123"), "telegram://file/abc123");
    }

    fn message(extra: serde_json::Value) -> TgMessage {
        let mut base = serde_json::json!({
            "message_id": 42,
            "date": 1_700_000_000,
            "chat": { "id": 100, "type": "private", "first_name": "Ann" },
            "from": { "id": 7, "is_bot": false, "first_name": "Ann", "username": "annb" },
        });
        base.as_object_mut().unwrap().extend(extra.as_object().unwrap().clone());
        serde_json::from_value(base).expect("valid telegram message fixture")
    }

    #[test]
    fn text_message_maps_to_text_content() {
        let msg = message(serde_json::json!({ "text": "hello" }));
        let unified = map_message(&msg).expect("text message maps");
        assert_eq!(unified.content, MessageContent::text("hello"));
        assert_eq!(unified.sender.username.as_deref(), Some("annb"));
    }

    #[test]
    fn message_with_no_mappable_content_returns_none() {
        let msg = message(serde_json::json!({ "new_chat_title": "Renamed" }));
        assert!(map_message(&msg).is_none());
    }
}
