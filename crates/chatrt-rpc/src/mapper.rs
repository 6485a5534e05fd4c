//! Pure translation between the subprocess CLI's JSON envelopes and the
//! unified domain types. No I/O; every function here is a total (or
//! `Option`-returning) conversion over already-parsed [`serde_json::Value`]s.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use chatrt_types::{
    Conversation, ConversationType, Message, MessageContent, MessageStub, Platform, Reaction, ScopedId, User,
};

fn epoch_millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}

/// Shape of an inbound `receive` notification's `dataMessage` body.
#[derive(Deserialize, Debug, Default)]
struct DataMessage {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    attachments: Vec<Attachment>,
    #[serde(default)]
    quote: Option<Quote>,
    #[serde(default)]
    reaction: Option<ReactionPayload>,
}

#[derive(Deserialize, Debug)]
struct Attachment {
    #[serde(rename = "contentType", default)]
    content_type: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    id: String,
}

#[derive(Deserialize, Debug)]
struct Quote {
    id: i64,
    #[serde(default)]
    author: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ReactionPayload {
    emoji: String,
    #[serde(rename = "targetAuthor", default)]
    target_author: Option<String>,
    #[serde(rename = "targetSentTimestamp")]
    target_sent_timestamp: i64,
}

/// The outer `receive` envelope: `{envelope: {source, sourceNumber,
/// timestamp, dataMessage?}}`.
#[derive(Deserialize, Debug)]
struct Envelope {
    #[serde(default)]
    source: Option<String>,
    #[serde(rename = "sourceNumber", default)]
    source_number: Option<String>,
    #[serde(rename = "dataMessage", default)]
    data_message: Option<DataMessage>,
}

#[derive(Deserialize, Debug)]
struct ReceiveNotification {
    envelope: Envelope,
}

/// The result of translating one inbound notification.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// A regular (non-reaction) message.
    Message(Message),
    /// A reaction to some other message.
    Reaction {
        /// The reaction itself.
        reaction: Reaction,
        /// A stub referencing the reacted-to message.
        target: MessageStub,
    },
}

fn attachment_content(attachment: &Attachment, conversation_id: ScopedId) -> (ScopedId, MessageContent) {
    let url = format!("signal://attachment/{}", attachment.id);
    let content = if attachment.content_type.starts_with("image/") {
        MessageContent::Image { url, caption: None }
    } else if attachment.content_type.starts_with("video/") {
        MessageContent::Video { url, caption: None }
    } else if attachment.content_type.starts_with("audio/") {
        MessageContent::Audio { url, duration_ms: 0 }
    } else {
        MessageContent::File {
            url,
            filename: attachment.filename.clone().unwrap_or_else(|| attachment.id.clone()),
            size: attachment.size,
        }
    };
    (conversation_id, content)
}

/// Translate a raw `receive` notification payload into an [`InboundEvent`],
/// or `None` for envelopes that carry neither a text/attachment message nor
/// a reaction (e.g. typing indicators, receipts — those are handled by
/// separate, narrower mapping functions below).
#[must_use]
pub fn map_inbound_notification(platform: Platform, raw: Value) -> Option<InboundEvent> {
    let notification: ReceiveNotification = serde_json::from_value(raw).ok()?;
    let source = notification
        .envelope
        .source_number
        .or(notification.envelope.source)?;
    let conversation_id = ScopedId::from(source.clone());
    let sender = User::new(ScopedId::from(source.clone()), platform);
    let data = notification.envelope.data_message?;

    if let Some(reaction_payload) = data.reaction {
        let reaction = Reaction {
            emoji: reaction_payload.emoji,
            user: sender,
            timestamp: epoch_millis_to_datetime(data.timestamp),
        };
        let target = MessageStub {
            id: ScopedId::from(reaction_payload.target_sent_timestamp.to_string()),
            conversation_id,
            sender: reaction_payload.target_author.map(|a| User::new(ScopedId::from(a), platform)),
        };
        return Some(InboundEvent::Reaction { reaction, target });
    }

    let content = if let Some(attachment) = data.attachments.first() {
        attachment_content(attachment, conversation_id.clone()).1
    } else {
        MessageContent::text(data.message.clone().unwrap_or_default())
    };

    let mut message = Message::new(
        ScopedId::from(data.timestamp.to_string()),
        conversation_id.clone(),
        sender,
        epoch_millis_to_datetime(data.timestamp),
        content,
    );

    if let Some(quote) = data.quote {
        message.reply_to = Some(MessageStub {
            id: ScopedId::from(quote.id.to_string()),
            conversation_id,
            sender: quote.author.map(|a| User::new(ScopedId::from(a), platform)),
        });
    }

    Some(InboundEvent::Message(message))
}

/// Build the `send` method's JSON-RPC params from a unified text send.
#[must_use]
pub fn send_text_params(conversation: &Conversation, text: &str) -> Value {
    serde_json::json!({
        "recipient": [conversation.id.0],
        "message": text,
    })
}

/// Synthesize the sent [`Message`] from the adapter's own request, since
/// `signal-cli`'s `send` response carries only a delivery timestamp and no
/// echoed content.
#[must_use]
pub fn synthesize_sent_message(
    platform: Platform,
    conversation: &Conversation,
    content: MessageContent,
    self_id: &ScopedId,
    response_timestamp_ms: Option<i64>,
) -> Message {
    let timestamp = response_timestamp_ms.map(epoch_millis_to_datetime).unwrap_or_else(Utc::now);
    let id = response_timestamp_ms.map_or_else(ScopedId::generate, |ts| ScopedId::from(ts.to_string()));
    Message::new(id, conversation.id.clone(), User::new(self_id.clone(), platform), timestamp, content)
}

/// Build a minimal DM conversation for a bare phone-number recipient, the
/// only conversation shape this backend can construct without a full
/// contact/group sync.
#[must_use]
pub fn dm_conversation(platform: Platform, phone_number: &str) -> Conversation {
    Conversation::new(ScopedId::from(phone_number), platform, ConversationType::Dm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn maps_plain_text_receive_to_message() {
        let raw = serde_json::json!({
            "envelope": {
                "sourceNumber": "+15550000001",
                "timestamp": 1_700_000_000_000i64,
                "dataMessage": { "message": "hello", "timestamp": 1_700_000_000_000i64 }
            }
        });
        let event = map_inbound_notification(Platform::Subprocess, raw).unwrap();
        match event {
            InboundEvent::Message(msg) => {
                assert_eq!(msg.content, MessageContent::text("hello"));
                assert_eq!(msg.sender.platform, Platform::Subprocess);
            }
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn maps_reaction_to_reaction_event_with_stub_target() {
        let raw = serde_json::json!({
            "envelope": {
                "sourceNumber": "+15550000001",
                "timestamp": 1_700_000_001_000i64,
                "dataMessage": {
                    "timestamp": 1_700_000_001_000i64,
                    "reaction": {
                        "emoji": "👍",
                        "targetAuthor": "+15550000002",
                        "targetSentTimestamp": 1_700_000_000_500i64
                    }
                }
            }
        });
        let event = map_inbound_notification(Platform::Subprocess, raw).unwrap();
        match event {
            InboundEvent::Reaction { reaction, target } => {
                assert_eq!(reaction.emoji, "👍");
                assert_eq!(target.id, ScopedId::from("1700000000500"));
            }
            other => panic!("expected reaction, got {other:?}"),
        }
    }

    #[test]
    fn quote_becomes_reply_to_stub() {
        let raw = serde_json::json!({
            "envelope": {
                "sourceNumber": "+15550000001",
                "timestamp": 1_700_000_002_000i64,
                "dataMessage": {
                    "message": "re: that",
                    "timestamp": 1_700_000_002_000i64,
                    "quote": { "id": 1_700_000_000_000i64, "author": "+15550000002" }
                }
            }
        });
        let event = map_inbound_notification(Platform::Subprocess, raw).unwrap();
        match event {
            InboundEvent::Message(msg) => {
                let reply = msg.reply_to.expect("reply_to stub");
                assert_eq!(reply.id, ScopedId::from("1700000000000"));
            }
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn envelope_without_data_message_maps_to_none() {
        let raw = serde_json::json!({ "envelope": { "sourceNumber": "+15550000001" } });
        assert!(map_inbound_notification(Platform::Subprocess, raw).is_none());
    }

    #[test]
    fn image_attachment_maps_to_image_content() {
        let raw = serde_json::json!({
            "envelope": {
                "sourceNumber": "+15550000001",
                "timestamp": 1_700_000_003_000i64,
                "dataMessage": {
                    "timestamp": 1_700_000_003_000i64,
                    "attachments": [{ "contentType": "image/png", "id": "att-1" }]
                }
            }
        });
        let event = map_inbound_notification(Platform::Subprocess, raw).unwrap();
        match event {
            InboundEvent::Message(msg) => assert!(matches!(msg.content, MessageContent::Image { .. })),
            other => panic!("expected message, got {other:?}"),
        }
    }
}
