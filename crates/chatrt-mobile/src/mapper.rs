//! Pure translation between the mobile protocol's inbound payload shapes and
//! the unified domain types. No I/O.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use chatrt_core::event::PresenceKind;
use chatrt_types::{Message, MessageContent, MessageStub, Platform, Reaction, ScopedId, User};

/// Container-variant type tags that wrap a concrete message payload one
/// level deeper. Unwrapped recursively until a concrete variant is found.
const CONTAINER_KEYS: [&str; 4] = ["viewOnceMessage", "ephemeralMessage", "documentWithCaptionMessage", "editedMessage"];

/// Status-broadcast JIDs never surface as ordinary conversations.
const STATUS_BROADCAST_JID: &str = "status@broadcast";

fn epoch_seconds_to_datetime(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).single().unwrap_or_else(Utc::now)
}

/// Recursively unwrap container variants until a concrete message payload
/// (or `None` if the structure bottoms out empty) is found.
#[must_use]
pub fn unwrap_container(message: &Value) -> Option<&Value> {
    let mut current = message;
    loop {
        let mut descended = false;
        for key in CONTAINER_KEYS {
            if let Some(inner) = current.get(key).and_then(|v| v.get("message")) {
                current = inner;
                descended = true;
                break;
            }
        }
        if !descended {
            return if current.is_object() { Some(current) } else { None };
        }
    }
}

/// The result of classifying one inbound protocol payload.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// A regular message.
    Message(Message),
    /// A reaction to another message.
    Reaction {
        /// The reaction itself.
        reaction: Reaction,
        /// A stub referencing the reacted-to message.
        target: MessageStub,
    },
    /// A typing indicator started or stopped.
    Typing {
        /// Conversation the indicator belongs to.
        conversation_id: ScopedId,
        /// Who is typing.
        user: User,
    },
    /// A presence change.
    Presence {
        /// Who changed presence.
        user: User,
        /// Which direction.
        kind: PresenceKind,
    },
    /// A read receipt.
    Read {
        /// The message that was read.
        message_id: ScopedId,
        /// When it was read.
        timestamp: DateTime<Utc>,
    },
}

fn message_content_from_concrete(payload: &Value) -> Option<MessageContent> {
    if let Some(text) = payload.get("conversation").and_then(Value::as_str) {
        return Some(MessageContent::text(text));
    }
    if let Some(ext) = payload.get("extendedTextMessage") {
        let text = ext.get("text").and_then(Value::as_str).unwrap_or_default();
        return Some(MessageContent::text(text));
    }
    if let Some(image) = payload.get("imageMessage") {
        return Some(MessageContent::Image {
            url: image.get("url").and_then(Value::as_str).unwrap_or_default().to_string(),
            caption: image.get("caption").and_then(Value::as_str).map(str::to_string),
        });
    }
    if let Some(video) = payload.get("videoMessage") {
        return Some(MessageContent::Video {
            url: video.get("url").and_then(Value::as_str).unwrap_or_default().to_string(),
            caption: video.get("caption").and_then(Value::as_str).map(str::to_string),
        });
    }
    if let Some(audio) = payload.get("audioMessage") {
        let url = audio.get("url").and_then(Value::as_str).unwrap_or_default().to_string();
        let duration_ms = audio.get("seconds").and_then(Value::as_u64).unwrap_or(0) * 1000;
        return Some(if audio.get("ptt").and_then(Value::as_bool).unwrap_or(false) {
            MessageContent::Voice { url, duration_ms }
        } else {
            MessageContent::Audio { url, duration_ms }
        });
    }
    if let Some(doc) = payload.get("documentMessage") {
        return Some(MessageContent::File {
            url: doc.get("url").and_then(Value::as_str).unwrap_or_default().to_string(),
            filename: doc.get("fileName").and_then(Value::as_str).unwrap_or("file").to_string(),
            size: doc.get("fileLength").and_then(Value::as_u64),
        });
    }
    if let Some(sticker) = payload.get("stickerMessage") {
        return Some(MessageContent::Sticker {
            id: sticker.get("fileSha256").and_then(Value::as_str).unwrap_or_default().to_string(),
            url: sticker.get("url").and_then(Value::as_str).map(str::to_string),
        });
    }
    if let Some(location) = payload.get("locationMessage") {
        return Some(MessageContent::Location {
            lat: location.get("degreesLatitude").and_then(Value::as_f64).unwrap_or(0.0),
            lng: location.get("degreesLongitude").and_then(Value::as_f64).unwrap_or(0.0),
            name: location.get("name").and_then(Value::as_str).map(str::to_string),
        });
    }
    if let Some(contact) = payload.get("contactMessage") {
        return Some(MessageContent::Contact {
            name: contact.get("displayName").and_then(Value::as_str).unwrap_or_default().to_string(),
            phone: contact.get("vcard").and_then(Value::as_str).unwrap_or_default().to_string(),
        });
    }
    None
}

/// `composing`/`recording` map to a `typing` event; `available`/`unavailable`
/// map to `presence online|offline`. Any other presence string is ignored.
fn map_presence_update(platform: Platform, raw: &Value) -> Option<InboundEvent> {
    let presence = raw.get("presenceUpdate")?;
    let jid = presence.get("remoteJid").and_then(Value::as_str)?;
    let user = User::new(ScopedId::from(jid), platform);
    match presence.get("presence").and_then(Value::as_str)? {
        "composing" | "recording" => Some(InboundEvent::Typing { conversation_id: ScopedId::from(jid), user }),
        "available" => Some(InboundEvent::Presence { user, kind: PresenceKind::Online }),
        "unavailable" => Some(InboundEvent::Presence { user, kind: PresenceKind::Offline }),
        _ => None,
    }
}

/// A receipt update only becomes a `read` event when `readTimestamp` is set
/// (delivery-only receipts are not surfaced).
fn map_receipt_update(raw: &Value) -> Option<InboundEvent> {
    let receipt = raw.get("receiptUpdate")?;
    let read_timestamp = receipt.get("readTimestamp").and_then(Value::as_i64)?;
    let message_id = receipt.get("id").and_then(Value::as_str)?;
    Some(InboundEvent::Read {
        message_id: ScopedId::from(message_id),
        timestamp: epoch_seconds_to_datetime(read_timestamp),
    })
}

/// Translate an inbound protocol envelope into zero-or-one unified events.
///
/// Returns `None` for status-broadcast traffic, history-sync batches
/// (tagged `type: "append"`), protocol messages, and reaction-only payloads
/// whose content has no other surfaced shape (reactions are emitted through
/// the `Reaction` variant, never folded into `Message`).
#[must_use]
pub fn map_inbound_payload(platform: Platform, raw: &Value) -> Option<InboundEvent> {
    if raw.get("type").and_then(Value::as_str) == Some("append") {
        return None;
    }

    if let Some(event) = map_presence_update(platform, raw) {
        return Some(event);
    }
    if let Some(event) = map_receipt_update(raw) {
        return Some(event);
    }

    let remote_jid = raw.get("key").and_then(|k| k.get("remoteJid")).and_then(Value::as_str)?;
    if remote_jid == STATUS_BROADCAST_JID {
        return None;
    }
    let conversation_id = ScopedId::from(remote_jid);

    if let Some(reaction) = raw.get("message").and_then(|m| m.get("reactionMessage")) {
        let emoji = reaction.get("text").and_then(Value::as_str).unwrap_or_default().to_string();
        let target_id = reaction.get("key").and_then(|k| k.get("id")).and_then(Value::as_str)?;
        let sender_jid = raw.get("participant").and_then(Value::as_str).or(Some(remote_jid))?;
        let sender = User::new(ScopedId::from(sender_jid), platform);
        let timestamp_ms = reaction.get("senderTimestampMs").and_then(Value::as_i64).unwrap_or(0);
        return Some(InboundEvent::Reaction {
            reaction: Reaction {
                emoji,
                user: sender.clone(),
                timestamp: epoch_seconds_to_datetime(timestamp_ms / 1000),
            },
            target: MessageStub {
                id: ScopedId::from(target_id),
                conversation_id,
                sender: Some(sender),
            },
        });
    }

    let body = raw.get("message")?;
    let concrete = unwrap_container(body)?;
    if concrete.get("protocolMessage").is_some() {
        return None;
    }
    let content = message_content_from_concrete(concrete)?;

    let message_id = raw.get("key").and_then(|k| k.get("id")).and_then(Value::as_str)?;
    let sender_jid = raw
        .get("key")
        .and_then(|k| k.get("participant"))
        .and_then(Value::as_str)
        .unwrap_or(remote_jid);
    let sender = User::new(ScopedId::from(sender_jid), platform);
    let timestamp = raw.get("messageTimestamp").and_then(Value::as_i64).map_or_else(Utc::now, epoch_seconds_to_datetime);

    let mut message = Message::new(ScopedId::from(message_id), conversation_id.clone(), sender, timestamp, content);

    if let Some(quoted) = concrete
        .get("extendedTextMessage")
        .or_else(|| concrete.get("contextInfo"))
        .and_then(|v| v.get("contextInfo"))
        .and_then(|ctx| ctx.get("stanzaId"))
        .and_then(Value::as_str)
    {
        message.reply_to = Some(MessageStub {
            id: ScopedId::from(quoted),
            conversation_id,
            sender: None,
        });
    }

    Some(InboundEvent::Message(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unwraps_single_level_view_once_container() {
        let raw = serde_json::json!({
            "viewOnceMessage": { "message": { "conversation": "hi" } }
        });
        let inner = unwrap_container(&raw).unwrap();
        assert_eq!(inner["conversation"], "hi");
    }

    #[test]
    fn unwraps_nested_ephemeral_then_edited() {
        let raw = serde_json::json!({
            "ephemeralMessage": {
                "message": { "editedMessage": { "message": { "conversation": "nested" } } }
            }
        });
        let inner = unwrap_container(&raw).unwrap();
        assert_eq!(inner["conversation"], "nested");
    }

    #[test]
    fn status_broadcast_is_filtered() {
        let raw = serde_json::json!({
            "key": { "remoteJid": "status@broadcast", "id": "1" },
            "message": { "conversation": "x" }
        });
        assert!(map_inbound_payload(Platform::Mobile, &raw).is_none());
    }

    #[test]
    fn history_sync_append_batches_are_filtered() {
        let raw = serde_json::json!({ "type": "append" });
        assert!(map_inbound_payload(Platform::Mobile, &raw).is_none());
    }

    #[test]
    fn plain_text_maps_to_message() {
        let raw = serde_json::json!({
            "key": { "remoteJid": "15550000001@s.whatsapp.net", "id": "abc" },
            "messageTimestamp": 1_700_000_000i64,
            "message": { "conversation": "hello" }
        });
        let event = map_inbound_payload(Platform::Mobile, &raw).unwrap();
        match event {
            InboundEvent::Message(msg) => assert_eq!(msg.content, MessageContent::text("hello")),
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn reaction_maps_to_reaction_event() {
        let raw = serde_json::json!({
            "key": { "remoteJid": "15550000001@s.whatsapp.net", "id": "r1" },
            "participant": "15550000002@s.whatsapp.net",
            "message": {
                "reactionMessage": {
                    "key": { "id": "target-1" },
                    "text": "🔥",
                    "senderTimestampMs": 1_700_000_000_000i64
                }
            }
        });
        let event = map_inbound_payload(Platform::Mobile, &raw).unwrap();
        match event {
            InboundEvent::Reaction { reaction, target } => {
                assert_eq!(reaction.emoji, "🔥");
                assert_eq!(target.id, ScopedId::from("target-1"));
            }
            other => panic!("expected reaction, got {other:?}"),
        }
    }

    #[test]
    fn protocol_messages_are_not_emitted() {
        let raw = serde_json::json!({
            "key": { "remoteJid": "15550000001@s.whatsapp.net", "id": "p1" },
            "message": { "protocolMessage": { "type": "REVOKE" } }
        });
        assert!(map_inbound_payload(Platform::Mobile, &raw).is_none());
    }

    #[test]
    fn image_message_maps_to_image_content() {
        let raw = serde_json::json!({
            "key": { "remoteJid": "15550000001@s.whatsapp.net", "id": "i1" },
            "message": { "imageMessage": { "url": "https://example/x.jpg", "caption": "look" } }
        });
        let event = map_inbound_payload(Platform::Mobile, &raw).unwrap();
        match event {
            InboundEvent::Message(msg) => match msg.content {
                MessageContent::Image { url, caption } => {
                    assert_eq!(url, "https://example/x.jpg");
                    assert_eq!(caption.as_deref(), Some("look"));
                }
                other => panic!("expected image, got {other:?}"),
            },
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn ptt_audio_maps_to_voice_not_audio() {
        let raw = serde_json::json!({
            "key": { "remoteJid": "15550000001@s.whatsapp.net", "id": "v1" },
            "message": { "audioMessage": { "url": "u", "seconds": 3, "ptt": true } }
        });
        let event = map_inbound_payload(Platform::Mobile, &raw).unwrap();
        match event {
            InboundEvent::Message(msg) => assert!(matches!(msg.content, MessageContent::Voice { duration_ms: 3000, .. })),
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn composing_presence_maps_to_typing() {
        let raw = serde_json::json!({
            "presenceUpdate": { "remoteJid": "15550000001@s.whatsapp.net", "presence": "composing" }
        });
        let event = map_inbound_payload(Platform::Mobile, &raw).unwrap();
        assert!(matches!(event, InboundEvent::Typing { .. }));
    }

    #[test]
    fn available_presence_maps_to_online() {
        let raw = serde_json::json!({
            "presenceUpdate": { "remoteJid": "15550000001@s.whatsapp.net", "presence": "available" }
        });
        let event = map_inbound_payload(Platform::Mobile, &raw).unwrap();
        assert!(matches!(event, InboundEvent::Presence { kind: PresenceKind::Online, .. }));
    }

    #[test]
    fn receipt_without_read_timestamp_is_not_emitted() {
        let raw = serde_json::json!({
            "receiptUpdate": { "id": "m1", "remoteJid": "15550000001@s.whatsapp.net" }
        });
        assert!(map_inbound_payload(Platform::Mobile, &raw).is_none());
    }

    #[test]
    fn receipt_with_read_timestamp_maps_to_read_event() {
        let raw = serde_json::json!({
            "receiptUpdate": { "id": "m1", "remoteJid": "15550000001@s.whatsapp.net", "readTimestamp": 1_700_000_000i64 }
        });
        let event = map_inbound_payload(Platform::Mobile, &raw).unwrap();
        match event {
            InboundEvent::Read { message_id, .. } => assert_eq!(message_id, ScopedId::from("m1")),
            other => panic!("expected read, got {other:?}"),
        }
    }
}
