//! Platform-neutral chat domain types.
//!
//! Every adapter translates its backend's wire payloads into these types and
//! back. Nothing here performs I/O; the types are plain data plus the small
//! amount of validation that keeps their invariants (one active content
//! variant per message, non-empty platform tags) true by construction.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The chat backend a value originated from or is destined for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// A bot-API platform (centralized HTTP/long-poll bot surface).
    BotApi,
    /// A mobile-protocol platform reached through a paired WebSocket session.
    Mobile,
    /// A subprocess-RPC platform fronted by a local CLI.
    Subprocess,
    /// A browser-automation platform with no official API.
    Browser,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::BotApi => "bot_api",
            Platform::Mobile => "mobile",
            Platform::Subprocess => "subprocess",
            Platform::Browser => "browser",
        };
        f.write_str(name)
    }
}

/// A platform-scoped identifier. Two ids are only comparable when their
/// platform matches; callers that need cross-platform uniqueness should pair
/// this with the owning `Platform`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopedId(pub String);

impl ScopedId {
    /// Build a new locally-generated id (used when a backend doesn't hand
    /// one back, e.g. a fire-and-forget send on a platform with no message
    /// acknowledgement).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ScopedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ScopedId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ScopedId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A user known to a particular platform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Platform-scoped id.
    pub id: ScopedId,
    /// Owning platform.
    pub platform: Platform,
    /// Handle/username, when the platform exposes one.
    pub username: Option<String>,
    /// Human-readable display name.
    pub display_name: Option<String>,
    /// Avatar image URL, when available.
    pub avatar: Option<String>,
}

impl User {
    /// Construct a user with only the fields every platform can supply.
    #[must_use]
    pub fn new(id: ScopedId, platform: Platform) -> Self {
        Self {
            id,
            platform,
            username: None,
            display_name: None,
            avatar: None,
        }
    }
}

/// The kind of conversation container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationType {
    /// One-to-one direct message.
    Dm,
    /// A private or semi-private group.
    Group,
    /// A broadcast-style channel.
    Channel,
}

/// A conversation container on a platform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Platform-scoped id.
    pub id: ScopedId,
    /// Owning platform.
    pub platform: Platform,
    /// Known participants. May be empty when the backend can't enumerate
    /// members (e.g. a large broadcast channel).
    pub participants: Vec<User>,
    /// Container kind.
    pub conversation_type: ConversationType,
    /// Free-form platform metadata (title, topic, invite link, ...).
    pub metadata: std::collections::HashMap<String, String>,
}

impl Conversation {
    /// Construct a conversation with no known participants or metadata.
    #[must_use]
    pub fn new(id: ScopedId, platform: Platform, conversation_type: ConversationType) -> Self {
        Self {
            id,
            platform,
            participants: Vec::new(),
            conversation_type,
            metadata: std::collections::HashMap::new(),
        }
    }
}

/// A stub reference to a message whose full body is unavailable (e.g. a
/// reply-to or forward target the backend didn't hand us the content for).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageStub {
    /// The referenced message's id.
    pub id: ScopedId,
    /// The conversation it lives in.
    pub conversation_id: ScopedId,
    /// The sender, if known.
    pub sender: Option<User>,
}

/// The body of a message. Exactly one variant is active at a time; this is
/// enforced by construction since there is one constructor per variant and
/// no way to combine two.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text.
    Text {
        /// The text body.
        text: String,
    },
    /// An image attachment.
    Image {
        /// Location of the image.
        url: String,
        /// Optional caption.
        caption: Option<String>,
    },
    /// A video attachment.
    Video {
        /// Location of the video.
        url: String,
        /// Optional caption.
        caption: Option<String>,
    },
    /// A non-voice audio clip.
    Audio {
        /// Location of the audio.
        url: String,
        /// Duration in milliseconds.
        duration_ms: u64,
    },
    /// A voice note.
    Voice {
        /// Location of the recording.
        url: String,
        /// Duration in milliseconds.
        duration_ms: u64,
    },
    /// An arbitrary file attachment.
    File {
        /// Location of the file.
        url: String,
        /// Original filename.
        filename: String,
        /// Size in bytes, when known.
        size: Option<u64>,
    },
    /// A platform sticker.
    Sticker {
        /// Sticker identifier within the platform's sticker set.
        id: String,
        /// Rendered image URL, when the platform exposes one.
        url: Option<String>,
    },
    /// A shared location.
    Location {
        /// Latitude.
        lat: f64,
        /// Longitude.
        lng: f64,
        /// Optional place name.
        name: Option<String>,
    },
    /// A shared contact card.
    Contact {
        /// Contact display name.
        name: String,
        /// Contact phone number.
        phone: String,
    },
    /// A bare link (when a platform represents link shares distinctly from
    /// text messages containing a URL).
    Link {
        /// The linked URL.
        url: String,
    },
}

impl MessageContent {
    /// Convenience constructor for the common case.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        MessageContent::Text { text: text.into() }
    }

    /// A short human-readable label for the active variant, used in logging.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            MessageContent::Text { .. } => "text",
            MessageContent::Image { .. } => "image",
            MessageContent::Video { .. } => "video",
            MessageContent::Audio { .. } => "audio",
            MessageContent::Voice { .. } => "voice",
            MessageContent::File { .. } => "file",
            MessageContent::Sticker { .. } => "sticker",
            MessageContent::Location { .. } => "location",
            MessageContent::Contact { .. } => "contact",
            MessageContent::Link { .. } => "link",
        }
    }
}

/// A reaction applied to a message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    /// The emoji (or platform-specific reaction token).
    pub emoji: String,
    /// Who reacted.
    pub user: User,
    /// When the reaction was applied.
    pub timestamp: DateTime<Utc>,
}

/// A single chat message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Platform-scoped id.
    pub id: ScopedId,
    /// The conversation this message belongs to.
    pub conversation_id: ScopedId,
    /// Who sent it.
    pub sender: User,
    /// When it was sent, per the backend's clock.
    pub timestamp: DateTime<Utc>,
    /// The message body.
    pub content: MessageContent,
    /// The message this one replies to, if any. May be a stub.
    pub reply_to: Option<MessageStub>,
    /// Reactions attached to this message, if the backend reports them
    /// inline rather than as separate events.
    pub reactions: Vec<Reaction>,
}

impl Message {
    /// Construct a message with no reply-to and no inline reactions.
    #[must_use]
    pub fn new(
        id: ScopedId,
        conversation_id: ScopedId,
        sender: User,
        timestamp: DateTime<Utc>,
        content: MessageContent,
    ) -> Self {
        Self {
            id,
            conversation_id,
            sender,
            timestamp,
            content,
            reply_to: None,
            reactions: Vec::new(),
        }
    }

    /// Reduce this message to a stub reference (e.g. for use as a `reply_to`
    /// on another message).
    #[must_use]
    pub fn as_stub(&self) -> MessageStub {
        MessageStub {
            id: self.id.clone(),
            conversation_id: self.conversation_id.clone(),
            sender: Some(self.sender.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn user(id: &str) -> User {
        User::new(ScopedId::from(id), Platform::BotApi)
    }

    #[test]
    fn message_round_trips_through_json() {
        let msg = Message::new(
            ScopedId::from("m1"),
            ScopedId::from("c1"),
            user("u1"),
            Utc::now(),
            MessageContent::text("hello"),
        );
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn content_kind_name_matches_variant() {
        assert_eq!(MessageContent::text("hi").kind_name(), "text");
        assert_eq!(
            MessageContent::Sticker {
                id: "s1".into(),
                url: None
            }
            .kind_name(),
            "sticker"
        );
    }

    #[test]
    fn as_stub_preserves_identity_not_content() {
        let msg = Message::new(
            ScopedId::from("m1"),
            ScopedId::from("c1"),
            user("u1"),
            Utc::now(),
            MessageContent::text("hello"),
        );
        let stub = msg.as_stub();
        assert_eq!(stub.id, msg.id);
        assert_eq!(stub.conversation_id, msg.conversation_id);
        assert_eq!(stub.sender.unwrap().id, msg.sender.id);
    }

    #[test]
    fn scoped_id_generate_is_unique() {
        let a = ScopedId::generate();
        let b = ScopedId::generate();
        assert_eq!(a, a.clone());
        assert!(a != b);
    }
}
