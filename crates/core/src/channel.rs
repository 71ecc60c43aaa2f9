//! Channel trait: the abstraction over chat platforms.
//!
//! A Channel connects Minerva to a messaging platform (Telegram, Discord,
//! CLI, ...). It yields inbound turns and delivers replies, documents and
//! typing indicators back to a conversation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::message::{ConversationKey, Image};

/// An inbound chat turn, already normalized by the platform adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// The conversation (chat + topic) this turn belongs to
    pub key: ConversationKey,

    /// Platform message identifier, used as the reply target
    pub message_id: String,

    /// Sender identifier (platform-specific user ID)
    pub sender_id: String,

    /// Public username, if the sender has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_username: Option<String>,

    /// Text or caption
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,

    /// Whether the turn mentions the assistant or replies to one of its messages
    #[serde(default)]
    pub addressed: bool,
}

/// Where a delivery goes: a conversation, optionally as a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyTarget {
    pub key: ConversationKey,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl ReplyTarget {
    pub fn new(key: ConversationKey) -> Self {
        Self { key, reply_to: None }
    }

    pub fn replying_to(mut self, message_id: impl Into<String>) -> Self {
        self.reply_to = Some(message_id.into());
        self
    }
}

/// The core Channel trait.
///
/// Implementations handle platform-specific connection logic, message
/// formatting and rate limiting. Size limits are enforced upstream: `send`
/// receives chunks that already fit the platform.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "telegram", "cli").
    fn name(&self) -> &str;

    /// Start listening for incoming messages.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChannelMessage, ChannelError>>,
        ChannelError,
    >;

    /// Send one text chunk.
    async fn send(&self, target: &ReplyTarget, content: &str) -> std::result::Result<(), ChannelError>;

    /// Send a file. Platforms without document support report `NotSupported`.
    async fn send_document(
        &self,
        _target: &ReplyTarget,
        _filename: &str,
        _bytes: &[u8],
    ) -> std::result::Result<(), ChannelError> {
        Err(ChannelError::NotSupported {
            channel: self.name().to_string(),
            operation: "documents".into(),
        })
    }

    /// Send a typing indicator (if the platform supports it).
    async fn send_typing(&self, _key: &ConversationKey) -> std::result::Result<(), ChannelError> {
        Ok(())
    }
}
