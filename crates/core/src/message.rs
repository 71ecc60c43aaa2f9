//! Message and conversation key domain types.
//!
//! A [`Message`] is one entry of a conversation history: something a
//! participant said, something the assistant replied, or a note written by
//! the engine on behalf of a tool. Messages are immutable once built and carry
//! their token cost so histories never need to re-count.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::token::{TokenCounter, image_tokens};

/// Author prefix marking entries written on behalf of a tool.
pub const TOOL_PREFIX: &str = "TOOL-";

/// Author of entries that report a protocol error back to the model.
pub const ERROR_AUTHOR: &str = "ERROR";

/// Author prefix for participants without a public username.
pub const ANONYMOUS_PREFIX: &str = "id-";

/// Author name for a tool-authored entry (`TOOL-<name>`).
pub fn tool_author(name: &str) -> String {
    format!("{TOOL_PREFIX}{name}")
}

/// Author name for a participant: their username, or `id-<user_id>`.
pub fn participant_author(username: Option<&str>, user_id: &str) -> String {
    match username {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("{ANONYMOUS_PREFIX}{user_id}"),
    }
}

/// An image attached to a message. `url` may be a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub width_px: u32,
    pub height_px: u32,
}

impl Image {
    pub fn new(url: impl Into<String>, width_px: u32, height_px: u32) -> Self {
        Self {
            url: url.into(),
            width_px,
            height_px,
        }
    }

    pub fn token_cost(&self) -> usize {
        image_tokens(self.width_px, self.height_px)
    }
}

/// The payload of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Content {
    Text(String),
    Multimodal {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        images: Vec<Image>,
    },
}

impl Content {
    /// The textual part, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Multimodal { text, .. } => text.as_deref(),
        }
    }

    pub fn images(&self) -> &[Image] {
        match self {
            Content::Text(_) => &[],
            Content::Multimodal { images, .. } => images,
        }
    }

    /// Build content from an optional caption and attached images.
    ///
    /// Falls back to plain text when there are no images.
    pub fn from_parts(text: Option<String>, images: Vec<Image>) -> Self {
        if images.is_empty() {
            Content::Text(text.unwrap_or_default())
        } else {
            Content::Multimodal { text, images }
        }
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

/// A single entry in a conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Participant name, the assistant's username, `TOOL-<name>` or `ERROR`
    pub author: String,

    pub content: Content,

    /// Token cost, computed once at construction
    pub token_length: usize,

    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Build a message and compute its token cost.
    ///
    /// Tool-authored entries are charged for their raw text only. Everything
    /// else is charged for the `author: text` line the model actually sees,
    /// plus the image cost of each attachment.
    pub fn new(author: impl Into<String>, content: impl Into<Content>, counter: &dyn TokenCounter) -> Self {
        let author = author.into();
        let content = content.into();
        let text = content.text().unwrap_or_default();

        let token_length = if author.starts_with(TOOL_PREFIX) {
            counter.count(text)
        } else {
            let line_tokens = counter.count(&format!("{author}: {text}"));
            line_tokens + content.images().iter().map(Image::token_cost).sum::<usize>()
        };

        Self {
            author,
            content,
            token_length,
            created_at: Utc::now(),
        }
    }

    pub fn is_tool_authored(&self) -> bool {
        self.author.starts_with(TOOL_PREFIX)
    }

    /// The textual part of the content, empty for image-only messages.
    pub fn text(&self) -> &str {
        self.content.text().unwrap_or_default()
    }
}

/// Identifies one conversation: a chat, optionally narrowed to a topic/thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationKey {
    pub chat_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,
}

impl ConversationKey {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            topic_id: None,
        }
    }

    pub fn with_topic(mut self, topic_id: impl Into<String>) -> Self {
        self.topic_id = Some(topic_id.into());
        self
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.topic_id {
            Some(topic) => write!(f, "{}/{}", self.chat_id, topic),
            None => write!(f, "{}", self.chat_id),
        }
    }
}
