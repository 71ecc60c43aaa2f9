//! # Minerva Core
//!
//! Domain types, traits, and error definitions for the Minerva chat
//! assistant. This crate has **no framework dependencies**: it defines the
//! model that the provider, channel, tool and session crates implement
//! against.
//!
//! Every collaborator of the session engine is a trait here (model endpoint,
//! chat platform, tool, token counter), so each can be swapped or mocked.

pub mod channel;
pub mod error;
pub mod message;
pub mod provider;
pub mod token;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use channel::{Channel, ChannelMessage, ReplyTarget};
pub use error::{ChannelError, Error, ProviderError, ResponseParseError, Result, SplitError, ToolError};
pub use message::{Content, ConversationKey, Image, Message};
pub use provider::{ChatEntry, ContentPart, Provider, ProviderRequest, ProviderResponse, Role};
pub use token::{HeuristicTokenCounter, TokenCounter};
pub use tool::{ParamType, Tool, ToolCall, ToolContext, ToolParam, ToolRegistry, ToolValue};
