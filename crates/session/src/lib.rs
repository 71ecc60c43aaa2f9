//! # Minerva Session
//!
//! The conversation engine. A [`SessionRegistry`] routes inbound turns to one
//! [`ChatSession`] per conversation; each session keeps a token-budgeted
//! [`MessageHistory`], asks the model for the next action, runs tools, and
//! delivers replies split to the platform's message limit.

pub mod history;
pub mod markdown;
pub mod prompt;
pub mod registry;
pub mod session;
pub mod tool_call;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use history::MessageHistory;
pub use markdown::{MarkdownChunks, MarkdownSplitter, split_markdown};
pub use prompt::{ModelAction, ModelMessage, parse_model_message, render_system_prompt};
pub use registry::SessionRegistry;
pub use session::{ChatSession, SessionServices, SessionSettings, Trigger, TurnOutcome, TurnReport};
pub use tool_call::{format_tool, parse_tool_call};
