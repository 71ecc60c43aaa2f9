//! System prompt, model reply protocol, and wire formatting.
//!
//! Every model reply starts with an action header:
//!
//! ```text
//! Action: respond
//! text shown to the chat
//! ```
//!
//! or
//!
//! ```text
//! Action: tool
//! tool_name(arguments)
//! ```

use std::fmt;

use minerva_config::IdentityConfig;
use minerva_core::error::ResponseParseError;
use minerva_core::message::{ANONYMOUS_PREFIX, ERROR_AUTHOR, Message, TOOL_PREFIX, tool_author};
use minerva_core::provider::{ChatEntry, ContentPart, Role};
use minerva_core::tool::ToolRegistry;

use crate::history::MessageHistory;
use crate::tool_call::format_tool;

pub const ACTION_PREFIX: &str = "Action:";

/// What the model asked the engine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelAction {
    Respond,
    UseTool,
}

impl ModelAction {
    pub const ALL: [ModelAction; 2] = [ModelAction::UseTool, ModelAction::Respond];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelAction::Respond => "respond",
            ModelAction::UseTool => "tool",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == name)
    }
}

impl fmt::Display for ModelAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMessage {
    pub action: ModelAction,
    pub content: String,
}

impl ModelMessage {
    /// Render back to the wire form, header included.
    pub fn render(action: ModelAction, content: &str) -> String {
        format!("{ACTION_PREFIX} {action}\n{content}")
    }
}

/// Split a model reply into its action header and payload.
pub fn parse_model_message(text: &str) -> Result<ModelMessage, ResponseParseError> {
    let text = text.trim();
    let (header, content) = text.split_once('\n').unwrap_or((text, ""));

    let Some(rest) = header.strip_prefix(ACTION_PREFIX) else {
        return Err(ResponseParseError::MissingAction);
    };
    // The action name ends at the next colon, if any
    let name = rest.split(':').next().unwrap_or_default().trim();
    let action = ModelAction::from_name(name)
        .ok_or_else(|| ResponseParseError::UnsupportedAction(name.to_string()))?;

    Ok(ModelMessage {
        action,
        content: content.to_string(),
    })
}

const DEFAULT_PERSONA: &str = "\
You are friendly, respectful and have a good sense of humor. You are good at breaking \
down intricate concepts and explaining them clearly. Prefer talking like a partner \
rather than a lecturer, and when it makes sense, nudge people to find the answer \
themselves instead of handing it over.

Provide short responses suitable for a group chat unless you need to elaborate. \
Never repeat yourself.";

/// Render the system prompt for an assistant with the given tools.
pub fn render_system_prompt(
    identity: &IdentityConfig,
    tools: &ToolRegistry,
    max_tool_use_count: u32,
) -> String {
    let persona = identity.persona.as_deref().unwrap_or(DEFAULT_PERSONA);
    let tool_list = tools
        .iter()
        .map(|tool| format_tool(tool.as_ref()))
        .collect::<Vec<_>>()
        .join("\n");
    let example_mention = identity.mention("participant_username");
    let tool_entry = tool_author("tool_name");
    let tool_error = tool_author(ERROR_AUTHOR);
    let respond = ModelAction::Respond;
    let use_tool = ModelAction::UseTool;

    format!(
        "You are {name}, a chat assistant.

{persona}

The conversation history includes multiple participants. Each message is structured as:
participant_username: message content

Your username is {username}. To mention a participant write {example_mention} (without quotes). \
Never mention yourself and never prefix your answers with your own username.

If a participant's username starts with \"{anonymous}\", their username is not available. \
Do not mention these participants.

When responding, you may use markdown for quotes, code blocks, bold, italics, underline, \
strikethrough and spoilers. Only these markdown rules are supported.

To help the user you may use tools. To use a tool, say:
{ACTION_PREFIX} {use_tool}
tool_name(arguments)

Pass text arguments in quotes. The tool is called with the provided arguments and its \
result is added to the conversation history as:
{tool_entry}: tool response

or, if the call fails:
{tool_error}: error message

Tool calls and tool responses are visible only to you. Decide what to share with the user, \
and do not mention tools in your responses.

You can use tools several times in a row, but never more than {max_tool_use_count} times in a row.

The following tools are available:

START OF THE TOOL LIST

{tool_list}
END OF THE TOOL LIST

Always start your message with:
{ACTION_PREFIX}

The action is either \"{use_tool}\" or \"{respond}\". Then put the content of your message \
on the next line.

Messages from {error} are visible only to you. If you get one, try fulfilling the request again.

For example:
{ACTION_PREFIX} {use_tool}
tool(\"arg1_value\", 42)

Or:
{ACTION_PREFIX} {respond}
The message that will appear in the chat.
",
        name = identity.ai_name,
        username = identity.ai_username,
        anonymous = ANONYMOUS_PREFIX,
        error = ERROR_AUTHOR,
    )
}

/// Wire role of a history entry.
///
/// Engine-authored entries (tool output, protocol errors) are system turns,
/// the assistant's own replies are assistant turns, everyone else is a user.
pub fn role_for(author: &str, ai_username: &str) -> Role {
    if author.starts_with(TOOL_PREFIX) || author == ERROR_AUTHOR {
        Role::System
    } else if author == ai_username {
        Role::Assistant
    } else {
        Role::User
    }
}

fn to_chat_entry(message: &Message, ai_username: &str) -> ChatEntry {
    let mut content: Vec<ContentPart> = message
        .content
        .images()
        .iter()
        .map(|image| ContentPart::image(image.url.clone()))
        .collect();
    if let Some(text) = message.content.text() {
        if content.is_empty() || !text.is_empty() {
            content.push(ContentPart::text(text));
        }
    }

    ChatEntry {
        role: role_for(&message.author, ai_username),
        name: Some(message.author.clone()),
        content,
    }
}

/// The system prompt followed by one entry per history message.
pub fn to_chat_entries(history: &MessageHistory, ai_username: &str) -> Vec<ChatEntry> {
    std::iter::once(ChatEntry::system(history.prompt()))
        .chain(history.messages().map(|m| to_chat_entry(m, ai_username)))
        .collect()
}
