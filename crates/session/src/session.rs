//! One conversation's response cycle.
//!
//! A [`ChatSession`] owns the history of one conversation. When a response
//! is due it runs a bounded loop: call the model, parse the action header,
//! then either deliver the reply or run a tool and go around again. Every
//! failure along the way is absorbed; the worst case for the user is a fixed
//! apology or refusal.

use std::sync::Arc;

use minerva_config::AppConfig;
use minerva_core::channel::{Channel, ReplyTarget};
use minerva_core::error::SplitError;
use minerva_core::message::{Content, ConversationKey, ERROR_AUTHOR, Message, tool_author};
use minerva_core::provider::{Provider, ProviderRequest};
use minerva_core::token::{TokenCounter, trim_to_token_budget};
use minerva_core::tool::{ToolCall, ToolContext, ToolRegistry};
use tracing::{debug, info, warn};

use crate::history::MessageHistory;
use crate::markdown::MarkdownSplitter;
use crate::prompt::{ModelAction, ModelMessage, parse_model_message, to_chat_entries};
use crate::tool_call::parse_tool_call;

/// Sent when the model cannot be reached or keeps replying out of protocol.
pub const APOLOGY: &str =
    "I'm sorry, I'm having trouble understanding you right now. Could you please rephrase your question?";

/// Sent when the model ignores the request to stop using tools.
pub const REFUSAL: &str = "I'm sorry, I can't help you with that. Please ask something else.";

/// Appended to tool output cut at the token budget.
pub const TRUNCATION_SUFFIX: &str = "...TRUNCATED";

/// Limits and model parameters shared by all sessions.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub model: String,
    pub temperature: f32,
    pub max_completion_tokens: u32,
    /// The assistant's own turns are authored under this name
    pub ai_username: String,
    pub max_history_tokens: usize,
    pub max_retry_count: u32,
    pub max_tool_use_count: u32,
    pub max_message_length: usize,
    pub max_tool_response_tokens: usize,
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_completion_tokens: config.max_completion_tokens,
            ai_username: config.identity.ai_username.clone(),
            max_history_tokens: config.session.max_history_tokens,
            max_retry_count: config.session.max_retry_count,
            max_tool_use_count: config.session.max_tool_use_count,
            max_message_length: config.session.max_message_length,
            max_tool_response_tokens: config.session.max_tool_response_tokens,
        }
    }

    /// Upper bound on model calls in one response cycle.
    pub fn max_model_calls(&self) -> u32 {
        self.max_retry_count + self.max_tool_use_count + 1
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Collaborators every session of an assistant shares.
#[derive(Clone)]
pub struct SessionServices {
    pub provider: Arc<dyn Provider>,
    pub channel: Arc<dyn Channel>,
    pub tools: Arc<ToolRegistry>,
    pub counter: Arc<dyn TokenCounter>,
    pub settings: Arc<SessionSettings>,
    /// Rendered system prompt
    pub prompt: Arc<str>,
}

/// The turn that made a response due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    /// Forwarded to the model endpoint as the end-user id
    pub user_id: String,
    /// Platform id of the message to reply to
    pub reply_to: Option<String>,
}

/// Counters scoped to one response cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnState {
    pub tool_use_count: u32,
    pub retry_count: u32,
    pub model_calls: u32,
    pub model_failures: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model's own reply was delivered
    Responded,
    /// The fixed apology was delivered
    Apologized,
    /// The fixed refusal was delivered after the tool ceiling
    Refused,
}

/// What a response cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    pub state: TurnState,
    /// False when any chunk failed to reach the channel
    pub delivered: bool,
}

pub struct ChatSession {
    key: ConversationKey,
    history: MessageHistory,
    splitter: MarkdownSplitter,
    services: SessionServices,
}

impl ChatSession {
    pub fn new(key: ConversationKey, services: SessionServices) -> Result<Self, SplitError> {
        let settings = &services.settings;
        let splitter = MarkdownSplitter::new(settings.max_message_length)?;
        let history = MessageHistory::new(
            services.prompt.as_ref(),
            settings.max_history_tokens,
            services.counter.as_ref(),
        );

        Ok(Self {
            key,
            history,
            splitter,
            services,
        })
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    pub fn channel(&self) -> Arc<dyn Channel> {
        Arc::clone(&self.services.channel)
    }

    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    pub fn add_message(&mut self, message: Message) {
        self.history.add(message);
    }

    /// Build a message with this session's token counter and append it.
    pub fn record(&mut self, author: impl Into<String>, content: impl Into<Content>) {
        let message = Message::new(author, content, self.services.counter.as_ref());
        self.history.add(message);
    }

    /// Run one response cycle for `trigger`.
    pub async fn create_response(&mut self, trigger: &Trigger) -> TurnReport {
        let settings = Arc::clone(&self.services.settings);
        let target = ReplyTarget {
            key: self.key.clone(),
            reply_to: trigger.reply_to.clone(),
        };
        let mut state = TurnState::default();

        info!(key = %self.key, user = %trigger.user_id, "Creating response");

        let (outcome, delivered) = loop {
            let reply = self.call_model(&trigger.user_id, &mut state).await;

            let model_message = match parse_model_message(&reply) {
                Ok(message) => message,
                Err(err) => {
                    if state.retry_count >= settings.max_retry_count {
                        warn!(key = %self.key, retries = state.retry_count, "Model keeps replying out of protocol");
                        let delivered = self.deliver_fixed(APOLOGY, &target).await;
                        break (TurnOutcome::Apologized, delivered);
                    }
                    state.retry_count += 1;
                    debug!(key = %self.key, error = %err, retry_count = state.retry_count, "Malformed model reply");
                    self.record(ERROR_AUTHOR, err.to_string());
                    continue;
                }
            };

            match model_message.action {
                ModelAction::Respond => {
                    let delivered = self.deliver(&model_message.content, &target).await;
                    let outcome = if state.model_failures > 0 {
                        TurnOutcome::Apologized
                    } else {
                        TurnOutcome::Responded
                    };
                    break (outcome, delivered);
                }
                ModelAction::UseTool => {
                    state.tool_use_count += 1;

                    if state.tool_use_count == settings.max_tool_use_count {
                        debug!(key = %self.key, tool_use_count = state.tool_use_count, "Tool ceiling reached");
                        self.record(
                            tool_author(ERROR_AUTHOR),
                            format!(
                                "You've used tools more than {} times in a row. Reply to the user.",
                                settings.max_tool_use_count
                            ),
                        );
                        continue;
                    }

                    if state.tool_use_count > settings.max_tool_use_count {
                        warn!(key = %self.key, "Model ignored the tool ceiling");
                        let delivered = self.deliver_fixed(REFUSAL, &target).await;
                        break (TurnOutcome::Refused, delivered);
                    }

                    self.run_tool(&model_message.content, &target).await;
                }
            }
        };

        info!(
            key = %self.key,
            ?outcome,
            model_calls = state.model_calls,
            tool_use_count = state.tool_use_count,
            retry_count = state.retry_count,
            "Response cycle finished"
        );

        TurnReport {
            outcome,
            state,
            delivered,
        }
    }

    /// Ask the model for the next reply and append it to the history.
    ///
    /// A failed call is replaced by a synthesized apology reply.
    async fn call_model(&mut self, user_id: &str, state: &mut TurnState) -> String {
        let settings = &self.services.settings;
        let request = ProviderRequest {
            model: settings.model.clone(),
            messages: to_chat_entries(&self.history, &settings.ai_username),
            temperature: settings.temperature,
            max_tokens: Some(settings.max_completion_tokens),
            user: Some(user_id.to_string()),
        };
        state.model_calls += 1;

        debug!(
            key = %self.key,
            entries = request.messages.len(),
            history_tokens = self.history.token_count(),
            "Calling model"
        );

        let reply = match self.services.provider.complete(request).await {
            Ok(response) => {
                debug!(key = %self.key, reply = %response.content, "Model replied");
                response.content
            }
            Err(err) => {
                warn!(key = %self.key, provider = %self.services.provider.name(), error = %err, "Model call failed");
                state.model_failures += 1;
                ModelMessage::render(ModelAction::Respond, APOLOGY)
            }
        };

        let ai_username = self.services.settings.ai_username.clone();
        self.record(ai_username, reply.clone());
        reply
    }

    /// Resolve and invoke a tool call, recording the outcome for the model.
    async fn run_tool(&mut self, call_text: &str, target: &ReplyTarget) {
        let call = match parse_tool_call(call_text, &self.services.tools) {
            Ok(call) => call,
            Err(err) => {
                debug!(key = %self.key, error = %err, "Unusable tool call");
                self.record(tool_author(ERROR_AUTHOR), format!("ERROR: {err}"));
                return;
            }
        };

        let ctx = ToolContext {
            channel: Arc::clone(&self.services.channel),
            target: target.clone(),
        };

        let ToolCall { tool, args } = call;
        info!(key = %self.key, tool = %tool.name(), "Invoking tool");
        let entry = match tool.invoke(args, &ctx).await {
            Ok(output) => trim_to_token_budget(
                self.services.counter.as_ref(),
                &output,
                self.services.settings.max_tool_response_tokens,
                TRUNCATION_SUFFIX,
            ),
            Err(err) => {
                warn!(key = %self.key, tool = %tool.name(), error = %err, "Tool failed");
                format!("ERROR: {err}")
            }
        };
        self.record(tool_author(tool.name()), entry);
    }

    /// Record a fixed reply as the assistant's turn, then deliver it.
    async fn deliver_fixed(&mut self, text: &str, target: &ReplyTarget) -> bool {
        let ai_username = self.services.settings.ai_username.clone();
        self.record(ai_username, ModelMessage::render(ModelAction::Respond, text));
        self.deliver(text, target).await
    }

    /// Split `text` to the platform limit and send the chunks in order.
    ///
    /// Stops at the first failed chunk.
    async fn deliver(&self, text: &str, target: &ReplyTarget) -> bool {
        for chunk in self.splitter.split(text) {
            if chunk.trim().is_empty() {
                continue;
            }
            if let Err(err) = self.services.channel.send(target, &chunk).await {
                warn!(key = %self.key, channel = %self.services.channel.name(), error = %err, "Delivery failed");
                return false;
            }
        }
        true
    }
}
