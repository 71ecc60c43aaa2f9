//! Shared test helpers: a scripted provider, a recording channel and a few
//! small tools.

use async_trait::async_trait;
use minerva_core::channel::{Channel, ChannelMessage, ReplyTarget};
use minerva_core::error::{ChannelError, ProviderError, ToolError};
use minerva_core::message::ConversationKey;
use minerva_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use minerva_core::tool::{ParamType, Tool, ToolContext, ToolParam, ToolRegistry, ToolValue};
use std::sync::{Arc, Mutex};

/// A mock provider that returns a sequence of scripted replies.
///
/// Each call to `complete` returns the next reply in the queue. Once the
/// script runs out every call fails, which the session treats like any
/// other provider error.
pub struct ScriptedProvider {
    replies: Mutex<Vec<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Provider whose replies all succeed.
    pub fn replies(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len() - 1
        };
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(index)
            .cloned()
            .unwrap_or_else(|| Err(ProviderError::Network("script exhausted".into())));

        reply.map(|content| ProviderResponse {
            content,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock-model".into(),
        })
    }
}

/// Something a [`RecordingChannel`] was asked to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Text { target: ReplyTarget, text: String },
    Document { target: ReplyTarget, filename: String, bytes: Vec<u8> },
    Typing(ConversationKey),
}

/// A channel that records deliveries instead of sending them.
#[derive(Default)]
pub struct RecordingChannel {
    deliveries: Mutex<Vec<Delivery>>,
    fail_sends: bool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose text sends all fail.
    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    /// Delivered text chunks, in order.
    pub fn texts(&self) -> Vec<String> {
        self.deliveries()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn start(
        &self,
    ) -> Result<tokio::sync::mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (_tx, rx) = tokio::sync::mpsc::channel(1);
        Ok(rx)
    }

    async fn send(&self, target: &ReplyTarget, content: &str) -> Result<(), ChannelError> {
        if self.fail_sends {
            return Err(ChannelError::DeliveryFailed {
                channel: "recording".into(),
                reason: "send disabled".into(),
            });
        }
        self.deliveries.lock().unwrap().push(Delivery::Text {
            target: target.clone(),
            text: content.to_string(),
        });
        Ok(())
    }

    async fn send_document(&self, target: &ReplyTarget, filename: &str, bytes: &[u8]) -> Result<(), ChannelError> {
        self.deliveries.lock().unwrap().push(Delivery::Document {
            target: target.clone(),
            filename: filename.to_string(),
            bytes: bytes.to_vec(),
        });
        Ok(())
    }

    async fn send_typing(&self, key: &ConversationKey) -> Result<(), ChannelError> {
        self.deliveries.lock().unwrap().push(Delivery::Typing(key.clone()));
        Ok(())
    }
}

/// `sum(a: int, b: int)`
pub struct SumTool;

#[async_trait]
impl Tool for SumTool {
    fn name(&self) -> &str {
        "sum"
    }
    fn description(&self) -> &str {
        "Add two integers."
    }
    fn parameters(&self) -> &[ToolParam] {
        const PARAMS: &[ToolParam] = &[ToolParam::new("a", ParamType::Int), ToolParam::new("b", ParamType::Int)];
        PARAMS
    }
    async fn invoke(&self, args: Vec<ToolValue>, _ctx: &ToolContext) -> Result<String, ToolError> {
        let a = args[0].as_i64().unwrap_or_default();
        let b = args[1].as_i64().unwrap_or_default();
        Ok((a + b).to_string())
    }
}

/// `do_x()`
pub struct DoXTool;

#[async_trait]
impl Tool for DoXTool {
    fn name(&self) -> &str {
        "do_x"
    }
    fn description(&self) -> &str {
        "Do x."
    }
    fn parameters(&self) -> &[ToolParam] {
        &[]
    }
    async fn invoke(&self, _args: Vec<ToolValue>, _ctx: &ToolContext) -> Result<String, ToolError> {
        Ok("x done".into())
    }
}

/// `fetch(url: str)` returns a page far larger than any tool budget.
pub struct FetchTool;

#[async_trait]
impl Tool for FetchTool {
    fn name(&self) -> &str {
        "fetch"
    }
    fn description(&self) -> &str {
        "Fetch a page."
    }
    fn parameters(&self) -> &[ToolParam] {
        const PARAMS: &[ToolParam] = &[ToolParam::new("url", ParamType::Str)];
        PARAMS
    }
    async fn invoke(&self, args: Vec<ToolValue>, _ctx: &ToolContext) -> Result<String, ToolError> {
        let url = args[0].as_str().unwrap_or_default();
        Ok(format!("<html>{url}{}</html>", "a".repeat(100_000)))
    }
}

/// `note(title: str, body: str)`
pub struct NoteTool;

#[async_trait]
impl Tool for NoteTool {
    fn name(&self) -> &str {
        "note"
    }
    fn description(&self) -> &str {
        "Write a note."
    }
    fn parameters(&self) -> &[ToolParam] {
        const PARAMS: &[ToolParam] = &[ToolParam::new("title", ParamType::Str), ToolParam::new("body", ParamType::Str)];
        PARAMS
    }
    async fn invoke(&self, args: Vec<ToolValue>, _ctx: &ToolContext) -> Result<String, ToolError> {
        Ok(format!("noted {}", args[0].as_str().unwrap_or_default()))
    }
}

/// `broken()` always fails.
pub struct BrokenTool;

#[async_trait]
impl Tool for BrokenTool {
    fn name(&self) -> &str {
        "broken"
    }
    fn description(&self) -> &str {
        "Always fails."
    }
    fn parameters(&self) -> &[ToolParam] {
        &[]
    }
    async fn invoke(&self, _args: Vec<ToolValue>, _ctx: &ToolContext) -> Result<String, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: "broken".into(),
            reason: "boom".into(),
        })
    }
}

pub fn test_registry() -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(Arc::new(SumTool))
        .with_tool(Arc::new(DoXTool))
        .with_tool(Arc::new(FetchTool))
        .with_tool(Arc::new(NoteTool))
        .with_tool(Arc::new(BrokenTool))
}
