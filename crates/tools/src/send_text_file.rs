//! Send text tool: deliver generated text to the chat as a document.

use async_trait::async_trait;
use minerva_core::error::ToolError;
use minerva_core::tool::{ParamType, Tool, ToolContext, ToolParam, ToolValue};
use tracing::info;

const PARAMS: &[ToolParam] = &[
    ToolParam::new("filename", ParamType::Str),
    ToolParam::new("content", ParamType::Str),
];

pub struct SendTextFileTool;

#[async_trait]
impl Tool for SendTextFileTool {
    fn name(&self) -> &str {
        "send_text_file"
    }

    fn description(&self) -> &str {
        "Send a text file with the given filename and content to the user. Use it for \
         content that is too long for a chat message or that the user asked to get as a file."
    }

    fn parameters(&self) -> &[ToolParam] {
        PARAMS
    }

    async fn invoke(&self, args: Vec<ToolValue>, ctx: &ToolContext) -> Result<String, ToolError> {
        let [filename, content] = args.as_slice() else {
            return Err(ToolError::Arity {
                tool_name: self.name().into(),
                expected: PARAMS.len(),
                got: args.len(),
            });
        };
        let filename = filename.as_str().unwrap_or_default();
        let content = content.as_str().unwrap_or_default();

        if filename.trim().is_empty() {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: "filename must not be empty".into(),
            });
        }

        let bytes = content.as_bytes();
        ctx.channel
            .send_document(&ctx.target, filename, bytes)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;

        info!(key = %ctx.target.key, filename, bytes = bytes.len(), "Sent text file");
        Ok(format!("sent:{filename}:{}", bytes.len()))
    }
}
