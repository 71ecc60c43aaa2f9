//! Tool trait: the abstraction over assistant capabilities.
//!
//! Tools declare a typed parameter list instead of a JSON schema: the model
//! calls them with a small textual grammar (`name(arg, ...)`), and each raw
//! argument is converted through the declared [`ParamType`].

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::channel::{Channel, ReplyTarget};
use crate::error::ToolError;

/// Declared type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Str,
    Int,
    Float,
    Bool,
}

impl ParamType {
    /// Name used in signatures shown to the model.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::Str => "str",
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Bool => "bool",
        }
    }

    /// Convert a raw argument. `Str` passes the text through unchanged.
    pub fn coerce(&self, raw: &str) -> std::result::Result<ToolValue, String> {
        match self {
            ParamType::Str => Ok(ToolValue::Str(raw.to_string())),
            ParamType::Int => raw.parse::<i64>().map(ToolValue::Int).map_err(|e| e.to_string()),
            ParamType::Float => raw.parse::<f64>().map(ToolValue::Float).map_err(|e| e.to_string()),
            ParamType::Bool => match raw {
                "True" | "true" => Ok(ToolValue::Bool(true)),
                "False" | "false" => Ok(ToolValue::Bool(false)),
                other => Err(format!("expected true or false, got {other:?}")),
            },
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A converted tool argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ToolValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ToolValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ToolValue::Int(n) => Some(*n),
            _ => None,
        }
    }

}

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolParam {
    pub name: &'static str,
    pub ty: ParamType,
}

impl ToolParam {
    pub const fn new(name: &'static str, ty: ParamType) -> Self {
        Self { name, ty }
    }
}

/// A resolved call: the registered tool plus converted arguments in
/// declaration order.
#[derive(Clone)]
pub struct ToolCall {
    pub tool: Arc<dyn Tool>,
    pub args: Vec<ToolValue>,
}

impl ToolCall {
    pub fn tool_name(&self) -> &str {
        self.tool.name()
    }
}

impl fmt::Debug for ToolCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolCall")
            .field("tool", &self.tool_name())
            .field("args", &self.args)
            .finish()
    }
}

/// Ambient context handed to every invocation.
///
/// Not part of the textual grammar, so the model never supplies it.
#[derive(Clone)]
pub struct ToolContext {
    pub channel: Arc<dyn Channel>,
    pub target: ReplyTarget,
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name the model calls this tool by.
    fn name(&self) -> &str;

    /// What this tool does (shown to the model).
    fn description(&self) -> &str;

    /// Declared parameters, in call order.
    fn parameters(&self) -> &[ToolParam];

    /// Run the tool. The output text is appended to the conversation.
    async fn invoke(&self, args: Vec<ToolValue>, ctx: &ToolContext) -> std::result::Result<String, ToolError>;
}

/// A registry of available tools, ordered by name.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// All tools, in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.values()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
