//! Error types for the Minerva domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; none of them is fatal to the
//! process. The session engine decides which ones become model-visible
//! history and which ones become a fixed reply to the user.

use thiserror::Error;

/// The top-level error type for all Minerva operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model call errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Delivery errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Tool protocol errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Model reply errors ---
    #[error("Response parse error: {0}")]
    ResponseParse(#[from] ResponseParseError),

    // --- Text segmentation errors ---
    #[error("Split error: {0}")]
    Split(#[from] SplitError),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failure of the completion endpoint (network, quota, malformed payload).
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider returned an empty completion")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),

    #[error("{channel} does not support {operation}")]
    NotSupported { channel: String, operation: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Errors raised while resolving or running a tool call.
///
/// The display text is what the model sees in its history, so it is phrased
/// for the model rather than for an operator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("Invalid tool call syntax: {0}")]
    Syntax(String),

    #[error("Tool {0} not found.")]
    NotFound(String),

    #[error(
        "The number of arguments does not match the tool's signature: {tool_name} takes {expected}, got {got}."
    )]
    Arity {
        tool_name: String,
        expected: usize,
        got: usize,
    },

    #[error("Argument '{param}' of {tool_name} must be {expected}, got {value:?}: {reason}")]
    ArgType {
        tool_name: String,
        param: String,
        expected: String,
        value: String,
        reason: String,
    },

    #[error("{tool_name} failed: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

/// The model reply did not follow the action-header protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseParseError {
    #[error("Action is missing, the message must start with \"Action:\"")]
    MissingAction,

    #[error("'{0}' action is not supported, must be one of: tool, respond")]
    UnsupportedAction(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("max chunk size must be greater than {min}, got {got}")]
    ChunkTooSmall { min: usize, got: usize },
}
