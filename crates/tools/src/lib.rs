//! Built-in tool implementations for Minerva.
//!
//! Tools let the assistant act beyond plain replies. Each one declares typed
//! parameters; the session engine parses the model's call text against them.

pub mod send_text_file;

use std::sync::Arc;

use minerva_core::tool::ToolRegistry;

pub use send_text_file::SendTextFileTool;

/// Create a default tool registry with all built-in tools.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SendTextFileTool));
    registry
}
