//! Chat channel implementations for Minerva.
//!
//! Each channel connects to a chat platform and relays turns to and from the
//! session registry. Channels are trait-based and platform-agnostic.
//!
//! Available channels:
//! - **CLI**: Interactive terminal chat (stdin/stdout)

pub mod cli;

pub use cli::{CliChannel, CliSettings};
