//! Chat completion API module.
//!
//! This module provides:
//! - Wire types for the `/chat/completions` endpoint
//! - An async client sharing one bounded connection pool
//!
//! ## Flow
//!
//! ```text
//! Responder → CompletionClient → POST {root}/chat/completions → choices
//! ```

pub mod client;
pub mod types;

pub use client::{CompletionClient, CompletionError};
pub use types::{
    ChatCompletionRequest, ChatCompletionResponse, Choice, Message, Role, CHAT_COMPLETION_PATH,
};
