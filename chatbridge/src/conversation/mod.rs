//! Conversation memory for a stateless webhook handler.
//!
//! - [`ConversationStore`]: TTL-bounded history per interaction key
//! - [`Responder`]: one turn of history + completion call + persistence

pub mod responder;
pub mod store;

pub use responder::{trim_history, RespondError, Responder};
pub use store::ConversationStore;
