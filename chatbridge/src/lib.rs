//! Chatbridge - chat webhook front-end with short-lived conversation memory.
//!
//! The service answers chat platform webhooks synchronously. It keeps no
//! database: inbound tokens are checked against a cached JWK set, and recent
//! replies are remembered per conversation in an expiring in-memory store.
//!
//! ## Architecture
//!
//! ```text
//! Webhook → TokenVerifier (KeySetCache) → Responder → CompletionClient
//!                                             ↕
//!                                     ConversationStore
//! ```

pub mod auth;
pub mod completion;
pub mod config;
pub mod conversation;
pub mod util;
pub mod web;

// Re-export commonly used types
pub use auth::{AuthError, KeySetCache, TokenVerifier};
pub use completion::{CompletionClient, Message, Role};
pub use config::Config;
pub use conversation::{ConversationStore, RespondError, Responder};
pub use web::{router, AppState};
