//! Web server module for the chat webhook.
//!
//! Routes:
//! - `POST /`: chat platform webhook (bearer-token authenticated)
//! - `GET /health`: liveness check

pub mod event;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use event::{ChatEvent, ChatResponse};
pub use handlers::{chat_webhook, health, AppState, HealthResponse, FALLBACK_TEXT, WELCOME_TEXT};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(chat_webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
