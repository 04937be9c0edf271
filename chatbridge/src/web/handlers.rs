//! Webhook endpoint handlers.
//!
//! The chat webhook handler:
//! 1. Verifies the bearer token (403 on any failure, reason only logged)
//! 2. Decodes the event (400 on failure)
//! 3. Answers synchronously with `{"text": ...}`
//!
//! Upstream failures are answered with a canned apology and status 200 so the
//! chat platform does not treat them as delivery failures.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::auth::{bearer_token, TokenVerifier};
use crate::conversation::Responder;
use crate::web::event::{ChatEvent, ChatResponse, EVENT_ADDED_TO_SPACE, EVENT_MESSAGE};
use crate::Config;

/// Reply when the bot is added to a space.
pub const WELCOME_TEXT: &str = "Thanks for adding me!";

/// Reply for unsupported events and failed completions.
pub const FALLBACK_TEXT: &str = "Sorry, I didn't understand your message.";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub verifier: TokenVerifier,
    pub responder: Responder,
}

impl AppState {
    pub fn new(config: Config, verifier: TokenVerifier, responder: Responder) -> Self {
        Self {
            config: Arc::new(config),
            verifier,
            responder,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Chat Webhook
// =============================================================================

fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "Forbidden").into_response()
}

fn reply(text: impl Into<String>) -> Response {
    (StatusCode::OK, Json(ChatResponse::new(text))).into_response()
}

/// Chat webhook endpoint.
pub async fn chat_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token);

    let Some(token) = token else {
        warn!(has_header = headers.contains_key(AUTHORIZATION), "webhook_auth_missing");
        return forbidden();
    };

    if let Err(e) = state.verifier.verify(token, &state.config.audience) {
        warn!(reason = %e, "webhook_auth_failed");
        return forbidden();
    }

    let event: ChatEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, body_length = body.len(), "webhook_decode_failed");
            return (StatusCode::BAD_REQUEST, "Invalid event body").into_response();
        }
    };

    info!(event_type = %event.event_type, "webhook_event_received");

    match event.event_type.as_str() {
        EVENT_ADDED_TO_SPACE => return reply(WELCOME_TEXT),
        EVENT_MESSAGE => {}
        other => {
            info!(event_type = %other, "webhook_event_ignored");
            return reply(FALLBACK_TEXT);
        }
    }

    let interaction_key = event.interaction_key();
    let prompt = event.prompt();

    match state
        .responder
        .respond(&interaction_key, &state.config.pre_prompt, &prompt)
        .await
    {
        Ok(text) => {
            info!(interaction_key = %interaction_key, "webhook_replied");
            reply(text)
        }
        Err(e) => {
            error!(interaction_key = %interaction_key, error = %e, "webhook_respond_failed");
            reply(FALLBACK_TEXT)
        }
    }
}
