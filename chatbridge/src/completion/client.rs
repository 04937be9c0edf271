//! Async client for the chat completion API.
//!
//! The client is cheap to clone and shares one `reqwest::Client` (and so one
//! bounded connection pool) across all request tasks.

use std::sync::Arc;

use reqwest::{header, Client, StatusCode};
use thiserror::Error;
use tracing::{info, warn};

use super::types::{ChatCompletionRequest, ChatCompletionResponse, CHAT_COMPLETION_PATH};

/// Failure of a single completion call. Calls are never retried.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Connection failure or timeout.
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Any status other than 200.
    #[error("unexpected status code: {0}")]
    Status(StatusCode),

    /// Body was not a valid completion response.
    #[error("invalid completion response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Chat completion client.
#[derive(Clone)]
pub struct CompletionClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl CompletionClient {
    /// Create a client for the API rooted at `root_url` (e.g. `https://api.openai.com/v1`).
    ///
    /// Timeouts and pool limits come from the supplied `http` client.
    pub fn new(http: Client, root_url: &str, api_key: impl Into<String>) -> Self {
        let endpoint = format!("{}{}", root_url.trim_end_matches('/'), CHAT_COMPLETION_PATH);

        Self {
            inner: Arc::new(ClientInner {
                http,
                endpoint,
                api_key: api_key.into(),
            }),
        }
    }

    /// Full URL of the completion endpoint.
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Issue one completion call.
    pub async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, CompletionError> {
        info!(
            model = %request.model,
            message_count = request.messages.len(),
            "completion_request_starting"
        );

        let resp = self
            .inner
            .http
            .post(&self.inner.endpoint)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.inner.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!(error = %e, "completion_request_timeout");
                } else {
                    warn!(error = %e, "completion_request_error");
                }
                CompletionError::Transport(e)
            })?;

        let status = resp.status();
        if status != StatusCode::OK {
            warn!(status_code = status.as_u16(), "completion_unexpected_status");
            return Err(CompletionError::Status(status));
        }

        let body = resp.bytes().await?;
        let data: ChatCompletionResponse = serde_json::from_slice(&body)?;

        info!(
            status_code = status.as_u16(),
            choice_count = data.choices.len(),
            body_length = body.len(),
            "completion_request_complete"
        );

        Ok(data)
    }
}
