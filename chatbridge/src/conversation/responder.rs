//! Conversation responder.
//!
//! Turns one inbound prompt plus stored history into a reply:
//!
//! 1. Load prior messages for the interaction key
//! 2. Send `[system] + history + user` to the completion API (no retry)
//! 3. Keep the returned reply messages as the next history, oldest dropped first
//! 4. Return the first reply's text

use thiserror::Error;
use tracing::{info, warn};

use super::store::ConversationStore;
use crate::completion::{ChatCompletionRequest, CompletionClient, CompletionError, Message};

/// Failure to produce a reply.
#[derive(Debug, Error)]
pub enum RespondError {
    #[error("upstream completion call failed: {0}")]
    Upstream(#[from] CompletionError),

    #[error("completion returned no choices")]
    NoChoices,
}

/// Drop messages from the front until at most `max` remain.
pub fn trim_history(messages: &mut Vec<Message>, max: usize) {
    if messages.len() > max {
        let excess = messages.len() - max;
        messages.drain(..excess);
    }
}

/// Orchestrates history, completion call and persistence for one turn.
#[derive(Clone)]
pub struct Responder {
    client: CompletionClient,
    store: ConversationStore,
    model: String,
    max_history: usize,
}

impl Responder {
    pub fn new(
        client: CompletionClient,
        store: ConversationStore,
        model: impl Into<String>,
        max_history: usize,
    ) -> Self {
        Self {
            client,
            store,
            model: model.into(),
            max_history,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Answer `user_prompt` in the conversation identified by `interaction_key`.
    ///
    /// `system_prompt` is sent first when non-empty. Only a successful reply
    /// with at least one choice updates the stored history.
    pub async fn respond(
        &self,
        interaction_key: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, RespondError> {
        let history = self.store.get(interaction_key).unwrap_or_default();
        let history_len = history.len();

        let mut messages = Vec::with_capacity(history_len + 2);
        if !system_prompt.is_empty() {
            messages.push(Message::system(system_prompt));
        }
        messages.extend(history);
        messages.push(Message::user(user_prompt));

        info!(
            interaction_key = %interaction_key,
            history_length = history_len,
            message_count = messages.len(),
            "responder_prompt_built"
        );

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
        };

        let mut replies = self.client.chat_completion(&request).await?.into_messages();

        let Some(first) = replies.first() else {
            warn!(interaction_key = %interaction_key, "responder_no_choices");
            return Err(RespondError::NoChoices);
        };
        let reply = first.content.clone();

        let received = replies.len();
        trim_history(&mut replies, self.max_history);
        let stored = replies.len();
        self.store.set(interaction_key, replies);

        info!(
            interaction_key = %interaction_key,
            replies_received = received,
            history_stored = stored,
            reply_length = reply.len(),
            "responder_reply_stored"
        );

        Ok(reply)
    }
}
