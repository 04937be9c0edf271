//! Chat platform event and response payloads.
//!
//! Only the fields used for routing and prompt construction are modeled;
//! anything else in the event is ignored.

use serde::{Deserialize, Serialize};

use crate::util::random_key::{random_key, RANDOM_KEY_LEN};

pub const EVENT_ADDED_TO_SPACE: &str = "ADDED_TO_SPACE";
pub const EVENT_MESSAGE: &str = "MESSAGE";

pub const SPACE_TYPE_DM: &str = "DM";

/// Inbound webhook event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    #[serde(default, rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
    #[serde(default)]
    pub text: String,
    /// Message text with the bot mention stripped; usually has a leading space.
    #[serde(default)]
    pub argument_text: String,
    #[serde(default)]
    pub sender: Option<Sender>,
    #[serde(default)]
    pub space: Option<Space>,
    #[serde(default)]
    pub thread: Option<Thread>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Space {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub space_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thread {
    #[serde(default)]
    pub name: String,
}

/// Synchronous reply body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
}

impl ChatResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl ChatEvent {
    /// Key under which this conversation's history is stored.
    ///
    /// - direct messages: the space name (one conversation per DM channel)
    /// - threads: the thread name
    /// - otherwise: a fresh random key, so the turn is answered without memory
    pub fn interaction_key(&self) -> String {
        let Some(message) = &self.message else {
            return random_key(RANDOM_KEY_LEN);
        };

        if let Some(space) = &message.space {
            if space.space_type == SPACE_TYPE_DM && !space.name.is_empty() {
                return space.name.clone();
            }
        }

        match &message.thread {
            Some(thread) if !thread.name.is_empty() => thread.name.clone(),
            _ => random_key(RANDOM_KEY_LEN),
        }
    }

    /// User prompt for the completion call: the trimmed message text,
    /// prefixed with the sender's display name when known.
    pub fn prompt(&self) -> String {
        let Some(message) = &self.message else {
            return String::new();
        };

        let text = match message.argument_text.trim() {
            "" => message.text.trim(),
            arg => arg,
        };

        match message.sender.as_ref().map(|s| s.display_name.trim()) {
            Some(name) if !name.is_empty() => format!("{name}: {text}"),
            _ => text.to_string(),
        }
    }
}
