//! TTL-bounded conversation history store.
//!
//! The only state this otherwise stateless service keeps. Entries live in a
//! sharded `DashMap`, so readers and writers of different interaction keys
//! never wait on each other. Expired entries are dropped lazily on read and
//! by a periodic sweep for keys that are never read again.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::completion::Message;
use crate::util::PeriodicTask;

/// Stored history of one conversation.
#[derive(Debug, Clone)]
struct ConversationEntry {
    messages: Vec<Message>,
    expires_at: Instant,
}

impl ConversationEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Concurrent map from interaction key to recent messages.
///
/// Cloning is cheap; all clones share the same entries.
#[derive(Clone)]
pub struct ConversationStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    entries: DashMap<String, ConversationEntry>,
    ttl: Duration,
}

impl ConversationStore {
    /// Create an empty store whose entries expire `ttl` after their last write.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: DashMap::new(),
                ttl,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Messages stored under `key`, if present and not expired.
    pub fn get(&self, key: &str) -> Option<Vec<Message>> {
        let now = Instant::now();

        {
            let entry = self.inner.entries.get(key)?;
            if !entry.is_expired(now) {
                return Some(entry.messages.clone());
            }
        }

        if self.remove_expired(key, now) {
            debug!(interaction_key = %key, "conversation_expired_on_read");
        }

        None
    }

    /// Remove `key` if it is still expired as of `now`.
    ///
    /// Checked again under the shard lock: a concurrent `set` may have
    /// refreshed the entry since it was read.
    fn remove_expired(&self, key: &str, now: Instant) -> bool {
        self.inner
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
    }

    /// Store `messages` under `key`, replacing any previous entry.
    pub fn set(&self, key: &str, messages: Vec<Message>) {
        let entry = ConversationEntry {
            messages,
            expires_at: Instant::now() + self.inner.ttl,
        };
        self.inner.entries.insert(key.to_string(), entry);
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.inner.entries.retain(|_, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });

        info!(
            removed = removed,
            remaining = self.inner.entries.len(),
            "conversation_sweep_complete"
        );

        removed
    }

    /// Run [`sweep`](Self::sweep) every `interval` until the returned task is stopped.
    pub fn spawn_sweeper(&self, interval: Duration) -> PeriodicTask {
        let store = self.clone();
        PeriodicTask::spawn("conversation_sweeper", interval, move || {
            let store = store.clone();
            async move {
                store.sweep();
            }
        })
    }

    /// Number of entries held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}
