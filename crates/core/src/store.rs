use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::info;

use crate::domain::conversation::{Conversation, ConversationId};

/// In-memory registry of active conversations, one entry per customer
/// identity.
///
/// Handlers check out the per-key `Arc` and hold its mutex for the full
/// handling of one inbound message, including the outbound sends, so two
/// handlers for the same customer can never interleave while different
/// customers proceed concurrently. The idle sweep takes the same per-key lock
/// before deleting, so it can never evict a conversation mid-handling.
pub struct ConversationStore {
    inner: Mutex<HashMap<ConversationId, Arc<Mutex<Conversation>>>>,
    transcript_window: usize,
}

impl ConversationStore {
    pub fn new(transcript_window: usize) -> Self {
        Self { inner: Mutex::new(HashMap::new()), transcript_window }
    }

    /// Returns the entry for `id`, creating a fresh conversation at the start
    /// step when none exists. Never holds the outer map lock while a handler
    /// waits on the per-key lock.
    pub async fn checkout(&self, id: &ConversationId) -> Arc<Mutex<Conversation>> {
        let mut map = self.inner.lock().await;
        map.entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Conversation::new(self.transcript_window))))
            .clone()
    }

    pub async fn remove(&self, id: &ConversationId) {
        self.inner.lock().await.remove(id);
    }

    pub async fn contains(&self, id: &ConversationId) -> bool {
        self.inner.lock().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Evicts conversations idle for at least `ttl` and returns how many were
    /// removed.
    ///
    /// Snapshot-then-delete: candidates are collected under the outer lock,
    /// then each per-key lock is taken and the idle check repeated before the
    /// entry is removed, so a conversation that became active between the
    /// snapshot and the delete survives.
    pub async fn sweep_idle(&self, ttl: Duration) -> usize {
        let candidates: Vec<(ConversationId, Arc<Mutex<Conversation>>)> = {
            let map = self.inner.lock().await;
            map.iter().map(|(id, entry)| (id.clone(), entry.clone())).collect()
        };

        let mut evicted = 0;
        for (id, entry) in candidates {
            let conversation = entry.lock().await;
            if !conversation.idle_for(ttl) {
                continue;
            }

            let mut map = self.inner.lock().await;
            let still_same = map.get(&id).is_some_and(|current| Arc::ptr_eq(current, &entry));
            if still_same {
                map.remove(&id);
                evicted += 1;
                info!(
                    event_name = "store.sweep.conversation_evicted",
                    conversation_id = %id,
                    step = conversation.step.as_str(),
                    "evicted idle conversation"
                );
            }
        }
        evicted
    }
}
