//! In-memory conversation store.

use super::conversation::Conversation;
use crate::events::ConversationId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Shared handle to one conversation record.
pub type SessionHandle = Arc<Mutex<Conversation>>;

/// Holds one record per active conversation.
///
/// The map sits behind one coarse lock that is only taken for lookups,
/// inserts and removals. Each record has its own mutex; callers hold it for
/// the whole handling of an event so transitions of one conversation never
/// interleave.
///
/// Nothing is persisted; records live as long as the process.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<ConversationId, SessionHandle>>,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the record for `id`, inserting a fresh one if absent.
    pub async fn get_or_create(&self, id: ConversationId) -> SessionHandle {
        if let Some(handle) = self.sessions.read().await.get(&id) {
            return Arc::clone(handle);
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(id).or_insert_with(|| {
            debug!(conversation_id = id, "created new session");
            Arc::new(Mutex::new(Conversation::new(id)))
        }))
    }

    /// Remove the record for `id`; a no-op if absent.
    ///
    /// `record` is the already-locked record when the caller holds one. The
    /// removed record is marked retired so tasks still waiting on its mutex
    /// know to look it up again.
    pub async fn delete(&self, id: ConversationId, record: Option<&mut Conversation>) {
        let removed = self.sessions.write().await.remove(&id);

        match (record, removed) {
            (Some(record), _) => record.retire(),
            (None, Some(handle)) => handle.lock().await.retire(),
            (None, None) => {}
        }
        debug!(conversation_id = id, "session deleted");
    }

    /// Whether a record exists for `id`.
    pub async fn contains(&self, id: ConversationId) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    /// Number of live records.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Snapshot of the record for `id`, without creating one.
    pub async fn snapshot(&self, id: ConversationId) -> Option<Conversation> {
        let handle = self.sessions.read().await.get(&id).map(Arc::clone)?;
        let record = handle.lock().await.clone();
        Some(record)
    }
}
