//! Session registry: hashed session id -> conversation buffer.
//!
//! The caller-supplied session token is never stored; only its sha256
//! digest keys the table, so the original token cannot be recovered
//! from process memory dumps or debug output.

use std::collections::HashMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock};

use crate::buffer::ConversationBuffer;
use crate::error::CoreError;

/// Default hard bound on live sessions.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// A buffer shared across concurrent requests for one session. The
/// mutex serializes turns that race on the same session id.
pub type SharedBuffer = Arc<Mutex<ConversationBuffer>>;

/// One-way hash of a caller-supplied session token.
pub fn hash_session_id(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SharedBuffer>>,
    capacity: usize,
    max_turns: usize,
    max_tokens: usize,
}

impl SessionRegistry {
    pub fn new(capacity: usize, max_turns: usize, max_tokens: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            capacity,
            max_turns,
            max_tokens,
        }
    }

    /// Look up the buffer for a session, creating one for unseen ids.
    ///
    /// Fails with `CoreError::RegistryFull` instead of evicting when the
    /// capacity bound would be exceeded.
    pub async fn get_or_create(&self, raw_id: &str) -> Result<SharedBuffer, CoreError> {
        let key = hash_session_id(raw_id);

        {
            let sessions = self.sessions.read().await;
            if let Some(buffer) = sessions.get(&key) {
                return Ok(Arc::clone(buffer));
            }
        }

        let mut sessions = self.sessions.write().await;
        // Re-check under the write lock; another request may have won.
        if let Some(buffer) = sessions.get(&key) {
            return Ok(Arc::clone(buffer));
        }
        if sessions.len() >= self.capacity {
            log::warn!("Session registry full ({} entries)", sessions.len());
            return Err(CoreError::RegistryFull(self.capacity));
        }

        let buffer = Arc::new(Mutex::new(ConversationBuffer::new(
            self.max_turns,
            self.max_tokens,
        )));
        sessions.insert(key, Arc::clone(&buffer));
        log::debug!("Created session, {} live", sessions.len());
        Ok(buffer)
    }

    /// Remove a session if present. Absent keys are not an error.
    pub async fn clear(&self, raw_id: &str) -> bool {
        let key = hash_session_id(raw_id);
        self.sessions.write().await.remove(&key).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
