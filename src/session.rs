//! Session memory
//!
//! Each conversation owns a single-slot memory holding its previous
//! (question, answer) pair. Sessions are explicit: created by the caller,
//! keyed by id, and discarded when the caller ends them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// The one remembered exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub query: String,
    pub result: String,
    pub updated_at: DateTime<Utc>,
}

/// Single-slot memory, overwritten on every update
#[derive(Debug, Clone, Default)]
pub struct SessionMemory {
    last: Option<MemoryEntry>,
}

impl SessionMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_context(&self) -> Option<&MemoryEntry> {
        self.last.as_ref()
    }

    pub fn update_context(&mut self, user_text: &str, result: &str) {
        self.last = Some(MemoryEntry {
            query: user_text.to_string(),
            result: result.to_string(),
            updated_at: Utc::now(),
        });
    }
}

#[derive(Debug, Error)]
#[error("Unknown session {0}")]
pub struct UnknownSession(pub Uuid);

/// Session id → memory, safe to share across concurrent requests
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SessionMemory>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session with empty memory
    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.write().await.insert(id, SessionMemory::new());
        tracing::debug!("Created session {}", id);
        id
    }

    /// Discard a session; returns whether it existed
    pub async fn end(&self, id: Uuid) -> bool {
        let existed = self.sessions.write().await.remove(&id).is_some();
        tracing::debug!("Ended session {} (existed: {})", id, existed);
        existed
    }

    pub async fn exists(&self, id: Uuid) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    pub async fn get_context(&self, id: Uuid) -> Result<Option<MemoryEntry>, UnknownSession> {
        self.sessions
            .read()
            .await
            .get(&id)
            .map(|memory| memory.get_context().cloned())
            .ok_or(UnknownSession(id))
    }

    pub async fn update_context(
        &self,
        id: Uuid,
        user_text: &str,
        result: &str,
    ) -> Result<(), UnknownSession> {
        let mut sessions = self.sessions.write().await;
        let memory = sessions.get_mut(&id).ok_or(UnknownSession(id))?;
        memory.update_context(user_text, result);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
