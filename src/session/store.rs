// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session persistence backend.
//!
//! [`SessionStore`] is the single source of truth for session existence:
//! no other component may cache existence or construct canonical records on
//! its own. `put` is a full replace; read-modify-write is the caller's job.
//! The trait also exposes a per-key lock so callers can guarantee at most
//! one in-flight turn per session without rolling their own serialization.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::types::{SessionId, SessionRecord};
use crate::error::StoreError;

/// Keyed store of session records.
///
/// The in-memory implementation never fails; the error channel exists for
/// durable backends, which must treat every operation as fallible.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the record for `id`, if any.
    async fn get(&self, id: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// Store `record` under its id, replacing any previous record entirely.
    async fn put(&self, record: SessionRecord) -> Result<(), StoreError>;

    /// Delete the record for `id`. Returns whether a record existed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// List every stored record. Used by the sweeper and introspection.
    async fn list_all(&self) -> Result<Vec<SessionRecord>, StoreError>;

    /// Acquire the per-session mutex for `id`.
    ///
    /// Hold the guard across a full load-trim-send-persist cycle to enforce
    /// the at-most-one-in-flight-turn-per-session invariant.
    async fn lock(&self, id: &str) -> OwnedMutexGuard<()>;
}

/// Shared store handle.
pub type SharedStore = Arc<dyn SessionStore>;

/// In-memory reference implementation of [`SessionStore`].
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<SessionId, SessionRecord>>,
    locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the store holds no sessions.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn put(&self, record: SessionRecord) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(record.id.clone(), record);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let existed = self.sessions.write().await.remove(id).is_some();

        // Drop the lock entry too. The map itself holds one reference and
        // the deleting turn holds at most one more through its guard, so
        // anything above two means another turn is queued on this key and
        // the entry must stay for it.
        let mut locks = self.locks.lock().await;
        if let Some(entry) = locks.get(id) {
            if Arc::strong_count(entry) <= 2 {
                locks.remove(id);
            }
        }

        Ok(existed)
    }

    async fn list_all(&self) -> Result<Vec<SessionRecord>, StoreError> {
        Ok(self.sessions.read().await.values().cloned().collect())
    }

    async fn lock(&self, id: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        entry.lock_owned().await
    }
}
