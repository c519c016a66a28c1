// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session types for conversation state management.

use serde::{Deserialize, Serialize};

use crate::types::ChatMessage;

/// Session identifier. Caller-supplied, exact-match store key.
pub type SessionId = String;

/// The unit of conversational state: one session's durable record.
///
/// Only the provider-neutral history is stored; no live provider handles.
/// A fresh provider call is issued per turn from this history, which keeps
/// the record trivially serializable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Unique session identifier, acts as the store key.
    pub id: SessionId,
    /// Provider this session is bound to.
    pub provider: String,
    /// Sticky model: bound at creation, reused unless explicitly overridden.
    pub model: String,
    /// Ordered conversation history (user/assistant appended in pairs).
    pub history: Vec<ChatMessage>,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: i64,
    /// Last update timestamp; refreshed on every read-modify-write cycle.
    /// Used solely by the eviction sweeper.
    pub updated_at: i64,
}

impl SessionRecord {
    /// Create a new empty session record.
    pub fn new(
        id: impl Into<SessionId>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: id.into(),
            provider: provider.into(),
            model: model.into(),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Refresh the record's updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp();
    }

    /// Seconds since the record was last updated.
    pub fn idle_secs(&self, now: i64) -> i64 {
        now - self.updated_at
    }

    /// Listing projection for this record.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            model: self.model.clone(),
            message_count: self.history.len(),
            updated_at: self.updated_at,
        }
    }
}

/// Session metadata for listing (without the full message history).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Session ID.
    pub id: SessionId,
    /// Sticky model name.
    pub model: String,
    /// Number of messages in the history.
    pub message_count: usize,
    /// Last update timestamp.
    pub updated_at: i64,
}

impl SessionInfo {
    /// Format the session info for display.
    pub fn format(&self) -> String {
        let date = chrono::DateTime::from_timestamp(self.updated_at, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown".to_string());

        format!(
            "{} ({} msgs, {}) - {}",
            self.id, self.message_count, self.model, date
        )
    }
}

/// Configuration for session housekeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle threshold after which a session is evicted, in seconds.
    pub idle_timeout_secs: u64,
    /// How often the eviction sweeper runs, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 60 * 60,
            sweep_interval_secs: 30 * 60,
        }
    }
}
