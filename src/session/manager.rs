// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session manager: orchestrates a single continue-conversation turn.
//!
//! The manager receives its store and provider at construction time and
//! never reaches for globals. Persistence happens only after a complete,
//! successful provider round trip, so a failed or cancelled turn leaves the
//! stored session exactly as it was.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::store::SessionStore;
use super::trim::{trim_history, TokenCounter, TrimWarning};
use super::types::{SessionInfo, SessionRecord};
use crate::error::{ProviderError, SessionError};
use crate::message;
use crate::types::{
    ChatMessage, GeneratedResponse, MessageContent, SharedProvider, TurnOverrides,
};

/// Binds a provider to a resolved model so the trimmer can count tokens.
struct BoundCounter<'a> {
    provider: &'a dyn crate::types::ChatProvider,
    model: &'a str,
}

#[async_trait]
impl TokenCounter for BoundCounter<'_> {
    async fn count(&self, messages: &[ChatMessage]) -> Result<u32, ProviderError> {
        self.provider.count_tokens(self.model, messages).await
    }
}

/// Orchestrates conversation turns against one provider and one store.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    provider: SharedProvider,
    default_model: Option<String>,
}

impl SessionManager {
    /// Create a manager over the given store and provider.
    pub fn new(store: Arc<dyn SessionStore>, provider: SharedProvider) -> Self {
        Self {
            store,
            provider,
            default_model: None,
        }
    }

    /// Set the model used for sessions that never name one.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Continue (or start) the conversation for `session_id`.
    ///
    /// Appends the user message, trims to the provider budget, calls the
    /// provider, appends the reply, and persists - in that order. Not
    /// idempotent: every successful call appends one turn. Any failure
    /// before persistence leaves the stored session untouched.
    pub async fn continue_conversation(
        &self,
        session_id: &str,
        text: &str,
        overrides: TurnOverrides,
    ) -> Result<GeneratedResponse, SessionError> {
        // Reject bad input before taking the session lock or touching state.
        let user_message = message::normalize("user", MessageContent::Text(text.to_string()))?;

        let _guard = self.store.lock(session_id).await;

        let mut record = match self.store.get(session_id).await? {
            Some(existing) => existing,
            None => {
                let model = overrides
                    .model
                    .clone()
                    .or_else(|| self.default_model.clone())
                    .unwrap_or_else(|| self.provider.default_model().to_string());
                debug!(session_id, model, "creating session");
                SessionRecord::new(session_id, self.provider.name(), model)
            }
        };

        // Effective model: explicit override wins and becomes sticky;
        // history already sent is not rewritten.
        if let Some(model) = &overrides.model {
            record.model = model.clone();
        }
        let model = record.model.clone();

        let budget = self.provider.token_budget(&model);
        let counter = BoundCounter {
            provider: self.provider.as_ref(),
            model: &model,
        };
        let outcome = trim_history(record.history.clone(), user_message, budget, &counter).await;
        match &outcome.warning {
            Some(TrimWarning::BudgetExceeded { tokens, budget }) => {
                warn!(session_id, tokens, budget, "message exceeds token budget, sending anyway");
            }
            Some(TrimWarning::CountFailed(err)) => {
                warn!(session_id, error = %err, "trimming degraded, sending untrimmed suffix");
            }
            None => {}
        }
        if outcome.dropped > 0 {
            debug!(session_id, dropped = outcome.dropped, "trimmed history to budget");
        }

        let params = overrides.resolve();
        let response = self
            .provider
            .send(&model, &outcome.messages, &params)
            .await?;

        let reply = message::normalize("assistant", MessageContent::Text(response.text.clone()))
            .map_err(|_| {
            SessionError::Provider(ProviderError::Parse(
                "provider returned empty text".to_string(),
            ))
        })?;

        // Persist only now, after the full round trip succeeded.
        record.history = outcome.messages;
        record.history.push(reply);
        record.touch();
        self.store.put(record).await?;

        Ok(response)
    }

    /// Delete the session for `id`. Returns whether it existed.
    pub async fn delete_session(&self, id: &str) -> Result<bool, SessionError> {
        let _guard = self.store.lock(id).await;
        Ok(self.store.delete(id).await?)
    }

    /// List all sessions, most recently updated first.
    pub async fn list_sessions(&self) -> Result<Vec<SessionInfo>, SessionError> {
        let mut infos: Vec<SessionInfo> = self
            .store
            .list_all()
            .await?
            .iter()
            .map(SessionRecord::info)
            .collect();
        infos.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(infos)
    }
}
