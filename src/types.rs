// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Core types for the Parley conversation proxy.
//!
//! This module defines the fundamental data structures used throughout the
//! crate: the provider-neutral message representation, generation parameters,
//! provider responses, and the [`ChatProvider`] trait every backend
//! implements.

use serde::{Deserialize, Serialize};

// ============================================================================
// Message Types
// ============================================================================

/// Role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Parse a role string from an external source.
    ///
    /// Unrecognized roles are coerced to [`Role::System`] with a recorded
    /// warning rather than rejected; downstream code only ever sees the
    /// three known variants.
    pub fn parse_lossy(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "user" => Self::User,
            "assistant" | "model" => Self::Assistant,
            "system" => Self::System,
            other => {
                tracing::warn!(role = %other, "unrecognized message role, coercing to system");
                Self::System
            }
        }
    }

    /// Wire name for this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One part of a message's content.
///
/// Parts are tagged at ingestion and never re-inferred downstream: a part is
/// either plain text or an opaque structured payload (base64 data plus a
/// media type) that only some providers can carry natively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Data { media_type: String, data: String },
}

impl ContentPart {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create an opaque data part.
    pub fn data(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Data {
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    /// Whether this part is bare text.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }

    /// Whether this part carries no usable content.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text { text } => text.trim().is_empty(),
            Self::Data { data, .. } => data.is_empty(),
        }
    }
}

/// Message content - either a simple flat string or ordered content parts.
///
/// The two cases correspond to the "simple" and "rich" message shapes. The
/// variant is decided once when a message is normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent::Text(s)
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent::Text(s.to_string())
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(parts: Vec<ContentPart>) -> Self {
        MessageContent::Parts(parts)
    }
}

/// A single conversational turn in provider-neutral form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
    /// Creation time (Unix epoch seconds), stamped when the message is
    /// appended to a history; never caller-supplied.
    pub created_at: i64,
}

impl ChatMessage {
    /// Create a message with the given role and content, stamped now.
    pub fn new(role: Role, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Create a user message with flat text content.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, MessageContent::Text(content.into()))
    }

    /// Create an assistant message with flat text content.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, MessageContent::Text(content.into()))
    }

    /// Create a system message with flat text content.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, MessageContent::Text(content.into()))
    }

    /// Create a message with content parts.
    pub fn with_parts(role: Role, parts: Vec<ContentPart>) -> Self {
        Self::new(role, MessageContent::Parts(parts))
    }

    /// Get text content if this message has the simple shape.
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(s) => Some(s),
            MessageContent::Parts(_) => None,
        }
    }

    /// Get content parts if this message has the rich shape.
    pub fn as_parts(&self) -> Option<&[ContentPart]> {
        match &self.content {
            MessageContent::Text(_) => None,
            MessageContent::Parts(parts) => Some(parts),
        }
    }
}

// ============================================================================
// Generation Parameters
// ============================================================================

/// Default sampling temperature when the caller leaves it unspecified.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Default nucleus-sampling cutoff.
pub const DEFAULT_TOP_P: f32 = 0.95;
/// Default generation cap in tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 800;

/// Fully resolved generation parameters for one provider call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Per-call overrides accepted by `continue_conversation`.
///
/// A `model` override applies to this call and becomes the session's sticky
/// model going forward; it does not retroactively change history already sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl TurnOverrides {
    /// Resolve these overrides against the defaults.
    pub fn resolve(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            top_p: self.top_p.unwrap_or(DEFAULT_TOP_P),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        }
    }
}

// ============================================================================
// Token Usage & Provider Response
// ============================================================================

/// Token usage information from a provider response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the input/prompt
    pub input_tokens: u32,
    /// Number of tokens in the output/completion
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Get total tokens (input + output).
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Reason why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model reached a natural stopping point.
    Stop,
    /// Generation hit the max-token cap.
    MaxTokens,
    /// Anything else the provider reported.
    Other,
}

/// One generated reply plus its usage metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedResponse {
    /// Generated text content.
    pub text: String,
    /// Token usage, when the provider reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Why generation stopped.
    pub finish_reason: FinishReason,
}

impl GeneratedResponse {
    /// Create a plain text response.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
            finish_reason: FinishReason::Stop,
        }
    }
}

// ============================================================================
// Provider Trait
// ============================================================================

use crate::error::ProviderError;
use async_trait::async_trait;

/// Trait every downstream chat backend implements.
///
/// The downstream API is stateless: every call carries the full (trimmed)
/// message list, and the model is passed per call rather than bound at
/// construction, so one client instance serves every session routed to its
/// provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Count the tokens a candidate message list would occupy for `model`.
    ///
    /// May be a network round trip; implementations without a counting
    /// endpoint estimate locally.
    async fn count_tokens(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<u32, ProviderError>;

    /// Send a message list and return the generated reply.
    async fn send(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<GeneratedResponse, ProviderError>;

    /// Provider name for display and session records.
    fn name(&self) -> &str;

    /// Model used when neither the session nor the caller names one.
    fn default_model(&self) -> &str;

    /// Context budget in tokens for the given model.
    fn token_budget(&self, model: &str) -> u32 {
        let _ = model;
        128_000
    }
}

/// A boxed provider for dynamic dispatch.
pub type BoxedProvider = Box<dyn ChatProvider>;

/// Arc-wrapped provider for shared ownership.
pub type SharedProvider = std::sync::Arc<dyn ChatProvider>;
