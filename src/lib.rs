// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Parley - session-aware conversation proxy for LLM providers.
//!
//! Parley sits between clients and LLM backends, keeping multi-turn
//! conversation state server-side. Clients send one message at a time
//! against a session id; Parley maintains the durable history, trims it
//! to the model's token budget, forwards the turn to the provider, and
//! evicts sessions that go idle.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`types`] - Core type definitions (ChatMessage, GenerationParams, ChatProvider, etc.)
//! - [`error`] - Error types and result aliases
//! - [`message`] - Message normalization and wire-shape conversion
//! - [`session`] - Session records, store, trimmer, manager, and sweeper
//! - [`providers`] - Provider implementations (Anthropic, OpenAI, Ollama)
//! - [`config`] - Configuration loading and merging
//! - [`telemetry`] - Tracing initialization
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use parley::providers::create_provider_from_env;
//! use parley::session::{MemoryStore, SessionManager};
//! use parley::types::TurnOverrides;
//!
//! let provider = create_provider_from_env()?;
//! let manager = SessionManager::new(Arc::new(MemoryStore::new()), provider);
//!
//! let reply = manager
//!     .continue_conversation("alice", "Hello!", TurnOverrides::default())
//!     .await?;
//! println!("{}", reply.text);
//! ```

pub mod config;
pub mod error;
pub mod message;
pub mod providers;
pub mod session;
pub mod telemetry;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ConfigError, ProviderError, Result, SessionError, StoreError};
pub use providers::{
    create_provider, create_provider_from_env, AnthropicProvider, OpenAiProvider, ProviderConfig,
    ProviderKind,
};
pub use session::{
    EvictionSweeper, MemoryStore, SessionConfig, SessionId, SessionInfo, SessionManager,
    SessionRecord, SessionStore,
};
pub use types::{
    BoxedProvider, ChatMessage, ChatProvider, ContentPart, FinishReason, GeneratedResponse,
    GenerationParams, MessageContent, Role, SharedProvider, TokenUsage, TurnOverrides,
};

/// Parley version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
