// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Provider implementations for the conversation proxy.
//!
//! This module provides implementations of the [`ChatProvider`] trait for
//! the supported backends:
//!
//! - [`anthropic::AnthropicProvider`] - Claude models via the Messages API
//! - [`openai::OpenAiProvider`] - OpenAI, Ollama, and OpenAI-compatible APIs
//!
//! # Quick Start
//!
//! Set an environment variable and go:
//!
//! ```bash
//! # For Anthropic Claude
//! export ANTHROPIC_API_KEY=your-key
//!
//! # For OpenAI
//! export OPENAI_API_KEY=your-key
//!
//! # For Ollama (no key needed, just have it running)
//! ```
//!
//! ```rust,ignore
//! use parley::providers::create_provider_from_env;
//!
//! let provider = create_provider_from_env()?;
//! ```

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

use std::sync::Arc;

use crate::error::ProviderError;
use crate::types::SharedProvider;

/// Connection settings shared by all provider constructors.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    /// API key, where the backend requires one.
    pub api_key: Option<String>,
    /// Default model for sessions that never name one.
    pub model: Option<String>,
    /// Override the backend base URL.
    pub base_url: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            model: Some(model.into()),
            ..Default::default()
        }
    }
}

/// Supported provider kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Anthropic Claude models
    Anthropic,
    /// OpenAI GPT models
    OpenAi,
    /// Ollama local models
    Ollama,
}

impl ProviderKind {
    /// Get the default model for this provider.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::OpenAi => "gpt-4o",
            Self::Ollama => "llama3.2",
        }
    }

    /// Get the default base URL for this provider.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }

    /// Check if this provider requires an API key.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::Anthropic | Self::OpenAi)
    }
}

/// Error type for parsing a provider kind from a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseProviderKindError;

impl std::fmt::Display for ParseProviderKindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid provider kind")
    }
}

impl std::error::Error for ParseProviderKindError {}

impl std::str::FromStr for ProviderKind {
    type Err = ParseProviderKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" | "gpt" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ParseProviderKindError),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::OpenAi => write!(f, "openai"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

/// Create a provider instance from kind and configuration.
///
/// # Errors
///
/// Returns [`ProviderError::NotConfigured`] if required configuration is
/// missing (an API key for Anthropic or OpenAI).
pub fn create_provider(
    kind: ProviderKind,
    config: ProviderConfig,
) -> Result<SharedProvider, ProviderError> {
    let model = config
        .model
        .clone()
        .unwrap_or_else(|| kind.default_model().to_string());
    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| kind.default_base_url().to_string());

    match kind {
        ProviderKind::Anthropic => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                ProviderError::NotConfigured("API key required for Anthropic".to_string())
            })?;
            Ok(Arc::new(AnthropicProvider::new(
                api_key, model, base_url, &config,
            )))
        }
        ProviderKind::OpenAi => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                ProviderError::NotConfigured("API key required for OpenAI".to_string())
            })?;
            Ok(Arc::new(OpenAiProvider::new(
                Some(api_key),
                model,
                base_url,
                "openai",
                &config,
            )))
        }
        // Ollama speaks the OpenAI wire dialect and needs no key
        ProviderKind::Ollama => Ok(Arc::new(OpenAiProvider::new(
            None, model, base_url, "ollama", &config,
        ))),
    }
}

/// Create a provider from environment variables with smart defaults.
///
/// # Detection Order
///
/// 1. `PARLEY_PROVIDER` for explicit selection (`anthropic`, `openai`, `ollama`)
/// 2. `ANTHROPIC_API_KEY` set - use Anthropic
/// 3. `OPENAI_API_KEY` set - use OpenAI
/// 4. Otherwise Ollama at localhost:11434
///
/// `PARLEY_MODEL` overrides the default model; `ANTHROPIC_BASE_URL`,
/// `OPENAI_BASE_URL`, and `OLLAMA_BASE_URL` override the base URLs.
pub fn create_provider_from_env() -> Result<SharedProvider, ProviderError> {
    let kind = std::env::var("PARLEY_PROVIDER")
        .ok()
        .and_then(|p| p.parse().ok());

    let kind = kind.unwrap_or_else(|| {
        if std::env::var("ANTHROPIC_API_KEY").is_ok() {
            ProviderKind::Anthropic
        } else if std::env::var("OPENAI_API_KEY").is_ok() {
            ProviderKind::OpenAi
        } else {
            // Local-first fallback, works if Ollama is running
            ProviderKind::Ollama
        }
    });

    let model = std::env::var("PARLEY_MODEL")
        .unwrap_or_else(|_| kind.default_model().to_string());

    let config = match kind {
        ProviderKind::Anthropic => {
            let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
                ProviderError::NotConfigured(
                    "ANTHROPIC_API_KEY not set. Set it or use PARLEY_PROVIDER=ollama for local models.".to_string(),
                )
            })?;
            ProviderConfig {
                api_key: Some(api_key),
                model: Some(model),
                base_url: std::env::var("ANTHROPIC_BASE_URL").ok(),
                ..Default::default()
            }
        }
        ProviderKind::OpenAi => {
            let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
                ProviderError::NotConfigured(
                    "OPENAI_API_KEY not set. Set it or use PARLEY_PROVIDER=ollama for local models.".to_string(),
                )
            })?;
            ProviderConfig {
                api_key: Some(api_key),
                model: Some(model),
                base_url: std::env::var("OPENAI_BASE_URL").ok(),
                ..Default::default()
            }
        }
        ProviderKind::Ollama => ProviderConfig {
            api_key: None,
            model: Some(model),
            base_url: std::env::var("OLLAMA_BASE_URL").ok(),
            ..Default::default()
        },
    };

    create_provider(kind, config)
}
