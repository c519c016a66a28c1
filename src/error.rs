// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the Parley conversation proxy.
//!
//! This module provides strongly-typed errors for different parts of the
//! crate, using `thiserror` for ergonomic error definitions and `anyhow`
//! for error propagation in the binary.

use thiserror::Error;

/// Errors that can occur during provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("API error: {message}")]
    Api {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Response parsing error: {0}")]
    Parse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl ProviderError {
    /// Create an API error with status code.
    pub fn api(message: impl Into<String>, status_code: u16) -> Self {
        Self::Api {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Check if this error is retryable at a higher layer.
    ///
    /// Retries are never attempted inside this crate; callers may use this
    /// classification to decide for themselves.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Unavailable(_) | Self::Timeout(_)
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(0)
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}

/// Errors that can occur in the persistence backend.
///
/// The in-memory reference store never raises this; the variant exists for
/// durable implementations of the store trait.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur during session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config format: {0}")]
    InvalidFormat(String),

    #[error("IO error reading config: {0}")]
    Io(String),

    #[error("JSON parsing error: {0}")]
    Json(String),

    #[error("YAML parsing error: {0}")]
    Yaml(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::Io(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml(err.to_string())
    }
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;
