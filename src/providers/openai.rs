// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! OpenAI-compatible provider implementation.
//!
//! Implements [`ChatProvider`] against the Chat Completions dialect, which
//! also serves Ollama and other compatible backends. History is sent in the
//! flat-text shape, so structured content parts degrade to their textual
//! form. The dialect has no count-tokens endpoint; counting uses a local
//! character-ratio estimate instead.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::ProviderError;
use crate::message::{self, WireMessage, WireShape};
use crate::types::{
    ChatMessage, ChatProvider, FinishReason, GeneratedResponse, GenerationParams, TokenUsage,
};

use super::ProviderConfig;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Rough chars-per-token ratio for local estimation.
///
/// A fair average for English prose across GPT and Llama tokenizers. For
/// exact counting use a backend with a count endpoint.
const TOKENS_PER_CHAR: f64 = 0.25;

/// Fixed per-message overhead for role and framing tokens.
const MESSAGE_OVERHEAD_TOKENS: u32 = 4;

/// OpenAI-compatible provider (OpenAI, Ollama, and friends).
pub struct OpenAiProvider {
    client: Client,
    api_key: Option<String>,
    default_model: String,
    base_url: String,
    provider_name: String,
}

impl OpenAiProvider {
    /// Create a new OpenAI-compatible provider.
    ///
    /// `api_key` is optional; Ollama and some compatible backends take none.
    pub fn new(
        api_key: Option<String>,
        default_model: impl Into<String>,
        base_url: impl Into<String>,
        provider_name: impl Into<String>,
        config: &ProviderConfig,
    ) -> Self {
        let timeout = config
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            default_model: default_model.into(),
            base_url: base_url.into(),
            provider_name: provider_name.into(),
        }
    }

    /// Estimate tokens for one message, local and infallible.
    fn estimate_message_tokens(message: &ChatMessage) -> u32 {
        let text = message::flatten_to_text(message);
        (text.len() as f64 * TOKENS_PER_CHAR) as u32 + MESSAGE_OVERHEAD_TOKENS
    }

    /// Map a non-2xx response body onto the error taxonomy.
    fn handle_error_response(&self, status_code: u16, body: &str) -> ProviderError {
        if let Ok(error) = serde_json::from_str::<ApiError>(body) {
            match status_code {
                401 | 403 => ProviderError::NotConfigured(error.error.message),
                429 => ProviderError::RateLimited(error.error.message),
                404 if error.error.message.contains("model") => {
                    ProviderError::InvalidModel(error.error.message)
                }
                _ => ProviderError::api(error.error.message, status_code),
            }
        } else {
            ProviderError::api(body.to_string(), status_code)
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    async fn count_tokens(
        &self,
        _model: &str,
        messages: &[ChatMessage],
    ) -> Result<u32, ProviderError> {
        Ok(messages.iter().map(Self::estimate_message_tokens).sum())
    }

    async fn send(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<GeneratedResponse, ProviderError> {
        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages: message::to_wire(WireShape::FlatText, messages),
            temperature: Some(params.temperature),
            top_p: Some(params.top_p),
            max_tokens: Some(params.max_tokens),
        };

        debug!(model, messages = messages.len(), "sending chat request");

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("content-type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(self.handle_error_response(status.as_u16(), &error_text));
        }

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        api_response.try_into()
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn token_budget(&self, model: &str) -> u32 {
        if model.starts_with("gpt-4.1") {
            1_000_000
        } else if model.starts_with("gpt-4") || model.starts_with("o3") {
            128_000
        } else if model.starts_with("llama") || model.starts_with("qwen") {
            8_000
        } else {
            32_000
        }
    }
}

/// Request body for the Chat Completions API.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Successful response from the Chat Completions API.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// API error response.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl TryFrom<ChatCompletionResponse> for GeneratedResponse {
    type Error = ProviderError;

    fn try_from(response: ChatCompletionResponse) -> Result<Self, Self::Error> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Parse("response carries no choices".to_string()))?;

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::MaxTokens,
            _ => FinishReason::Other,
        };

        Ok(Self {
            text: choice.message.content.unwrap_or_default(),
            usage: response.usage.map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
            finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentPart, Role};

    fn provider() -> OpenAiProvider {
        OpenAiProvider::new(
            None,
            "llama3.2",
            "http://localhost:11434/v1",
            "ollama",
            &ProviderConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_count_tokens_is_local_and_infallible() {
        let p = provider();
        // 40 chars at 4 chars/token plus 4 overhead
        let messages = vec![ChatMessage::user("a".repeat(40))];
        assert_eq!(p.count_tokens("llama3.2", &messages).await.unwrap(), 14);
    }

    #[tokio::test]
    async fn test_count_tokens_empty_history() {
        let p = provider();
        assert_eq!(p.count_tokens("llama3.2", &[]).await.unwrap(), 0);
    }

    #[test]
    fn test_estimate_degrades_rich_parts() {
        let msg = ChatMessage::with_parts(
            Role::User,
            vec![ContentPart::text("hello"), ContentPart::data("image/png", "aGk=")],
        );
        // Counts the flattened text form, including the JSON-ified data part
        assert!(OpenAiProvider::estimate_message_tokens(&msg) > MESSAGE_OVERHEAD_TOKENS);
    }

    #[test]
    fn test_request_flattens_rich_content() {
        let messages = vec![ChatMessage::with_parts(
            Role::User,
            vec![ContentPart::text("first"), ContentPart::text("second")],
        )];
        let request = ChatCompletionRequest {
            model: "gpt-4o".to_string(),
            messages: message::to_wire(WireShape::FlatText, &messages),
            temperature: None,
            top_p: None,
            max_tokens: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["content"], "first\n\nsecond");
    }

    #[test]
    fn test_response_conversion() {
        let response = ChatCompletionResponse {
            choices: vec![ApiChoice {
                message: ApiResponseMessage {
                    content: Some("hi there".to_string()),
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: Some(ApiUsage {
                prompt_tokens: 10,
                completion_tokens: 2,
            }),
        };
        let generated: GeneratedResponse = response.try_into().unwrap();
        assert_eq!(generated.text, "hi there");
        assert_eq!(generated.finish_reason, FinishReason::Stop);
        assert_eq!(generated.usage.unwrap().total(), 12);
    }

    #[test]
    fn test_response_without_choices_is_parse_error() {
        let response = ChatCompletionResponse {
            choices: vec![],
            usage: None,
        };
        let err = GeneratedResponse::try_from(response).unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }

    #[test]
    fn test_error_mapping() {
        let p = provider();
        let body = r#"{"error":{"message":"invalid api key"}}"#;
        assert!(matches!(
            p.handle_error_response(401, body),
            ProviderError::NotConfigured(_)
        ));

        let body = r#"{"error":{"message":"rate limit reached"}}"#;
        assert!(matches!(
            p.handle_error_response(429, body),
            ProviderError::RateLimited(_)
        ));

        let body = r#"{"error":{"message":"model 'nope' not found"}}"#;
        assert!(matches!(
            p.handle_error_response(404, body),
            ProviderError::InvalidModel(_)
        ));
    }

    #[test]
    fn test_token_budget_by_model() {
        let p = provider();
        assert_eq!(p.token_budget("gpt-4.1"), 1_000_000);
        assert_eq!(p.token_budget("gpt-4o"), 128_000);
        assert_eq!(p.token_budget("llama3.2"), 8_000);
    }
}
