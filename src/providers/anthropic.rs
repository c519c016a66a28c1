// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Anthropic Claude provider implementation.
//!
//! Implements [`ChatProvider`] against the Messages API. History is sent in
//! the rich block shape, so structured content parts survive the round
//! trip. Token counting uses the dedicated count-tokens endpoint, which is
//! exact for the model that will serve the request.
//!
//! See [Anthropic Messages API](https://docs.anthropic.com/en/api/messages) for details.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::ProviderError;
use crate::message::{self, WireMessage, WireShape};
use crate::types::{
    ChatMessage, ChatProvider, FinishReason, GeneratedResponse, GenerationParams, Role,
    TokenUsage,
};

use super::ProviderConfig;

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Anthropic Claude provider.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    default_model: String,
    base_url: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Anthropic API key
    /// * `default_model` - Model used when a session never names one
    /// * `base_url` - API base URL
    /// * `config` - Additional connection options
    pub fn new(
        api_key: impl Into<String>,
        default_model: impl Into<String>,
        base_url: impl Into<String>,
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
            api_key: api_key.into(),
            default_model: default_model.into(),
            base_url: base_url.into(),
        }
    }

    /// Split history into the API's system string and conversation turns.
    ///
    /// The Messages API takes system content as a top-level field, not as
    /// messages, and rejects unknown roles. System-role history (including
    /// coerced unknown roles) is folded into that field in order.
    fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<WireMessage>) {
        let (system, turns): (Vec<_>, Vec<_>) =
            messages.iter().cloned().partition(|m| m.role == Role::System);

        let system = if system.is_empty() {
            None
        } else {
            Some(
                system
                    .iter()
                    .map(message::flatten_to_text)
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            )
        };

        (system, message::to_wire(WireShape::RichParts, &turns))
    }

    /// Map a non-2xx response body onto the error taxonomy.
    fn handle_error_response(&self, status_code: u16, body: &str) -> ProviderError {
        if let Ok(error) = serde_json::from_str::<ApiError>(body) {
            match error.error.error_type.as_str() {
                "authentication_error" => ProviderError::NotConfigured(error.error.message),
                "rate_limit_error" => ProviderError::RateLimited(error.error.message),
                "overloaded_error" => ProviderError::RateLimited("API overloaded".to_string()),
                "invalid_request_error" => {
                    if error.error.message.contains("model") {
                        ProviderError::InvalidModel(error.error.message)
                    } else {
                        ProviderError::api(error.error.message, status_code)
                    }
                }
                _ => ProviderError::api(error.error.message, status_code),
            }
        } else {
            ProviderError::api(body.to_string(), status_code)
        }
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    async fn count_tokens(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<u32, ProviderError> {
        let (system, api_messages) = Self::split_system(messages);
        let request = CountTokensRequest {
            model: model.to_string(),
            messages: api_messages,
            system,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages/count_tokens", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(self.handle_error_response(status.as_u16(), &error_text));
        }

        let counted: CountTokensResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(counted.input_tokens)
    }

    async fn send(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<GeneratedResponse, ProviderError> {
        let (system, api_messages) = Self::split_system(messages);
        let request = MessagesRequest {
            model: model.to_string(),
            max_tokens: params.max_tokens,
            messages: api_messages,
            system,
            temperature: Some(params.temperature),
            top_p: Some(params.top_p),
        };

        debug!(model, messages = messages.len(), "sending chat request");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(self.handle_error_response(status.as_u16(), &error_text));
        }

        let api_response: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(api_response.into())
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn token_budget(&self, model: &str) -> u32 {
        // Claude 3 and later all carry 200k context
        if model.contains("claude-3")
            || model.contains("claude-sonnet-4")
            || model.contains("claude-opus-4")
            || model.contains("claude-haiku-4")
        {
            200_000
        } else {
            100_000
        }
    }
}

/// Request body for the Messages API.
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

/// Request body for the count-tokens endpoint.
#[derive(Debug, Serialize)]
struct CountTokensRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CountTokensResponse {
    input_tokens: u32,
}

/// Successful response from the Messages API.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ApiContentBlock>,
    stop_reason: Option<String>,
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ApiContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// API error response.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

impl From<MessagesResponse> for GeneratedResponse {
    fn from(response: MessagesResponse) -> Self {
        let text = response
            .content
            .iter()
            .filter_map(|block| match block {
                ApiContentBlock::Text { text } => Some(text.as_str()),
                ApiContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        let finish_reason = match response.stop_reason.as_deref() {
            Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
            Some("max_tokens") => FinishReason::MaxTokens,
            _ => FinishReason::Other,
        };

        Self {
            text,
            usage: Some(TokenUsage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            }),
            finish_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageContent;

    fn provider() -> AnthropicProvider {
        AnthropicProvider::new(
            "test-key",
            "claude-sonnet-4-20250514",
            "https://api.anthropic.com",
            &ProviderConfig::default(),
        )
    }

    #[test]
    fn test_split_system_folds_system_messages() {
        let messages = vec![
            ChatMessage::system("be terse"),
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi"),
        ];
        let (system, turns) = AnthropicProvider::split_system(&messages);
        assert_eq!(system.as_deref(), Some("be terse"));
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, "user");
        assert_eq!(turns[1].role, "assistant");
    }

    #[test]
    fn test_split_system_without_system_messages() {
        let messages = vec![ChatMessage::user("hello")];
        let (system, turns) = AnthropicProvider::split_system(&messages);
        assert!(system.is_none());
        assert_eq!(turns.len(), 1);
    }

    #[test]
    fn test_response_conversion() {
        let response = MessagesResponse {
            content: vec![
                ApiContentBlock::Text {
                    text: "Hello".to_string(),
                },
                ApiContentBlock::Text {
                    text: " world".to_string(),
                },
            ],
            stop_reason: Some("end_turn".to_string()),
            usage: ApiUsage {
                input_tokens: 12,
                output_tokens: 3,
            },
        };
        let generated: GeneratedResponse = response.into();
        assert_eq!(generated.text, "Hello world");
        assert_eq!(generated.finish_reason, FinishReason::Stop);
        assert_eq!(generated.usage.unwrap().total(), 15);
    }

    #[test]
    fn test_response_conversion_max_tokens() {
        let response = MessagesResponse {
            content: vec![ApiContentBlock::Text {
                text: "truncat".to_string(),
            }],
            stop_reason: Some("max_tokens".to_string()),
            usage: ApiUsage {
                input_tokens: 1,
                output_tokens: 800,
            },
        };
        let generated: GeneratedResponse = response.into();
        assert_eq!(generated.finish_reason, FinishReason::MaxTokens);
    }

    #[test]
    fn test_error_mapping() {
        let p = provider();
        let body = r#"{"error":{"type":"rate_limit_error","message":"slow down"}}"#;
        assert!(matches!(
            p.handle_error_response(429, body),
            ProviderError::RateLimited(_)
        ));

        let body = r#"{"error":{"type":"invalid_request_error","message":"model: not found"}}"#;
        assert!(matches!(
            p.handle_error_response(404, body),
            ProviderError::InvalidModel(_)
        ));

        let body = r#"{"error":{"type":"authentication_error","message":"bad key"}}"#;
        assert!(matches!(
            p.handle_error_response(401, body),
            ProviderError::NotConfigured(_)
        ));

        assert!(matches!(
            p.handle_error_response(500, "not json"),
            ProviderError::Api {
                status_code: Some(500),
                ..
            }
        ));
    }

    #[test]
    fn test_token_budget_by_model() {
        let p = provider();
        assert_eq!(p.token_budget("claude-sonnet-4-20250514"), 200_000);
        assert_eq!(p.token_budget("claude-2.1"), 100_000);
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![
            ChatMessage::new(Role::User, MessageContent::Text("hi".to_string())),
            ChatMessage::with_parts(
                Role::User,
                vec![
                    crate::types::ContentPart::text("look at this"),
                    crate::types::ContentPart::data("image/png", "aGk="),
                ],
            ),
        ];
        let (system, api_messages) = AnthropicProvider::split_system(&messages);
        let request = MessagesRequest {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 800,
            messages: api_messages,
            system,
            temperature: Some(0.7),
            top_p: Some(0.95),
        };
        let json = serde_json::to_value(&request).unwrap();
        // Simple messages stay a bare string; rich messages keep their blocks
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
        assert_eq!(json["messages"][1]["content"][0]["type"], "text");
        assert_eq!(json["messages"][1]["content"][1]["type"], "data");
        assert!(json.get("system").is_none());
    }
}
