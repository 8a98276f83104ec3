use crate::errors::{ProviderError, ProviderErrorCode};
use crate::providers::{classify_status, CompletionProvider, REQUEST_TIMEOUT};
use crate::types::{CompletionOptions, ModelInfo};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

const API_VERSION: &str = "2023-06-01";

const SYSTEM_PROMPT: &str = "You are a SQL expert. Generate safe, read-only MySQL queries. \
    Always respond with valid JSON containing: {\"sql\": \"YOUR SQL QUERY\", \
    \"explanation\": \"Brief explanation\", \"columns\": [\"column1\", \"column2\"], \
    \"chartType\": \"table|bar|line|pie|none\"}";

// --- Messages API request and response structures ---

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize, Debug)]
struct ContentBlock {
    text: String,
}

#[derive(Deserialize, Debug, Default)]
struct ErrorResponse {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Deserialize, Debug, Default)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

// --- Anthropic provider implementation ---

/// Adapter for the Anthropic messages API.
#[derive(Clone, Debug)]
pub struct AnthropicProvider {
    client: ReqwestClient,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

impl AnthropicProvider {
    pub fn new(
        api_url: Option<String>,
        api_key: Option<String>,
        model: String,
    ) -> Result<Self, ProviderError> {
        let client = ReqwestClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                ProviderError::new("anthropic", ProviderErrorCode::RequestFailed, e.to_string())
            })?;

        Ok(Self {
            client,
            api_url: api_url.unwrap_or_else(|| ANTHROPIC_API_URL.to_string()),
            api_key,
            model,
        })
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, ProviderError> {
        let Some(api_key) = self.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return Err(ProviderError::new(
                "anthropic",
                ProviderErrorCode::NotConfigured,
                "Anthropic API key not configured",
            ));
        };

        let request_body = MessagesRequest {
            model: options.model.as_deref().unwrap_or(&self.model),
            max_tokens: options.max_tokens.unwrap_or(1000),
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                ProviderError::new("anthropic", ProviderErrorCode::RequestFailed, e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body: ErrorResponse = response.json().await.unwrap_or_default();
            let message = if body.error.message.is_empty() {
                format!("Unknown Anthropic error (status {status})")
            } else {
                body.error.message
            };
            return Err(ProviderError::with_status(
                "anthropic",
                classify_status(status.as_u16()),
                message,
                status.as_u16(),
            ));
        }

        let messages_response: MessagesResponse = response.json().await.map_err(|e| {
            ProviderError::new(
                "anthropic",
                ProviderErrorCode::InvalidResponse,
                e.to_string(),
            )
        })?;

        messages_response
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or_else(|| {
                ProviderError::new(
                    "anthropic",
                    ProviderErrorCode::InvalidResponse,
                    "Invalid response from Anthropic",
                )
            })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo::new(
                "claude-3-5-sonnet-20241022",
                "Claude 3.5 Sonnet",
                "Best balance of intelligence and speed",
                "Medium",
            ),
            ModelInfo::new(
                "claude-3-opus-20240229",
                "Claude 3 Opus",
                "Most powerful Claude model",
                "High",
            ),
            ModelInfo::new(
                "claude-3-haiku-20240307",
                "Claude 3 Haiku",
                "Fastest and most compact",
                "Low",
            ),
        ]
    }
}
