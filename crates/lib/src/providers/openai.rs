use crate::errors::{ProviderError, ProviderErrorCode};
use crate::providers::{classify_status, CompletionProvider, REQUEST_TIMEOUT};
use crate::types::{CompletionOptions, ModelInfo};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

const SYSTEM_PROMPT: &str =
    "You are a SQL expert. Generate safe, read-only MySQL queries. Always respond with valid JSON.";

/// Models that accept the `json_object` response format.
const JSON_MODE_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-4-turbo-preview"];

// --- Chat-completions request and response structures ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    r#type: &'static str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ChatResponseMessage {
    content: String,
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

// --- OpenAI provider implementation ---

/// Adapter for the OpenAI chat completions API.
#[derive(Clone, Debug)]
pub struct OpenAiProvider {
    client: ReqwestClient,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiProvider {
    /// Creates a new `OpenAiProvider`. `api_url` overrides the default
    /// endpoint, which tests use to point at a mock server.
    pub fn new(
        api_url: Option<String>,
        api_key: Option<String>,
        model: String,
    ) -> Result<Self, ProviderError> {
        let client = ReqwestClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                ProviderError::new("openai", ProviderErrorCode::RequestFailed, e.to_string())
            })?;

        Ok(Self {
            client,
            api_url: api_url.unwrap_or_else(|| OPENAI_API_URL.to_string()),
            api_key,
            model,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
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
                "openai",
                ProviderErrorCode::NotConfigured,
                "OpenAI API key not configured",
            ));
        };

        let model = options.model.as_deref().unwrap_or(&self.model);
        let request_body = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            // Low temperature for consistent SQL.
            temperature: options.temperature.unwrap_or(0.1),
            max_tokens: options.max_tokens.unwrap_or(1000),
            response_format: JSON_MODE_MODELS
                .contains(&model)
                .then_some(ResponseFormat {
                    r#type: "json_object",
                }),
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                ProviderError::new("openai", ProviderErrorCode::RequestFailed, e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body: ErrorResponse = response.json().await.unwrap_or_default();
            let message = if body.error.message.is_empty() {
                format!("Unknown OpenAI error (status {status})")
            } else {
                body.error.message
            };
            return Err(ProviderError::with_status(
                "openai",
                classify_status(status.as_u16()),
                message,
                status.as_u16(),
            ));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            ProviderError::new("openai", ProviderErrorCode::InvalidResponse, e.to_string())
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                ProviderError::new(
                    "openai",
                    ProviderErrorCode::InvalidResponse,
                    "Invalid response from OpenAI",
                )
            })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo::new(
                "gpt-4o",
                "GPT-4o",
                "Most capable model, best for complex queries",
                "High",
            ),
            ModelInfo::new(
                "gpt-4o-mini",
                "GPT-4o Mini",
                "Fast and efficient, good for most queries",
                "Low",
            ),
            ModelInfo::new(
                "gpt-4-turbo",
                "GPT-4 Turbo",
                "Powerful with large context window",
                "High",
            ),
            ModelInfo::new(
                "gpt-3.5-turbo",
                "GPT-3.5 Turbo",
                "Legacy model, fast but less capable",
                "Very Low",
            ),
        ]
    }
}
