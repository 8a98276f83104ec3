pub mod anthropic;
pub mod openai;

use crate::config::Config;
use crate::errors::ProviderError;
use crate::types::{CompletionOptions, ModelInfo};
use async_trait::async_trait;
use dyn_clone::DynClone;
use std::fmt::Debug;
use std::time::Duration;

/// Fixed wall-clock budget for one provider HTTP call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A completion provider: an external text-generation service invoked with
/// a prompt to obtain a candidate SQL query and explanation.
///
/// Implementations are a small closed set of named adapters; the router
/// holds them behind this interface and never depends on a concrete one.
#[async_trait]
pub trait CompletionProvider: Send + Sync + Debug + DynClone {
    fn name(&self) -> &str;

    /// Whether the adapter has the credentials it needs. Unconfigured
    /// providers are skipped during fallback.
    fn is_configured(&self) -> bool;

    /// Sends the prompt and returns the provider's raw text reply.
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, ProviderError>;

    /// Rough token estimate: one token per four characters of English text.
    fn token_estimate(&self, text: &str) -> usize {
        text.len().div_ceil(4)
    }

    fn available_models(&self) -> Vec<ModelInfo>;
}

dyn_clone::clone_trait_object!(CompletionProvider);

/// Builds the standard provider set from configuration, in fallback order.
pub fn providers_from_config(
    config: &Config,
) -> Result<Vec<Box<dyn CompletionProvider>>, ProviderError> {
    Ok(vec![
        Box::new(openai::OpenAiProvider::new(
            config.openai_api_url.clone(),
            config.openai_api_key.clone(),
            config.openai_model.clone(),
        )?),
        Box::new(anthropic::AnthropicProvider::new(
            config.anthropic_api_url.clone(),
            config.anthropic_api_key.clone(),
            config.anthropic_model.clone(),
        )?),
    ])
}

/// Maps an HTTP status to a provider failure code.
pub(crate) fn classify_status(status: u16) -> crate::errors::ProviderErrorCode {
    use crate::errors::ProviderErrorCode::*;
    match status {
        401 | 403 => AuthError,
        429 | 529 => RateLimited,
        500..=599 => RequestFailed,
        _ => Unknown,
    }
}
