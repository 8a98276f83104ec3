//! Completion routing with provider fallback.
//!
//! The router owns the named provider adapters, selects a primary, and
//! walks a fixed fallback order on recoverable failure. Authentication
//! failures are terminal: retrying the same bad credential elsewhere
//! cannot help and would mask a configuration problem.

use crate::errors::{ProviderError, QueryError};
use crate::prompt::PromptAssembler;
use crate::providers::CompletionProvider;
use crate::types::{ChartHint, CompletionOptions, ModelInfo, SchemaSnapshot, SqlCandidate};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Summary of one registered provider, for settings surfaces.
#[derive(Debug)]
pub struct ProviderStatus {
    pub name: String,
    pub configured: bool,
    pub models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct RawCandidate {
    sql: Option<String>,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(rename = "chartType")]
    chart_type: Option<String>,
}

pub struct CompletionRouter {
    providers: HashMap<String, Box<dyn CompletionProvider>>,
    /// Fixed walk order for fallback; also the registration order.
    fallback_order: Vec<String>,
    default_provider: String,
    assembler: PromptAssembler,
    fence_open: Regex,
    fence_close: Regex,
    select_stmt: Regex,
}

impl CompletionRouter {
    /// Registers providers in the given order; that order doubles as the
    /// fallback order.
    pub fn new(
        providers: Vec<Box<dyn CompletionProvider>>,
        default_provider: &str,
        assembler: PromptAssembler,
    ) -> Result<Self, QueryError> {
        let fallback_order: Vec<String> =
            providers.iter().map(|p| p.name().to_string()).collect();
        let providers = providers
            .into_iter()
            .map(|p| (p.name().to_string(), p))
            .collect();

        Ok(Self {
            providers,
            fallback_order,
            default_provider: default_provider.to_string(),
            assembler,
            fence_open: Regex::new(r"```(?:json|sql)?\s*")?,
            fence_close: Regex::new(r"```\s*$")?,
            select_stmt: Regex::new(r"(?is)SELECT\s+.+")?,
        })
    }

    pub fn has_configured_provider(&self) -> bool {
        self.providers.values().any(|p| p.is_configured())
    }

    pub fn provider_status(&self) -> Vec<ProviderStatus> {
        self.fallback_order
            .iter()
            .filter_map(|name| self.providers.get(name))
            .map(|p| ProviderStatus {
                name: p.name().to_string(),
                configured: p.is_configured(),
                models: p.available_models(),
            })
            .collect()
    }

    /// Generates a SQL candidate for the question, falling back across
    /// providers on recoverable failure.
    pub async fn generate(
        &self,
        question: &str,
        schema: &SchemaSnapshot,
        integrations: &[String],
        options: &CompletionOptions,
    ) -> Result<SqlCandidate, QueryError> {
        let prompt = self.assembler.build(question, schema, integrations);
        let primary = options
            .provider
            .as_deref()
            .unwrap_or(&self.default_provider);

        match self.call_provider(primary, &prompt, options).await {
            Ok(raw) => self.parse_candidate(&raw, primary),
            Err(e) if e.is_auth_error() => {
                warn!(provider = primary, "authentication failure, not falling back");
                Err(e.into())
            }
            Err(e) => {
                warn!(provider = primary, error = %e, "primary provider failed, trying fallback");
                self.try_fallback(&prompt, primary, options).await
            }
        }
    }

    async fn call_provider(
        &self,
        name: &str,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, ProviderError> {
        let provider = self.providers.get(name).ok_or_else(|| {
            ProviderError::new(
                name,
                crate::errors::ProviderErrorCode::Unknown,
                format!("Unknown completion provider: {name}"),
            )
        })?;

        if !provider.is_configured() {
            return Err(ProviderError::new(
                name,
                crate::errors::ProviderErrorCode::NotConfigured,
                format!("{name} is not configured. Please add an API key."),
            ));
        }

        debug!(
            provider = name,
            prompt_tokens = provider.token_estimate(prompt),
            "calling completion provider"
        );
        provider.complete(prompt, options).await
    }

    /// Walks the fallback order once, skipping the failed provider and any
    /// unconfigured one.
    async fn try_fallback(
        &self,
        prompt: &str,
        failed: &str,
        options: &CompletionOptions,
    ) -> Result<SqlCandidate, QueryError> {
        for name in &self.fallback_order {
            if name == failed {
                continue;
            }
            let Some(provider) = self.providers.get(name) else {
                continue;
            };
            if !provider.is_configured() {
                continue;
            }

            match provider.complete(prompt, options).await {
                Ok(raw) => return self.parse_candidate(&raw, name),
                Err(e) => {
                    warn!(provider = %name, error = %e, "fallback provider failed");
                    continue;
                }
            }
        }

        Err(QueryError::AllProvidersFailed)
    }

    /// Parses a raw provider reply into a [`SqlCandidate`].
    ///
    /// Surrounding code fences are stripped and the body parsed as JSON.
    /// When that fails, the first `SELECT ...` substring is extracted as a
    /// last resort.
    fn parse_candidate(&self, raw: &str, provider: &str) -> Result<SqlCandidate, QueryError> {
        let cleaned = self.fence_open.replace_all(raw, "");
        let cleaned = self.fence_close.replace(&cleaned, "");
        let cleaned = cleaned.trim();

        let parsed: Result<RawCandidate, _> = serde_json::from_str(cleaned);
        let candidate = match parsed {
            Ok(candidate) => candidate,
            Err(_) => {
                if let Some(m) = self.select_stmt.find(cleaned) {
                    return Ok(SqlCandidate {
                        sql: m.as_str().trim().to_string(),
                        explanation: "Query extracted from response".to_string(),
                        expected_columns: Vec::new(),
                        chart_hint: ChartHint::Table,
                        provider_used: provider.to_string(),
                    });
                }
                return Err(QueryError::ResponseMalformed(
                    "invalid JSON in provider response".to_string(),
                ));
            }
        };

        let sql = candidate.sql.filter(|s| !s.trim().is_empty()).ok_or_else(|| {
            QueryError::ResponseMalformed("no SQL query in provider response".to_string())
        })?;

        Ok(SqlCandidate {
            sql,
            explanation: candidate.explanation,
            expected_columns: candidate.columns,
            chart_hint: candidate
                .chart_type
                .as_deref()
                .map(ChartHint::parse)
                .unwrap_or_default(),
            provider_used: provider.to_string(),
        })
    }
}
