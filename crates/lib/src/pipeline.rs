//! # The Query Pipeline
//!
//! The primary entry point: owns every component of the
//! question-to-result flow and exposes the high-level methods a transport
//! layer (CLI, REST, etc.) calls. All dependencies are injected through
//! the builder; nothing here reaches into process-wide state.
//!
//! One request moves strictly forward through
//! sanitize -> prompt -> complete -> validate -> execute; the only retry
//! loop is the provider-fallback sub-sequence inside the router.

use crate::catalog::SchemaCatalog;
use crate::config::Config;
use crate::errors::QueryError;
use crate::executor::QueryExecutionEngine;
use crate::prompt::PromptAssembler;
use crate::providers::CompletionProvider;
use crate::quota::DailyQuota;
use crate::router::{CompletionRouter, ProviderStatus};
use crate::sanitize::InputSanitizer;
use crate::types::{CompletionOptions, QueryResponse};
use crate::validate::SqlSafetyValidator;
use crate::backend::QueryBackend;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct QueryPipeline {
    sanitizer: InputSanitizer,
    router: CompletionRouter,
    catalog: Box<dyn SchemaCatalog>,
    engine: QueryExecutionEngine,
    quota: DailyQuota,
}

/// Builder for [`QueryPipeline`] instances.
#[derive(Default)]
pub struct QueryPipelineBuilder {
    providers: Vec<Box<dyn CompletionProvider>>,
    catalog: Option<Box<dyn SchemaCatalog>>,
    backend: Option<Box<dyn QueryBackend>>,
    config: Option<Arc<Config>>,
}

impl QueryPipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a completion provider. Registration order is the
    /// fallback order.
    pub fn provider(mut self, provider: Box<dyn CompletionProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn catalog(mut self, catalog: Box<dyn SchemaCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn backend(mut self, backend: Box<dyn QueryBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn config(mut self, config: Arc<Config>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<QueryPipeline, QueryError> {
        let config = self.config.unwrap_or_else(|| Arc::new(Config::default()));
        let catalog = self
            .catalog
            .ok_or_else(|| QueryError::Storage("pipeline requires a schema catalog".into()))?;
        let backend = self
            .backend
            .ok_or_else(|| QueryError::Storage("pipeline requires a query backend".into()))?;

        let assembler = PromptAssembler::new(&config.table_prefix, "UTC");
        let router =
            CompletionRouter::new(self.providers, &config.default_provider, assembler)?;
        let validator = SqlSafetyValidator::new(config.max_rows, &config.table_prefix)?;
        let engine = QueryExecutionEngine::new(
            backend,
            validator,
            Duration::from_secs(config.query_timeout_secs),
        );

        Ok(QueryPipeline {
            sanitizer: InputSanitizer::new()?,
            router,
            catalog,
            engine,
            quota: DailyQuota::new(config.daily_limit),
        })
    }
}

impl QueryPipeline {
    pub fn builder() -> QueryPipelineBuilder {
        QueryPipelineBuilder::new()
    }

    /// Turns a natural-language question into an executed, vetted query.
    ///
    /// Every failure mode comes back as a `QueryResponse` with
    /// `success=false` and a human-readable message; this method never
    /// propagates an error to the transport layer.
    pub async fn process_query(&self, user: &str, question: &str) -> QueryResponse {
        self.process_query_with_options(user, question, &CompletionOptions::default())
            .await
    }

    pub async fn process_query_with_options(
        &self,
        user: &str,
        question: &str,
        options: &CompletionOptions,
    ) -> QueryResponse {
        info!(user = user, "received question");

        if !self.router.has_configured_provider() {
            return QueryResponse::failure(
                "No completion provider configured. Please add an API key.",
            );
        }

        if !self.quota.try_acquire(user) {
            return QueryResponse::failure(
                "Daily query limit exceeded. Please try again tomorrow.",
            );
        }

        let clean = match self.sanitizer.sanitize(question) {
            Ok(clean) => clean,
            Err(rejection) => {
                return QueryResponse::failure(format!("Question rejected: {rejection}"))
            }
        };

        let (schema, integrations, allowed) = match self.load_catalog().await {
            Ok(parts) => parts,
            Err(e) => return QueryResponse::failure(e.to_string()),
        };

        let candidate = match self
            .router
            .generate(&clean.text, &schema, &integrations, options)
            .await
        {
            Ok(candidate) => candidate,
            Err(e) => return QueryResponse::failure(e.to_string()),
        };
        info!(provider = %candidate.provider_used, "generated SQL candidate");

        let outcome = self.engine.execute(&candidate.sql, &allowed).await;
        let mut warnings = clean.warnings;
        warnings.extend(outcome.warnings);

        if !outcome.success {
            return QueryResponse {
                success: false,
                data: None,
                columns: None,
                row_count: None,
                execution_time: None,
                sql: Some(candidate.sql),
                explanation: Some(candidate.explanation),
                chart_type: None,
                warnings,
                message: Some(outcome.errors.join(", ")),
            };
        }

        QueryResponse {
            success: true,
            data: Some(outcome.rows),
            columns: Some(outcome.columns),
            row_count: Some(outcome.row_count),
            execution_time: Some(outcome.elapsed_seconds),
            sql: Some(candidate.sql),
            explanation: Some(candidate.explanation),
            chart_type: Some(candidate.chart_hint),
            warnings,
            message: None,
        }
    }

    /// Re-runs previously generated or saved SQL. The full validator
    /// still applies; there is no trusted path around it.
    pub async fn execute_raw(&self, sql: &str) -> QueryResponse {
        let allowed = match self.catalog.allowed_tables().await {
            Ok(allowed) => allowed,
            Err(e) => return QueryResponse::failure(e.to_string()),
        };

        let outcome = self.engine.execute(sql, &allowed).await;
        if !outcome.success {
            let mut response = QueryResponse::failure(outcome.errors.join(", "));
            response.warnings = outcome.warnings;
            return response;
        }

        QueryResponse {
            success: true,
            data: Some(outcome.rows),
            columns: Some(outcome.columns),
            row_count: Some(outcome.row_count),
            execution_time: Some(outcome.elapsed_seconds),
            sql: Some(sql.to_string()),
            explanation: None,
            chart_type: None,
            warnings: outcome.warnings,
            message: None,
        }
    }

    /// Starter questions tailored to the detected integrations.
    pub async fn suggestions(&self) -> Vec<String> {
        let mut suggestions = vec![
            "How many posts do we have?".to_string(),
            "Show me the 10 most recent users".to_string(),
            "How many comments were posted this month?".to_string(),
        ];

        let integrations = self
            .catalog
            .detected_integrations()
            .await
            .unwrap_or_default();

        if integrations.iter().any(|i| i.starts_with("woocommerce")) {
            suggestions.extend([
                "What was our total revenue this month?".to_string(),
                "Show me the top 10 customers by total spend".to_string(),
                "How many orders are pending?".to_string(),
                "What is our average order value?".to_string(),
            ]);
        }
        if integrations.iter().any(|i| i == "learndash") {
            suggestions.extend([
                "How many students enrolled this month?".to_string(),
                "What is the completion rate for each course?".to_string(),
                "What is the average quiz score?".to_string(),
            ]);
        }
        if integrations.iter().any(|i| i == "memberpress") {
            suggestions.extend([
                "How many active members do we have?".to_string(),
                "What is our monthly recurring revenue?".to_string(),
                "Show me members who cancelled this month".to_string(),
            ]);
        }

        suggestions
    }

    pub fn provider_status(&self) -> Vec<ProviderStatus> {
        self.router.provider_status()
    }

    pub fn quota_remaining(&self, user: &str) -> Option<u32> {
        self.quota.remaining(user)
    }

    pub async fn refresh_schema(&self) -> Result<(), QueryError> {
        self.catalog.clear_cache().await;
        self.catalog.schema().await.map(|_| ())
    }

    pub fn catalog(&self) -> &dyn SchemaCatalog {
        self.catalog.as_ref()
    }

    async fn load_catalog(
        &self,
    ) -> Result<
        (
            Arc<crate::types::SchemaSnapshot>,
            Vec<String>,
            std::collections::HashSet<String>,
        ),
        QueryError,
    > {
        let schema = self.catalog.schema().await?;
        let integrations = self.catalog.detected_integrations().await?;
        let allowed = self.catalog.allowed_tables().await?;
        Ok((schema, integrations, allowed))
    }
}
