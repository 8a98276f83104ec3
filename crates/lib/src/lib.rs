//! # Natural Language to Safe SQL
//!
//! This crate turns an untrusted natural-language question into a vetted,
//! bounded database query. A completion provider produces candidate SQL;
//! nothing that provider says is trusted. Before execution every candidate
//! passes a safety validator that forces read-only single statements,
//! clamps row limits, and allowlist-checks table references, and every
//! query runs under an explicit wall-clock budget.
//!
//! The pipeline per request:
//! question -> sanitizer -> prompt assembly -> completion router (with
//! provider fallback) -> safety validator -> execution engine -> result.

pub mod backend;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod executor;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod quota;
pub mod router;
pub mod sanitize;
pub mod types;
pub mod validate;

pub use backend::{QueryBackend, SqliteBackend};
pub use catalog::{SchemaCatalog, SqliteCatalog};
pub use config::Config;
pub use errors::{ProviderError, ProviderErrorCode, QueryError};
pub use executor::QueryExecutionEngine;
pub use pipeline::{QueryPipeline, QueryPipelineBuilder};
pub use prompt::PromptAssembler;
pub use providers::anthropic::AnthropicProvider;
pub use providers::openai::OpenAiProvider;
pub use providers::{providers_from_config, CompletionProvider};
pub use quota::DailyQuota;
pub use router::CompletionRouter;
pub use sanitize::{CleanQuestion, InputSanitizer, SanitizeRejection};
pub use types::{
    ChartHint, CompletionOptions, ExecutionOutcome, QueryResponse, SchemaSnapshot, SqlCandidate,
    ValidationOutcome,
};
pub use validate::SqlSafetyValidator;
