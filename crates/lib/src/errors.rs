use thiserror::Error;

/// Machine-readable failure codes reported by completion provider adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorCode {
    /// The provider has no API key configured.
    NotConfigured,
    /// The HTTP request could not be completed (network error, timeout).
    RequestFailed,
    /// The provider replied with a payload we could not decode.
    InvalidResponse,
    /// The provider rejected the request due to rate limiting or overload.
    RateLimited,
    /// The credential was rejected. Never retried against another provider.
    AuthError,
    /// Anything the adapter could not classify.
    Unknown,
}

/// A typed failure from a completion provider.
#[derive(Error, Debug, Clone)]
#[error("{provider}: {message}")]
pub struct ProviderError {
    pub provider: String,
    pub code: ProviderErrorCode,
    pub message: String,
    pub status: Option<u16>,
}

impl ProviderError {
    pub fn new(provider: &str, code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            code,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        provider: &str,
        code: ProviderErrorCode,
        message: impl Into<String>,
        status: u16,
    ) -> Self {
        Self {
            provider: provider.to_string(),
            code,
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn is_auth_error(&self) -> bool {
        self.code == ProviderErrorCode::AuthError
    }

    pub fn is_rate_limit(&self) -> bool {
        self.code == ProviderErrorCode::RateLimited
    }
}

/// Failures surfaced by the query pipeline.
///
/// Every stage returns one of these as a value; nothing in the pipeline
/// panics across a component boundary.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The inbound question was empty, oversized, or matched an injection
    /// pattern. No provider call is made.
    #[error("question rejected: {0}")]
    InputRejected(String),
    #[error("daily query limit exceeded")]
    QuotaExceeded,
    #[error("no completion provider is configured")]
    NoProviderConfigured,
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("all completion providers failed")]
    AllProvidersFailed,
    /// The provider replied, but no usable SQL could be recovered.
    #[error("unusable provider response: {0}")]
    ResponseMalformed(String),
    /// One or more validator rules rejected the SQL. Never executed.
    #[error("SQL rejected: {}", .0.join(", "))]
    SqlRejected(Vec<String>),
    #[error("query execution failed: {0}")]
    ExecutionFailed(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}
