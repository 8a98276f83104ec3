//! Environment-driven configuration.
//!
//! Every component receives its knobs through this struct rather than
//! reading process-wide state. Out-of-range values are clamped, not
//! rejected, so a bad deployment still comes up with safe bounds.

use std::env;

pub const DEFAULT_MAX_ROWS: u32 = 1000;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DAILY_LIMIT: u32 = 20;

#[derive(Debug, Clone)]
pub struct Config {
    /// Provider tried first when the request does not name one.
    pub default_provider: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    /// Endpoint override, used by tests to point at a mock server.
    pub openai_api_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub anthropic_api_url: Option<String>,
    /// Hard cap applied to every query's LIMIT clause (10..=10000).
    pub max_rows: u32,
    /// Wall-clock budget for one query (5..=120 seconds).
    pub query_timeout_secs: u64,
    /// Queries per user per day. 0 means unlimited.
    pub daily_limit: u32,
    /// Table name prefix, also substituted for the `{prefix}` placeholder.
    pub table_prefix: String,
    /// Path to the SQLite database file, or ":memory:".
    pub db_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: "openai".to_string(),
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            openai_api_url: None,
            anthropic_api_key: None,
            anthropic_model: "claude-3-5-sonnet-20241022".to_string(),
            anthropic_api_url: None,
            max_rows: DEFAULT_MAX_ROWS,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
            daily_limit: DEFAULT_DAILY_LIMIT,
            table_prefix: "wp_".to_string(),
            db_path: "askdb.db".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from the environment, reading `.env` if present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Self {
            default_provider: env::var("ASKDB_PROVIDER")
                .unwrap_or(defaults.default_provider),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            openai_model: env::var("ASKDB_OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_api_url: env::var("ASKDB_OPENAI_API_URL").ok(),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
            anthropic_model: env::var("ASKDB_ANTHROPIC_MODEL")
                .unwrap_or(defaults.anthropic_model),
            anthropic_api_url: env::var("ASKDB_ANTHROPIC_API_URL").ok(),
            max_rows: clamped("ASKDB_MAX_ROWS", DEFAULT_MAX_ROWS, 10, 10_000),
            query_timeout_secs: clamped(
                "ASKDB_QUERY_TIMEOUT",
                DEFAULT_QUERY_TIMEOUT_SECS,
                5,
                120,
            ),
            daily_limit: env::var("ASKDB_DAILY_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_DAILY_LIMIT),
            table_prefix: env::var("ASKDB_TABLE_PREFIX").unwrap_or(defaults.table_prefix),
            db_path: env::var("ASKDB_DB").unwrap_or(defaults.db_path),
        }
    }
}

fn clamped<T>(var: &str, default: T, min: T, max: T) -> T
where
    T: std::str::FromStr + PartialOrd + Copy,
{
    let value = env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default);
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}
