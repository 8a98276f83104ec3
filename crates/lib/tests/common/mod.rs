#![allow(dead_code)]
//! Shared test utilities: mock providers, mock backends, and seeded
//! in-memory databases, so tests stay isolated and repeatable.

use askdb::backend::{PlanRow, QueryBackend, QueryRows};
use askdb::errors::{ProviderError, QueryError};
use askdb::types::{ColumnInfo, CompletionOptions, ModelInfo, SchemaSnapshot, TableInfo};
use askdb::{CompletionProvider, SqliteBackend};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static INIT: Once = Once::new();

/// Initializes the tracing subscriber once for the whole test binary.
pub fn setup_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt::init();
    });
}

// --- Mock completion provider ---

#[derive(Clone, Debug)]
pub struct MockProvider {
    name: String,
    configured: bool,
    /// Scripted replies, consumed front to back.
    responses: Arc<Mutex<Vec<Result<String, ProviderError>>>>,
    pub prompts_seen: Arc<Mutex<Vec<String>>>,
}

impl MockProvider {
    pub fn new(name: &str, responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            name: name.to_string(),
            configured: true,
            responses: Arc::new(Mutex::new(responses)),
            prompts_seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unconfigured(name: &str) -> Self {
        Self {
            name: name.to_string(),
            configured: false,
            responses: Arc::new(Mutex::new(Vec::new())),
            prompts_seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts_seen.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn complete(
        &self,
        prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<String, ProviderError> {
        self.prompts_seen.lock().unwrap().push(prompt.to_string());

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(r#"{"sql": "SELECT 1"}"#.to_string())
        } else {
            responses.remove(0)
        }
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo::new("mock-1", "Mock", "Scripted test model", "Free")]
    }
}

// --- Mock query backend ---

#[derive(Clone, Debug)]
pub struct MockBackend {
    result: QueryRows,
    plan: Vec<PlanRow>,
    /// When set, each query sleeps this long before answering, to
    /// exercise the engine's timeout path.
    delay: Option<Duration>,
    pub queries_seen: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    pub fn new(result: QueryRows) -> Self {
        Self {
            result,
            plan: Vec::new(),
            delay: None,
            queries_seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_plan(mut self, plan: Vec<PlanRow>) -> Self {
        self.plan = plan;
        self
    }

    pub fn call_count(&self) -> usize {
        self.queries_seen.lock().unwrap().len()
    }
}

#[async_trait]
impl QueryBackend for MockBackend {
    fn name(&self) -> &str {
        "MockDB"
    }

    async fn run_query(&self, sql: &str) -> Result<QueryRows, QueryError> {
        self.queries_seen.lock().unwrap().push(sql.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.result.clone())
    }

    async fn explain(&self, _sql: &str) -> Result<Vec<PlanRow>, QueryError> {
        Ok(self.plan.clone())
    }
}

// --- Fixtures ---

/// A minimal schema snapshot with `wp_users` and `wp_posts`.
pub fn sample_schema() -> SchemaSnapshot {
    SchemaSnapshot {
        tables: vec![
            TableInfo {
                name: "wp_users".to_string(),
                columns: vec![
                    ColumnInfo {
                        name: "ID".to_string(),
                        sql_type: "INTEGER".to_string(),
                        nullable: false,
                        key: "PRI".to_string(),
                    },
                    ColumnInfo {
                        name: "user_login".to_string(),
                        sql_type: "TEXT".to_string(),
                        nullable: false,
                        key: String::new(),
                    },
                ],
                row_count: 42,
                description: "User accounts".to_string(),
            },
            TableInfo {
                name: "wp_posts".to_string(),
                columns: vec![ColumnInfo {
                    name: "ID".to_string(),
                    sql_type: "INTEGER".to_string(),
                    nullable: false,
                    key: "PRI".to_string(),
                }],
                row_count: 120,
                description: "Posts, pages, and custom post types".to_string(),
            },
        ],
    }
}

/// Opens an in-memory SQLite database seeded with a couple of prefixed
/// tables and a few rows.
pub async fn seeded_backend() -> SqliteBackend {
    let backend = SqliteBackend::open(":memory:")
        .await
        .expect("in-memory database");

    backend
        .initialize_with_data(
            "CREATE TABLE wp_users (ID INTEGER PRIMARY KEY, user_login TEXT NOT NULL, user_email TEXT);
             CREATE TABLE wp_posts (ID INTEGER PRIMARY KEY, post_title TEXT, post_status TEXT);
             INSERT INTO wp_users (ID, user_login, user_email) VALUES (1, 'alice', 'alice@example.com');
             INSERT INTO wp_users (ID, user_login, user_email) VALUES (2, 'bob', 'bob@example.com');
             INSERT INTO wp_posts (ID, post_title, post_status) VALUES (1, 'Hello world', 'publish');
             INSERT INTO wp_posts (ID, post_title, post_status) VALUES (2, 'Draft thoughts', 'draft')",
        )
        .await
        .expect("seed data");

    backend
}
