//! Query backends.
//!
//! A [`QueryBackend`] is the one component allowed to touch the database
//! with model-derived SQL, and it only ever receives text that already
//! passed the safety validator. The concrete implementation wraps a
//! local SQLite database via Turso.

use crate::errors::QueryError;
use async_trait::async_trait;
use dyn_clone::DynClone;
use serde_json::Value;
use std::fmt::{self, Debug};
use tracing::debug;
use turso::{Database, Value as TursoValue};

/// Column names plus ordered row records from one query.
#[derive(Debug, Clone, Default)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Map<String, Value>>,
}

/// One row of the engine's query-plan output, kept as a loose map since
/// plan shapes differ across engines.
pub type PlanRow = serde_json::Map<String, Value>;

#[async_trait]
pub trait QueryBackend: Send + Sync + Debug + DynClone {
    /// Name of the backing engine (e.g. "SQLite").
    fn name(&self) -> &str;

    /// Runs an already-validated query and returns its rows.
    async fn run_query(&self, sql: &str) -> Result<QueryRows, QueryError>;

    /// Runs the engine's query-plan facility on an already-validated query.
    async fn explain(&self, sql: &str) -> Result<Vec<PlanRow>, QueryError>;
}

dyn_clone::clone_trait_object!(QueryBackend);

/// A backend over a local SQLite database.
///
/// Cloning shares the underlying database, so the catalog and the backend
/// can sit on the same file or in-memory instance.
#[derive(Clone)]
pub struct SqliteBackend {
    db: Database,
}

impl SqliteBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Opens a database at `db_path` (":memory:" for an isolated in-memory
    /// instance) with WAL enabled.
    pub async fn open(db_path: &str) -> Result<Self, QueryError> {
        let db = turso::Builder::new_local(db_path)
            .build()
            .await
            .map_err(|e| QueryError::Storage(e.to_string()))?;

        let conn = db.connect().map_err(|e| QueryError::Storage(e.to_string()))?;
        // `query` rather than `execute`: this PRAGMA returns a row.
        conn.query("PRAGMA journal_mode=WAL;", ())
            .await
            .map_err(|e| QueryError::Storage(e.to_string()))?;

        Ok(Self { db })
    }

    pub fn database(&self) -> Database {
        self.db.clone()
    }

    /// Test/setup helper: executes multiple semicolon-separated statements.
    pub async fn initialize_with_data(&self, init_sql: &str) -> Result<(), QueryError> {
        let conn = self.db.connect().map_err(|e| QueryError::Storage(e.to_string()))?;

        for statement in init_sql.split(';').filter(|s| !s.trim().is_empty()) {
            conn.execute(statement, ())
                .await
                .map_err(|e| QueryError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    async fn collect_rows(&self, sql: &str) -> Result<QueryRows, QueryError> {
        let conn = self.db.connect().map_err(|e| QueryError::Storage(e.to_string()))?;

        let mut stmt = conn
            .prepare(sql)
            .await
            .map_err(|e| QueryError::ExecutionFailed(e.to_string()))?;

        let columns: Vec<String> = stmt
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let mut rows = stmt
            .query(())
            .await
            .map_err(|e| QueryError::ExecutionFailed(e.to_string()))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| QueryError::ExecutionFailed(e.to_string()))?
        {
            let mut record = serde_json::Map::new();
            for (i, name) in columns.iter().enumerate() {
                let value = row
                    .get_value(i)
                    .map_err(|e| QueryError::ExecutionFailed(e.to_string()))?;
                record.insert(name.clone(), turso_value_to_json(value));
            }
            records.push(record);
        }

        Ok(QueryRows {
            columns,
            rows: records,
        })
    }
}

impl Debug for SqliteBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteBackend").finish_non_exhaustive()
    }
}

#[async_trait]
impl QueryBackend for SqliteBackend {
    fn name(&self) -> &str {
        "SQLite"
    }

    async fn run_query(&self, sql: &str) -> Result<QueryRows, QueryError> {
        debug!(sql = %sql, "--> executing query");
        self.collect_rows(sql).await
    }

    async fn explain(&self, sql: &str) -> Result<Vec<PlanRow>, QueryError> {
        let plan = self
            .collect_rows(&format!("EXPLAIN QUERY PLAN {sql}"))
            .await?;
        Ok(plan.rows)
    }
}

/// Converts a Turso value to a serde_json::Value.
fn turso_value_to_json(v: TursoValue) -> Value {
    match v {
        TursoValue::Null => Value::Null,
        TursoValue::Integer(i) => Value::Number(i.into()),
        TursoValue::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        TursoValue::Text(s) => Value::String(s),
        TursoValue::Blob(_) => Value::String("<blob>".to_string()),
    }
}
