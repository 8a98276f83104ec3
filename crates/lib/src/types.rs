use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A column descriptor inside a [`SchemaSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// The column type as reported by the database (e.g. `INTEGER`, `TEXT`).
    pub sql_type: String,
    pub nullable: bool,
    /// Key marker such as `PRI`, or empty when the column is not indexed.
    pub key: String,
}

/// A table descriptor inside a [`SchemaSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    /// Approximate row count, used only to give the model a sense of scale.
    pub row_count: u64,
    pub description: String,
}

/// The enumerated set of accessible tables, columns and row counts.
///
/// Used both to prompt the completion provider and to allowlist-check the
/// SQL it produces. Treated as read-only; refreshes replace the whole
/// snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: Vec<TableInfo>,
}

impl SchemaSnapshot {
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }
}

/// Rendering hint attached to a generated query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartHint {
    Table,
    Bar,
    Line,
    Pie,
    None,
}

impl ChartHint {
    /// Parses a provider-supplied hint, defaulting to `table` for anything
    /// unrecognized.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "bar" => Self::Bar,
            "line" => Self::Line,
            "pie" => Self::Pie,
            "none" => Self::None,
            _ => Self::Table,
        }
    }
}

impl Default for ChartHint {
    fn default() -> Self {
        Self::Table
    }
}

/// A SQL query produced by a completion provider.
///
/// A candidate is never executed directly; it must pass the safety
/// validator first.
#[derive(Debug, Clone)]
pub struct SqlCandidate {
    pub sql: String,
    pub explanation: String,
    pub expected_columns: Vec<String>,
    pub chart_hint: ChartHint,
    /// Name of the provider that produced this candidate, which may differ
    /// from the primary when fallback kicked in.
    pub provider_used: String,
}

/// Result of running a raw SQL string through the safety validator.
///
/// When `accepted` is true, `normalized_sql` starts with `SELECT`, contains
/// no forbidden keyword, and carries an explicit `LIMIT` at or below the
/// configured maximum. `normalized_sql` reflects comment removal and LIMIT
/// rewriting even on rejection, for diagnostics.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub accepted: bool,
    pub normalized_sql: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Result of executing a validated query.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub rows: Vec<serde_json::Map<String, Value>>,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub elapsed_seconds: f64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ExecutionOutcome {
    pub fn failure(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            success: false,
            rows: Vec::new(),
            columns: Vec::new(),
            row_count: 0,
            elapsed_seconds: 0.0,
            errors,
            warnings,
        }
    }
}

/// Per-request knobs forwarded to the completion provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionOptions {
    /// Provider name override; the configured default is used when absent.
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// A model a provider can serve, for display in settings surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub cost: String,
}

impl ModelInfo {
    pub fn new(id: &str, name: &str, description: &str, cost: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            cost: cost.to_string(),
        }
    }
}

/// The shape handed back to whatever transport fronts the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<serde_json::Map<String, Value>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<ChartHint>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl QueryResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            columns: None,
            row_count: None,
            execution_time: None,
            sql: None,
            explanation: None,
            chart_type: None,
            warnings: Vec::new(),
            message: Some(message.into()),
        }
    }
}
