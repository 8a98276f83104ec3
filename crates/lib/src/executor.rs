//! Query execution under a wall-clock budget.
//!
//! The engine never runs raw SQL: every query goes through the safety
//! validator first, and the database round-trip is bounded by a timeout
//! so a validator gap that admits an expensive query still cannot hang a
//! request. Execution failures come back as outcome values; nothing
//! escapes this boundary as a panic.

use crate::backend::{PlanRow, QueryBackend};
use crate::errors::QueryError;
use crate::types::ExecutionOutcome;
use crate::validate::SqlSafetyValidator;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Row threshold above which a full scan is worth flagging.
const LARGE_SCAN_ROWS: u64 = 10_000;

pub struct QueryExecutionEngine {
    backend: Box<dyn QueryBackend>,
    validator: SqlSafetyValidator,
    timeout: Duration,
}

impl QueryExecutionEngine {
    pub fn new(
        backend: Box<dyn QueryBackend>,
        validator: SqlSafetyValidator,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            validator,
            timeout,
        }
    }

    /// Validates and executes a SQL string.
    ///
    /// On rejection nothing is executed and the validator's errors are
    /// returned. A timed-out query surfaces as a normal failure outcome.
    pub async fn execute(&self, sql: &str, allowed_tables: &HashSet<String>) -> ExecutionOutcome {
        let validation = self.validator.validate(sql, allowed_tables);
        if !validation.accepted {
            warn!(errors = ?validation.errors, "rejected query, not executing");
            return ExecutionOutcome::failure(validation.errors, validation.warnings);
        }

        let start = Instant::now();
        let result = tokio::time::timeout(
            self.timeout,
            self.backend.run_query(&validation.normalized_sql),
        )
        .await;

        match result {
            Err(_) => ExecutionOutcome::failure(
                vec![format!(
                    "Query timed out after {} seconds",
                    self.timeout.as_secs_f64()
                )],
                validation.warnings,
            ),
            Ok(Err(e)) => ExecutionOutcome::failure(vec![e.to_string()], validation.warnings),
            Ok(Ok(result)) => {
                let elapsed = start.elapsed().as_secs_f64();
                info!(
                    rows = result.rows.len(),
                    elapsed_seconds = elapsed,
                    "query executed"
                );
                ExecutionOutcome {
                    success: true,
                    row_count: result.rows.len(),
                    columns: result.columns,
                    rows: result.rows,
                    elapsed_seconds: (elapsed * 10_000.0).round() / 10_000.0,
                    errors: Vec::new(),
                    warnings: validation.warnings,
                }
            }
        }
    }

    /// Runs the backend's query-plan facility on validated SQL and scans
    /// the plan for performance smells. Diagnostic only; never blocks
    /// execution.
    pub async fn explain(
        &self,
        sql: &str,
        allowed_tables: &HashSet<String>,
    ) -> Result<(Vec<PlanRow>, Vec<String>), QueryError> {
        let validation = self.validator.validate(sql, allowed_tables);
        if !validation.accepted {
            return Err(QueryError::SqlRejected(validation.errors));
        }

        let plan = self.backend.explain(&validation.normalized_sql).await?;
        let warnings = analyze_plan(&plan);
        Ok((plan, warnings))
    }
}

/// Scans query-plan rows for known performance smells, one warning per
/// finding. Handles both MySQL-style EXPLAIN columns and SQLite's
/// `EXPLAIN QUERY PLAN` detail strings.
fn analyze_plan(plan: &[PlanRow]) -> Vec<String> {
    let mut warnings = Vec::new();

    for row in plan {
        let table = row
            .get("table")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");

        // MySQL shape: type=ALL on a large table is a full scan.
        if row.get("type").and_then(|v| v.as_str()) == Some("ALL") {
            let rows = row.get("rows").and_then(|v| v.as_u64()).unwrap_or(0);
            if rows > LARGE_SCAN_ROWS {
                warnings.push(format!(
                    "Full table scan on {table} ({rows} rows) - query may be slow"
                ));
            }
        }

        if row.get("key").map(|v| v.is_null()).unwrap_or(false)
            && row.get("possible_keys").map(|v| !v.is_null()).unwrap_or(false)
        {
            warnings.push(format!("No index used on {table} - consider adding index"));
        }

        if let Some(extra) = row.get("Extra").and_then(|v| v.as_str()) {
            if extra.contains("Using filesort") {
                warnings.push("Using filesort - query may be slow for large datasets".to_string());
            }
            if extra.contains("Using temporary") {
                warnings
                    .push("Using temporary table - query may be memory intensive".to_string());
            }
        }

        // SQLite shape: a `detail` string per plan node.
        if let Some(detail) = row.get("detail").and_then(|v| v.as_str()) {
            if detail.starts_with("SCAN") && !detail.contains("USING INDEX") {
                warnings.push(format!("Full table scan ({detail}) - query may be slow"));
            }
            if detail.contains("USE TEMP B-TREE") {
                warnings.push(format!(
                    "Temporary b-tree ({detail}) - query may be memory intensive"
                ));
            }
        }
    }

    warnings
}
