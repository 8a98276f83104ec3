//! Execution engine checks: validation gate, timeout budget, and plan
//! analysis, against both a real in-memory database and mock backends.

mod common;

use askdb::backend::QueryRows;
use askdb::errors::QueryError;
use askdb::executor::QueryExecutionEngine;
use askdb::validate::SqlSafetyValidator;
use common::{seeded_backend, setup_tracing, MockBackend};
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;

fn allowed() -> HashSet<String> {
    ["wp_users", "wp_posts"].iter().map(|s| s.to_string()).collect()
}

fn engine_with(backend: MockBackend, timeout: Duration) -> QueryExecutionEngine {
    let validator = SqlSafetyValidator::new(1000, "wp_").expect("validator patterns compile");
    QueryExecutionEngine::new(Box::new(backend), validator, timeout)
}

#[tokio::test]
async fn runs_a_validated_query_against_sqlite() {
    setup_tracing();
    let backend = seeded_backend().await;
    let validator = SqlSafetyValidator::new(1000, "wp_").expect("validator patterns compile");
    let engine =
        QueryExecutionEngine::new(Box::new(backend), validator, Duration::from_secs(30));

    let outcome = engine
        .execute("SELECT user_login FROM wp_users ORDER BY ID LIMIT 10", &allowed())
        .await;

    assert!(outcome.success, "{:?}", outcome.errors);
    assert_eq!(outcome.columns, vec!["user_login".to_string()]);
    assert_eq!(outcome.row_count, 2);
    assert_eq!(outcome.rows[0].get("user_login"), Some(&json!("alice")));
    assert_eq!(outcome.rows[1].get("user_login"), Some(&json!("bob")));
    assert!(outcome.elapsed_seconds >= 0.0);
}

#[tokio::test]
async fn rejected_sql_never_reaches_the_backend() {
    setup_tracing();
    let backend = MockBackend::new(QueryRows::default());
    let engine = engine_with(backend.clone(), Duration::from_secs(30));

    let outcome = engine
        .execute("DROP TABLE wp_users", &allowed())
        .await;

    assert!(!outcome.success);
    assert!(outcome
        .errors
        .iter()
        .any(|e| e.contains("Forbidden keyword detected: DROP")));
    assert_eq!(backend.call_count(), 0, "rejected SQL must not execute");
}

#[tokio::test]
async fn backend_receives_the_normalized_sql() {
    setup_tracing();
    let backend = MockBackend::new(QueryRows::default());
    let engine = engine_with(backend.clone(), Duration::from_secs(30));

    let outcome = engine.execute("SELECT * FROM wp_users", &allowed()).await;

    assert!(outcome.success, "{:?}", outcome.errors);
    let seen = backend.queries_seen.lock().unwrap();
    assert_eq!(seen.as_slice(), ["SELECT * FROM wp_users LIMIT 1000"]);
}

#[tokio::test]
async fn slow_queries_hit_the_timeout() {
    setup_tracing();
    let backend =
        MockBackend::new(QueryRows::default()).with_delay(Duration::from_millis(200));
    let engine = engine_with(backend, Duration::from_millis(50));

    let outcome = engine
        .execute("SELECT * FROM wp_users LIMIT 5", &allowed())
        .await;

    assert!(!outcome.success);
    assert!(
        outcome.errors.iter().any(|e| e.starts_with("Query timed out after")),
        "{:?}",
        outcome.errors
    );
}

#[tokio::test]
async fn execution_errors_become_failure_outcomes() {
    setup_tracing();
    let backend = seeded_backend().await;
    let validator = SqlSafetyValidator::new(1000, "wp_").expect("validator patterns compile");
    let engine =
        QueryExecutionEngine::new(Box::new(backend), validator, Duration::from_secs(30));

    let outcome = engine
        .execute("SELECT no_such_column FROM wp_users LIMIT 5", &allowed())
        .await;

    assert!(!outcome.success);
    assert!(!outcome.errors.is_empty());
}

#[tokio::test]
async fn validation_warnings_survive_into_the_outcome() {
    setup_tracing();
    let backend = MockBackend::new(QueryRows::default());
    let engine = engine_with(backend, Duration::from_secs(30));

    let outcome = engine
        .execute("SELECT * FROM wp_users LIMIT 50000", &allowed())
        .await;

    assert!(outcome.success, "{:?}", outcome.errors);
    assert!(outcome
        .warnings
        .iter()
        .any(|w| w == "LIMIT reduced to maximum 1000 rows."));
}

#[tokio::test]
async fn explain_rejects_invalid_sql() {
    setup_tracing();
    let backend = MockBackend::new(QueryRows::default());
    let engine = engine_with(backend, Duration::from_secs(30));

    let err = engine
        .explain("DELETE FROM wp_users", &allowed())
        .await
        .expect_err("invalid SQL must not be explained");

    assert!(matches!(err, QueryError::SqlRejected(_)));
}

#[tokio::test]
async fn explain_flags_sqlite_plan_smells() {
    setup_tracing();
    let plan_row = json!({
        "id": 2,
        "parent": 0,
        "detail": "SCAN wp_posts"
    });
    let serde_json::Value::Object(plan_row) = plan_row else {
        unreachable!()
    };
    let backend = MockBackend::new(QueryRows::default()).with_plan(vec![plan_row]);
    let engine = engine_with(backend, Duration::from_secs(30));

    let (plan, warnings) = engine
        .explain("SELECT * FROM wp_posts LIMIT 5", &allowed())
        .await
        .expect("plan");

    assert_eq!(plan.len(), 1);
    assert!(
        warnings.iter().any(|w| w.starts_with("Full table scan")),
        "expected a scan warning, got {warnings:?}"
    );
}

#[tokio::test]
async fn explain_flags_mysql_plan_smells() {
    setup_tracing();
    let plan_row = json!({
        "table": "wp_posts",
        "type": "ALL",
        "rows": 50000,
        "key": null,
        "possible_keys": "idx_status",
        "Extra": "Using filesort; Using temporary"
    });
    let serde_json::Value::Object(plan_row) = plan_row else {
        unreachable!()
    };
    let backend = MockBackend::new(QueryRows::default()).with_plan(vec![plan_row]);
    let engine = engine_with(backend, Duration::from_secs(30));

    let (_, warnings) = engine
        .explain("SELECT * FROM wp_posts LIMIT 5", &allowed())
        .await
        .expect("plan");

    assert!(warnings
        .iter()
        .any(|w| w == "Full table scan on wp_posts (50000 rows) - query may be slow"));
    assert!(warnings
        .iter()
        .any(|w| w == "No index used on wp_posts - consider adding index"));
    assert!(warnings
        .iter()
        .any(|w| w == "Using filesort - query may be slow for large datasets"));
    assert!(warnings
        .iter()
        .any(|w| w == "Using temporary table - query may be memory intensive"));
}
