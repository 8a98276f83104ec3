//! Router fallback and response-parsing checks, driven by scripted
//! mock providers.

mod common;

use askdb::errors::{ProviderError, ProviderErrorCode, QueryError};
use askdb::prompt::PromptAssembler;
use askdb::router::CompletionRouter;
use askdb::types::{ChartHint, CompletionOptions};
use askdb::CompletionProvider;
use chrono::NaiveDate;
use common::{sample_schema, setup_tracing, MockProvider};

fn assembler() -> PromptAssembler {
    PromptAssembler::new("wp_", "UTC")
        .with_date(NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date"))
}

fn router(providers: Vec<Box<dyn CompletionProvider>>, default: &str) -> CompletionRouter {
    CompletionRouter::new(providers, default, assembler()).expect("router patterns compile")
}

const GOOD_REPLY: &str = r#"{
    "sql": "SELECT COUNT(*) AS total FROM wp_users LIMIT 1",
    "explanation": "Counts all users",
    "columns": ["total"],
    "chartType": "none"
}"#;

#[tokio::test]
async fn happy_path_parses_a_full_candidate() {
    setup_tracing();
    let primary = MockProvider::new("openai", vec![Ok(GOOD_REPLY.to_string())]);
    let r = router(vec![Box::new(primary.clone())], "openai");

    let candidate = r
        .generate("How many users?", &sample_schema(), &[], &CompletionOptions::default())
        .await
        .expect("candidate");

    assert_eq!(candidate.sql, "SELECT COUNT(*) AS total FROM wp_users LIMIT 1");
    assert_eq!(candidate.explanation, "Counts all users");
    assert_eq!(candidate.expected_columns, vec!["total".to_string()]);
    assert_eq!(candidate.chart_hint, ChartHint::None);
    assert_eq!(candidate.provider_used, "openai");
    assert_eq!(primary.call_count(), 1);
}

#[tokio::test]
async fn recoverable_failure_falls_back_in_registration_order() {
    setup_tracing();
    let primary = MockProvider::new(
        "openai",
        vec![Err(ProviderError::new(
            "openai",
            ProviderErrorCode::RateLimited,
            "rate limit exceeded",
        ))],
    );
    let secondary = MockProvider::new("anthropic", vec![Ok(GOOD_REPLY.to_string())]);
    let r = router(
        vec![Box::new(primary.clone()), Box::new(secondary.clone())],
        "openai",
    );

    let candidate = r
        .generate("How many users?", &sample_schema(), &[], &CompletionOptions::default())
        .await
        .expect("fallback candidate");

    assert_eq!(candidate.provider_used, "anthropic");
    assert_eq!(primary.call_count(), 1);
    assert_eq!(secondary.call_count(), 1);
}

#[tokio::test]
async fn auth_failure_is_terminal() {
    setup_tracing();
    let primary = MockProvider::new(
        "openai",
        vec![Err(ProviderError::new(
            "openai",
            ProviderErrorCode::AuthError,
            "invalid API key",
        ))],
    );
    let secondary = MockProvider::new("anthropic", vec![Ok(GOOD_REPLY.to_string())]);
    let r = router(
        vec![Box::new(primary.clone()), Box::new(secondary.clone())],
        "openai",
    );

    let err = r
        .generate("How many users?", &sample_schema(), &[], &CompletionOptions::default())
        .await
        .expect_err("auth errors must not fall back");

    assert!(matches!(err, QueryError::Provider(ref e) if e.is_auth_error()));
    assert_eq!(secondary.call_count(), 0);
}

#[tokio::test]
async fn all_failures_surface_as_all_providers_failed() {
    setup_tracing();
    let failing = |name: &str| {
        MockProvider::new(
            name,
            vec![Err(ProviderError::new(
                name,
                ProviderErrorCode::RequestFailed,
                "boom",
            ))],
        )
    };
    let r = router(
        vec![Box::new(failing("openai")), Box::new(failing("anthropic"))],
        "openai",
    );

    let err = r
        .generate("How many users?", &sample_schema(), &[], &CompletionOptions::default())
        .await
        .expect_err("both providers down");

    assert!(matches!(err, QueryError::AllProvidersFailed));
}

#[tokio::test]
async fn unconfigured_providers_are_skipped_during_fallback() {
    setup_tracing();
    let primary = MockProvider::new(
        "openai",
        vec![Err(ProviderError::new(
            "openai",
            ProviderErrorCode::RequestFailed,
            "boom",
        ))],
    );
    let dormant = MockProvider::unconfigured("anthropic");
    let third = MockProvider::new("local", vec![Ok(GOOD_REPLY.to_string())]);
    let r = router(
        vec![
            Box::new(primary),
            Box::new(dormant.clone()),
            Box::new(third.clone()),
        ],
        "openai",
    );

    let candidate = r
        .generate("How many users?", &sample_schema(), &[], &CompletionOptions::default())
        .await
        .expect("third provider answers");

    assert_eq!(candidate.provider_used, "local");
    assert_eq!(dormant.call_count(), 0);
    assert_eq!(third.call_count(), 1);
}

#[tokio::test]
async fn options_provider_overrides_the_default() {
    setup_tracing();
    let first = MockProvider::new("openai", vec![Ok(GOOD_REPLY.to_string())]);
    let second = MockProvider::new("anthropic", vec![Ok(GOOD_REPLY.to_string())]);
    let r = router(
        vec![Box::new(first.clone()), Box::new(second.clone())],
        "openai",
    );

    let options = CompletionOptions {
        provider: Some("anthropic".to_string()),
        ..Default::default()
    };
    let candidate = r
        .generate("How many users?", &sample_schema(), &[], &options)
        .await
        .expect("candidate");

    assert_eq!(candidate.provider_used, "anthropic");
    assert_eq!(first.call_count(), 0);
    assert_eq!(second.call_count(), 1);
}

#[tokio::test]
async fn fenced_json_replies_are_unwrapped() {
    setup_tracing();
    let fenced = format!("```json\n{GOOD_REPLY}\n```");
    let primary = MockProvider::new("openai", vec![Ok(fenced)]);
    let r = router(vec![Box::new(primary)], "openai");

    let candidate = r
        .generate("How many users?", &sample_schema(), &[], &CompletionOptions::default())
        .await
        .expect("candidate");

    assert_eq!(candidate.sql, "SELECT COUNT(*) AS total FROM wp_users LIMIT 1");
}

#[tokio::test]
async fn bare_select_text_is_extracted_as_a_last_resort() {
    setup_tracing();
    let chatty = "Here is your query:\nSELECT ID FROM wp_users LIMIT 10";
    let primary = MockProvider::new("openai", vec![Ok(chatty.to_string())]);
    let r = router(vec![Box::new(primary)], "openai");

    let candidate = r
        .generate("List users", &sample_schema(), &[], &CompletionOptions::default())
        .await
        .expect("extracted candidate");

    assert_eq!(candidate.sql, "SELECT ID FROM wp_users LIMIT 10");
    assert_eq!(candidate.explanation, "Query extracted from response");
    assert_eq!(candidate.chart_hint, ChartHint::Table);
}

#[tokio::test]
async fn unparseable_reply_is_malformed_and_terminal() {
    setup_tracing();
    let primary = MockProvider::new("openai", vec![Ok("I cannot help with that.".to_string())]);
    let fallback = MockProvider::new("anthropic", vec![Ok(GOOD_REPLY.to_string())]);
    let r = router(
        vec![Box::new(primary), Box::new(fallback.clone())],
        "openai",
    );

    let err = r
        .generate("List users", &sample_schema(), &[], &CompletionOptions::default())
        .await
        .expect_err("no SQL anywhere in the reply");

    assert!(matches!(err, QueryError::ResponseMalformed(ref m) if m.contains("invalid JSON")));
    assert_eq!(fallback.call_count(), 0, "parse failures must not fall back");
}

#[tokio::test]
async fn json_without_sql_is_malformed() {
    setup_tracing();
    let primary = MockProvider::new(
        "openai",
        vec![Ok(r#"{"explanation": "no can do", "columns": []}"#.to_string())],
    );
    let r = router(vec![Box::new(primary)], "openai");

    let err = r
        .generate("List users", &sample_schema(), &[], &CompletionOptions::default())
        .await
        .expect_err("sql field missing");

    assert!(matches!(err, QueryError::ResponseMalformed(ref m) if m.contains("no SQL query")));
}

#[tokio::test]
async fn unknown_chart_type_defaults_to_table() {
    setup_tracing();
    let reply = r#"{"sql": "SELECT 1 LIMIT 1", "chartType": "hologram"}"#;
    let primary = MockProvider::new("openai", vec![Ok(reply.to_string())]);
    let r = router(vec![Box::new(primary)], "openai");

    let candidate = r
        .generate("Anything", &sample_schema(), &[], &CompletionOptions::default())
        .await
        .expect("candidate");

    assert_eq!(candidate.chart_hint, ChartHint::Table);
}

#[test]
fn provider_status_reflects_registration_order() {
    setup_tracing();
    let r = router(
        vec![
            Box::new(MockProvider::new("openai", Vec::new())),
            Box::new(MockProvider::unconfigured("anthropic")),
        ],
        "openai",
    );

    let status = r.provider_status();
    assert_eq!(status.len(), 2);
    assert_eq!(status[0].name, "openai");
    assert!(status[0].configured);
    assert_eq!(status[1].name, "anthropic");
    assert!(!status[1].configured);
    assert!(r.has_configured_provider());
}
