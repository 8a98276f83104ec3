//! Command-line front end for the askdb pipeline.
//!
//! Thin transport layer only: parses arguments, wires the pipeline from
//! environment configuration, and prints results as JSON.

use anyhow::{Context, Result};
use askdb::{
    providers_from_config, Config, QueryPipeline, QueryResponse, SqliteBackend, SqliteCatalog,
};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// The quota identity used for all CLI invocations.
const CLI_USER: &str = "cli";

#[derive(Parser)]
#[command(name = "askdb", about = "Ask your database questions in plain language")]
struct Cli {
    /// Path to the SQLite database (overrides ASKDB_DB).
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a natural-language question.
    Ask {
        question: String,
        /// Provider to try first (e.g. "openai", "anthropic").
        #[arg(long)]
        provider: Option<String>,
        /// Model override forwarded to the provider.
        #[arg(long)]
        model: Option<String>,
    },
    /// Execute a previously generated SQL query. The safety validator
    /// still applies.
    Exec { sql: String },
    /// Print the discovered schema snapshot.
    Schema,
    /// List registered providers and their configuration state.
    Providers,
    /// Show starter questions for the detected integrations.
    Suggest,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    let config = Arc::new(config);

    let backend = SqliteBackend::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open database at {}", config.db_path))?;
    let catalog = SqliteCatalog::new(backend.database(), &config.table_prefix);

    let mut builder = QueryPipeline::builder()
        .catalog(Box::new(catalog))
        .backend(Box::new(backend))
        .config(config.clone());
    for provider in providers_from_config(&config)? {
        builder = builder.provider(provider);
    }
    let pipeline = builder.build()?;

    match cli.command {
        Command::Ask {
            question,
            provider,
            model,
        } => {
            let options = askdb::CompletionOptions {
                provider,
                model,
                ..Default::default()
            };
            let response = pipeline
                .process_query_with_options(CLI_USER, &question, &options)
                .await;
            print_response(&response)?;
        }
        Command::Exec { sql } => {
            let response = pipeline.execute_raw(&sql).await;
            print_response(&response)?;
        }
        Command::Schema => {
            let schema = pipeline.catalog().schema().await?;
            println!("{}", serde_json::to_string_pretty(schema.as_ref())?);
        }
        Command::Providers => {
            for status in pipeline.provider_status() {
                let state = if status.configured {
                    "configured"
                } else {
                    "not configured"
                };
                println!("{} ({state})", status.name);
                for model in status.models {
                    println!("  {} - {} [{}]", model.id, model.description, model.cost);
                }
            }
        }
        Command::Suggest => {
            for suggestion in pipeline.suggestions().await {
                println!("- {suggestion}");
            }
        }
    }

    Ok(())
}

fn print_response(response: &QueryResponse) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(response)?);
    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}
