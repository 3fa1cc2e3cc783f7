use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use mail_query::config::AppConfig;
use mail_query::error::IngestError;
use mail_query::ingest::{self, EmlDirSource, ImapSource, MailSource};
use mail_query::llm::{LlmConfig, create_provider};
use mail_query::query::{QueryOutcome, QueryProcessor};
use mail_query::render::{render_json, render_outcome};
use mail_query::store::{LibSqlBackend, RecordStore};

#[derive(Parser)]
#[command(name = "mail-query", version, about = "Ask questions about your mail in plain language")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Pull recent messages into the local database
    Fetch {
        /// Number of messages to fetch
        #[arg(long)]
        limit: Option<usize>,
        /// Import *.eml files from this directory instead of IMAP
        #[arg(long)]
        eml_dir: Option<PathBuf>,
    },
    /// Answer one question
    Query {
        question: String,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Read questions from stdin until /quit
    Repl,
    /// Show database location and record count
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("Invalid configuration")?;

    let store = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );

    match cli.command.unwrap_or(Command::Repl) {
        Command::Fetch { limit, eml_dir } => {
            let limit = limit.unwrap_or(config.fetch_limit);
            let source: Box<dyn MailSource> = match eml_dir {
                Some(dir) => Box::new(EmlDirSource::new(dir)),
                None => {
                    let imap = config.imap.clone().ok_or_else(|| IngestError::NotConfigured {
                        name: "imap".to_string(),
                        reason: "set EMAIL_IMAP_HOST or pass --eml-dir".to_string(),
                    })?;
                    Box::new(ImapSource::new(imap))
                }
            };
            let stored = ingest::ingest(source.as_ref(), store.as_ref(), limit).await?;
            if stored == 0 {
                println!("No emails found to fetch");
            } else {
                println!("Fetched and stored {stored} emails");
            }
        }
        Command::Query { question, json } => {
            let processor = build_processor(store)?;
            let outcome = processor.process_query(&question).await;
            print_outcome(&outcome, json)?;
            if !outcome.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Repl => {
            let processor = build_processor(store)?;
            run_repl(&processor).await?;
        }
        Command::Status => {
            println!("Database: {}", config.db_path.display());
            println!("Emails:   {}", store.count_records().await?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Model settings are only read here, so `fetch` and `status` run without an API key.
fn build_processor(store: Arc<LibSqlBackend>) -> anyhow::Result<QueryProcessor> {
    let llm_config = LlmConfig::from_env().context("Invalid model configuration")?;
    let llm = create_provider(&llm_config)?;
    Ok(QueryProcessor::new(llm, store))
}

fn print_outcome(outcome: &QueryOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", render_json(outcome)?);
    } else if outcome.is_success() {
        println!("{}", render_outcome(outcome));
    } else {
        eprintln!("{}", render_outcome(outcome));
    }
    Ok(())
}

async fn run_repl(processor: &QueryProcessor) -> anyhow::Result<()> {
    eprintln!("Ask about your emails (e.g. 'Show all emails from last week'). /quit to exit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprint!("> ");
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "/quit" || line == "/exit" {
            break;
        }
        if !line.is_empty() {
            let outcome = processor.process_query(line).await;
            print_outcome(&outcome, false)?;
            println!();
        }
        eprint!("> ");
    }
    Ok(())
}
