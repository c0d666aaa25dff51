//! finquery command line interface
//!
//! Ask questions of the financial collections in plain English.
//!
//! # Usage
//!
//! ```bash
//! # One-shot query with summary
//! finquery_cli query "Show all transactions above \$1000"
//!
//! # Translate only, print the JSON query
//! finquery_cli translate --format json "ETFs with expense ratio under 0.1%"
//!
//! # Conversational session with one-turn memory
//! finquery_cli chat
//!
//! # What is in the store
//! finquery_cli collections --samples
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

use finquery::{schema_explorer, CollectionName, ConfigLoader, FinqueryConfig, QueryAgent};

#[derive(Parser)]
#[command(name = "finquery_cli")]
#[command(version = "0.1.0")]
#[command(about = "Natural-language queries over financial document collections")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: json or pretty (default)
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,

    /// Config file (overrides FINQUERY_CONFIG)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate, execute and summarize a question
    Query {
        /// The question
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Skip the summary completion
        #[arg(long)]
        no_summary: bool,
    },

    /// Translate a question without executing it
    Translate {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Interactive session that remembers the previous exchange
    Chat,

    /// List collections in the store
    Collections {
        /// Show one sample document per collection
        #[arg(long)]
        samples: bool,
    },

    /// Show which collection the keyword classifier picks
    Classify {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli.command, cli.format, cli.config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // One line, no partial output
            let message = format!("{:#}", e).replace('\n', " | ");
            eprintln!("{}: {}", "error".red().bold(), message);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, format: OutputFormat, config: Option<PathBuf>) -> Result<()> {
    match command {
        Commands::Classify { text } => cmd_classify(&text.join(" "), format),
        Commands::Query { text, no_summary } => {
            let (config, agent) = setup(config).await?;
            let summarize = !no_summary && config.agent.summarize;
            cmd_query(&agent, &text.join(" "), summarize, format).await
        }
        Commands::Translate { text } => {
            let (_, agent) = setup(config).await?;
            cmd_translate(&agent, &text.join(" "), format).await
        }
        Commands::Chat => {
            let (_, agent) = setup(config).await?;
            cmd_chat(&agent).await
        }
        Commands::Collections { samples } => {
            let (_, agent) = setup(config).await?;
            cmd_collections(&agent, samples, format).await
        }
    }
}

async fn setup(path: Option<PathBuf>) -> Result<(FinqueryConfig, QueryAgent)> {
    let config = ConfigLoader::load_with_path(path.as_deref())?;
    let agent = QueryAgent::from_config(&config).await?;
    Ok((config, agent))
}

// =============================================================================
// COMMANDS
// =============================================================================

async fn cmd_query(
    agent: &QueryAgent,
    text: &str,
    summarize: bool,
    format: OutputFormat,
) -> Result<()> {
    let response = agent.translate_and_execute_with(text, summarize).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        OutputFormat::Pretty => {
            println!("{} {}", "Collection:".bold(), response.collection.to_string().cyan());
            println!(
                "{} {}",
                "Query:".bold(),
                serde_json::Value::Object(response.query.clone())
            );
            println!(
                "{} {}",
                "Results:".bold(),
                response.results.len().to_string().green()
            );
            for doc in response.results.documents() {
                println!("  {}", doc);
            }
            if let Some(summary) = &response.summary {
                println!();
                println!("{}", "Summary".bold().underline());
                println!("{}", summary);
            }
        }
    }
    Ok(())
}

async fn cmd_translate(agent: &QueryAgent, text: &str, format: OutputFormat) -> Result<()> {
    let translated = agent.translate(text).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&translated)?),
        OutputFormat::Pretty => {
            println!("{} {}", "Collection:".bold(), translated.collection.to_string().cyan());
            println!(
                "{} {}",
                "Query:".bold(),
                serde_json::to_string_pretty(&translated.query)?
            );
        }
    }
    Ok(())
}

async fn cmd_chat(agent: &QueryAgent) -> Result<()> {
    use rustyline::error::ReadlineError;

    let mut rl = rustyline::DefaultEditor::new()
        .map_err(|e| anyhow::anyhow!("failed to init rustyline: {e}"))?;
    let session = agent.start_session().await;

    println!(
        "{}",
        "Ask about stocks, ETFs, customers, accounts or transactions. Ctrl-D to quit."
            .dimmed()
    );

    loop {
        let line = match rl.readline(&format!("{} ", "finquery>".green().bold())) {
            Ok(line) => line,
            Err(ReadlineError::Eof) => break,
            Err(ReadlineError::Interrupted) => continue,
            Err(e) => {
                agent.end_session(session).await;
                return Err(anyhow::anyhow!("readline error: {e}"));
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }
        let _ = rl.add_history_entry(line);

        // A failed turn is reported and the session continues
        match agent.converse(session, line).await {
            Ok(reply) => println!("{}\n", reply),
            Err(e) => {
                let message = e.to_string().replace('\n', " | ");
                eprintln!("{}: {}\n", "error".red().bold(), message);
            }
        }
    }

    agent.end_session(session).await;
    Ok(())
}

async fn cmd_collections(agent: &QueryAgent, samples: bool, format: OutputFormat) -> Result<()> {
    let store = agent.store().as_ref();

    if samples {
        let meta = schema_explorer::cache_metadata(store).await?;
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&meta)?),
            OutputFormat::Pretty => {
                for (name, sample) in &meta {
                    println!("{}", name.cyan().bold());
                    match sample {
                        Some(doc) => println!("  {}", doc),
                        None => println!("  {}", "(empty)".dimmed()),
                    }
                }
            }
        }
        return Ok(());
    }

    let names = schema_explorer::list_collections(store).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&names)?),
        OutputFormat::Pretty => {
            for name in names {
                let marker = if CollectionName::parse(&name).is_some() {
                    "✓".green()
                } else {
                    "·".dimmed()
                };
                println!("{} {}", marker, name);
            }
        }
    }
    Ok(())
}

fn cmd_classify(text: &str, format: OutputFormat) -> Result<()> {
    let collection = CollectionName::classify(text);
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "text": text, "collection": collection })
        ),
        OutputFormat::Pretty => println!("{}", collection.to_string().cyan()),
    }
    Ok(())
}
