//! # Analyst Harness CLI (`analyst`)
//!
//! Loads datasets and documents into memory and answers routed queries,
//! either one-shot from the command line or through the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! analyst --config ./config/analyst.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `analyst serve` | Start the HTTP API |
//! | `analyst ask "<query>" --file F...` | Load files, route and answer one query |
//! | `analyst classify "<query>"` | Show how a query would be routed |
//! | `analyst profile <FILE>` | Column profile of a CSV/XLSX file |
//! | `analyst inspect <FILE>` | Title, summary, keywords of a document |
//! | `analyst search "<query>" --file F...` | Rank document chunks |
//!
//! ## Examples
//!
//! ```bash
//! analyst ask "top 3 by Revenue in sales.csv" --file ./sales.csv
//! analyst classify "summarize the paper" --documents
//! analyst search "attention heads" --file paper.pdf --top-k 3
//! RUST_LOG=debug analyst serve
//! ```

use analyst_harness::config::{self, Config};
use analyst_harness::document::DocumentAnalyzer;
use analyst_harness::orchestrator::Orchestrator;
use analyst_harness::router::{self, QueryContext};
use analyst_harness::server;
use analyst_harness::tabular::TabularAnalyzer;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Analyst Harness: route questions to a tabular or a document analyzer.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "analyst",
    about = "Analyst Harness: a local-first query router over tabular datasets and documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/analyst.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Load files, then route and answer a single query.
    ///
    /// The routing context lists whatever the loaded files produced.
    Ask {
        query: String,

        /// Files to load first (.csv, .xlsx, .pdf, .txt, .md). Repeatable.
        #[arg(long = "file")]
        files: Vec<PathBuf>,

        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Classify a query without running it.
    Classify {
        query: String,

        /// Pretend at least one dataset is loaded.
        #[arg(long)]
        datasets: bool,

        /// Pretend at least one document is loaded.
        #[arg(long)]
        documents: bool,
    },

    /// Print the column profile of a CSV/XLSX file as JSON.
    Profile { file: PathBuf },

    /// Print title, summary, keywords and sample chunks of a document as JSON.
    Inspect { file: PathBuf },

    /// Search document chunks by semantic similarity.
    Search {
        query: String,

        /// Documents to load and search. Repeatable.
        #[arg(long = "file", required = true)]
        files: Vec<PathBuf>,

        /// Maximum number of results to return.
        #[arg(long)]
        top_k: Option<usize>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Classification needs no analyzers and no config.
    if let Commands::Classify {
        query,
        datasets,
        documents,
    } = &cli.command
    {
        let context = QueryContext {
            loaded_datasets: placeholder(*datasets),
            loaded_documents: placeholder(*documents),
            ..Default::default()
        };
        let c = router::classify(query, &context);
        println!("query_type:  {}", c.query_type.as_str());
        println!("confidence:  {:.2}", c.confidence);
        println!("reasoning:   {}", c.reasoning);
        return Ok(());
    }

    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve => run_serve(&cfg)?,
        Commands::Ask { query, files, json } => {
            let orchestrator = Orchestrator::new(&cfg)?;
            for file in &files {
                let loaded = orchestrator
                    .load_file(file)
                    .with_context(|| format!("Failed to load {}", file.display()))?;
                eprintln!("{}", loaded.message);
            }
            let context = orchestrator.current_context();
            let response = orchestrator.process_query(&query, Some(&context));
            if json {
                print_json(&response)?;
            } else {
                println!("{}", response.message);
                println!(
                    "[{} via {}, confidence {:.2}]",
                    response.routing.query_type.as_str(),
                    response.routing.agent_used,
                    response.routing.confidence
                );
            }
            if !response.success {
                std::process::exit(1);
            }
        }
        Commands::Profile { file } => {
            let analyzer = TabularAnalyzer::new();
            let loaded = analyzer
                .load_file(&file)
                .with_context(|| format!("Failed to load {}", file.display()))?;
            print_json(&loaded.info)?;
        }
        Commands::Inspect { file } => {
            let analyzer = DocumentAnalyzer::new(&cfg)?;
            let name = load_document(&analyzer, &file)?;
            print_json(&analyzer.info(&name)?)?;
        }
        Commands::Search {
            query,
            files,
            top_k,
        } => {
            let analyzer = DocumentAnalyzer::new(&cfg)?;
            for file in &files {
                load_document(&analyzer, file)?;
            }
            let results = analyzer.search(&query, top_k)?;
            if results.results.is_empty() {
                println!("No results.");
            }
            for (i, hit) in results.results.iter().enumerate() {
                println!(
                    "{}. [{:.3}] {} #{}",
                    i + 1,
                    hit.score,
                    hit.document,
                    hit.chunk_id
                );
                println!("    {}", hit.text);
            }
        }
        Commands::Classify { .. } => unreachable!("handled before config loading"),
    }

    Ok(())
}

/// Builds the orchestrator outside the runtime (remote embedding clients are
/// blocking) and serves until terminated.
fn run_serve(cfg: &Config) -> anyhow::Result<()> {
    let orchestrator = Arc::new(Orchestrator::new(cfg)?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(server::run_server(cfg, orchestrator.clone()))?;
    drop(runtime);
    drop(orchestrator);
    Ok(())
}

fn load_document(analyzer: &DocumentAnalyzer, file: &Path) -> anyhow::Result<String> {
    let loaded = analyzer
        .load_file(file)
        .with_context(|| format!("Failed to load {}", file.display()))?;
    eprintln!("{}", loaded.message);
    Ok(loaded.info.file_name)
}

fn placeholder(loaded: bool) -> Vec<String> {
    if loaded {
        vec!["(loaded)".to_string()]
    } else {
        Vec::new()
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
