//! # Contextual Retrieval CLI (`crag`)
//!
//! ## Usage
//!
//! ```bash
//! crag --config ./config/crag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `crag init` | Create the SQLite database and run schema migrations |
//! | `crag ingest <path>` | Contextualize, embed, and store a file or directory |
//! | `crag ask "<query>"` | Answer a question from the ingested documents |
//! | `crag search "<query>"` | Show the fused retrieval results for a query |
//! | `crag documents` | List ingested documents |
//! | `crag serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! crag init
//! crag ingest ./handbook.pdf --name "Employee handbook"
//! crag ingest ./docs/
//! crag ask "How many vacation days do new hires get?"
//! crag search "vacation policy" --limit 10
//! crag serve
//! ```

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use contextual_retrieval::{config, migrate, server, service};

/// Contextual Retrieval: document Q&A over contextualized chunks with
/// hybrid full-text and vector search.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/crag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "crag",
    about = "Contextual Retrieval: contextual chunk ingestion and hybrid question answering",
    version,
    long_about = "Every chunk of an uploaded document is situated within the whole document by a \
    chat model before it is embedded and indexed. Questions are answered from the reciprocal-rank \
    fusion of full-text and vector search results."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/crag.toml")]
    config: PathBuf,

    /// Increase log verbosity (`-v` info, `-vv` debug). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (documents, chunks, chunks_fts, embeddings).
    /// Safe to run repeatedly.
    Init,

    /// Ingest a file, or every file under a directory.
    ///
    /// Each chunk costs one chat completion and one embedding call. A
    /// document is stored only if all of its chunks succeed.
    Ingest {
        /// File or directory to ingest.
        path: PathBuf,

        /// Document name (single file only; defaults to the file name).
        #[arg(long)]
        name: Option<String>,
    },

    /// Answer a question from the ingested documents.
    Ask {
        /// The question.
        query: String,
    },

    /// Show fused retrieval results with scores and per-source ranks.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results (defaults to `[retrieval] top_k`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List ingested documents.
    Documents,

    /// Start the HTTP API.
    ///
    /// Binds to the address configured in `[server].bind`.
    Serve,
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { path, name } => {
            service::run_ingest(&cfg, &path, name).await?;
        }
        Commands::Ask { query } => {
            service::run_ask(&cfg, &query).await?;
        }
        Commands::Search { query, limit } => {
            service::run_search(&cfg, &query, limit).await?;
        }
        Commands::Documents => {
            service::run_documents(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
