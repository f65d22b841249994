//! # Counsel Harness CLI (`counsel`)
//!
//! The `counsel` binary is the operational interface for the answering
//! core. It provides commands for database initialization, retrieval
//! debugging, corpus validation, and starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! counsel --config ./config/counsel.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `counsel init` | Create the SQLite database and run schema migrations |
//! | `counsel search "<query>"` | Run a one-off retrieval against the corpus |
//! | `counsel refresh` | Rebuild the index from the corpus and report its size |
//! | `counsel serve` | Start the HTTP server |

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use counsel_harness::config::load_config;
use counsel_harness::db;
use counsel_harness::index::Bm25Params;
use counsel_harness::knowledge::{KnowledgeBase, SqliteCorpusSource};
use counsel_harness::migrate::run_migrations;
use counsel_harness::retrieve::retrieve;
use counsel_harness::server::run_server;
use counsel_harness::tokenize::SyllableTokenizer;

/// Counsel Harness — a retrieval-augmented legal answering core.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/counsel.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "counsel",
    about = "Counsel Harness — a retrieval-augmented legal answering core",
    version,
    long_about = "Counsel Harness maintains a BM25 index over a law-article corpus and serves \
    streamed, integrity-stamped answers assembled from retrieved passages, conversation memory, \
    and a completion provider."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/counsel.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `law_articles` and
    /// `messages` tables. Idempotent — running it multiple times is safe.
    Init,

    /// Run a one-off retrieval against the current corpus.
    ///
    /// Builds an index snapshot from the `law_articles` table and prints
    /// the top-k documents with scores. Useful for inspecting ranking
    /// without a running server.
    Search {
        /// The query string.
        query: String,

        /// Number of results to return.
        #[arg(long, default_value_t = 3)]
        k: usize,
    },

    /// Rebuild the index from the corpus and report its size.
    ///
    /// Validates that the corpus store is readable and contains indexable
    /// documents. The running server's own `/knowledge/refresh` endpoint is
    /// the trigger that actually swaps its live snapshot.
    Refresh,

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "counsel_harness=info,counsel=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            run_migrations(&config).await?;
            println!("Database initialized at {}", config.db.path.display());
        }

        Commands::Search { query, k } => {
            let knowledge = build_knowledge(&config).await?;
            knowledge.refresh().await?;
            let snapshot = knowledge.snapshot();
            let hits = retrieve(&snapshot, &SyllableTokenizer, &query, k);

            if hits.is_empty() {
                println!("No results.");
                return Ok(());
            }

            for (i, hit) in hits.iter().enumerate() {
                let title = hit.document.title.as_deref().unwrap_or("(untitled)");
                let excerpt: String = hit.document.text.chars().take(160).collect();
                println!("{}. [{:.3}] {}", i + 1, hit.score, title);
                println!("    excerpt: \"{}\"", excerpt.replace('\n', " "));
                println!("    id: {}", hit.document.id);
                println!();
            }
        }

        Commands::Refresh => {
            let knowledge = build_knowledge(&config).await?;
            let outcome = knowledge.refresh().await?;
            println!("Indexed {} documents.", outcome.documents);
        }

        Commands::Serve => {
            run_server(&config).await?;
        }
    }

    Ok(())
}

async fn build_knowledge(
    config: &counsel_harness::config::Config,
) -> anyhow::Result<KnowledgeBase> {
    let pool = db::connect(&config.db).await?;
    Ok(KnowledgeBase::new(
        Arc::new(SqliteCorpusSource::new(pool)),
        Arc::new(SyllableTokenizer),
        Bm25Params {
            k1: config.retrieval.bm25_k1,
            b: config.retrieval.bm25_b,
        },
    ))
}
