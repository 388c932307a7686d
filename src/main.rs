//! # GitSage CLI (`gitsage`)
//!
//! ## Usage
//!
//! ```bash
//! gitsage --config ./config/gitsage.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gitsage init` | Create the SQLite database and run schema migrations |
//! | `gitsage ingest <path-or-url>` | Chunk, embed and index a repository |
//! | `gitsage search "<query>"` | Ranked retrieval across code and text |
//! | `gitsage ask --repo <r> "<question>"` | Answer a question about a repository |
//! | `gitsage docs --repo <r>` | Generate Markdown documentation |
//! | `gitsage compare <a> <b>` | Compare two ingested repositories |
//! | `gitsage stats` | Show what is indexed |
//!
//! Logs go to stderr; set `RUST_LOG=debug` to see per-file decisions.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use gitsage::app::{resolve_repo, App};
use gitsage::{ask, compare, config, docs, ingest, migrate, search, stats};

/// GitSage: ask questions about a code repository.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/gitsage.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "gitsage",
    about = "GitSage — repository ingestion and retrieval for code-aware question answering",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "./config/gitsage.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    Init,

    /// Ingest a repository from a local directory or a git URL.
    Ingest {
        /// Local directory or remote git URL.
        target: String,

        /// Repository identity to store chunks under (defaults to the target).
        #[arg(long)]
        repo: Option<String>,

        /// Content version for local directories (defaults to a listing digest).
        #[arg(long)]
        version: Option<String>,
    },

    /// Retrieve the chunks most relevant to a query.
    Search {
        query: String,

        /// Restrict results to one repository.
        #[arg(long)]
        repo: Option<String>,

        /// Maximum number of results (defaults to `retrieval.top_k`).
        #[arg(long)]
        limit: Option<usize>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Answer a question about an ingested repository.
    Ask {
        question: String,

        #[arg(long)]
        repo: String,

        /// Require this exact content version to be ingested.
        #[arg(long)]
        version: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Generate documentation for an ingested repository.
    Docs {
        #[arg(long)]
        repo: String,

        /// Write Markdown to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Compare two ingested repositories.
    Compare {
        repo_a: String,
        repo_b: String,

        #[arg(long)]
        json: bool,
    },

    /// Show database statistics.
    Stats,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    if let Commands::Init = cli.command {
        migrate::run_migrations(&cfg).await?;
        println!("Database initialized successfully.");
        return Ok(());
    }

    let app = App::open(cfg).await?;
    let result = run(&app, cli.command).await;
    app.close().await;
    result
}

async fn run(app: &App, command: Commands) -> Result<()> {
    match command {
        Commands::Init => Ok(()),
        Commands::Ingest {
            target,
            repo,
            version,
        } => ingest::run_ingest(app, &target, repo.as_deref(), version).await,
        Commands::Search {
            query,
            repo,
            limit,
            json,
        } => {
            let repo = repo.as_deref().map(resolve_repo).transpose()?;
            search::run_search(app, &query, repo.as_ref(), limit, json).await
        }
        Commands::Ask {
            question,
            repo,
            version,
            json,
        } => {
            let repo = resolve_repo(&repo)?;
            ask::run_ask(app, &repo, &question, version.as_deref(), json).await
        }
        Commands::Docs { repo, output } => {
            let repo = resolve_repo(&repo)?;
            docs::run_docs(app, &repo, output.as_deref()).await
        }
        Commands::Compare {
            repo_a,
            repo_b,
            json,
        } => {
            let a = resolve_repo(&repo_a)?;
            let b = resolve_repo(&repo_b)?;
            compare::run_compare(app, &a, &b, json).await
        }
        Commands::Stats => stats::run_stats(app).await,
    }
}
