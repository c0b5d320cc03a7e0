//! # ISSN Harvest CLI (`issn-harvest`)
//!
//! ## Usage
//!
//! ```bash
//! issn-harvest --config ./config/issn-harvest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `issn-harvest init` | Create the fact table and indexes |
//! | `issn-harvest run` | Ingest every ISSN in the input list once |
//! | `issn-harvest history <issn>` | Show stored snapshots for one ISSN |
//! | `issn-harvest stats` | Summarise the fact table |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `issn_harvest=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use issn_harvest::progress::ProgressMode;
use issn_harvest::{config, history, ingest, migrate, stats};

/// ISSN Harvest: incremental, fingerprint-deduplicated ingestion of journal
/// metadata from Crossref and OpenAlex.
#[derive(Parser)]
#[command(
    name = "issn-harvest",
    about = "ISSN Harvest: incremental ingestion of journal metadata keyed by ISSN",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// A missing file is an error; every key inside it has a default.
    #[arg(long, global = true, default_value = "./config/issn-harvest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the fact table. Idempotent.
    Init,

    /// Run one full ingestion pass.
    ///
    /// Looks every ISSN up in both providers, fingerprints the result, and
    /// appends a row dated today only when the fingerprint is new for that
    /// ISSN.
    Run {
        /// CSV file with an `issn` column. Overrides `ingest.input`.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Only process the first N ISSNs.
        #[arg(long)]
        limit: Option<usize>,

        /// Fetch and fingerprint, but write nothing.
        #[arg(long)]
        dry_run: bool,

        /// ISSNs per batch. Overrides `ingest.batch_size`.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Pause between batches, in seconds. Overrides `ingest.inter_chunk_delay_secs`.
        #[arg(long)]
        delay_secs: Option<u64>,

        /// Progress output on stderr. Defaults to `human` on a TTY, else `off`.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Show every stored snapshot for an ISSN.
    History {
        issn: String,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Summarise the fact table.
    Stats,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "issn_harvest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Fact table initialized successfully.");
        }
        Commands::Run {
            input,
            limit,
            dry_run,
            batch_size,
            delay_secs,
            progress,
        } => {
            ingest::run_ingest(
                &cfg,
                ingest::RunArgs {
                    input,
                    limit,
                    dry_run,
                    batch_size,
                    delay_secs,
                    progress,
                },
            )
            .await?;
        }
        Commands::History { issn, json } => {
            history::run_history(&cfg, &issn, json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
