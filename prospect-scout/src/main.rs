// Prospect scout command-line entry point.
//
// Every command loads config, opens the database, and prints its result as
// JSON on stdout. Logs go to a file so stdout stays machine-readable.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use prospect_scout::config;
use prospect_scout::db::Database;
use prospect_scout::engine::batch::{self, BatchReport};
use prospect_scout::engine::features::Mode;
use prospect_scout::engine::session::ScoutSession;
use prospect_scout::import;
use prospect_scout::model::PlayerId;

#[derive(Debug, Parser)]
#[command(name = "scout", version, about = "Baseball prospect scouting engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import players.csv and per-category stat files from a directory
    Import { dir: PathBuf },
    /// Learn per-level weights from the population
    Calibrate {
        /// Recompute even when calibrated weights are already stored
        #[arg(long)]
        force: bool,
    },
    /// Extract a player's feature vector
    Features {
        player_id: PlayerId,
        #[arg(long, default_value = "all")]
        mode: Mode,
        #[arg(long)]
        season: Option<i32>,
    },
    /// Find the most similar top-tier players
    Similar {
        player_id: PlayerId,
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Rate a player's tools, overall, and potential
    Rate { player_id: PlayerId },
    /// Project a player's career value
    Project { player_id: PlayerId },
    /// Store feature vectors for every player
    PopulateFeatures,
    /// Store rating profiles for every player
    PopulateRatings,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let config = config::load_config().context("failed to load configuration")?;
    let db = Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    let session = Arc::new(ScoutSession::new(db, config.engine));

    match cli.command {
        Command::Import { dir } => {
            let summary = import::import_dir(session.source(), &dir)
                .with_context(|| format!("failed to import {}", dir.display()))?;
            print_json(&summary)
        }
        Command::Calibrate { force } => print_json(&session.calibrate_levels(force)?),
        Command::Features {
            player_id,
            mode,
            season,
        } => print_json(&session.extract_features(player_id, mode, season)?),
        Command::Similar { player_id, k } => {
            let k = k.unwrap_or(session.config().similarity.default_k);
            print_json(&session.get_similar(player_id, k)?)
        }
        Command::Rate { player_id } => print_json(&session.rate(player_id)?),
        Command::Project { player_id } => print_json(&session.project_career(player_id)?),
        Command::PopulateFeatures => {
            let worker = Arc::clone(&session);
            let report = run_interruptible(move || Ok(worker.populate_features()?)).await?;
            print_json(&report)
        }
        Command::PopulateRatings => {
            let worker = Arc::clone(&session);
            let report = run_interruptible(move || Ok(worker.populate_ratings()?)).await?;
            print_json(&report)
        }
    }
}

/// Run a batch job off the async runtime, giving up on Ctrl+C. Rows already
/// written stay written; every write is idempotent so a rerun resumes cleanly.
async fn run_interruptible<F>(job: F) -> anyhow::Result<BatchReport>
where
    F: FnOnce() -> anyhow::Result<BatchReport> + Send + 'static,
{
    tokio::select! {
        report = batch::run_blocking(job) => report,
        _ = tokio::signal::ctrl_c() => {
            warn!("Batch job interrupted");
            anyhow::bail!("interrupted")
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{text}");
    Ok(())
}

/// Initialize tracing to log to a file under the platform data directory,
/// falling back to `./logs`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = match directories::ProjectDirs::from("", "", "prospect-scout") {
        Some(dirs) => dirs.data_local_dir().join("logs"),
        None => std::env::current_dir()?.join("logs"),
    };
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("scout.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("prospect_scout=info,scout=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
