//! seatpland — the seatplan daemon.
//!
//! Single binary over the assignment engine:
//! - `serve`: REST API (runs, previews, read models)
//! - `run`: one assignment run for an exam year, report on stdout
//! - `preview`: the plan a run would commit, nothing written
//! - `import`: load a JSON snapshot of geography, centers, schools and roster
//!
//! # Usage
//!
//! ```text
//! seatpland --config /etc/seatplan/seatplan.toml serve --port 8480
//! seatpland run --year 2025
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use seatplan_core::{LogFormat, LoggingConfig, SeatplanConfig};
use seatplan_engine::{AssignmentEngine, AssignmentReport, RunOptions};
use seatplan_state::{ExamYearId, Snapshot, StateStore};

#[derive(Parser)]
#[command(name = "seatpland", about = "Examination center assignment daemon")]
struct Cli {
    /// Path to seatplan.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for persistent state (overrides the config file).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the REST API.
    Serve {
        /// Port to listen on (overrides the config file).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Assign every pending school of an exam year.
    Run {
        #[arg(long)]
        year: ExamYearId,

        /// Re-report skips already recorded by an earlier run.
        #[arg(long)]
        include_known_skips: bool,
    },
    /// Show the plan a run would commit without writing anything.
    Preview {
        #[arg(long)]
        year: ExamYearId,
    },
    /// Import a JSON snapshot into the store.
    Import {
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = SeatplanConfig::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }

    init_tracing(&config.logging)?;

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
        Command::Run {
            year,
            include_known_skips,
        } => {
            let engine = open_engine(&config)?;
            let options = RunOptions {
                include_known_skips,
            };
            let report = engine
                .run_with_timeout(year, options, config.engine.run_timeout())
                .await?;
            print_report(&report)
        }
        Command::Preview { year } => {
            let engine = open_engine(&config)?;
            let report = engine.preview_blocking(year).await?;
            print_report(&report)
        }
        Command::Import { file } => import(&config, &file),
    }
}

fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.filter)
            .with_context(|| format!("invalid log filter {:?}", logging.filter))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

fn open_store(config: &SeatplanConfig) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(&config.storage.data_dir).with_context(|| {
        format!("creating data dir {}", config.storage.data_dir.display())
    })?;
    let db_path = config.storage.db_path();
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");
    Ok(store)
}

fn open_engine(config: &SeatplanConfig) -> anyhow::Result<AssignmentEngine> {
    Ok(AssignmentEngine::with_stored_roster(open_store(config)?))
}

fn print_report(report: &AssignmentReport) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn import(config: &SeatplanConfig, file: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("reading snapshot {}", file.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&content)
        .with_context(|| format!("parsing snapshot {}", file.display()))?;

    let store = open_store(config)?;
    let summary = store.import_snapshot(&snapshot)?;
    info!(
        regions = summary.regions,
        clusters = summary.clusters,
        centers = summary.centers,
        schools = summary.schools,
        roster = summary.roster,
        "snapshot imported"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn serve(config: SeatplanConfig) -> anyhow::Result<()> {
    info!("seatplan daemon starting");

    let engine = open_engine(&config)?;
    let router = seatplan_api::build_router(engine, config.engine.run_timeout());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("seatplan daemon stopped");
    Ok(())
}
