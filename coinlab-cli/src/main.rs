//! CoinLab CLI: update, query and analysis commands.
//!
//! Commands:
//! - `update`: run the symbol → staleness → fill pipeline
//! - `search`, `history`, `metrics`, `status`: read persisted datasets
//! - `forecast`, `technical`, `sentiment`: analyze one entity
//! - `init-config`: write a config file with every default spelled out

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use coinlab_analysis::{
    AnalysisStrategy, ForecastConfig, ForecastStrategy, SentimentStrategy, TechnicalStrategy,
};
use coinlab_core::{
    Catalog, DatasetStore, ForceRefreshPolicy, Pipeline, PipelineConfig, PipelineError,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "coinlab",
    about = "CoinLab CLI: crypto market data ingestion and analysis"
)]
struct Cli {
    /// Pipeline config (TOML). Defaults apply to anything it leaves out.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh the symbol universe and fill stale datasets.
    Update {
        /// Fetch every entity regardless of its last stored date.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Find tracked entities by id, symbol or name.
    Search { term: String },
    /// Print an entity's daily history.
    History { id: String },
    /// Print an entity's metric snapshots.
    Metrics { id: String },
    /// Count persisted datasets.
    Status,
    /// Train a forecast model on an entity's history.
    Forecast {
        id: String,

        /// Training epochs.
        #[arg(long)]
        epochs: Option<usize>,

        /// RNG seed for weight init and shuffling.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Technical indicators for an entity.
    Technical { id: String },
    /// On-chain and social sentiment for an entity.
    Sentiment { id: String },
    /// Write the default config to PATH.
    InitConfig { path: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Update { force } => run_update(config, force),
        Commands::Search { term } => {
            let store = DatasetStore::new(&config.data_dir);
            print_json(&Catalog::open(&store).search(&term))
        }
        Commands::History { id } => {
            let store = DatasetStore::new(&config.data_dir);
            print_json(&Catalog::open(&store).history(&id))
        }
        Commands::Metrics { id } => {
            let store = DatasetStore::new(&config.data_dir);
            print_json(&Catalog::open(&store).metrics(&id))
        }
        Commands::Status => print_json(&DatasetStore::new(&config.data_dir).status()),
        Commands::Forecast { id, epochs, seed } => {
            let mut forecast = ForecastConfig::default();
            if let Some(epochs) = epochs {
                forecast = forecast.with_epochs(epochs);
            }
            if let Some(seed) = seed {
                forecast = forecast.with_seed(seed);
            }
            let store = DatasetStore::new(&config.data_dir);
            run_analysis(&ForecastStrategy::new(&store, forecast), &id)
        }
        Commands::Technical { id } => {
            let store = DatasetStore::new(&config.data_dir);
            run_analysis(&TechnicalStrategy::new(&store), &id)
        }
        Commands::Sentiment { id } => run_analysis(&SentimentStrategy::default(), &id),
        Commands::InitConfig { path } => run_init_config(&path),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn run_update(config: PipelineConfig, force: bool) -> Result<()> {
    let mut pipeline = Pipeline::from_config(config);
    if force {
        pipeline = pipeline.with_policy(Box::new(ForceRefreshPolicy));
    }

    match pipeline.run() {
        Ok(report) => {
            info!(
                succeeded = report.succeeded,
                processed = report.processed,
                "update finished"
            );
            print_json(&report)
        }
        Err(e @ PipelineError::SymbolUniverseUnavailable(_)) => {
            error!(error = %e, "update aborted");
            std::process::exit(1);
        }
    }
}

fn run_analysis(strategy: &dyn AnalysisStrategy, id: &str) -> Result<()> {
    let report = strategy
        .analyze(id)
        .with_context(|| format!("{} analysis of {id}", strategy.name()))?;
    print_json(&report)
}

fn run_init_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    let toml = PipelineConfig::default().to_toml()?;
    std::fs::write(path, toml).with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
