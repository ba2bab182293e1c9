use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cyboair_esg_engine::{
    aggregate_period, aggregate_periods, compute_trend, safety::compute_trir_with_base, summarize,
    EngineConfig, InMemoryRecordStore, PeriodKey, ProjectId, RawActivityEntry,
};

#[derive(Debug, Parser)]
#[command(name = "cyboair-esg", about = "Scope 1/2/3 accounting over site activity logs")]
struct Cli {
    /// JSON engine config; defaults apply to any key it leaves out.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Aggregate one period's raw entries (a JSON array).
    Aggregate {
        #[arg(long)]
        entries: PathBuf,
        #[arg(long)]
        period: PeriodKey,
        #[arg(long)]
        project: ProjectId,
    },
    /// Aggregate a JSON object of period -> entries and print the dashboard summary.
    Summarize {
        #[arg(long)]
        entries: PathBuf,
        #[arg(long)]
        project: ProjectId,
    },
    /// Total Recordable Incident Rate.
    Trir {
        #[arg(long)]
        incidents: u32,
        #[arg(long)]
        hours: f64,
    },
    /// Origin-pinned linear trend over comma-separated period totals.
    Trend {
        #[arg(value_delimiter = ',', required = true)]
        values: Vec<f64>,
    },
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_bool("CYBOAIR_LOG_JSON", false) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, Box<dyn Error>> {
    let cfg = match path {
        Some(p) => EngineConfig::load(p)?,
        None => EngineConfig::default(),
    };
    Ok(cfg.with_env_overrides()?)
}

/// Build a store from a period -> entries document. Rejected entries are
/// logged and skipped; every listed period stays known to the store.
fn load_store(
    project: ProjectId,
    by_period: BTreeMap<String, Vec<RawActivityEntry>>,
    ceiling_pct: f64,
) -> Result<(InMemoryRecordStore, Vec<PeriodKey>), Box<dyn Error>> {
    let mut store = InMemoryRecordStore::new();
    let mut periods = Vec::new();
    for (key, raw) in by_period {
        let period: PeriodKey = key.parse()?;
        periods.push(period);
        store.open_period(project, period);
        for entry in raw {
            if let Err(error) = store.append(project, period, entry, ceiling_pct) {
                warn!(%project, %period, %error, "entry rejected");
            }
        }
    }
    Ok((store, periods))
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Aggregate {
            entries,
            period,
            project,
        } => {
            let raw: Vec<RawActivityEntry> = serde_json::from_str(&fs::read_to_string(&entries)?)?;
            let agg = aggregate_period(project, period, &raw, &config)?;
            println!("{}", serde_json::to_string_pretty(&agg)?);
        }
        Command::Summarize { entries, project } => {
            let by_period: BTreeMap<String, Vec<RawActivityEntry>> =
                serde_json::from_str(&fs::read_to_string(&entries)?)?;
            let (store, periods) = load_store(project, by_period, config.allocation_ceiling_pct)?;
            let batch = aggregate_periods(&store, project, &periods, &config);
            for failure in &batch.failures {
                warn!(%project, period = %failure.period, error = %failure.error, "period not aggregated");
            }
            info!(
                aggregated = batch.aggregates.len(),
                failed = batch.failures.len(),
                "summary built"
            );
            let summary = summarize(&batch.aggregates, &config);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Trir { incidents, hours } => {
            match compute_trir_with_base(incidents, hours, config.trir_exposure_base_hours) {
                Some(rate) => println!("{rate:.3}"),
                None => println!("N/A"),
            }
        }
        Command::Trend { values } => {
            let trend = compute_trend(&values);
            println!("{}", serde_json::to_string_pretty(&trend)?);
        }
    }

    Ok(())
}
