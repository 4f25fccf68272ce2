mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use moon_core::{
    Calendar, DateRange, Day, DayRecord, GenerationState, MeanEphemeris, ProgressListener, Scope,
};
use moon_store::Store;

use crate::config::Config;

const DB_FILE: &str = "moon.db";

#[derive(Parser)]
#[command(name = "moon", about = "Generate and maintain lunar day series")]
struct Cli {
    /// Config file (default: $MOON_DATA_DIR/moon.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate every day the scope needs around a date range
    Generate {
        #[arg(long)]
        from: NaiveDate,

        #[arg(long)]
        to: NaiveDate,

        /// day, phase or cycle (default from config)
        #[arg(long)]
        scope: Option<Scope>,

        /// Worker threads, 0 for one per hardware thread
        #[arg(long)]
        workers: Option<usize>,

        /// Longest wait for one burst of work, 0 for no limit
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Print stored days with their phase and distance to the nearest extremes
    Show {
        #[arg(long)]
        from: NaiveDate,

        #[arg(long)]
        to: NaiveDate,
    },

    /// Delete stored days the configured scope no longer needs
    Trim {
        #[arg(long)]
        from: NaiveDate,

        #[arg(long)]
        to: NaiveDate,

        /// Also delete days after the range
        #[arg(long)]
        future: bool,
    },

    /// Show store statistics
    Stats,

    /// Export stored days to a JSON file
    Export {
        /// Output file path
        path: PathBuf,
    },

    /// Import days from a JSON file
    Import {
        /// Input file path
        path: PathBuf,
    },
}

/// Logs every state change of a run.
struct LogListener;

impl ProgressListener for LogListener {
    fn on_state_changed(&self, state: GenerationState) {
        tracing::info!(%state, "generation state");
    }

    fn on_progress(&self, percent: f64) {
        tracing::trace!(percent = format!("{:.0}%", percent * 100.0), "progress");
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn open_store(data_dir: &Path) -> Result<Store> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;
    Store::open(&data_dir.join(DB_FILE)).context("failed to open day store")
}

/// A calendar over `range` holding every stored day.
fn load_calendar(store: &Store, config: &Config, range: DateRange, scope: Scope) -> Result<Calendar> {
    let mut calendar = Calendar::new(
        range,
        scope,
        Arc::new(MeanEphemeris::new()),
        config.location(),
        config.engine_config(),
    );
    let records = store.load_days().context("failed to load stored days")?;
    calendar
        .import_days(records)
        .context("failed to import stored days")?;
    Ok(calendar)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let data_dir = config::data_dir();
    let config = Config::load(cli.config.as_deref(), &data_dir)?;

    match &cli.command {
        Commands::Generate {
            from,
            to,
            scope,
            workers,
            timeout_secs,
        } => cmd_generate(
            &data_dir,
            config,
            DateRange::new(*from, *to),
            *scope,
            *workers,
            *timeout_secs,
        ),
        Commands::Show { from, to } => cmd_show(&data_dir, &config, DateRange::new(*from, *to)),
        Commands::Trim { from, to, future } => {
            cmd_trim(&data_dir, &config, DateRange::new(*from, *to), *future)
        }
        Commands::Stats => cmd_stats(&data_dir),
        Commands::Export { path } => cmd_export(&data_dir, path),
        Commands::Import { path } => cmd_import(&data_dir, path),
    }
}

fn cmd_generate(
    data_dir: &Path,
    mut config: Config,
    range: DateRange,
    scope: Option<Scope>,
    workers: Option<usize>,
    timeout_secs: Option<u64>,
) -> Result<()> {
    if let Some(workers) = workers {
        config.engine.workers = workers;
    }
    if let Some(secs) = timeout_secs {
        config.engine.burst_timeout_secs = secs;
    }
    let scope = scope.unwrap_or(config.engine.scope);

    let store = open_store(data_dir)?;
    let mut calendar = load_calendar(&store, &config, range, scope)?;
    calendar.add_listener(Arc::new(LogListener));

    let outcome = calendar.start_generation();

    // Interrupted runs still keep what they finished.
    let fresh: Vec<DayRecord> = calendar
        .newly_generated()
        .context("failed to collect generated days")?
        .into_iter()
        .map(DayRecord::from_day)
        .collect();
    store
        .save_days(&fresh)
        .context("failed to save generated days")?;

    let generated = outcome.context("generation failed")?;
    println!("generated {generated} days");

    let days = calendar.all_days().context("failed to read days")?;
    print_table(days.into_iter().filter(|d| range.contains(d.date())));
    Ok(())
}

fn cmd_show(data_dir: &Path, config: &Config, range: DateRange) -> Result<()> {
    let store = open_store(data_dir)?;
    // Cycle scope so the import derives day counts as well as phases.
    let calendar = load_calendar(&store, config, range, Scope::Cycle)?;
    let days = calendar.all_days().context("failed to read days")?;
    let shown: Vec<&Day> = days.into_iter().filter(|d| range.contains(d.date())).collect();
    if shown.is_empty() {
        println!("no stored days in {range}");
        return Ok(());
    }
    print_table(shown.into_iter());
    Ok(())
}

fn cmd_trim(data_dir: &Path, config: &Config, range: DateRange, future: bool) -> Result<()> {
    let store = open_store(data_dir)?;
    let mut calendar = load_calendar(&store, config, range, config.engine.scope)?;
    let removed = calendar
        .remove_overhead(future)
        .context("failed to remove overhead")?;
    let dates: Vec<NaiveDate> = removed.iter().map(Day::date).collect();
    let deleted = store
        .delete_days(&dates)
        .context("failed to delete days")?;
    println!("removed {deleted} days");
    Ok(())
}

fn cmd_stats(data_dir: &Path) -> Result<()> {
    let store = open_store(data_dir)?;
    let count = store.day_count().context("failed to count days")?;
    let bounds = store.date_bounds().context("failed to read date bounds")?;
    let version = store
        .get_metadata("schema_version")
        .context("failed to read schema version")?
        .unwrap_or_default();

    println!("days:       {count}");
    match bounds {
        Some(range) => {
            println!("first:      {}", range.start());
            println!("last:       {}", range.end());
            let missing = range.size().saturating_sub(count);
            println!("gaps:       {missing}");
        }
        None => println!("first:      -\nlast:       -"),
    }
    println!("schema:     {version}");
    Ok(())
}

fn cmd_export(data_dir: &Path, path: &Path) -> Result<()> {
    let store = open_store(data_dir)?;
    let count = store
        .export_json_file(path)
        .context("failed to export JSON")?;
    println!("exported {count} days to {}", path.display());
    Ok(())
}

fn cmd_import(data_dir: &Path, path: &Path) -> Result<()> {
    let store = open_store(data_dir)?;
    let count = store
        .import_json_file(path)
        .context("failed to import JSON")?;
    println!("imported {count} days from {}", path.display());
    Ok(())
}

fn print_table<'a>(days: impl Iterator<Item = &'a Day>) {
    fn count(n: Option<u32>) -> String {
        n.map_or_else(|| "-".to_string(), |n| n.to_string())
    }

    println!("date        visible  phase        since  until");
    for day in days {
        let phase = day.phase().map_or_else(|| "-".to_string(), |p| p.to_string());
        println!(
            "{}  {:>7.3}  {:<11}  {:>5}  {:>5}",
            day.date(),
            day.raw.lunar_visibility,
            phase,
            count(day.derived.days_since_extreme),
            count(day.derived.days_until_extreme),
        );
    }
}
