//! Atlas CLI — database init and snapshot load commands.
//!
//! Commands:
//! - `init-db` — create the store file and all registered tables
//! - `load-daily` — load per-day whole-market snapshot files
//! - `load-history` — load per-instrument full-history files
//!
//! Any validation or store failure propagates as a fatal error; a load
//! either commits completely or not at all.

use anyhow::{bail, Context, Result};
use atlas_core::config::Settings;
use atlas_core::pipeline::{SnapshotStore, SourceLayout, StdoutProgress};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "atlas", about = "Atlas CLI — canonical market-snapshot loader")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store file and all registered tables.
    InitDb {
        /// Store file path. Defaults to {data_root}/db/atlas.db.
        #[arg(long)]
        db: Option<PathBuf>,

        /// Settings TOML file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Data root directory. Overrides the settings file.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Load per-day whole-market snapshot files (YYYY-MM-DD_Astock.csv).
    LoadDaily {
        /// Load one specific file.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Load the file for one trading date (YYYY-MM-DD).
        #[arg(long)]
        date: Option<String>,

        /// Load every snapshot file under one year directory.
        #[arg(long)]
        year: Option<i32>,

        /// Cap the number of files loaded.
        #[arg(long)]
        limit: Option<usize>,

        /// Store file path. Defaults to {data_root}/db/atlas.db.
        #[arg(long)]
        db: Option<PathBuf>,

        /// Settings TOML file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Data root directory. Overrides the settings file.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Load per-instrument full-history CSV files.
    LoadHistory {
        /// Load one specific file instead of every history file.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Cap the number of files loaded.
        #[arg(long)]
        limit: Option<usize>,

        /// Store file path. Defaults to {data_root}/db/atlas.db.
        #[arg(long)]
        db: Option<PathBuf>,

        /// Settings TOML file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Data root directory. Overrides the settings file.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb { db, config, data_dir } => run_init_db(db, config, data_dir),
        Commands::LoadDaily {
            file,
            date,
            year,
            limit,
            db,
            config,
            data_dir,
        } => run_load_daily(file, date, year, limit, db, config, data_dir),
        Commands::LoadHistory {
            file,
            limit,
            db,
            config,
            data_dir,
        } => run_load_history(file, limit, db, config, data_dir),
    }
}

fn resolve_settings(config: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<Settings> {
    let mut settings = match config {
        Some(path) => Settings::from_file(&path)?,
        None => Settings::default(),
    };
    if let Some(dir) = data_dir {
        settings.data_root = dir;
    }
    Ok(settings)
}

fn run_init_db(
    db: Option<PathBuf>,
    config: Option<PathBuf>,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let settings = resolve_settings(config, data_dir)?;
    let paths = settings.paths();
    paths.ensure_dirs()?;
    let db_path = db.unwrap_or_else(|| paths.db_path());

    let store = SnapshotStore::open(&db_path)?;
    println!("Store initialized: {}", db_path.display());
    println!("Tables:");
    for table in store.tables()? {
        println!("  - {table}");
    }
    Ok(())
}

fn run_load_daily(
    file: Option<PathBuf>,
    date: Option<String>,
    year: Option<i32>,
    limit: Option<usize>,
    db: Option<PathBuf>,
    config: Option<PathBuf>,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let settings = resolve_settings(config, data_dir)?;
    let paths = settings.paths();
    paths.ensure_dirs()?;
    let db_path = db.unwrap_or_else(|| paths.db_path());

    let files: Vec<PathBuf> = if let Some(file) = file {
        vec![file]
    } else if let Some(date) = date {
        let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .with_context(|| format!("invalid --date '{date}' (expected YYYY-MM-DD)"))?;
        vec![paths.daily_file(date)]
    } else if let Some(year) = year {
        let files = paths.daily_files_for_year(year)?;
        if files.is_empty() {
            bail!(
                "no snapshot files for {year} under {}",
                paths.year_dir(year).display()
            );
        }
        files
    } else {
        let latest = paths
            .latest_daily_file()
            .with_context(|| format!("no snapshot files under {}", paths.daily_dir().display()))?;
        vec![latest]
    };

    let mut store = SnapshotStore::open(&db_path)?;
    let summary = store.load_files(
        &files,
        SourceLayout::DailySnapshot,
        limit,
        &settings,
        Some(&StdoutProgress),
    )?;
    println!("Total rows loaded: {}", summary.rows);
    Ok(())
}

fn run_load_history(
    file: Option<PathBuf>,
    limit: Option<usize>,
    db: Option<PathBuf>,
    config: Option<PathBuf>,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let settings = resolve_settings(config, data_dir)?;
    let paths = settings.paths();
    paths.ensure_dirs()?;
    let db_path = db.unwrap_or_else(|| paths.db_path());

    let files: Vec<PathBuf> = if let Some(file) = file {
        if !file.exists() {
            bail!("file not found: {}", file.display());
        }
        vec![file]
    } else {
        let files = paths.history_files()?;
        if files.is_empty() {
            bail!("no history files under {}", paths.history_dir().display());
        }
        files
    };

    let mut store = SnapshotStore::open(&db_path)?;
    let summary = store.load_files(
        &files,
        SourceLayout::InstrumentHistory,
        limit,
        &settings,
        Some(&StdoutProgress),
    )?;
    println!("Total rows loaded: {}", summary.rows);
    Ok(())
}
