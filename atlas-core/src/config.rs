//! Project-relative data layout and tunable settings.
//!
//! Layout: `{root}/daily/{year}/{date}_Astock.csv`, `{root}/history/*.csv`,
//! `{root}/db/atlas.db`. Directories are created on demand; nothing else is
//! read from the environment.

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::contracts::conventions::DATE_FORMAT;

/// File-name suffix of per-day whole-market snapshot files.
pub const DAILY_FILE_SUFFIX: &str = "_Astock.csv";

/// Default absolute tolerance when comparing a close against a limit price.
/// It absorbs floating rounding, not genuine near-misses.
pub const DEFAULT_LIMIT_TOLERANCE: f64 = 0.001;

/// Errors from settings loading.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("read settings '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse settings '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Tunable settings, optionally loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the data directory layout.
    pub data_root: PathBuf,
    /// Absolute tolerance for limit-hit comparisons.
    pub limit_tolerance: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            limit_tolerance: DEFAULT_LIMIT_TOLERANCE,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| SettingsError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Directory layout rooted at `data_root`.
    pub fn paths(&self) -> DataPaths {
        DataPaths::new(&self.data_root)
    }
}

/// The project-relative data directory layout.
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/daily` — per-day snapshot files, one subdirectory per year.
    pub fn daily_dir(&self) -> PathBuf {
        self.root.join("daily")
    }

    /// `{root}/daily/{year}`.
    pub fn year_dir(&self, year: i32) -> PathBuf {
        self.daily_dir().join(year.to_string())
    }

    /// `{root}/daily/{year}/{date}_Astock.csv` for a trading date.
    pub fn daily_file(&self, date: NaiveDate) -> PathBuf {
        self.year_dir(date.year())
            .join(format!("{}{DAILY_FILE_SUFFIX}", date.format(DATE_FORMAT)))
    }

    /// `{root}/history` — per-instrument full-history files.
    pub fn history_dir(&self) -> PathBuf {
        self.root.join("history")
    }

    /// `{root}/db/atlas.db`.
    pub fn db_path(&self) -> PathBuf {
        self.root.join("db").join("atlas.db")
    }

    /// Create the full directory layout if absent.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            self.daily_dir(),
            self.history_dir(),
            self.root.join("db"),
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Every snapshot file under a year directory, sorted by file name.
    pub fn daily_files_for_year(&self, year: i32) -> std::io::Result<Vec<PathBuf>> {
        let dir = self.year_dir(year);
        let mut files = Vec::new();
        if dir.exists() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if is_daily_file(&path) {
                    files.push(path);
                }
            }
        }
        files.sort();
        Ok(files)
    }

    /// The most recently dated snapshot file across all years, if any.
    pub fn latest_daily_file(&self) -> Option<PathBuf> {
        let daily = self.daily_dir();
        let mut files = Vec::new();
        let years = fs::read_dir(&daily).ok()?;
        for year_entry in years.flatten() {
            let year_path = year_entry.path();
            if !year_path.is_dir() {
                continue;
            }
            if let Ok(entries) = fs::read_dir(&year_path) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if is_daily_file(&path) {
                        files.push(path);
                    }
                }
            }
        }
        // File names embed the date, so lexicographic max is newest.
        files.sort();
        files.pop()
    }

    /// Every history CSV, sorted by file name.
    pub fn history_files(&self) -> std::io::Result<Vec<PathBuf>> {
        let dir = self.history_dir();
        let mut files = Vec::new();
        if dir.exists() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) == Some("csv") {
                    files.push(path);
                }
            }
        }
        files.sort();
        Ok(files)
    }
}

fn is_daily_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(DAILY_FILE_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_file_path_embeds_year_and_date() {
        let paths = DataPaths::new("data");
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(
            paths.daily_file(date),
            PathBuf::from("data/daily/2024/2024-01-02_Astock.csv")
        );
    }

    #[test]
    fn settings_default_and_toml_override() {
        let settings = Settings::default();
        assert_eq!(settings.limit_tolerance, DEFAULT_LIMIT_TOLERANCE);
        assert_eq!(settings.data_root, PathBuf::from("data"));

        let parsed: Settings = toml::from_str("limit_tolerance = 0.005").unwrap();
        assert_eq!(parsed.limit_tolerance, 0.005);
        assert_eq!(parsed.data_root, PathBuf::from("data"));
    }

    #[test]
    fn latest_daily_file_picks_newest_across_years() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(tmp.path());
        for (year, name) in [
            (2023, "2023-12-29_Astock.csv"),
            (2024, "2024-01-02_Astock.csv"),
            (2024, "2024-01-03_Astock.csv"),
        ] {
            let dir = paths.year_dir(year);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(name), "x").unwrap();
        }
        // Non-matching files are ignored.
        fs::write(paths.year_dir(2024).join("notes.txt"), "x").unwrap();

        let latest = paths.latest_daily_file().unwrap();
        assert!(latest.ends_with("2024/2024-01-03_Astock.csv"));
    }

    #[test]
    fn ensure_dirs_creates_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(tmp.path().join("data"));
        paths.ensure_dirs().unwrap();
        assert!(paths.daily_dir().is_dir());
        assert!(paths.history_dir().is_dir());
        assert!(paths.db_path().parent().unwrap().is_dir());
    }
}
