//! Cleaning pipeline — one raw market file in, one canonical batch out.
//!
//! Both source layouts (per-day whole-market snapshot, per-instrument full
//! history) run through the same fixed sequence: structural checks, field
//! mapping, identifier normalization, type coercion, derived price-limit
//! flags, canonical column order, and key/date validation. Every step either
//! succeeds for the whole batch or fails with a named error — there is no
//! partial output, and one file's failure never affects sibling files.

use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::config::{Settings, DAILY_FILE_SUFFIX};
use crate::contracts::conventions::{
    classify_board, limit_percent, normalize_ticker, parse_date, DATE_FORMAT,
};
use crate::contracts::fields::{
    AMOUNT, CLOSE, FLOAT_CAP, HIGH, IS_LIMIT_DOWN, IS_LIMIT_UP, IS_ST, LOW, MARKET_CAP, NAME, OPEN,
    PCT_CHANGE, PRE_CLOSE, TICKER, TRADE_DATE, TURNOVER, VOLUME,
};
use crate::contracts::mappings::{apply_mapping, MappingError, EASTMONEY_SNAPSHOT};
use crate::contracts::schema::DAILY_MARKET_SNAPSHOT;
use crate::contracts::validate::{self, ValidateError};

use super::ingest::{read_csv, IngestError};

/// Which raw file layout a load is reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLayout {
    /// Per-day whole-market file named `YYYY-MM-DD_Astock.csv` with
    /// provider-native headers.
    DailySnapshot,
    /// Per-instrument full-history file with canonical headers; the
    /// instrument name column is optional.
    InstrumentHistory,
}

/// Canonical columns a history file must provide.
const HISTORY_REQUIRED: &[&str] = &[
    TRADE_DATE, TICKER, OPEN, HIGH, LOW, CLOSE, PRE_CLOSE, PCT_CHANGE, VOLUME, AMOUNT, TURNOVER,
    MARKET_CAP, FLOAT_CAP,
];

/// Errors from the cleaning pipeline.
#[derive(Debug, Error)]
pub enum CleanError {
    #[error("{path}: file is empty")]
    EmptyBatch { path: String },

    #[error("{path}: missing columns: {missing:?}")]
    MissingColumns { path: String, missing: Vec<String> },

    #[error("{path}: {count} row(s) with unclassifiable ticker, e.g. {examples:?}")]
    InvalidTicker {
        path: String,
        count: usize,
        examples: Vec<String>,
    },

    #[error("{path}: {count} unparsable trade_date value(s), e.g. '{example}'")]
    UnparsableDate {
        path: String,
        count: usize,
        example: String,
    },

    #[error("{path}: {count} duplicate (trade_date, ticker) key(s), e.g. {examples:?}")]
    DuplicateKey {
        path: String,
        count: usize,
        examples: Vec<String>,
    },

    #[error("{path}: rows carry trade_date {found} but the file name says {file_date}")]
    DateMismatch {
        path: String,
        file_date: NaiveDate,
        found: String,
    },

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Validate(#[from] ValidateError),

    #[error("frame error: {0}")]
    Frame(#[from] PolarsError),
}

/// Trading date encoded in a `YYYY-MM-DD_Astock.csv` file name, if any.
pub fn trade_date_from_file_name(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(DAILY_FILE_SUFFIX)?;
    if stem.len() < 10 || !stem.is_char_boundary(stem.len() - 10) {
        return None;
    }
    parse_date(&stem[stem.len() - 10..], Some("%Y-%m-%d")).ok()
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
}

fn date_from_days(days: i32) -> NaiveDate {
    epoch() + Duration::days(days as i64)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names_str().contains(&name)
}

/// Clean one raw file into a canonical snapshot batch, or fail loudly.
pub fn clean_file(
    path: &Path,
    layout: SourceLayout,
    settings: &Settings,
) -> Result<DataFrame, CleanError> {
    let display = path.display().to_string();
    let mut df = read_csv(path)?;

    if df.height() == 0 {
        return Err(CleanError::EmptyBatch { path: display });
    }

    let file_date = trade_date_from_file_name(path);

    // A snapshot file may omit the trading-date column; recover it from the
    // file name before the required-column check so recovery failure
    // surfaces as a missing column.
    if !has_column(&df, TRADE_DATE) {
        if let Some(date) = file_date {
            let repeated = vec![date.format(DATE_FORMAT).to_string(); df.height()];
            df.with_column(Column::new(TRADE_DATE.into(), repeated))?;
        }
    }

    match layout {
        SourceLayout::DailySnapshot => {
            let mut required: Vec<&str> = EASTMONEY_SNAPSHOT.source_names().collect();
            required.push(TRADE_DATE);
            check_source_columns(&df, &required, &display)?;
            df = apply_mapping(&df, EASTMONEY_SNAPSHOT.source, false)?;
        }
        SourceLayout::InstrumentHistory => {
            check_source_columns(&df, HISTORY_REQUIRED, &display)?;
            if !has_column(&df, NAME) {
                let empty = vec![None::<String>; df.height()];
                df.with_column(Column::new(NAME.into(), empty))?;
            }
        }
    }

    normalize_tickers(&mut df, &display)?;
    df = validate::convert_numeric(&df, None, false)?;
    convert_trade_date_strict(&mut df, &display)?;
    derive_status_flags(&mut df, settings)?;

    let df = df
        .lazy()
        .sort(
            [TRADE_DATE, TICKER],
            SortMultipleOptions::default()
                .with_order_descending_multi([false, false])
                .with_maintain_order(true),
        )
        .collect()?;
    let df = df.select(DAILY_MARKET_SNAPSHOT.insert_columns())?;

    validate::validate_schema(&df, DAILY_MARKET_SNAPSHOT.name, false)?;
    check_duplicate_keys(&df, &display)?;
    check_file_date(&df, file_date, &display)?;

    Ok(df)
}

fn check_source_columns(
    df: &DataFrame,
    required: &[&str],
    path: &str,
) -> Result<(), CleanError> {
    let present = df.get_column_names_str();
    let mut missing: Vec<String> = required
        .iter()
        .filter(|c| !present.contains(*c))
        .map(|c| c.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        missing.sort();
        Err(CleanError::MissingColumns {
            path: path.to_string(),
            missing,
        })
    }
}

/// Rewrite the ticker column to the canonical suffixed form. A prefix
/// matching no exchange rule fails the batch — UNKNOWN is never committed.
fn normalize_tickers(df: &mut DataFrame, path: &str) -> Result<(), CleanError> {
    let (normalized, bad, count) = {
        let tickers = df.column(TICKER)?.str()?;
        let mut normalized: Vec<String> = Vec::with_capacity(tickers.len());
        let mut bad: Vec<String> = Vec::new();
        let mut count = 0usize;
        for value in tickers.iter() {
            let raw = value.unwrap_or("");
            match normalize_ticker(raw) {
                Some(full) => normalized.push(full),
                None => {
                    count += 1;
                    if bad.len() < 5 {
                        bad.push(raw.to_string());
                    }
                    normalized.push(String::new());
                }
            }
        }
        (normalized, bad, count)
    };
    if count > 0 {
        return Err(CleanError::InvalidTicker {
            path: path.to_string(),
            count,
            examples: bad,
        });
    }
    df.with_column(Column::new(TICKER.into(), normalized))?;
    Ok(())
}

/// Parse the trading-date column into a calendar date. Any unparsable value
/// aborts the batch.
fn convert_trade_date_strict(df: &mut DataFrame, path: &str) -> Result<(), CleanError> {
    if df.column(TRADE_DATE)?.dtype() == &DataType::Date {
        return Ok(());
    }
    let (days, failures, example) = {
        let raw_dates = df.column(TRADE_DATE)?.str()?;
        let epoch = epoch();
        let mut days: Vec<Option<i32>> = Vec::with_capacity(raw_dates.len());
        let mut failures = 0usize;
        let mut example = String::new();
        for value in raw_dates.iter() {
            match value.map(str::trim) {
                None | Some("") => {
                    failures += 1;
                    if example.is_empty() {
                        example = "<null>".to_string();
                    }
                    days.push(None);
                }
                Some(raw) => match parse_date(raw, None) {
                    Ok(date) => days.push(Some((date - epoch).num_days() as i32)),
                    Err(_) => {
                        failures += 1;
                        if example.is_empty() {
                            example = raw.to_string();
                        }
                        days.push(None);
                    }
                },
            }
        }
        (days, failures, example)
    };
    if failures > 0 {
        return Err(CleanError::UnparsableDate {
            path: path.to_string(),
            count: failures,
            example,
        });
    }
    let column = Column::new(TRADE_DATE.into(), days).cast(&DataType::Date)?;
    df.with_column(column)?;
    Ok(())
}

/// Derive `is_st` and the two limit-hit flags.
///
/// The limit percent and boundary prices are computed fresh per row from the
/// board classification, the ST flag, and the previous close; only the three
/// boolean flags survive into the output.
fn derive_status_flags(df: &mut DataFrame, settings: &Settings) -> Result<(), CleanError> {
    let height = df.height();

    let is_st: Vec<bool> = {
        let names = df.column(NAME)?.str()?;
        names
            .iter()
            .map(|name| {
                name.map(|s| s.to_lowercase().contains("st"))
                    .unwrap_or(false)
            })
            .collect()
    };

    let (limit_up, limit_down) = {
        let tickers = df.column(TICKER)?.str()?;
        let pre_close = df.column(PRE_CLOSE)?.f64()?;
        let close = df.column(CLOSE)?.f64()?;
        let tolerance = settings.limit_tolerance;

        let mut limit_up: Vec<bool> = Vec::with_capacity(height);
        let mut limit_down: Vec<bool> = Vec::with_capacity(height);
        for i in 0..height {
            // A suffixed identifier outside the board tables (accepted
            // verbatim from a history file) gets main-board treatment.
            let pct = tickers
                .get(i)
                .and_then(classify_board)
                .map(|board| limit_percent(board, is_st[i]))
                .unwrap_or(10.0);
            match (pre_close.get(i), close.get(i)) {
                (Some(prev), Some(last)) => {
                    let up_price = round2(prev * (1.0 + pct / 100.0));
                    let down_price = round2(prev * (1.0 - pct / 100.0));
                    // Prices tick in cents; rounding the close first means
                    // the tolerance only absorbs float noise. A close a full
                    // tick beyond the boundary is not a limit hit — real
                    // limit hits never legitimately exceed the threshold.
                    limit_up.push((round2(last) - up_price).abs() <= tolerance);
                    limit_down.push((round2(last) - down_price).abs() <= tolerance);
                }
                _ => {
                    limit_up.push(false);
                    limit_down.push(false);
                }
            }
        }
        (limit_up, limit_down)
    };

    df.with_column(Column::new(IS_ST.into(), is_st))?;
    df.with_column(Column::new(IS_LIMIT_UP.into(), limit_up))?;
    df.with_column(Column::new(IS_LIMIT_DOWN.into(), limit_down))?;
    Ok(())
}

/// A duplicate `(trade_date, ticker)` pair inside one batch is an upstream
/// data defect; it is surfaced, never silently de-duplicated.
fn check_duplicate_keys(df: &DataFrame, path: &str) -> Result<(), CleanError> {
    let dates = df.column(TRADE_DATE)?.date()?;
    let tickers = df.column(TICKER)?.str()?;

    let mut seen: HashSet<(Option<i32>, String)> = HashSet::with_capacity(df.height());
    let mut examples: Vec<String> = Vec::new();
    let mut count = 0usize;
    for i in 0..df.height() {
        let date = dates.get(i);
        let ticker = tickers.get(i).unwrap_or("").to_string();
        if !seen.insert((date, ticker.clone())) {
            count += 1;
            if examples.len() < 5 {
                let rendered = date
                    .map(|d| date_from_days(d).format(DATE_FORMAT).to_string())
                    .unwrap_or_else(|| "<null>".to_string());
                examples.push(format!("({rendered}, {ticker})"));
            }
        }
    }
    if count > 0 {
        return Err(CleanError::DuplicateKey {
            path: path.to_string(),
            count,
            examples,
        });
    }
    Ok(())
}

/// When the file name encodes a single trading date, every row must carry
/// it — this catches concatenated or mislabeled files.
fn check_file_date(
    df: &DataFrame,
    file_date: Option<NaiveDate>,
    path: &str,
) -> Result<(), CleanError> {
    let Some(file_date) = file_date else {
        return Ok(());
    };
    let expected = (file_date - epoch()).num_days() as i32;
    let dates = df.column(TRADE_DATE)?.date()?;
    for i in 0..df.height() {
        let actual = dates.get(i);
        if actual != Some(expected) {
            let found = actual
                .map(|d| date_from_days(d).format(DATE_FORMAT).to_string())
                .unwrap_or_else(|| "<null>".to_string());
            return Err(CleanError::DateMismatch {
                path: path.to_string(),
                file_date,
                found,
            });
        }
    }
    Ok(())
}
