//! Store adapter — canonical batches in and out of an embedded SQLite file.
//!
//! The adapter owns the connection lifecycle and translates batches into
//! persistence operations. All statements are generated from the table
//! schema registry, so one implementation serves every table. Multi-file
//! loads run inside a single transaction: any file's failure rolls back the
//! whole load, and re-running is safe because the per-row upsert makes loads
//! idempotent.

use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::Settings;
use crate::contracts::conventions::{parse_date, DATE_FORMAT};
use crate::contracts::fields::{PRE_CLOSE, TICKER, TRADE_DATE, TRADE_ID};
use crate::contracts::schema::{
    get_table, init_database, ColumnSpec, SchemaError, SqlType, TableSchema,
    DAILY_MARKET_SNAPSHOT,
};
use crate::contracts::validate::{quick_validate, ValidateError};

use super::clean::{clean_file, CleanError, SourceLayout};

/// Errors from the store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Clean(#[from] CleanError),

    #[error(transparent)]
    Validate(#[from] ValidateError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame error: {0}")]
    Frame(#[from] PolarsError),

    #[error("unsupported value in column '{column}' at row {row}")]
    Unsupported { column: String, row: usize },
}

/// Filter for read accessors. Fields that do not apply to a table (no such
/// column) are ignored; results always come back ordered by the table's
/// primary key ascending.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    /// Exact trading date.
    pub trade_date: Option<NaiveDate>,
    /// Exact instrument identifier.
    pub ticker: Option<String>,
    /// Exact trade id (trade_execution only).
    pub trade_id: Option<String>,
    /// Inclusive range start.
    pub start_date: Option<NaiveDate>,
    /// Inclusive range end.
    pub end_date: Option<NaiveDate>,
}

/// Progress callbacks for a multi-file load.
pub trait LoadProgress {
    fn on_file_loaded(&self, path: &Path, rows: usize, index: usize, total: usize);
    fn on_load_complete(&self, files: usize, rows: usize);
}

/// Progress reporter that prints to stdout.
pub struct StdoutProgress;

impl LoadProgress for StdoutProgress {
    fn on_file_loaded(&self, path: &Path, rows: usize, index: usize, total: usize) {
        println!(
            "[{}/{}] loaded {} row(s) from {}",
            index + 1,
            total,
            rows,
            path.display()
        );
    }

    fn on_load_complete(&self, files: usize, rows: usize) {
        println!("Load complete: {files} file(s), {rows} row(s)");
    }
}

/// Outcome of a committed multi-file load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub files: usize,
    pub rows: usize,
}

/// The embedded snapshot store.
pub struct SnapshotStore {
    conn: Connection,
}

impl SnapshotStore {
    /// Open (or create) the store read-write, creating parent directories
    /// and all registered tables.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        init_database(&conn)?;
        let store = Self { conn };
        store.ensure_snapshot_columns()?;
        Ok(store)
    }

    /// Open an existing store read-only.
    pub fn open_read_only(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self { conn })
    }

    /// Open an in-memory store (tests, scratch work).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        init_database(&conn)?;
        Ok(Self { conn })
    }

    /// Additive migration: older store files predate the `pre_close` column.
    fn ensure_snapshot_columns(&self) -> Result<(), StoreError> {
        let mut stmt = self
            .conn
            .prepare("PRAGMA table_info('daily_market_snapshot')")?;
        let names: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<_, _>>()?;
        if !names.iter().any(|n| n == PRE_CLOSE) {
            self.conn.execute_batch(
                "ALTER TABLE daily_market_snapshot ADD COLUMN pre_close DOUBLE",
            )?;
        }
        Ok(())
    }

    /// Names of every table in the store file.
    pub fn tables(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Validate and insert a batch into a registered table.
    ///
    /// With `replace`, rows matching the batch's primary-key values are
    /// deleted first so the insert cannot violate the key.
    pub fn save_batch(
        &mut self,
        table_name: &str,
        df: &DataFrame,
        replace: bool,
    ) -> Result<usize, StoreError> {
        let schema = get_table(table_name)?;
        let df = quick_validate(df, table_name, true, true)?;
        let df = df.select(schema.insert_columns())?;

        let tx = self.conn.transaction()?;
        {
            if replace {
                let mut delete = tx.prepare(&schema.delete_by_key_sql())?;
                for row in 0..df.height() {
                    let keys = row_values(&df, schema.primary_key, row)?;
                    delete.execute(params_from_iter(keys))?;
                }
            }
            let mut insert = tx.prepare(&schema.insert_sql())?;
            let columns = schema.insert_columns();
            for row in 0..df.height() {
                let values = row_values(&df, &columns, row)?;
                insert.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;
        Ok(df.height())
    }

    /// Insert-or-overwrite a batch by primary key (last write wins on every
    /// non-key column).
    pub fn upsert_batch(&mut self, table_name: &str, df: &DataFrame) -> Result<usize, StoreError> {
        let schema = get_table(table_name)?;
        let df = quick_validate(df, table_name, true, true)?;
        let df = df.select(schema.insert_columns())?;

        let tx = self.conn.transaction()?;
        {
            let mut upsert = tx.prepare(&schema.upsert_sql())?;
            let columns = schema.insert_columns();
            for row in 0..df.height() {
                let values = row_values(&df, &columns, row)?;
                upsert.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;
        Ok(df.height())
    }

    /// Clean and upsert an ordered sequence of files inside one transaction.
    ///
    /// Any failure rolls the entire load back — no partial set of files is
    /// ever committed. Re-invoking after a failure is safe.
    pub fn load_files(
        &mut self,
        paths: &[PathBuf],
        layout: SourceLayout,
        limit: Option<usize>,
        settings: &Settings,
        progress: Option<&dyn LoadProgress>,
    ) -> Result<LoadSummary, StoreError> {
        let schema = &DAILY_MARKET_SNAPSHOT;
        let columns = schema.insert_columns();
        let selected = match limit {
            Some(n) => &paths[..n.min(paths.len())],
            None => paths,
        };

        let mut files = 0usize;
        let mut rows = 0usize;
        let tx = self.conn.transaction()?;
        {
            let mut upsert = tx.prepare(&schema.upsert_sql())?;
            for (index, path) in selected.iter().enumerate() {
                let df = clean_file(path, layout, settings)?;
                for row in 0..df.height() {
                    let values = row_values(&df, &columns, row)?;
                    upsert.execute(params_from_iter(values))?;
                }
                if let Some(p) = progress {
                    p.on_file_loaded(path, df.height(), index, selected.len());
                }
                files += 1;
                rows += df.height();
            }
        }
        tx.commit()?;

        if let Some(p) = progress {
            p.on_load_complete(files, rows);
        }
        Ok(LoadSummary { files, rows })
    }

    /// Read a registered table back as a canonical batch.
    pub fn query(&self, table_name: &str, filter: &QueryFilter) -> Result<DataFrame, StoreError> {
        let schema = get_table(table_name)?;
        self.fetch(schema, filter)
    }

    /// Daily market snapshots matching a filter, ordered by (date, ticker).
    pub fn snapshots(&self, filter: &QueryFilter) -> Result<DataFrame, StoreError> {
        self.fetch(&DAILY_MARKET_SNAPSHOT, filter)
    }

    /// Validate and insert daily snapshots.
    pub fn save_snapshots(&mut self, df: &DataFrame, replace: bool) -> Result<usize, StoreError> {
        self.save_batch(DAILY_MARKET_SNAPSHOT.name, df, replace)
    }

    fn fetch(&self, schema: &TableSchema, filter: &QueryFilter) -> Result<DataFrame, StoreError> {
        let columns = schema.insert_columns();
        let mut sql = format!("SELECT {} FROM {}", columns.join(", "), schema.name);

        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();
        if schema.column(TRADE_DATE).is_some() {
            if let Some(date) = filter.trade_date {
                clauses.push(format!("{TRADE_DATE} = ?"));
                params.push(date_param(date));
            }
            if let Some(start) = filter.start_date {
                clauses.push(format!("{TRADE_DATE} >= ?"));
                params.push(date_param(start));
            }
            if let Some(end) = filter.end_date {
                clauses.push(format!("{TRADE_DATE} <= ?"));
                params.push(date_param(end));
            }
        }
        if schema.column(TICKER).is_some() {
            if let Some(ticker) = &filter.ticker {
                clauses.push(format!("{TICKER} = ?"));
                params.push(SqlValue::Text(ticker.clone()));
            }
        }
        if schema.column(TRADE_ID).is_some() {
            if let Some(trade_id) = &filter.trade_id {
                clauses.push(format!("{TRADE_ID} = ?"));
                params.push(SqlValue::Text(trade_id.clone()));
            }
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&schema.primary_key.join(", "));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut raw: Vec<Vec<SqlValue>> = vec![Vec::new(); columns.len()];
        let mut rows = stmt.query(params_from_iter(params))?;
        while let Some(row) = rows.next()? {
            for (i, column) in raw.iter_mut().enumerate() {
                column.push(row.get::<_, SqlValue>(i)?);
            }
        }

        let specs: Vec<&ColumnSpec> = schema
            .columns
            .iter()
            .filter(|c| c.default_sql.is_none())
            .collect();
        let out: Vec<Column> = specs
            .iter()
            .zip(raw.iter())
            .map(|(spec, values)| column_from_values(spec, values))
            .collect::<Result<_, _>>()?;
        Ok(DataFrame::new(out)?)
    }
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
}

fn date_param(date: NaiveDate) -> SqlValue {
    SqlValue::Text(date.format(DATE_FORMAT).to_string())
}

/// Bind one batch row's values for the named columns.
fn row_values(
    df: &DataFrame,
    columns: &[&str],
    row: usize,
) -> Result<Vec<SqlValue>, StoreError> {
    let mut out = Vec::with_capacity(columns.len());
    for name in columns {
        let value = df.column(name)?.get(row)?;
        out.push(sql_value(name, row, value)?);
    }
    Ok(out)
}

fn sql_value(column: &str, row: usize, value: AnyValue) -> Result<SqlValue, StoreError> {
    Ok(match value {
        AnyValue::Null => SqlValue::Null,
        AnyValue::Boolean(b) => SqlValue::Integer(b as i64),
        AnyValue::Int32(v) => SqlValue::Integer(v as i64),
        AnyValue::Int64(v) => SqlValue::Integer(v),
        AnyValue::UInt32(v) => SqlValue::Integer(v as i64),
        AnyValue::UInt64(v) => SqlValue::Integer(v as i64),
        AnyValue::Float32(v) => SqlValue::Real(v as f64),
        AnyValue::Float64(v) => SqlValue::Real(v),
        AnyValue::String(s) => SqlValue::Text(s.to_string()),
        AnyValue::StringOwned(s) => SqlValue::Text(s.to_string()),
        AnyValue::Date(days) => SqlValue::Text(
            (epoch() + Duration::days(days as i64))
                .format(DATE_FORMAT)
                .to_string(),
        ),
        _ => {
            return Err(StoreError::Unsupported {
                column: column.to_string(),
                row,
            })
        }
    })
}

/// Rebuild one typed column from raw store values.
fn column_from_values(spec: &ColumnSpec, values: &[SqlValue]) -> Result<Column, StoreError> {
    let name: PlSmallStr = spec.name.into();
    let column = match spec.dtype {
        SqlType::Double => {
            let v: Vec<Option<f64>> = values
                .iter()
                .map(|x| match x {
                    SqlValue::Integer(i) => Some(*i as f64),
                    SqlValue::Real(f) => Some(*f),
                    SqlValue::Text(s) => s.parse().ok(),
                    _ => None,
                })
                .collect();
            Column::new(name, v)
        }
        SqlType::Bigint => {
            let v: Vec<Option<i64>> = values
                .iter()
                .map(|x| match x {
                    SqlValue::Integer(i) => Some(*i),
                    SqlValue::Real(f) => Some(*f as i64),
                    SqlValue::Text(s) => s.parse().ok(),
                    _ => None,
                })
                .collect();
            Column::new(name, v)
        }
        SqlType::Boolean => {
            let v: Vec<Option<bool>> = values
                .iter()
                .map(|x| match x {
                    SqlValue::Integer(i) => Some(*i != 0),
                    _ => None,
                })
                .collect();
            Column::new(name, v)
        }
        SqlType::Varchar | SqlType::Timestamp => {
            let v: Vec<Option<String>> = values
                .iter()
                .map(|x| match x {
                    SqlValue::Text(s) => Some(s.clone()),
                    SqlValue::Integer(i) => Some(i.to_string()),
                    SqlValue::Real(f) => Some(f.to_string()),
                    _ => None,
                })
                .collect();
            Column::new(name, v)
        }
        SqlType::Date => {
            let ep = epoch();
            let v: Vec<Option<i32>> = values
                .iter()
                .map(|x| match x {
                    SqlValue::Text(s) => parse_date(s, None)
                        .ok()
                        .map(|d| (d - ep).num_days() as i32),
                    _ => None,
                })
                .collect();
            Column::new(name, v).cast(&DataType::Date)?
        }
    };
    Ok(column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// A typed canonical batch with one row per (date, ticker, close, pre_close).
    fn sample_batch(rows: &[(&str, &str, f64, f64)]) -> DataFrame {
        let ep = epoch();
        let days: Vec<i32> = rows
            .iter()
            .map(|(d, _, _, _)| {
                (parse_date(d, None).unwrap() - ep).num_days() as i32
            })
            .collect();
        let tickers: Vec<&str> = rows.iter().map(|(_, t, _, _)| *t).collect();
        let closes: Vec<f64> = rows.iter().map(|(_, _, c, _)| *c).collect();
        let pre_closes: Vec<f64> = rows.iter().map(|(_, _, _, p)| *p).collect();
        let n = rows.len();

        DataFrame::new(vec![
            Column::new("trade_date".into(), days)
                .cast(&DataType::Date)
                .unwrap(),
            Column::new("ticker".into(), tickers),
            Column::new("name".into(), vec![Some("测试股份"); n]),
            Column::new("open".into(), pre_closes.clone()),
            Column::new("high".into(), closes.clone()),
            Column::new("low".into(), pre_closes.clone()),
            Column::new("close".into(), closes.clone()),
            Column::new("pre_close".into(), pre_closes),
            Column::new("pct_change".into(), vec![1.0; n]),
            Column::new("volume".into(), vec![100_000.0; n]),
            Column::new("amount".into(), vec![1_000_000.0; n]),
            Column::new("turnover".into(), vec![2.5; n]),
            Column::new("market_cap".into(), vec![5e9; n]),
            Column::new("float_cap".into(), vec![4e9; n]),
            Column::new("is_st".into(), vec![false; n]),
            Column::new("is_limit_up".into(), vec![false; n]),
            Column::new("is_limit_down".into(), vec![false; n]),
        ])
        .unwrap()
    }

    #[test]
    fn open_creates_directories_and_tables() {
        let tmp = tempfile::tempdir().unwrap();
        let db = tmp.path().join("db").join("atlas.db");
        let store = SnapshotStore::open(&db).unwrap();
        assert!(db.exists());
        assert_eq!(
            store.tables().unwrap(),
            vec!["daily_market_snapshot", "market_phase", "trade_execution"]
        );
    }

    #[test]
    fn save_and_query_round_trip() {
        let mut store = SnapshotStore::open_in_memory().unwrap();
        let batch = sample_batch(&[
            ("2024-01-02", "600000.SH", 10.5, 10.0),
            ("2024-01-02", "000001.SZ", 9.8, 9.7),
        ]);
        let saved = store.save_snapshots(&batch, false).unwrap();
        assert_eq!(saved, 2);

        let all = store.snapshots(&QueryFilter::default()).unwrap();
        assert_eq!(all.height(), 2);
        // Ordered by (trade_date, ticker) ascending.
        let tickers = all.column("ticker").unwrap().str().unwrap();
        assert_eq!(tickers.get(0), Some("000001.SZ"));
        assert_eq!(tickers.get(1), Some("600000.SH"));

        let one = store
            .snapshots(&QueryFilter {
                ticker: Some("600000.SH".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(one.height(), 1);
        let close = one.column("close").unwrap().f64().unwrap();
        assert_eq!(close.get(0), Some(10.5));
    }

    #[test]
    fn query_by_inclusive_date_range() {
        let mut store = SnapshotStore::open_in_memory().unwrap();
        let batch = sample_batch(&[
            ("2024-01-02", "600000.SH", 10.5, 10.0),
            ("2024-01-03", "600000.SH", 10.6, 10.5),
            ("2024-01-04", "600000.SH", 10.7, 10.6),
        ]);
        store.save_snapshots(&batch, false).unwrap();

        let range = store
            .snapshots(&QueryFilter {
                start_date: NaiveDate::from_ymd_opt(2024, 1, 3),
                end_date: NaiveDate::from_ymd_opt(2024, 1, 4),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(range.height(), 2);
        let dates = range.column("trade_date").unwrap().date().unwrap();
        assert_eq!(dates.get(0), Some(19725));
    }

    #[test]
    fn save_without_replace_hits_the_primary_key() {
        let mut store = SnapshotStore::open_in_memory().unwrap();
        let batch = sample_batch(&[("2024-01-02", "600000.SH", 10.5, 10.0)]);
        store.save_snapshots(&batch, false).unwrap();
        let err = store.save_snapshots(&batch, false).unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));
    }

    #[test]
    fn save_with_replace_is_idempotent() {
        let mut store = SnapshotStore::open_in_memory().unwrap();
        let batch = sample_batch(&[
            ("2024-01-02", "600000.SH", 10.5, 10.0),
            ("2024-01-02", "000001.SZ", 9.8, 9.7),
        ]);
        store.save_snapshots(&batch, true).unwrap();
        let first = store.snapshots(&QueryFilter::default()).unwrap();
        store.save_snapshots(&batch, true).unwrap();
        let second = store.snapshots(&QueryFilter::default()).unwrap();

        assert_eq!(second.height(), 2);
        assert!(first.equals_missing(&second));
    }

    #[test]
    fn upsert_overwrites_all_non_key_columns() {
        let mut store = SnapshotStore::open_in_memory().unwrap();
        store
            .upsert_batch(
                "daily_market_snapshot",
                &sample_batch(&[("2024-01-02", "600000.SH", 10.5, 10.0)]),
            )
            .unwrap();
        store
            .upsert_batch(
                "daily_market_snapshot",
                &sample_batch(&[("2024-01-02", "600000.SH", 11.0, 10.0)]),
            )
            .unwrap();

        let all = store.snapshots(&QueryFilter::default()).unwrap();
        assert_eq!(all.height(), 1);
        let close = all.column("close").unwrap().f64().unwrap();
        assert_eq!(close.get(0), Some(11.0));
    }

    #[test]
    fn generic_save_serves_the_phase_table() {
        let mut store = SnapshotStore::open_in_memory().unwrap();
        let df = DataFrame::new(vec![
            Column::new("trade_date".into(), vec![19724i32])
                .cast(&DataType::Date)
                .unwrap(),
            Column::new("phase".into(), vec!["M2"]),
            Column::new("M1_core".into(), vec![false]),
            Column::new("M2_front".into(), vec![true]),
            Column::new("M3_identifiable".into(), vec![false]),
            Column::new("V_triggered".into(), vec![false]),
            Column::new("notes".into(), vec![Some("轮动初期")]),
        ])
        .unwrap();
        store.save_batch("market_phase", &df, false).unwrap();

        let back = store.query("market_phase", &QueryFilter::default()).unwrap();
        assert_eq!(back.height(), 1);
        let phase = back.column("phase").unwrap().str().unwrap();
        assert_eq!(phase.get(0), Some("M2"));
        let front = back.column("M2_front").unwrap().bool().unwrap();
        assert_eq!(front.get(0), Some(true));
    }

    #[test]
    fn unknown_table_is_a_schema_error() {
        let mut store = SnapshotStore::open_in_memory().unwrap();
        let err = store
            .save_batch("nope", &sample_batch(&[]), false)
            .unwrap_err();
        assert!(matches!(err, StoreError::Schema(_)));
    }

    #[test]
    fn migration_adds_pre_close_to_legacy_store() {
        let tmp = tempfile::tempdir().unwrap();
        let db = tmp.path().join("atlas.db");
        {
            let conn = Connection::open(&db).unwrap();
            conn.execute_batch(
                "CREATE TABLE daily_market_snapshot (
                   trade_date DATE NOT NULL,
                   ticker VARCHAR NOT NULL,
                   close DOUBLE,
                   PRIMARY KEY (trade_date, ticker)
                 );",
            )
            .unwrap();
        }
        let store = SnapshotStore::open(&db).unwrap();
        let mut stmt = store
            .conn
            .prepare("PRAGMA table_info('daily_market_snapshot')")
            .unwrap();
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(1))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(names.iter().any(|n| n == "pre_close"));
    }

    #[test]
    fn read_only_store_can_query() {
        let tmp = tempfile::tempdir().unwrap();
        let db = tmp.path().join("atlas.db");
        {
            let mut store = SnapshotStore::open(&db).unwrap();
            store
                .save_snapshots(
                    &sample_batch(&[("2024-01-02", "600000.SH", 10.5, 10.0)]),
                    false,
                )
                .unwrap();
        }
        let store = SnapshotStore::open_read_only(&db).unwrap();
        let all = store.snapshots(&QueryFilter::default()).unwrap();
        assert_eq!(all.height(), 1);
    }

    // ── multi-file load ─────────────────────────────────────────────

    const HISTORY_HEADER: &str = "trade_date,ticker,open,high,low,close,pre_close,pct_change,\
volume,amount,turnover,market_cap,float_cap";

    fn write_history_file(dir: &Path, name: &str, rows: &[String]) -> PathBuf {
        let path = dir.join(name);
        let mut content = String::from(HISTORY_HEADER);
        content.push('\n');
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn history_row(date: &str, ticker: &str, close: f64) -> String {
        format!("{date},{ticker},10.0,11.2,9.9,{close},10.0,1.0,100000,1000000.0,2.5,5e9,4e9")
    }

    #[test]
    fn load_files_commits_all_files() {
        let tmp = tempfile::tempdir().unwrap();
        let a = write_history_file(
            tmp.path(),
            "600000.csv",
            &[
                history_row("2024-01-02", "600000", 10.5),
                history_row("2024-01-03", "600000", 10.6),
            ],
        );
        let b = write_history_file(
            tmp.path(),
            "000001.csv",
            &[history_row("2024-01-02", "000001", 9.8)],
        );

        let mut store = SnapshotStore::open_in_memory().unwrap();
        let summary = store
            .load_files(
                &[a, b],
                SourceLayout::InstrumentHistory,
                None,
                &Settings::default(),
                None,
            )
            .unwrap();
        assert_eq!(summary, LoadSummary { files: 2, rows: 3 });
        assert_eq!(store.snapshots(&QueryFilter::default()).unwrap().height(), 3);
    }

    #[test]
    fn load_files_rolls_back_everything_on_any_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let good = write_history_file(
            tmp.path(),
            "600000.csv",
            &[history_row("2024-01-02", "600000", 10.5)],
        );
        // Same key twice: the cleaning pipeline rejects the file.
        let bad = write_history_file(
            tmp.path(),
            "000001.csv",
            &[
                history_row("2024-01-02", "000001", 9.8),
                history_row("2024-01-02", "000001", 9.9),
            ],
        );

        let mut store = SnapshotStore::open_in_memory().unwrap();
        let err = store
            .load_files(
                &[good, bad],
                SourceLayout::InstrumentHistory,
                None,
                &Settings::default(),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Clean(CleanError::DuplicateKey { .. })));

        // Zero rows from either file survive the rollback.
        assert_eq!(store.snapshots(&QueryFilter::default()).unwrap().height(), 0);
    }

    #[test]
    fn reloading_the_same_file_changes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let file = write_history_file(
            tmp.path(),
            "600000.csv",
            &[
                history_row("2024-01-02", "600000", 10.5),
                history_row("2024-01-03", "600000", 10.6),
            ],
        );

        let mut store = SnapshotStore::open_in_memory().unwrap();
        let paths = vec![file];
        store
            .load_files(
                &paths,
                SourceLayout::InstrumentHistory,
                None,
                &Settings::default(),
                None,
            )
            .unwrap();
        let first = store.snapshots(&QueryFilter::default()).unwrap();
        store
            .load_files(
                &paths,
                SourceLayout::InstrumentHistory,
                None,
                &Settings::default(),
                None,
            )
            .unwrap();
        let second = store.snapshots(&QueryFilter::default()).unwrap();

        assert_eq!(first.height(), 2);
        assert!(first.equals_missing(&second));
    }

    #[test]
    fn load_files_respects_the_limit() {
        let tmp = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for (i, code) in ["600000", "600004", "600006"].iter().enumerate() {
            paths.push(write_history_file(
                tmp.path(),
                &format!("{code}.csv"),
                &[history_row("2024-01-02", code, 10.0 + i as f64)],
            ));
        }

        let mut store = SnapshotStore::open_in_memory().unwrap();
        let summary = store
            .load_files(
                &paths,
                SourceLayout::InstrumentHistory,
                Some(2),
                &Settings::default(),
                None,
            )
            .unwrap();
        assert_eq!(summary.files, 2);
        assert_eq!(store.snapshots(&QueryFilter::default()).unwrap().height(), 2);
    }
}
