//! Table schema registry — the single source of truth for store tables.
//!
//! Column names, types, nullability, and primary keys are defined here and
//! nowhere else; the validator and the store adapter both read from this
//! registry. Schemas are immutable at runtime.

use rusqlite::Connection;
use thiserror::Error;

use super::fields::{
    AMOUNT, CLOSE, CREATED_AT, ENTRY_DATE, ENTRY_PRICE, EXIT_DATE, EXIT_PRICE, FLOAT_CAP,
    HALF_SELL_DATE, HALF_SELL_PRICE, HALF_SELL_TRIGGER, HIGH, IS_LIMIT_DOWN, IS_LIMIT_UP, IS_ST,
    LOW, M1_CORE, M2_FRONT, M3_IDENTIFIABLE, MARKET_CAP, NAME, NOTES, OPEN, PATH_TYPE, PCT_CHANGE,
    PHASE, POSITION_PCT, PRE_CLOSE, TICKER, TRADE_DATE, TRADE_ID, TURNOVER, V_TRIGGERED, VOLUME,
};

/// Semantic column type, rendered to a SQL type name in DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Date,
    Varchar,
    Double,
    Bigint,
    Boolean,
    Timestamp,
}

impl SqlType {
    pub fn sql(&self) -> &'static str {
        match self {
            SqlType::Date => "DATE",
            SqlType::Varchar => "VARCHAR",
            SqlType::Double => "DOUBLE",
            SqlType::Bigint => "BIGINT",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Timestamp => "TIMESTAMP",
        }
    }
}

/// One column of a table definition.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub dtype: SqlType,
    pub nullable: bool,
    /// SQL default expression; a defaulted column is filled by the store,
    /// not by incoming batches.
    pub default_sql: Option<&'static str>,
}

impl ColumnSpec {
    const fn new(name: &'static str, dtype: SqlType) -> Self {
        Self {
            name,
            dtype,
            nullable: true,
            default_sql: None,
        }
    }

    const fn not_null(name: &'static str, dtype: SqlType) -> Self {
        Self {
            name,
            dtype,
            nullable: false,
            default_sql: None,
        }
    }

    const fn with_default(name: &'static str, dtype: SqlType, default_sql: &'static str) -> Self {
        Self {
            name,
            dtype,
            nullable: true,
            default_sql: Some(default_sql),
        }
    }
}

/// A named, ordered, immutable table definition.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [ColumnSpec],
    pub primary_key: &'static [&'static str],
}

impl TableSchema {
    /// All column names, in schema order.
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// Columns an incoming batch must provide, in schema order.
    /// DB-defaulted columns (`created_at`) are excluded.
    pub fn insert_columns(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .filter(|c| c.default_sql.is_none())
            .map(|c| c.name)
            .collect()
    }

    /// Insertable columns that are not part of the primary key.
    pub fn non_key_columns(&self) -> Vec<&'static str> {
        self.insert_columns()
            .into_iter()
            .filter(|name| !self.primary_key.contains(name))
            .collect()
    }

    /// Spec for a named column.
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// `CREATE TABLE IF NOT EXISTS` DDL.
    ///
    /// A single-column primary key is inlined on its column; a multi-column
    /// key is emitted as a trailing table constraint.
    pub fn create_sql(&self) -> String {
        let mut defs = Vec::with_capacity(self.columns.len() + 1);
        for col in self.columns {
            let mut def = format!("  {} {}", col.name, col.dtype.sql());
            if !col.nullable {
                def.push_str(" NOT NULL");
            }
            if self.primary_key.len() == 1 && self.primary_key[0] == col.name {
                def.push_str(" PRIMARY KEY");
            }
            if let Some(default) = col.default_sql {
                def.push_str(" DEFAULT ");
                def.push_str(default);
            }
            defs.push(def);
        }
        if self.primary_key.len() > 1 {
            defs.push(format!("  PRIMARY KEY ({})", self.primary_key.join(", ")));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
            self.name,
            defs.join(",\n")
        )
    }

    /// Parameterized insert-or-update-on-conflict statement.
    ///
    /// On a primary-key conflict every non-key column is overwritten with
    /// the incoming value — last write wins, no per-field merging.
    pub fn upsert_sql(&self) -> String {
        let cols = self.insert_columns();
        let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("?{i}")).collect();
        let updates: Vec<String> = self
            .non_key_columns()
            .into_iter()
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {}",
            self.name,
            cols.join(", "),
            placeholders.join(", "),
            self.primary_key.join(", "),
            updates.join(", ")
        )
    }

    /// Parameterized plain insert statement.
    pub fn insert_sql(&self) -> String {
        let cols = self.insert_columns();
        let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("?{i}")).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.name,
            cols.join(", "),
            placeholders.join(", ")
        )
    }

    /// Parameterized delete-by-primary-key statement.
    pub fn delete_by_key_sql(&self) -> String {
        let conds: Vec<String> = self
            .primary_key
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{c} = ?{}", i + 1))
            .collect();
        format!("DELETE FROM {} WHERE {}", self.name, conds.join(" AND "))
    }
}

/// Daily whole-market snapshot, one row per (trading date, instrument).
pub const DAILY_MARKET_SNAPSHOT: TableSchema = TableSchema {
    name: "daily_market_snapshot",
    columns: &[
        ColumnSpec::not_null(TRADE_DATE, SqlType::Date),
        ColumnSpec::not_null(TICKER, SqlType::Varchar),
        ColumnSpec::new(NAME, SqlType::Varchar),
        ColumnSpec::new(OPEN, SqlType::Double),
        ColumnSpec::new(HIGH, SqlType::Double),
        ColumnSpec::new(LOW, SqlType::Double),
        ColumnSpec::new(CLOSE, SqlType::Double),
        ColumnSpec::new(PRE_CLOSE, SqlType::Double),
        ColumnSpec::new(PCT_CHANGE, SqlType::Double),
        ColumnSpec::new(VOLUME, SqlType::Bigint),
        ColumnSpec::new(AMOUNT, SqlType::Double),
        ColumnSpec::new(TURNOVER, SqlType::Double),
        ColumnSpec::new(MARKET_CAP, SqlType::Double),
        ColumnSpec::new(FLOAT_CAP, SqlType::Double),
        ColumnSpec::new(IS_ST, SqlType::Boolean),
        ColumnSpec::new(IS_LIMIT_UP, SqlType::Boolean),
        ColumnSpec::new(IS_LIMIT_DOWN, SqlType::Boolean),
        ColumnSpec::with_default(CREATED_AT, SqlType::Timestamp, "CURRENT_TIMESTAMP"),
    ],
    primary_key: &[TRADE_DATE, TICKER],
};

/// Daily market phase assessment, one row per trading date.
pub const MARKET_PHASE: TableSchema = TableSchema {
    name: "market_phase",
    columns: &[
        ColumnSpec::not_null(TRADE_DATE, SqlType::Date),
        ColumnSpec::new(PHASE, SqlType::Varchar),
        ColumnSpec::new(M1_CORE, SqlType::Boolean),
        ColumnSpec::new(M2_FRONT, SqlType::Boolean),
        ColumnSpec::new(M3_IDENTIFIABLE, SqlType::Boolean),
        ColumnSpec::new(V_TRIGGERED, SqlType::Boolean),
        ColumnSpec::new(NOTES, SqlType::Varchar),
        ColumnSpec::with_default(CREATED_AT, SqlType::Timestamp, "CURRENT_TIMESTAMP"),
    ],
    primary_key: &[TRADE_DATE],
};

/// Trade execution record, one row per trade id.
pub const TRADE_EXECUTION: TableSchema = TableSchema {
    name: "trade_execution",
    columns: &[
        ColumnSpec::not_null(TRADE_ID, SqlType::Varchar),
        ColumnSpec::new(TICKER, SqlType::Varchar),
        ColumnSpec::new(ENTRY_DATE, SqlType::Date),
        ColumnSpec::new(ENTRY_PRICE, SqlType::Double),
        ColumnSpec::new(PATH_TYPE, SqlType::Varchar),
        ColumnSpec::new(HALF_SELL_TRIGGER, SqlType::Double),
        ColumnSpec::new(HALF_SELL_DATE, SqlType::Date),
        ColumnSpec::new(HALF_SELL_PRICE, SqlType::Double),
        ColumnSpec::new(EXIT_DATE, SqlType::Date),
        ColumnSpec::new(EXIT_PRICE, SqlType::Double),
        ColumnSpec::new(POSITION_PCT, SqlType::Double),
        ColumnSpec::new(NOTES, SqlType::Varchar),
    ],
    primary_key: &[TRADE_ID],
};

/// Every table in the store, in creation order.
pub const ALL_TABLES: &[TableSchema] = &[DAILY_MARKET_SNAPSHOT, MARKET_PHASE, TRADE_EXECUTION];

/// Errors from the schema registry.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unknown table '{table}' (known: {known})")]
    UnknownTable { table: String, known: String },
}

/// Look up a table definition by name.
pub fn get_table(name: &str) -> Result<&'static TableSchema, SchemaError> {
    ALL_TABLES
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| SchemaError::UnknownTable {
            table: name.to_string(),
            known: ALL_TABLES
                .iter()
                .map(|t| t.name)
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// Idempotently create every known table.
pub fn init_database(conn: &Connection) -> rusqlite::Result<()> {
    for table in ALL_TABLES {
        conn.execute_batch(&table.create_sql())?;
    }
    Ok(())
}
