//! Per-provider field mappings — source column names to the canonical
//! vocabulary.
//!
//! Each upstream provider/format gets one named rename map. Applying a map
//! renames the columns it knows about and leaves the rest alone by default,
//! so downstream validation can surface unexpected columns instead of
//! silently losing data.

use polars::prelude::*;
use thiserror::Error;

use super::fields::{
    AMOUNT, CLOSE, FLOAT_CAP, HIGH, LOW, MARKET_CAP, NAME, OPEN, PCT_CHANGE, PRE_CLOSE, TICKER,
    TRADE_DATE, TURNOVER, VOLUME,
};

/// A named source→canonical rename map.
#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    /// Registry key, e.g. `"eastmoney_snapshot"`.
    pub source: &'static str,
    pairs: &'static [(&'static str, &'static str)],
}

impl FieldMapping {
    /// Source-side column names, in declaration order.
    pub fn source_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.pairs.iter().map(|(src, _)| *src)
    }

    /// Canonical-side column names, in declaration order.
    pub fn canonical_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.pairs.iter().map(|(_, dst)| *dst)
    }

    /// Canonical name for a source column, if this map knows it.
    pub fn rename_for(&self, column: &str) -> Option<&'static str> {
        self.pairs
            .iter()
            .find(|(src, _)| *src == column)
            .map(|(_, dst)| *dst)
    }
}

/// Eastmoney daily bar download (per-instrument history pull).
pub const EASTMONEY_DAILY_BAR: FieldMapping = FieldMapping {
    source: "eastmoney_daily_bar",
    pairs: &[
        ("代码", TICKER),
        ("日期", TRADE_DATE),
        ("股票名称", NAME),
        ("开盘", OPEN),
        ("最高", HIGH),
        ("最低", LOW),
        ("收盘", CLOSE),
        ("成交量", VOLUME),
        ("成交额", AMOUNT),
        ("涨跌幅", PCT_CHANGE),
        ("换手率", TURNOVER),
    ],
};

/// Eastmoney whole-market snapshot — the layout of the per-day
/// `YYYY-MM-DD_Astock.csv` files.
pub const EASTMONEY_SNAPSHOT: FieldMapping = FieldMapping {
    source: "eastmoney_snapshot",
    pairs: &[
        ("代码", TICKER),
        ("名称", NAME),
        ("今开", OPEN),
        ("最高", HIGH),
        ("最低", LOW),
        ("最新价", CLOSE),
        ("昨收", PRE_CLOSE),
        ("涨跌幅", PCT_CHANGE),
        ("成交量", VOLUME),
        ("成交额", AMOUNT),
        ("换手率", TURNOVER),
        ("总市值", MARKET_CAP),
        ("流通市值", FLOAT_CAP),
    ],
};

/// AKShare daily bar history.
pub const AKSHARE_DAILY_BAR: FieldMapping = FieldMapping {
    source: "akshare_daily_bar",
    pairs: &[
        ("代码", TICKER),
        ("日期", TRADE_DATE),
        ("开盘", OPEN),
        ("最高", HIGH),
        ("最低", LOW),
        ("收盘", CLOSE),
        ("成交量", VOLUME),
        ("成交额", AMOUNT),
        ("涨跌幅", PCT_CHANGE),
        ("换手率", TURNOVER),
    ],
};

/// AKShare realtime quote table.
pub const AKSHARE_REALTIME: FieldMapping = FieldMapping {
    source: "akshare_realtime",
    pairs: &[
        ("代码", TICKER),
        ("名称", NAME),
        ("最新价", CLOSE),
        ("涨跌幅", PCT_CHANGE),
        ("成交量", VOLUME),
        ("成交额", AMOUNT),
        ("换手率", TURNOVER),
        ("总市值", MARKET_CAP),
        ("流通市值", FLOAT_CAP),
    ],
};

/// Every known mapping, in registry order.
pub const ALL_MAPPINGS: &[FieldMapping] = &[
    EASTMONEY_DAILY_BAR,
    EASTMONEY_SNAPSHOT,
    AKSHARE_DAILY_BAR,
    AKSHARE_REALTIME,
];

/// Errors from the mapping layer.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("unknown source '{requested}' (known: {known})")]
    UnknownSource { requested: String, known: String },

    #[error("rename failed: {0}")]
    Frame(#[from] PolarsError),
}

/// Look up a mapping by its registry key.
pub fn get_mapping(source: &str) -> Result<&'static FieldMapping, MappingError> {
    ALL_MAPPINGS
        .iter()
        .find(|m| m.source == source)
        .ok_or_else(|| MappingError::UnknownSource {
            requested: source.to_string(),
            known: ALL_MAPPINGS
                .iter()
                .map(|m| m.source)
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// Rename a batch's columns from a provider layout to the canonical one.
///
/// Columns the map does not know about are preserved unless `drop_extra`;
/// columns already carrying a canonical name pass through untouched.
pub fn apply_mapping(
    df: &DataFrame,
    source: &str,
    drop_extra: bool,
) -> Result<DataFrame, MappingError> {
    let mapping = get_mapping(source)?;
    let mut df = df.clone();

    let present: Vec<String> = df
        .get_column_names_str()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    for column in &present {
        if let Some(canonical) = mapping.rename_for(column) {
            df.rename(column, canonical.into())?;
        }
    }

    if drop_extra {
        let canonical: Vec<&str> = mapping.canonical_names().collect();
        let keep: Vec<String> = df
            .get_column_names_str()
            .into_iter()
            .filter(|name| canonical.contains(name))
            .map(|name| name.to_string())
            .collect();
        df = df.select(keep)?;
    }

    Ok(df)
}
