//! Batch validation — structural column checks and type coercion.
//!
//! Structural checks compare a batch against the schema registry (or an
//! explicit column set). Coercions turn raw string columns into typed ones:
//! numeric and date failures become nulls unless strict mode is requested,
//! boolean coercion maps a fixed token vocabulary and everything else to
//! null. Already-typed columns pass through unchanged, so cleaning is
//! idempotent on its own output.

use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;

use super::conventions::parse_date;
use super::fields::{BOOLEAN_FIELDS, DATE_FIELDS, NUMERIC_FIELDS};
use super::schema::{get_table, SchemaError};

/// Errors from batch validation.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("[{table}] missing columns: {missing:?}")]
    MissingColumns { table: String, missing: Vec<String> },

    #[error("[{table}] unexpected columns: {extra:?}")]
    ExtraColumns { table: String, extra: Vec<String> },

    #[error("column '{column}': {failures} value(s) failed {dtype} conversion")]
    TypeConversion {
        column: String,
        dtype: &'static str,
        failures: usize,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("frame error: {0}")]
    Frame(#[from] PolarsError),
}

fn present_columns(df: &DataFrame) -> Vec<String> {
    df.get_column_names_str()
        .into_iter()
        .map(|s| s.to_string())
        .collect()
}

/// Fail when any required column is absent from the batch.
pub fn check_missing_columns(
    df: &DataFrame,
    required: &[&str],
    table: &str,
) -> Result<(), ValidateError> {
    let present = present_columns(df);
    let mut missing: Vec<String> = required
        .iter()
        .filter(|c| !present.iter().any(|p| p == *c))
        .map(|c| c.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        missing.sort();
        Err(ValidateError::MissingColumns {
            table: table.to_string(),
            missing,
        })
    }
}

/// Report columns outside the expected set; fail instead under `strict`.
pub fn check_extra_columns(
    df: &DataFrame,
    expected: &[&str],
    table: &str,
    strict: bool,
) -> Result<Vec<String>, ValidateError> {
    let mut extra: Vec<String> = present_columns(df)
        .into_iter()
        .filter(|c| !expected.contains(&c.as_str()))
        .collect();
    extra.sort();
    if !extra.is_empty() && strict {
        return Err(ValidateError::ExtraColumns {
            table: table.to_string(),
            extra,
        });
    }
    Ok(extra)
}

/// Which columns a coercion applies to: an explicit list, or every present
/// column belonging to the relevant field class.
fn coercion_targets(df: &DataFrame, columns: Option<&[&str]>, class: &[&str]) -> Vec<String> {
    let present = present_columns(df);
    match columns {
        Some(cols) => present
            .into_iter()
            .filter(|c| cols.contains(&c.as_str()))
            .collect(),
        None => present
            .into_iter()
            .filter(|c| class.contains(&c.as_str()))
            .collect(),
    }
}

/// Coerce string columns to `f64`. Unparsable values become null, or fail
/// the batch when `strict`.
pub fn convert_numeric(
    df: &DataFrame,
    columns: Option<&[&str]>,
    strict: bool,
) -> Result<DataFrame, ValidateError> {
    let mut df = df.clone();
    for name in coercion_targets(&df, columns, NUMERIC_FIELDS) {
        let col = df.column(&name)?;
        if col.dtype() != &DataType::String {
            continue;
        }
        let ca = col.str()?;
        let mut parsed: Vec<Option<f64>> = Vec::with_capacity(ca.len());
        let mut failures = 0usize;
        for value in ca.iter() {
            match value.map(str::trim) {
                None | Some("") => parsed.push(None),
                Some(raw) => match raw.parse::<f64>() {
                    Ok(num) => parsed.push(Some(num)),
                    Err(_) => {
                        failures += 1;
                        parsed.push(None);
                    }
                },
            }
        }
        if strict && failures > 0 {
            return Err(ValidateError::TypeConversion {
                column: name,
                dtype: "numeric",
                failures,
            });
        }
        df.with_column(Column::new(name.as_str().into(), parsed))?;
    }
    Ok(df)
}

const TRUE_TOKENS: &[&str] = &["1", "true", "yes", "是"];
const FALSE_TOKENS: &[&str] = &["0", "false", "no", "否"];

/// Coerce string columns to booleans via the fixed token vocabulary.
/// Tokens outside the vocabulary become null.
pub fn convert_boolean(df: &DataFrame, columns: Option<&[&str]>) -> Result<DataFrame, ValidateError> {
    let mut df = df.clone();
    for name in coercion_targets(&df, columns, BOOLEAN_FIELDS) {
        let col = df.column(&name)?;
        if col.dtype() != &DataType::String {
            continue;
        }
        let ca = col.str()?;
        let parsed: Vec<Option<bool>> = ca
            .iter()
            .map(|value| {
                let token = value?.trim().to_lowercase();
                if TRUE_TOKENS.contains(&token.as_str()) {
                    Some(true)
                } else if FALSE_TOKENS.contains(&token.as_str()) {
                    Some(false)
                } else {
                    None
                }
            })
            .collect();
        df.with_column(Column::new(name.as_str().into(), parsed))?;
    }
    Ok(df)
}

/// Coerce string columns to calendar dates via the ordered candidate
/// formats. Unparsable values become null, or fail the batch when `strict`.
pub fn convert_date(
    df: &DataFrame,
    columns: Option<&[&str]>,
    from_format: Option<&str>,
    strict: bool,
) -> Result<DataFrame, ValidateError> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    let mut df = df.clone();
    for name in coercion_targets(&df, columns, DATE_FIELDS) {
        let col = df.column(&name)?;
        if col.dtype() != &DataType::String {
            continue;
        }
        let ca = col.str()?;
        let mut days: Vec<Option<i32>> = Vec::with_capacity(ca.len());
        let mut failures = 0usize;
        for value in ca.iter() {
            match value {
                None => days.push(None),
                Some(raw) => match parse_date(raw, from_format) {
                    Ok(date) => days.push(Some((date - epoch).num_days() as i32)),
                    Err(_) => {
                        failures += 1;
                        days.push(None);
                    }
                },
            }
        }
        if strict && failures > 0 {
            return Err(ValidateError::TypeConversion {
                column: name,
                dtype: "date",
                failures,
            });
        }
        let column = Column::new(name.as_str().into(), days).cast(&DataType::Date)?;
        df.with_column(column)?;
    }
    Ok(df)
}

/// Run the three coercions in fixed order: numeric → boolean → date.
/// The order matters — boolean tokens must never be consumed as numbers.
pub fn canonicalize(df: &DataFrame) -> Result<DataFrame, ValidateError> {
    let df = convert_numeric(df, None, false)?;
    let df = convert_boolean(&df, None)?;
    convert_date(&df, None, None, false)
}

/// Check a batch's columns against a registered table.
///
/// Fails on missing columns; extra columns fail when `allow_extra` is off,
/// otherwise they are returned for the caller to inspect.
pub fn validate_schema(
    df: &DataFrame,
    table_name: &str,
    allow_extra: bool,
) -> Result<Vec<String>, ValidateError> {
    let schema = get_table(table_name)?;
    let required = schema.insert_columns();
    check_missing_columns(df, &required, table_name)?;
    check_extra_columns(df, &required, table_name, !allow_extra)
}

/// Schema check followed by type canonicalization, in one call.
pub fn quick_validate(
    df: &DataFrame,
    table_name: &str,
    allow_extra: bool,
    auto_convert: bool,
) -> Result<DataFrame, ValidateError> {
    validate_schema(df, table_name, allow_extra)?;
    if auto_convert {
        canonicalize(df)
    } else {
        Ok(df.clone())
    }
}
