//! Raw CSV ingestion — a file on disk becomes an all-string record batch.
//!
//! Upstream files arrive UTF-8 with a signature and provider-native headers,
//! so ingestion stays deliberately dumb: the BOM is stripped, every column
//! is materialized as a string, and all type coercion belongs to the
//! validator. Structural problems (unreadable file, ragged rows, duplicate
//! or empty headers) are ingest errors.

use polars::prelude::*;
use std::path::Path;
use thiserror::Error;

/// Errors from raw CSV ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("csv error in '{path}': {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("'{path}': empty column name in header")]
    EmptyHeader { path: String },

    #[error("'{path}': duplicate column '{column}'")]
    DuplicateColumn { path: String, column: String },

    #[error("frame error: {0}")]
    Frame(#[from] PolarsError),
}

/// Read a CSV file into an all-string DataFrame.
pub fn read_csv(path: &Path) -> Result<DataFrame, IngestError> {
    let display = path.display().to_string();
    if !path.exists() {
        return Err(IngestError::FileNotFound(display));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| IngestError::Csv {
            path: display.clone(),
            source: e,
        })?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| IngestError::Csv {
            path: display.clone(),
            source: e,
        })?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            // A UTF-8 signature survives on the first header field.
            let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
            h.trim().to_string()
        })
        .collect();

    for (i, name) in headers.iter().enumerate() {
        if name.is_empty() {
            return Err(IngestError::EmptyHeader { path: display });
        }
        if headers[..i].contains(name) {
            return Err(IngestError::DuplicateColumn {
                path: display,
                column: name.clone(),
            });
        }
    }

    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record.map_err(|e| IngestError::Csv {
            path: display.clone(),
            source: e,
        })?;
        for (i, column) in columns.iter_mut().enumerate() {
            column.push(record.get(i).map(|s| s.to_string()));
        }
    }

    let columns: Vec<Column> = headers
        .iter()
        .zip(columns)
        .map(|(name, values)| Column::new(name.as_str().into(), values))
        .collect();
    Ok(DataFrame::new(columns)?)
}
