//! Atlas Core — canonicalization contracts, cleaning pipeline, and snapshot store.
//!
//! This crate turns heterogeneous daily and historical A-share market CSV
//! files into one normalized schema and loads them into an embedded SQLite
//! store keyed by `(trade_date, ticker)`:
//! - Field contract: canonical field vocabulary + per-provider rename maps
//! - Conventions: ticker formatting, exchange/board classification, price-limit rules
//! - Table schema registry: the single source of truth for columns, types, and keys
//! - Validator: structural checks and type coercion for record batches
//! - Cleaning pipeline: raw file → canonical batch, or a named error
//! - Store adapter: transactional, idempotent upsert loads and read-back queries

pub mod config;
pub mod contracts;
pub mod pipeline;
