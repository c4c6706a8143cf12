//! Canonical field-name vocabulary.
//!
//! Every column name used anywhere in the project is defined here once.
//! The mappings, schema registry, validator, and pipeline all refer to
//! these constants — renaming a field means changing exactly one line.

pub const TICKER: &str = "ticker";
pub const TRADE_DATE: &str = "trade_date";
pub const NAME: &str = "name";
pub const CREATED_AT: &str = "created_at";

pub const OPEN: &str = "open";
pub const HIGH: &str = "high";
pub const LOW: &str = "low";
pub const CLOSE: &str = "close";
pub const VOLUME: &str = "volume";
pub const AMOUNT: &str = "amount";

pub const PCT_CHANGE: &str = "pct_change";
pub const PRE_CLOSE: &str = "pre_close";

pub const TURNOVER: &str = "turnover";
pub const MARKET_CAP: &str = "market_cap";
pub const FLOAT_CAP: &str = "float_cap";

pub const IS_ST: &str = "is_st";
pub const IS_LIMIT_UP: &str = "is_limit_up";
pub const IS_LIMIT_DOWN: &str = "is_limit_down";

pub const PHASE: &str = "phase";
pub const M1_CORE: &str = "M1_core";
pub const M2_FRONT: &str = "M2_front";
pub const M3_IDENTIFIABLE: &str = "M3_identifiable";
pub const V_TRIGGERED: &str = "V_triggered";
pub const NOTES: &str = "notes";

pub const TRADE_ID: &str = "trade_id";
pub const ENTRY_DATE: &str = "entry_date";
pub const ENTRY_PRICE: &str = "entry_price";
pub const PATH_TYPE: &str = "path_type";
pub const HALF_SELL_TRIGGER: &str = "half_sell_trigger";
pub const HALF_SELL_DATE: &str = "half_sell_date";
pub const HALF_SELL_PRICE: &str = "half_sell_price";
pub const EXIT_DATE: &str = "exit_date";
pub const EXIT_PRICE: &str = "exit_price";
pub const POSITION_PCT: &str = "position_pct";

/// Columns coerced to `f64` by the validator unless told otherwise.
pub const NUMERIC_FIELDS: &[&str] = &[
    OPEN,
    HIGH,
    LOW,
    CLOSE,
    VOLUME,
    AMOUNT,
    PCT_CHANGE,
    TURNOVER,
    MARKET_CAP,
    FLOAT_CAP,
    PRE_CLOSE,
    ENTRY_PRICE,
    EXIT_PRICE,
    HALF_SELL_PRICE,
    HALF_SELL_TRIGGER,
    POSITION_PCT,
];

/// Columns coerced to booleans via the fixed token vocabulary.
pub const BOOLEAN_FIELDS: &[&str] = &[
    IS_ST,
    IS_LIMIT_UP,
    IS_LIMIT_DOWN,
    M1_CORE,
    M2_FRONT,
    M3_IDENTIFIABLE,
    V_TRIGGERED,
];

/// Columns coerced to calendar dates.
pub const DATE_FIELDS: &[&str] = &[TRADE_DATE, ENTRY_DATE, EXIT_DATE, HALF_SELL_DATE];

/// Columns that stay as free-form strings.
pub const STRING_FIELDS: &[&str] = &[TICKER, TRADE_ID, NAME, PHASE, PATH_TYPE, NOTES];
