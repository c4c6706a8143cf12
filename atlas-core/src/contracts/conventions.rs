//! Market conventions — ticker formatting, exchange/board classification,
//! price-limit percentages, and canonical date handling.
//!
//! Everything in this module is a pure function over its inputs. Prefix
//! tables and the limit-percent rules follow the listing rules of the three
//! mainland exchanges; the date parser tries a fixed, ordered list of known
//! input formats so the behavior is deterministic.

use chrono::NaiveDate;
use thiserror::Error;

/// Canonical length of a bare instrument code.
pub const TICKER_LENGTH: usize = 6;

/// Canonical date rendering used across files, store, and file names.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Ordered candidate formats tried when no explicit input format is given.
/// The first successful parse wins.
pub const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d"];

/// Listing board of an instrument, derived from its numeric prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Board {
    /// Shanghai main board (600/601/603/605).
    ShMain,
    /// Shanghai STAR market (688/689).
    Star,
    /// Shenzhen main board (000/001/002/003).
    SzMain,
    /// Shenzhen ChiNext (300/301/302).
    ChiNext,
    /// Beijing Stock Exchange (4xx/8xx/920).
    Beijing,
}

/// Exchange an instrument trades on.
///
/// `Unknown` is a classification signal only — the cleaning pipeline rejects
/// rows that remain unclassified; an `Unknown` identifier is never committed
/// to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    Sh,
    Sz,
    Bj,
    Unknown,
}

impl Exchange {
    /// Suffix used in the canonical `dddddd.XX` identifier form.
    pub fn suffix(&self) -> &'static str {
        match self {
            Exchange::Sh => "SH",
            Exchange::Sz => "SZ",
            Exchange::Bj => "BJ",
            Exchange::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.suffix())
    }
}

/// A date string that matched none of the known formats.
#[derive(Debug, Error)]
#[error("cannot parse date '{raw}'")]
pub struct DateParseError {
    pub raw: String,
}

/// Zero-pad a raw code to the canonical 6-digit form.
///
/// `"1"` becomes `"000001"`; an already 6-digit code passes through.
pub fn format_ticker(raw: &str) -> String {
    let raw = raw.trim();
    if raw.len() < TICKER_LENGTH {
        format!("{raw:0>width$}", width = TICKER_LENGTH)
    } else {
        raw.to_string()
    }
}

/// Classify the listing board from the numeric prefix of a code.
///
/// Accepts either a bare 6-digit code or a suffixed identifier; returns
/// `None` for prefixes outside the documented sets (funds, bonds, and other
/// non-equity code ranges).
pub fn classify_board(ticker: &str) -> Option<Board> {
    let code = ticker.split('.').next().unwrap_or(ticker);
    if ["600", "601", "603", "605"].iter().any(|p| code.starts_with(p)) {
        Some(Board::ShMain)
    } else if ["688", "689"].iter().any(|p| code.starts_with(p)) {
        Some(Board::Star)
    } else if ["000", "001", "002", "003"].iter().any(|p| code.starts_with(p)) {
        Some(Board::SzMain)
    } else if ["300", "301", "302"].iter().any(|p| code.starts_with(p)) {
        Some(Board::ChiNext)
    } else if ["4", "8", "920"].iter().any(|p| code.starts_with(p)) {
        Some(Board::Beijing)
    } else {
        None
    }
}

/// Classify the exchange from the numeric prefix of a code.
pub fn classify_exchange(ticker: &str) -> Exchange {
    match classify_board(ticker) {
        Some(Board::ShMain) | Some(Board::Star) => Exchange::Sh,
        Some(Board::SzMain) | Some(Board::ChiNext) => Exchange::Sz,
        Some(Board::Beijing) => Exchange::Bj,
        None => Exchange::Unknown,
    }
}

/// Normalize a raw identifier to the canonical `dddddd.XX` form.
///
/// An already-suffixed identifier passes through (uppercased) when both the
/// code and suffix are well-formed. A bare code is zero-padded and tagged
/// with the suffix of its classified exchange. Returns `None` when the
/// identifier cannot be classified — callers decide whether that is fatal.
pub fn normalize_ticker(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Some((code, suffix)) = raw.rsplit_once('.') {
        let suffix = suffix.to_ascii_uppercase();
        if matches!(suffix.as_str(), "SH" | "SZ" | "BJ")
            && code.len() == TICKER_LENGTH
            && code.bytes().all(|b| b.is_ascii_digit())
        {
            return Some(format!("{code}.{suffix}"));
        }
        return None;
    }

    let code = format_ticker(raw);
    if code.len() != TICKER_LENGTH || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match classify_exchange(&code) {
        Exchange::Unknown => None,
        ex => Some(format!("{code}.{}", ex.suffix())),
    }
}

/// Daily price-limit percentage for a board.
///
/// The board takes precedence: the special-treatment reduction to 5% applies
/// only on the two main boards, never on the higher-volatility boards.
pub fn limit_percent(board: Board, is_st: bool) -> f64 {
    match board {
        Board::Star | Board::ChiNext => 20.0,
        Board::Beijing => 30.0,
        Board::ShMain | Board::SzMain => {
            if is_st {
                5.0
            } else {
                10.0
            }
        }
    }
}

/// Parse a date string.
///
/// With `from_format`, only that format is tried. Without it, the candidates
/// in [`DATE_FORMATS`] are tried in order and the first success is returned.
pub fn parse_date(raw: &str, from_format: Option<&str>) -> Result<NaiveDate, DateParseError> {
    let raw = raw.trim();
    if let Some(fmt) = from_format {
        return NaiveDate::parse_from_str(raw, fmt).map_err(|_| DateParseError {
            raw: raw.to_string(),
        });
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Ok(date);
        }
    }
    Err(DateParseError {
        raw: raw.to_string(),
    })
}

/// Parse and re-render a date string in the canonical `%Y-%m-%d` form.
pub fn format_date(raw: &str, from_format: Option<&str>) -> Result<String, DateParseError> {
    parse_date(raw, from_format).map(|d| d.format(DATE_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn format_ticker_pads_short_codes() {
        assert_eq!(format_ticker("1"), "000001");
        assert_eq!(format_ticker("600000"), "600000");
        assert_eq!(format_ticker(" 2318 "), "002318");
    }

    #[test]
    fn classify_exchange_by_prefix() {
        assert_eq!(classify_exchange("600000"), Exchange::Sh);
        assert_eq!(classify_exchange("688001"), Exchange::Sh);
        assert_eq!(classify_exchange("000001"), Exchange::Sz);
        assert_eq!(classify_exchange("300750"), Exchange::Sz);
        assert_eq!(classify_exchange("430047"), Exchange::Bj);
        assert_eq!(classify_exchange("830799"), Exchange::Bj);
        assert_eq!(classify_exchange("920001"), Exchange::Bj);
    }

    #[test]
    fn unknown_prefixes_are_not_classified() {
        // Funds and bonds code ranges are outside the documented sets.
        assert_eq!(classify_exchange("510300"), Exchange::Unknown);
        assert_eq!(classify_exchange("123456"), Exchange::Unknown);
        assert!(classify_board("510300").is_none());
    }

    #[test]
    fn normalize_ticker_attaches_suffix() {
        assert_eq!(normalize_ticker("600000").as_deref(), Some("600000.SH"));
        assert_eq!(normalize_ticker("1").as_deref(), Some("000001.SZ"));
        assert_eq!(normalize_ticker("830799").as_deref(), Some("830799.BJ"));
    }

    #[test]
    fn normalize_ticker_passes_suffixed_identifiers() {
        assert_eq!(normalize_ticker("600000.SH").as_deref(), Some("600000.SH"));
        assert_eq!(normalize_ticker("000001.sz").as_deref(), Some("000001.SZ"));
        // Malformed suffix or code is not silently accepted.
        assert_eq!(normalize_ticker("600000.XX"), None);
        assert_eq!(normalize_ticker("60000.SH"), None);
    }

    #[test]
    fn normalize_ticker_rejects_unclassifiable() {
        assert_eq!(normalize_ticker("510300"), None);
        assert_eq!(normalize_ticker("abc"), None);
    }

    #[test]
    fn limit_percent_truth_table() {
        assert_eq!(limit_percent(Board::ShMain, false), 10.0);
        assert_eq!(limit_percent(Board::SzMain, false), 10.0);
        assert_eq!(limit_percent(Board::ShMain, true), 5.0);
        assert_eq!(limit_percent(Board::SzMain, true), 5.0);
        // ST status never widens or narrows the higher-volatility boards.
        assert_eq!(limit_percent(Board::Star, true), 20.0);
        assert_eq!(limit_percent(Board::ChiNext, true), 20.0);
        assert_eq!(limit_percent(Board::Beijing, true), 30.0);
        assert_eq!(limit_percent(Board::Star, false), 20.0);
        assert_eq!(limit_percent(Board::Beijing, false), 30.0);
    }

    #[test]
    fn parse_date_tries_formats_in_order() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(parse_date("2024-01-02", None).unwrap(), expected);
        assert_eq!(parse_date("20240102", None).unwrap(), expected);
        assert_eq!(parse_date("2024/01/02", None).unwrap(), expected);
        assert!(parse_date("02.01.2024", None).is_err());
    }

    #[test]
    fn parse_date_with_explicit_format() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(parse_date("20240102", Some("%Y%m%d")).unwrap(), expected);
        assert!(parse_date("2024-01-02", Some("%Y%m%d")).is_err());
    }

    #[test]
    fn format_date_renders_canonical_form() {
        assert_eq!(format_date("20240102", None).unwrap(), "2024-01-02");
        assert_eq!(format_date("2024/01/02", None).unwrap(), "2024-01-02");
    }

    proptest! {
        #[test]
        fn format_ticker_always_six_digits_for_numeric_input(code in 0u32..1_000_000) {
            let formatted = format_ticker(&code.to_string());
            prop_assert_eq!(formatted.len(), TICKER_LENGTH);
        }

        #[test]
        fn normalized_suffix_matches_classification(code in 0u32..1_000_000) {
            let raw = format!("{code:06}");
            match normalize_ticker(&raw) {
                Some(full) => {
                    let suffix = full.rsplit_once('.').map(|(_, s)| s.to_string()).unwrap();
                    prop_assert_eq!(suffix, classify_exchange(&raw).suffix());
                }
                None => prop_assert_eq!(classify_exchange(&raw), Exchange::Unknown),
            }
        }
    }
}
