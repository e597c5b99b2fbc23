//! Calendar date extraction from lot identifiers.
//!
//! Lot numbers embed a DDMMYY fragment at a fixed position. Two vendor
//! patterns exist: a site-prefixed form (`ABJ150124002`) and a plain
//! `LOT`-prefixed form (`LOT150124`). Anything else carries no date.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

/// Site-prefixed lots: 3-5 uppercase letters, then DDMMYY, then an
/// optional numeric suffix.
static SITE_LOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3,5}(\d{6})\d*").expect("hard-coded pattern"));

/// Plain lots: the literal `LOT` prefix then DDMMYY.
static PLAIN_LOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^LOT(\d{6})").expect("hard-coded pattern"));

/// Extract the production date embedded in a lot identifier.
///
/// Returns `None` when neither pattern matches or the captured digits do
/// not form a valid calendar date (e.g. month 13). Never fails on
/// malformed input; a fixed positional match avoids false positives on
/// product codes embedded in the same string.
pub fn extract_lot_date(lot: &str) -> Option<NaiveDate> {
    let lot = lot.trim();
    if lot.is_empty() {
        return None;
    }

    let digits = SITE_LOT
        .captures(lot)
        .or_else(|| PLAIN_LOT.captures(lot))
        .and_then(|caps| caps.get(1))?;

    NaiveDate::parse_from_str(digits.as_str(), "%d%m%y").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn extracts_from_site_prefixed_lots() {
        assert_eq!(extract_lot_date("ABJ150124002"), Some(date(2024, 1, 15)));
        assert_eq!(extract_lot_date("DEPOT010324"), Some(date(2024, 3, 1)));
    }

    #[test]
    fn extracts_from_plain_lots() {
        assert_eq!(extract_lot_date("LOT150124"), Some(date(2024, 1, 15)));
        assert_eq!(extract_lot_date("LOT0103241234"), Some(date(2024, 3, 1)));
    }

    #[test]
    fn returns_none_for_invalid_calendar_digits() {
        // Day 32 and month 13 are not dates.
        assert_eq!(extract_lot_date("LOT320124"), None);
        assert_eq!(extract_lot_date("LOT011324"), None);
        assert_eq!(extract_lot_date("LOT000000"), None);
    }

    #[test]
    fn returns_none_when_no_pattern_matches() {
        assert_eq!(extract_lot_date(""), None);
        assert_eq!(extract_lot_date("   "), None);
        assert_eq!(extract_lot_date("150124"), None);
        assert_eq!(extract_lot_date("AB150124"), None);
        assert_eq!(extract_lot_date("lot150124"), None);
        assert_eq!(extract_lot_date("REF-150124"), None);
    }

    #[test]
    fn is_deterministic() {
        for _ in 0..3 {
            assert_eq!(extract_lot_date("ABJ150124002"), Some(date(2024, 1, 15)));
        }
    }
}
