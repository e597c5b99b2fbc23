//! Sage-style mask record layout and parsing.
//!
//! The mask extract is positional: every record is a list of string
//! fields, the record kind sits in column 0 (`S` stock, `E` session
//! header, `L` inventory header) and stock lines carry at least
//! [`MIN_COLUMNS`] fields. Byte-level CSV handling stays outside this
//! crate; callers hand over already-split records.
//!
//! Column map for `S` records:
//!
//! | index | field                |
//! |-------|----------------------|
//! | 0     | record kind          |
//! | 1     | session number       |
//! | 2     | inventory number     |
//! | 4     | site / depot         |
//! | 5     | theoretical quantity |
//! | 7     | indicator            |
//! | 8     | product code         |
//! | 9     | location             |
//! | 10    | status               |
//! | 11    | unit of measure      |
//! | 14    | lot number           |

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use recount_core::{DomainError, DomainResult};

use crate::row::StockRow;
use crate::status::StockStatus;

pub const COL_RECORD_KIND: usize = 0;
pub const COL_SESSION_NUMBER: usize = 1;
pub const COL_INVENTORY_NUMBER: usize = 2;
pub const COL_SITE: usize = 4;
pub const COL_THEORETICAL_QTY: usize = 5;
pub const COL_INDICATOR: usize = 7;
pub const COL_PRODUCT: usize = 8;
pub const COL_LOCATION: usize = 9;
pub const COL_STATUS: usize = 10;
pub const COL_UNIT: usize = 11;
pub const COL_LOT: usize = 14;

/// Minimum field count a mask file must reach on its widest record.
pub const MIN_COLUMNS: usize = 15;

/// Record kinds appearing in a mask file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Stock,
    SessionHeader,
    InventoryHeader,
    Other,
}

impl RecordKind {
    pub fn of(record: &[String]) -> Self {
        match field(record, COL_RECORD_KIND) {
            "S" => Self::Stock,
            "E" => Self::SessionHeader,
            "L" => Self::InventoryHeader,
            _ => Self::Other,
        }
    }
}

/// Identifiers recovered from the mask's header lines.
///
/// Each field is absent when the corresponding header line is missing or
/// blank; [`MaskMetadata::resolve`] fills deterministic fallbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskMetadata {
    pub session_number: Option<String>,
    pub inventory_number: Option<String>,
    pub site: Option<String>,
}

/// [`MaskMetadata`] with fallbacks applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMaskMetadata {
    pub session_number: String,
    pub inventory_number: String,
    pub site: String,
}

impl MaskMetadata {
    /// Fill missing identifiers with generated ones, stamped from the
    /// upload's business time so re-running over the same persisted
    /// inputs stays deterministic.
    pub fn resolve(&self, fallback_stamp: DateTime<Utc>) -> ResolvedMaskMetadata {
        let stamp = fallback_stamp.format("%Y%m%d%H%M%S");
        ResolvedMaskMetadata {
            session_number: self
                .session_number
                .clone()
                .unwrap_or_else(|| format!("AUTO_SESS_{stamp}")),
            inventory_number: self
                .inventory_number
                .clone()
                .unwrap_or_else(|| format!("AUTO_INV_{stamp}")),
            site: self.site.clone().unwrap_or_else(|| "UNKNOWN".to_string()),
        }
    }
}

/// A parsed mask: header metadata plus the typed stock rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskExtract {
    pub metadata: MaskMetadata,
    pub rows: Vec<StockRow>,
}

fn field(record: &[String], idx: usize) -> &str {
    record.get(idx).map(|s| s.trim()).unwrap_or("")
}

fn non_empty(record: &[String], idx: usize) -> Option<String> {
    let value = field(record, idx);
    (!value.is_empty()).then(|| value.to_string())
}

/// Lenient quantity parse: blank coerces to zero, a comma decimal
/// separator is accepted, unparseable text coerces to zero.
pub fn parse_quantity(raw: &str) -> Decimal {
    let cleaned = raw.trim().replace(',', ".");
    if cleaned.is_empty() {
        return Decimal::ZERO;
    }
    cleaned.parse::<Decimal>().unwrap_or(Decimal::ZERO)
}

/// Parse one `S` record into a typed [`StockRow`].
///
/// `index` is the record's position in the file, used in error messages.
pub fn parse_stock_record(record: &[String], index: usize) -> DomainResult<StockRow> {
    let status = StockStatus::parse(field(record, COL_STATUS))
        .map_err(|e| DomainError::validation(format!("record {index}: {e}")))?;

    StockRow::new(
        field(record, COL_PRODUCT),
        field(record, COL_LOCATION),
        status,
        field(record, COL_LOT),
        parse_quantity(field(record, COL_THEORETICAL_QTY)),
        field(record, COL_UNIT),
    )
    .map_err(|e| DomainError::validation(format!("record {index}: {e}")))
}

/// Parse a whole mask into metadata + stock rows.
///
/// Fails when the file is too narrow to be a mask or carries no stock
/// records at all; both reject the upload wholesale.
pub fn parse_mask(records: &[Vec<String>]) -> DomainResult<MaskExtract> {
    let widest = records.iter().map(Vec::len).max().unwrap_or(0);
    if widest < MIN_COLUMNS {
        return Err(DomainError::validation(format!(
            "invalid mask layout: {widest} columns detected, {MIN_COLUMNS} required"
        )));
    }

    let mut metadata = MaskMetadata {
        session_number: None,
        inventory_number: None,
        site: None,
    };
    let mut rows = Vec::new();

    for (index, record) in records.iter().enumerate() {
        match RecordKind::of(record) {
            RecordKind::SessionHeader => {
                if metadata.session_number.is_none() {
                    metadata.session_number = non_empty(record, COL_SESSION_NUMBER);
                }
            }
            RecordKind::InventoryHeader => {
                if metadata.inventory_number.is_none() {
                    metadata.inventory_number = non_empty(record, COL_INVENTORY_NUMBER);
                }
            }
            RecordKind::Stock => {
                if metadata.site.is_none() {
                    metadata.site = non_empty(record, COL_SITE);
                }
                rows.push(parse_stock_record(record, index)?);
            }
            RecordKind::Other => {}
        }
    }

    if rows.is_empty() {
        return Err(DomainError::validation(
            "no stock ('S') records found in the mask",
        ));
    }

    Ok(MaskExtract { metadata, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn record(fields: &[(usize, &str)]) -> Vec<String> {
        let mut rec = vec![String::new(); MIN_COLUMNS];
        for (idx, value) in fields {
            rec[*idx] = (*value).to_string();
        }
        rec
    }

    fn stock_record(product: &str, qty: &str, status: &str, lot: &str) -> Vec<String> {
        record(&[
            (COL_RECORD_KIND, "S"),
            (COL_SITE, "DEPOT_A"),
            (COL_THEORETICAL_QTY, qty),
            (COL_PRODUCT, product),
            (COL_LOCATION, "A-01-02"),
            (COL_STATUS, status),
            (COL_UNIT, "UN"),
            (COL_LOT, lot),
        ])
    }

    #[test]
    fn parses_a_full_mask() {
        let records = vec![
            record(&[(COL_RECORD_KIND, "E"), (COL_SESSION_NUMBER, "SES001")]),
            record(&[(COL_RECORD_KIND, "L"), (COL_INVENTORY_NUMBER, "INV001")]),
            stock_record("ART001", "100", "A", "LOT250115"),
            stock_record("ART002", "12,5", "AM", "ABJ150125001"),
        ];

        let mask = parse_mask(&records).unwrap();
        assert_eq!(mask.metadata.session_number.as_deref(), Some("SES001"));
        assert_eq!(mask.metadata.inventory_number.as_deref(), Some("INV001"));
        assert_eq!(mask.metadata.site.as_deref(), Some("DEPOT_A"));
        assert_eq!(mask.rows.len(), 2);
        assert_eq!(mask.rows[0].theoretical_qty, dec!(100));
        // Comma decimal separator is tolerated.
        assert_eq!(mask.rows[1].theoretical_qty, dec!(12.5));
    }

    #[test]
    fn resolves_missing_metadata_deterministically() {
        let records = vec![stock_record("ART001", "1", "A", "L1")];
        let mask = parse_mask(&records).unwrap();

        let at = chrono::Utc.with_ymd_and_hms(2025, 1, 15, 8, 30, 0).unwrap();
        let resolved = mask.metadata.resolve(at);
        assert_eq!(resolved.session_number, "AUTO_SESS_20250115083000");
        assert_eq!(resolved.inventory_number, "AUTO_INV_20250115083000");
        assert_eq!(resolved.site, "DEPOT_A");
    }

    #[test]
    fn rejects_a_narrow_file() {
        let records = vec![vec!["S".to_string(), "x".to_string()]];
        let err = parse_mask(&records).unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("columns")),
            _ => panic!("Expected validation error"),
        }
    }

    #[test]
    fn rejects_a_mask_without_stock_records() {
        let records = vec![record(&[(COL_RECORD_KIND, "E"), (COL_SESSION_NUMBER, "S1")])];
        assert!(parse_mask(&records).is_err());
    }

    #[test]
    fn rejects_an_unknown_status() {
        let records = vec![stock_record("ART001", "1", "Z", "L1")];
        let err = parse_mask(&records).unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("record 0")),
            _ => panic!("Expected validation error"),
        }
    }

    #[test]
    fn blank_and_garbage_quantities_coerce_to_zero() {
        assert_eq!(parse_quantity(""), Decimal::ZERO);
        assert_eq!(parse_quantity("  "), Decimal::ZERO);
        assert_eq!(parse_quantity("abc"), Decimal::ZERO);
        assert_eq!(parse_quantity("3,25"), dec!(3.25));
    }
}
