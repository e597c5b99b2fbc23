//! Aggregation of validated rows into per-line lot breakdowns.
//!
//! Deterministic with respect to input order: lines come out in
//! first-seen (product, location) order, lots within a line in
//! first-seen lot-identifier order. That ordering later feeds the
//! FIFO/LIFO tie-breaks of gap distribution.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use recount_core::{DomainError, DomainResult};
use recount_extract::{LineKey, StockRow};

use crate::audit::EngineWarning;
use crate::lot_date::extract_lot_date;

/// One lot inside an aggregated line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotEntry {
    pub lot: String,
    /// Theoretical quantity, summed across source rows sharing this lot
    /// identifier within the line.
    pub quantity: Decimal,
    /// Parsed from the lot identifier; `None` sorts after every dated lot.
    pub production_date: Option<NaiveDate>,
    /// First-seen rank within the line; equal dates break on this.
    pub rank: usize,
}

/// One line per (product, location), with its constituent lots.
///
/// Invariant at creation: `theoretical_total` equals the sum of the
/// constituent lot quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedLine {
    pub key: LineKey,
    pub unit: String,
    pub theoretical_total: Decimal,
    pub lots: Vec<LotEntry>,
}

/// Aggregation result: ordered lines plus non-fatal observations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationReport {
    pub lines: Vec<AggregatedLine>,
    pub warnings: Vec<EngineWarning>,
}

/// Group an accepted row set into aggregated lines.
///
/// A lot may legitimately appear on several source rows (e.g. unit
/// sub-lines); those quantities are summed, not kept separate. Lot dates
/// are parsed once here; identifiers that carry no date yield an
/// [`EngineWarning::UnparseableLotDate`] and the lot still takes part.
pub fn aggregate_rows(rows: &[StockRow]) -> DomainResult<AggregationReport> {
    let mut lines: Vec<AggregatedLine> = Vec::new();
    let mut index: HashMap<LineKey, usize> = HashMap::new();
    let mut warnings: Vec<EngineWarning> = Vec::new();

    for row in rows {
        let key = row.line_key();
        let line_idx = match index.get(&key) {
            Some(&i) => i,
            None => {
                lines.push(AggregatedLine {
                    key: key.clone(),
                    unit: row.unit.clone(),
                    theoretical_total: Decimal::ZERO,
                    lots: Vec::new(),
                });
                index.insert(key, lines.len() - 1);
                lines.len() - 1
            }
        };

        let line = &mut lines[line_idx];
        line.theoretical_total += row.theoretical_qty;

        match line.lots.iter_mut().find(|entry| entry.lot == row.lot) {
            Some(entry) => entry.quantity += row.theoretical_qty,
            None => {
                let production_date = extract_lot_date(&row.lot);
                if production_date.is_none() && !row.lot.trim().is_empty() {
                    tracing::warn!(lot = %row.lot, "lot identifier carries no parseable date");
                    warnings.push(EngineWarning::UnparseableLotDate {
                        lot: row.lot.clone(),
                    });
                }
                line.lots.push(LotEntry {
                    lot: row.lot.clone(),
                    quantity: row.theoretical_qty,
                    production_date,
                    rank: line.lots.len(),
                });
            }
        }
    }

    // Conservation is structural here, but the invariant guards every
    // later mutation path, so re-check it before handing lines out.
    for line in &lines {
        let lot_sum: Decimal = line.lots.iter().map(|l| l.quantity).sum();
        if lot_sum != line.theoretical_total {
            return Err(DomainError::invariant(format!(
                "line {} total {} diverges from lot sum {}",
                line.key, line.theoretical_total, lot_sum
            )));
        }
    }

    Ok(AggregationReport { lines, warnings })
}
