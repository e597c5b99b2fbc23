//! Counting-template and corrected-export row emission.
//!
//! Template rows go out after aggregation for the operator to fill;
//! final rows come back out of distribution, one per constituent lot,
//! ready for the external serializer.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use recount_extract::LineKey;

use crate::aggregate::AggregatedLine;
use crate::distribute::DistributionReport;

/// Row of the counting template handed to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRow {
    pub product: String,
    pub location: String,
    /// Read-only book quantity.
    pub theoretical_qty: Decimal,
    /// Filled by the operator; blank means zero on re-ingest.
    pub counted_qty: Option<Decimal>,
    pub unit: String,
}

impl TemplateRow {
    pub fn key(&self) -> LineKey {
        LineKey::new(self.product.clone(), self.location.clone())
    }

    /// The counted quantity with the blank-means-zero default applied.
    pub fn counted_or_zero(&self) -> Decimal {
        self.counted_qty.unwrap_or(Decimal::ZERO)
    }
}

/// Emit one template row per aggregated line, counted quantity blank.
pub fn template_rows(lines: &[AggregatedLine]) -> Vec<TemplateRow> {
    lines
        .iter()
        .map(|line| TemplateRow {
            product: line.key.product.clone(),
            location: line.key.location.clone(),
            theoretical_qty: line.theoretical_total,
            counted_qty: None,
            unit: line.unit.clone(),
        })
        .collect()
}

/// Indicator carried on corrected-export rows: `Exception` flags lots
/// left at zero and synthetic adjustment lots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineIndicator {
    #[serde(rename = "1")]
    Normal,
    #[serde(rename = "2")]
    Exception,
}

/// One line of the corrected export the ERP re-imports.
///
/// Quantities are integer-rounded the way the export format expects;
/// the original theoretical quantity rides along next to the corrected
/// one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalRow {
    pub product: String,
    pub location: String,
    pub lot: String,
    pub theoretical_qty: Decimal,
    pub corrected_qty: Decimal,
    pub unit: String,
    pub indicator: LineIndicator,
}

/// Emit the corrected rows for one distributed line: every constituent
/// lot (untouched ones included, delta 0) plus the synthetic adjustment
/// lot when the distribution created one.
pub fn final_rows(line: &AggregatedLine, report: &DistributionReport) -> Vec<FinalRow> {
    let mut rows: Vec<FinalRow> = report
        .adjustments
        .iter()
        .map(|adj| FinalRow {
            product: line.key.product.clone(),
            location: line.key.location.clone(),
            lot: adj.lot.clone(),
            theoretical_qty: adj.previous_qty.round(),
            corrected_qty: adj.final_qty.round(),
            unit: line.unit.clone(),
            indicator: if adj.final_qty.is_zero() {
                LineIndicator::Exception
            } else {
                LineIndicator::Normal
            },
        })
        .collect();

    if let Some(extra) = &report.adjustment_lot {
        rows.push(FinalRow {
            product: line.key.product.clone(),
            location: line.key.location.clone(),
            lot: extra.lot.clone(),
            theoretical_qty: Decimal::ZERO,
            corrected_qty: extra.final_qty.round(),
            unit: line.unit.clone(),
            indicator: LineIndicator::Exception,
        });
    }

    rows
}
