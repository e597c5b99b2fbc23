//! Redistribution of the counted-vs-theoretical gap across a line's lots.
//!
//! A surplus lands whole on the most recent lot; a deficit drains lots
//! oldest first and never takes a lot below zero. Undated lots sort
//! after every dated lot and are never chosen over a dated alternative.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use recount_core::{DomainError, DomainResult};
use recount_extract::LineKey;

use crate::aggregate::{AggregatedLine, LotEntry};
use crate::audit::{AuditFact, EngineWarning};

/// Name of the synthetic lot created when a count lands on a line whose
/// theoretical total is zero.
pub const ADJUSTMENT_LOT: &str = "LOECART";

/// Per-lot outcome of a distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotAdjustment {
    pub lot: String,
    pub previous_qty: Decimal,
    pub delta: Decimal,
    pub final_qty: Decimal,
    /// True when this distribution drained the lot to exactly zero.
    pub exhausted: bool,
}

/// Outcome of distributing one line's gap.
///
/// Post-conditions (checked before the report is handed out):
/// - Σ deltas = gap + residual (conservation over the resolvable part);
/// - every `final_qty` ≥ 0;
/// - a non-zero residual is always reported, never silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionReport {
    pub key: LineKey,
    pub counted: Decimal,
    /// counted − theoretical, signed.
    pub gap: Decimal,
    /// One entry per constituent lot, in aggregation order.
    pub adjustments: Vec<LotAdjustment>,
    /// Deficit that could not be absorbed (≥ 0); zero when fully resolved.
    pub residual: Decimal,
    /// Synthetic lot carrying a count against an empty line.
    pub adjustment_lot: Option<LotAdjustment>,
    pub facts: Vec<AuditFact>,
    pub warnings: Vec<EngineWarning>,
}

impl DistributionReport {
    /// The portion of the gap actually applied to lots.
    pub fn resolved_gap(&self) -> Decimal {
        self.gap + self.residual
    }
}

/// Indices of `lots` in distribution order: dated lots ascending by
/// (date, first-seen rank), then undated lots in first-seen order.
fn chronological(lots: &[LotEntry]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..lots.len()).collect();
    order.sort_by_key(|&i| match lots[i].production_date {
        Some(date) => (false, date, lots[i].rank),
        None => (true, NaiveDate::MAX, lots[i].rank),
    });
    order
}

/// The surplus target: the most recent dated lot, falling back to the
/// earliest-seen undated lot when the line has no dated lot at all.
fn surplus_target(lots: &[LotEntry], order: &[usize]) -> usize {
    order
        .iter()
        .rev()
        .find(|&&i| lots[i].production_date.is_some())
        .copied()
        .unwrap_or(order[0])
}

/// Distribute `counted − theoretical` across the line's lots.
pub fn distribute_gap(line: &AggregatedLine, counted: Decimal) -> DomainResult<DistributionReport> {
    if counted < Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "counted quantity cannot be negative ({}: {counted})",
            line.key
        )));
    }

    let gap = counted - line.theoretical_total;
    let mut adjustments: Vec<LotAdjustment> = line
        .lots
        .iter()
        .map(|l| LotAdjustment {
            lot: l.lot.clone(),
            previous_qty: l.quantity,
            delta: Decimal::ZERO,
            final_qty: l.quantity,
            exhausted: false,
        })
        .collect();
    let mut facts: Vec<AuditFact> = Vec::new();
    let mut warnings: Vec<EngineWarning> = Vec::new();
    let mut residual = Decimal::ZERO;
    let mut adjustment_lot: Option<LotAdjustment> = None;

    if line.theoretical_total.is_zero() && counted > Decimal::ZERO {
        // Counting stock where the book says none: the whole count is
        // carried by a synthetic lot rather than forced onto a lot that
        // never held it.
        adjustment_lot = Some(LotAdjustment {
            lot: ADJUSTMENT_LOT.to_string(),
            previous_qty: Decimal::ZERO,
            delta: counted,
            final_qty: counted,
            exhausted: false,
        });
        facts.push(AuditFact::adjustment_lot_created(&line.key, counted));
    } else if gap > Decimal::ZERO {
        let order = chronological(&line.lots);
        let target = surplus_target(&line.lots, &order);
        adjustments[target].delta = gap;
        adjustments[target].final_qty = adjustments[target].previous_qty + gap;
    } else if gap < Decimal::ZERO {
        let order = chronological(&line.lots);
        let mut remaining = -gap;
        for idx in order {
            if remaining.is_zero() {
                break;
            }
            let adj = &mut adjustments[idx];
            if adj.previous_qty.is_zero() {
                facts.push(AuditFact::lot_skipped_empty(&line.key, &adj.lot));
                continue;
            }
            let take = adj.previous_qty.min(remaining);
            adj.delta = -take;
            adj.final_qty = adj.previous_qty - take;
            remaining -= take;
            if adj.final_qty.is_zero() {
                adj.exhausted = true;
                facts.push(AuditFact::lot_drained(&line.key, &adj.lot));
            }
        }
        if remaining > Decimal::ZERO {
            residual = remaining;
            tracing::warn!(key = %line.key, %residual, "deficit not fully absorbed");
            facts.push(AuditFact::residual_unresolved(&line.key, residual));
            warnings.push(EngineWarning::UnresolvedGap {
                key: line.key.clone(),
                residual,
            });
        }
    }

    let report = DistributionReport {
        key: line.key.clone(),
        counted,
        gap,
        adjustments,
        residual,
        adjustment_lot,
        facts,
        warnings,
    };
    check_invariants(&report)?;
    Ok(report)
}

fn check_invariants(report: &DistributionReport) -> DomainResult<()> {
    let mut applied: Decimal = report.adjustments.iter().map(|a| a.delta).sum();
    if let Some(extra) = &report.adjustment_lot {
        applied += extra.delta;
    }
    if applied != report.resolved_gap() {
        return Err(DomainError::invariant(format!(
            "applied deltas {applied} diverge from resolvable gap {} on {}",
            report.resolved_gap(),
            report.key
        )));
    }

    for adj in report.adjustments.iter().chain(report.adjustment_lot.iter()) {
        if adj.final_qty < Decimal::ZERO {
            return Err(DomainError::invariant(format!(
                "lot {} on {} driven below zero ({})",
                adj.lot, report.key, adj.final_qty
            )));
        }
        if adj.previous_qty + adj.delta != adj.final_qty {
            return Err(DomainError::invariant(format!(
                "lot {} on {} delta bookkeeping is inconsistent",
                adj.lot, report.key
            )));
        }
    }
    Ok(())
}
