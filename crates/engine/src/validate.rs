//! Whole-extract validation against the chosen depot context.
//!
//! Validation is atomic: either every row passes and statistics are
//! computed once, or the entire upload is rejected. There is no per-row
//! filtering.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use recount_core::DomainError;
use recount_extract::{DepotContext, StockRow, StockStatus};

use crate::audit::AuditFact;

/// Advisory statistics computed once on successful validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractStatistics {
    pub total_rows: usize,
    pub distinct_products: usize,
    pub distinct_lots: usize,
}

/// One row whose status falls outside the context's allowed set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBreach {
    pub row_index: usize,
    pub lot: String,
    pub status: StockStatus,
}

/// Structured rejection of an extract. Both kinds are fatal and abort
/// the call with no partial output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Rows carry statuses the chosen context does not allow.
    #[error("depot context {context} incompatible with {} offending row(s)", .offending.len())]
    ContextMismatch {
        context: DepotContext,
        offending: Vec<StatusBreach>,
    },

    /// Quarantined lots are present. The audit facts are carried inside
    /// the error so the caller can persist them even though the call
    /// fails.
    #[error("extract contains {} quarantined lot(s)", .facts.len())]
    Quarantine { facts: Vec<AuditFact> },
}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        match &err {
            ValidationError::ContextMismatch { context, offending } => {
                let mut codes: Vec<&str> =
                    offending.iter().map(|b| b.status.as_code()).collect();
                codes.sort_unstable();
                codes.dedup();
                DomainError::context_mismatch(format!(
                    "depot {context} chosen but statuses {} detected",
                    codes.join("/")
                ))
            }
            ValidationError::Quarantine { facts } => DomainError::quarantine(format!(
                "{} lot(s) under quarantine status",
                facts.len()
            )),
        }
    }
}

/// Validate an accepted extract against its depot context.
///
/// Quarantine is checked first, over the whole row set, so `Q` rows are
/// reported as quarantine rather than as a context mismatch; one audit
/// fact is emitted per distinct offending lot. The context check then
/// requires every remaining status to be in the context's allowed set.
pub fn validate_extract(
    rows: &[StockRow],
    context: DepotContext,
) -> Result<ExtractStatistics, ValidationError> {
    let mut quarantined_lots: Vec<&str> = Vec::new();
    for row in rows {
        if row.status.is_quarantine() && !quarantined_lots.contains(&row.lot.as_str()) {
            quarantined_lots.push(&row.lot);
        }
    }
    if !quarantined_lots.is_empty() {
        tracing::warn!(lots = quarantined_lots.len(), "quarantined lots in extract");
        return Err(ValidationError::Quarantine {
            facts: quarantined_lots
                .iter()
                .map(|lot| AuditFact::quarantine_detected(lot))
                .collect(),
        });
    }

    let offending: Vec<StatusBreach> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| !context.allows(row.status))
        .map(|(row_index, row)| StatusBreach {
            row_index,
            lot: row.lot.clone(),
            status: row.status,
        })
        .collect();
    if !offending.is_empty() {
        tracing::warn!(
            %context,
            rows = offending.len(),
            "extract incompatible with depot context"
        );
        return Err(ValidationError::ContextMismatch { context, offending });
    }

    let products: HashSet<&str> = rows.iter().map(|r| r.product.as_str()).collect();
    let lots: HashSet<&str> = rows.iter().map(|r| r.lot.as_str()).collect();
    let stats = ExtractStatistics {
        total_rows: rows.len(),
        distinct_products: products.len(),
        distinct_lots: lots.len(),
    };
    tracing::debug!(
        rows = stats.total_rows,
        products = stats.distinct_products,
        lots = stats.distinct_lots,
        "extract validated"
    );
    Ok(stats)
}
