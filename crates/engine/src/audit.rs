//! Audit facts and non-fatal warnings emitted by engine operations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use recount_extract::LineKey;

/// Kind of auditable fact an engine call can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// A quarantined lot was found while validating an extract.
    QuarantineDetected,
    /// A lot ran dry (or was already dry) while absorbing a deficit.
    LotExhausted,
    /// A deficit could not be fully absorbed; the remainder is tracked.
    ResidualUnresolved,
    /// A synthetic lot was created to carry a count against an empty line.
    AdjustmentLotCreated,
}

/// An auditable fact: action kind + free-text detail.
///
/// Facts are time-free; the workflow layer stamps them with business time
/// when it turns them into persisted entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFact {
    pub action: AuditAction,
    pub detail: String,
}

impl AuditFact {
    pub fn quarantine_detected(lot: &str) -> Self {
        Self {
            action: AuditAction::QuarantineDetected,
            detail: format!("quarantined lot {lot} present in extract"),
        }
    }

    pub fn lot_drained(key: &LineKey, lot: &str) -> Self {
        Self {
            action: AuditAction::LotExhausted,
            detail: format!("lot {lot} ({key}) drained to zero during deficit distribution"),
        }
    }

    pub fn lot_skipped_empty(key: &LineKey, lot: &str) -> Self {
        Self {
            action: AuditAction::LotExhausted,
            detail: format!("lot {lot} ({key}) skipped: already exhausted"),
        }
    }

    pub fn residual_unresolved(key: &LineKey, residual: Decimal) -> Self {
        Self {
            action: AuditAction::ResidualUnresolved,
            detail: format!("deficit of {residual} on {key} could not be absorbed"),
        }
    }

    pub fn adjustment_lot_created(key: &LineKey, counted: Decimal) -> Self {
        Self {
            action: AuditAction::AdjustmentLotCreated,
            detail: format!("counted {counted} against empty line {key}; adjustment lot created"),
        }
    }
}

/// Non-fatal observations accumulated alongside successful results.
///
/// Warnings never abort an engine call; callers surface them to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineWarning {
    /// A lot identifier's date could not be extracted; the lot sorts
    /// after every dated lot in its line.
    UnparseableLotDate { lot: String },
    /// A deficit left a residual after every lot in the line ran dry.
    UnresolvedGap { key: LineKey, residual: Decimal },
}
