//! Depot compliance context.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use recount_core::DomainError;

use crate::status::StockStatus;

/// Warehouse compliance mode chosen when a reconciliation session opens.
///
/// The context restricts which status codes an uploaded extract may carry:
/// a "Conforme" depot holds accepted stock only (A/AM), a "Non-Conforme"
/// depot holds rejected stock only (R/RM).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepotContext {
    #[serde(rename = "Conforme")]
    Conforme,
    #[serde(rename = "Non-Conforme")]
    NonConforme,
}

impl DepotContext {
    /// Status codes acceptable under this context.
    pub fn allowed_statuses(&self) -> &'static [StockStatus] {
        match self {
            Self::Conforme => &[StockStatus::A, StockStatus::Am],
            Self::NonConforme => &[StockStatus::R, StockStatus::Rm],
        }
    }

    pub fn allows(&self, status: StockStatus) -> bool {
        self.allowed_statuses().contains(&status)
    }
}

impl core::fmt::Display for DepotContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Conforme => f.write_str("Conforme"),
            Self::NonConforme => f.write_str("Non-Conforme"),
        }
    }
}

impl FromStr for DepotContext {
    type Err = DomainError;

    /// Tolerant parse covering the spellings seen in upload forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Conforme" | "conforme" => Ok(Self::Conforme),
            "Non-Conforme" | "NonConforme" | "non-conforme" | "Non Conforme" => {
                Ok(Self::NonConforme)
            }
            other => Err(DomainError::validation(format!(
                "unknown depot context: {other:?}"
            ))),
        }
    }
}
