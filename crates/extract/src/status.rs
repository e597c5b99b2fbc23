//! Stock status codes carried by extract rows.

use serde::{Deserialize, Serialize};

use recount_core::{DomainError, DomainResult};

/// Depot status of a stock line, as exported by the ERP.
///
/// `A`/`AM` mark accepted stock, `R`/`RM` rejected stock, and `Q` stock
/// frozen under quality control. `Q` lots must never be reconciled
/// through this workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockStatus {
    #[serde(rename = "A")]
    A,
    #[serde(rename = "AM")]
    Am,
    #[serde(rename = "R")]
    R,
    #[serde(rename = "RM")]
    Rm,
    #[serde(rename = "Q")]
    Q,
}

impl StockStatus {
    /// Parse the status column of an extract row.
    pub fn parse(code: &str) -> DomainResult<Self> {
        match code.trim() {
            "A" => Ok(Self::A),
            "AM" => Ok(Self::Am),
            "R" => Ok(Self::R),
            "RM" => Ok(Self::Rm),
            "Q" => Ok(Self::Q),
            other => Err(DomainError::validation(format!(
                "unknown stock status code: {other:?}"
            ))),
        }
    }

    /// The two-letter wire code used by the ERP export.
    pub fn as_code(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::Am => "AM",
            Self::R => "R",
            Self::Rm => "RM",
            Self::Q => "Q",
        }
    }

    /// Quarantined stock blocks the whole extract.
    pub fn is_quarantine(&self) -> bool {
        matches!(self, Self::Q)
    }
}

impl core::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_codes() {
        assert_eq!(StockStatus::parse("A").unwrap(), StockStatus::A);
        assert_eq!(StockStatus::parse("AM").unwrap(), StockStatus::Am);
        assert_eq!(StockStatus::parse(" RM ").unwrap(), StockStatus::Rm);
        assert_eq!(StockStatus::parse("Q").unwrap(), StockStatus::Q);
    }

    #[test]
    fn rejects_unknown_codes() {
        let err = StockStatus::parse("X").unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("X")),
            _ => panic!("Expected validation error"),
        }
    }

    #[test]
    fn only_q_is_quarantine() {
        assert!(StockStatus::Q.is_quarantine());
        assert!(!StockStatus::A.is_quarantine());
        assert!(!StockStatus::Rm.is_quarantine());
    }
}
