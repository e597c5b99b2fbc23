//! Typed extract rows and line identity.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use recount_core::{DomainError, DomainResult};

use crate::status::StockStatus;

/// Identity of an aggregated line: one product at one location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub product: String,
    pub location: String,
}

impl LineKey {
    pub fn new(product: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            location: location.into(),
        }
    }
}

impl core::fmt::Display for LineKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} @ {}", self.product, self.location)
    }
}

/// One stock line of the uploaded extract. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRow {
    pub product: String,
    pub location: String,
    pub status: StockStatus,
    pub lot: String,
    pub theoretical_qty: Decimal,
    pub unit: String,
}

impl StockRow {
    /// Build a row, enforcing the constraints the engine relies on:
    /// a product code is present and the theoretical quantity is not
    /// negative.
    pub fn new(
        product: impl Into<String>,
        location: impl Into<String>,
        status: StockStatus,
        lot: impl Into<String>,
        theoretical_qty: Decimal,
        unit: impl Into<String>,
    ) -> DomainResult<Self> {
        let product = product.into();
        if product.trim().is_empty() {
            return Err(DomainError::validation("product code cannot be empty"));
        }
        if theoretical_qty < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "theoretical quantity cannot be negative (product {product}, got {theoretical_qty})"
            )));
        }
        Ok(Self {
            product,
            location: location.into(),
            status,
            lot: lot.into(),
            theoretical_qty,
            unit: unit.into(),
        })
    }

    pub fn line_key(&self) -> LineKey {
        LineKey::new(self.product.clone(), self.location.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn builds_a_valid_row() {
        let row = StockRow::new(
            "ART001",
            "A-01-02",
            StockStatus::A,
            "LOT250115",
            dec!(100),
            "UN",
        )
        .unwrap();
        assert_eq!(row.line_key(), LineKey::new("ART001", "A-01-02"));
    }

    #[test]
    fn rejects_negative_quantity() {
        let err = StockRow::new("ART001", "A-01-02", StockStatus::A, "L1", dec!(-1), "UN")
            .unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("negative")),
            _ => panic!("Expected validation error"),
        }
    }

    #[test]
    fn rejects_blank_product() {
        assert!(StockRow::new("  ", "LOC", StockStatus::A, "L1", dec!(1), "UN").is_err());
    }
}
