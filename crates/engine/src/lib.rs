//! `recount-engine` — the reconciliation engine.
//!
//! Pure, synchronous computations over already-materialized row sets:
//! validate an extract against its depot context, aggregate rows into
//! per-line lot breakdowns, parse lot production dates, and redistribute
//! counted-vs-theoretical gaps across lots. Every operation is a
//! function of its explicit inputs; sessions never share state, so
//! concurrent use needs no locking here.

pub mod aggregate;
pub mod audit;
pub mod distribute;
pub mod lot_date;
pub mod template;
pub mod validate;

pub use aggregate::{AggregatedLine, AggregationReport, LotEntry, aggregate_rows};
pub use audit::{AuditAction, AuditFact, EngineWarning};
pub use distribute::{
    ADJUSTMENT_LOT, DistributionReport, LotAdjustment, distribute_gap,
};
pub use lot_date::extract_lot_date;
pub use template::{FinalRow, LineIndicator, TemplateRow, final_rows, template_rows};
pub use validate::{ExtractStatistics, StatusBreach, ValidationError, validate_extract};
