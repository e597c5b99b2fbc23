//! `recount-extract` — typed model of an uploaded stock extract.
//!
//! Turns already-materialized mask records into [`StockRow`]s plus the
//! header metadata a session is named after. No file IO happens here.

pub mod context;
pub mod mask;
pub mod row;
pub mod status;

pub use context::DepotContext;
pub use mask::{MaskExtract, MaskMetadata, ResolvedMaskMetadata, parse_mask, parse_quantity};
pub use row::{LineKey, StockRow};
pub use status::StockStatus;
