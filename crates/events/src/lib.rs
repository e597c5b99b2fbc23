//! `recount-events` — the append-only event contract.
//!
//! Workflow sessions record their lifecycle as events implementing
//! [`Event`]; persistence of the resulting streams belongs to the
//! session store, not to this crate.

pub mod event;

pub use event::Event;
