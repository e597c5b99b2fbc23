//! `recount-infra` — persistence ports and their in-memory fallbacks.
//!
//! The workflow stays pure; everything a host process must persist
//! (session snapshots, audit trails, row artifacts) goes through the
//! [`SessionStore`] port defined here.

pub mod session_store;

pub use session_store::{
    ArtifactKind, InMemorySessionStore, SessionRecord, SessionStore, StoreError,
};
