//! # BumpHub Store
//!
//! SQLite-backed persistence for all durable engine state: members,
//! listings, the append-only bump log, destination registrations,
//! per-stream watermarks, and status-message mappings.
//!
//! Survives restarts — the watermark and mapping state here is what
//! makes the drivers safe to re-run after a crash.

mod store;

pub use store::BumpStore;
