//! # BumpHub Engine
//!
//! The three periodic drivers and the manual-bump gate:
//!
//! ```text
//! timer ──▶ AutoBumpScheduler.run_once(now)   tier intervals → bump listings
//! timer ──▶ WatermarkNotifier.run_once(now)   new records → fan out → advance watermark
//! timer ──▶ StatusBoard.run_once(now)         health snapshot → edit-or-create per destination
//! UI    ──▶ ManualBumpGate.bump_listing(...)  cooldown gate → bump → audit record
//! ```
//!
//! Drivers share no runtime state; they interact only through the
//! store. Every `run_once` takes `now` as an argument and neither
//! panics nor aborts on a single item's failure — per-item errors are
//! logged, counted in the pass outcome, and isolated from siblings.

pub mod autobump;
pub mod daemon;
pub mod health;
pub mod manual;
pub mod notifier;
pub mod statusboard;

pub use autobump::{Analytics, AutoBumpOutcome, AutoBumpScheduler, TracingAnalytics};
pub use manual::ManualBumpGate;
pub use notifier::{NotifierOutcome, WatermarkNotifier};
pub use statusboard::{StatusBoard, StatusOutcome};
