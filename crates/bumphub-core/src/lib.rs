//! # BumpHub Core
//!
//! Shared foundation for the BumpHub engine crates: the domain data
//! model, configuration, the error type, and the pure cooldown gate.
//!
//! Everything here is side-effect free — persistence lives in
//! `bumphub-store`, outbound HTTP in `bumphub-dispatch`, and the
//! periodic drivers in `bumphub-engine`.

pub mod config;
pub mod cooldown;
pub mod error;
pub mod types;

pub use config::BumpHubConfig;
pub use error::{BumpHubError, Result};
pub use types::{
    BumpKind, BumpRecord, Destination, DestinationKind, HealthCheck, Listing, Member,
    OverallHealth, StatusMapping, Tier,
};
