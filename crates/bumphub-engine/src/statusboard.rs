//! Status board — one live message per destination, edited in place.
//!
//! The stored destination → message-id mapping decides edit-vs-create.
//! A failed edit (message deleted, permission pulled, transient error)
//! falls back to creating a fresh message and overwriting the mapping,
//! so stale state self-heals without operator action.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};

use bumphub_core::config::StatusBoardConfig;
use bumphub_core::error::Result;
use bumphub_core::types::{Destination, DestinationKind, OverallHealth};
use bumphub_dispatch::{render_status, BoardStats, Dispatcher, NotificationPayload};
use bumphub_store::BumpStore;

use crate::health;

/// What happened at one destination during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpsertAction {
    Edited,
    Created,
}

/// Aggregate result of one status-board pass.
#[derive(Debug)]
pub struct StatusOutcome {
    pub overall: OverallHealth,
    pub destinations: usize,
    pub edited: usize,
    pub created: usize,
    pub failed: usize,
}

pub struct StatusBoard {
    store: Arc<BumpStore>,
    dispatcher: Arc<dyn Dispatcher>,
    config: StatusBoardConfig,
    check_timeout: StdDuration,
}

impl StatusBoard {
    pub fn new(
        store: Arc<BumpStore>,
        dispatcher: Arc<dyn Dispatcher>,
        config: StatusBoardConfig,
        check_timeout: StdDuration,
    ) -> Self {
        Self {
            store,
            dispatcher,
            config,
            check_timeout,
        }
    }

    /// One status-board pass: snapshot health, render once, then
    /// edit-or-create per destination, each isolated from the others.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<StatusOutcome> {
        let checks =
            health::run_checks(&self.store, &self.config.health_targets, self.check_timeout).await;
        let overall = OverallHealth::aggregate(&checks);
        let stats = BoardStats {
            listing_count: self.store.listing_count()?,
            bumps_last_day: self.store.bumps_since_count(now - Duration::hours(24))?,
        };
        let payload = render_status(&checks, stats, now);

        let destinations = self.store.active_destinations(DestinationKind::Status)?;
        if destinations.is_empty() {
            tracing::info!("ℹ️ No status destinations registered, skipping board update");
        }

        let mut outcome = StatusOutcome {
            overall,
            destinations: destinations.len(),
            edited: 0,
            created: 0,
            failed: 0,
        };

        for dest in &destinations {
            match self.upsert_one(dest, &payload, now).await {
                Ok(UpsertAction::Edited) => outcome.edited += 1,
                Ok(UpsertAction::Created) => outcome.created += 1,
                Err(e) => {
                    tracing::warn!("⚠️ Status board update at {} failed: {e}", dest.id);
                    outcome.failed += 1;
                }
            }
        }

        tracing::info!(
            "🩺 Status pass ({overall}): {} edited, {} created, {} failed",
            outcome.edited,
            outcome.created,
            outcome.failed
        );
        Ok(outcome)
    }

    async fn upsert_one(
        &self,
        dest: &Destination,
        payload: &NotificationPayload,
        now: DateTime<Utc>,
    ) -> Result<UpsertAction> {
        let payload_json = serde_json::to_string(payload).ok();

        if let Some(mapping) = self.store.mapping(&dest.id)? {
            match self.dispatcher.edit(dest, &mapping.message_id, payload).await {
                Ok(()) => {
                    self.store.set_mapping(
                        &dest.id,
                        &mapping.message_id,
                        payload_json.as_deref(),
                        now,
                    )?;
                    return Ok(UpsertAction::Edited);
                }
                Err(e) => {
                    // Message gone or edit forbidden: self-heal by
                    // recreating, below.
                    tracing::info!(
                        "♻️ Edit of message {} at {} failed ({e}), recreating",
                        mapping.message_id,
                        dest.id
                    );
                }
            }
        }

        let message_id = self.dispatcher.send(dest, payload).await?;
        self.store
            .set_mapping(&dest.id, &message_id, payload_json.as_deref(), now)?;
        Ok(UpsertAction::Created)
    }
}
