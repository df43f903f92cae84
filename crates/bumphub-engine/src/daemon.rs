//! Long-running daemon mode.
//! Uses tokio::interval for zero-overhead ticking (sleeps between passes).
//!
//! Each driver gets its own loop and its own cadence. Passes within a
//! loop run strictly one at a time; a pass that overruns its interval
//! delays the next tick rather than bursting to catch up, so a slow
//! destination can never stack overlapping passes.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::MissedTickBehavior;

use crate::{AutoBumpScheduler, StatusBoard, WatermarkNotifier};

pub struct Daemon {
    autobump: Arc<AutoBumpScheduler>,
    notifier: Arc<WatermarkNotifier>,
    status_board: Arc<StatusBoard>,
    autobump_interval_secs: u64,
    notifier_interval_secs: u64,
    status_interval_secs: u64,
}

impl Daemon {
    pub fn new(
        autobump: Arc<AutoBumpScheduler>,
        notifier: Arc<WatermarkNotifier>,
        status_board: Arc<StatusBoard>,
        autobump_interval_secs: u64,
        notifier_interval_secs: u64,
        status_interval_secs: u64,
    ) -> Self {
        Self {
            autobump,
            notifier,
            status_board,
            autobump_interval_secs,
            notifier_interval_secs,
            status_interval_secs,
        }
    }

    /// Run all three driver loops. Never returns; stop with Ctrl-C.
    pub async fn run(self) {
        tracing::info!(
            "⏰ Daemon started (autobump every {}s, notifier every {}s, status board every {}s)",
            self.autobump_interval_secs,
            self.notifier_interval_secs,
            self.status_interval_secs
        );

        let autobump = {
            let scheduler = self.autobump.clone();
            let mut interval = driver_interval(self.autobump_interval_secs);
            tokio::spawn(async move {
                loop {
                    interval.tick().await;
                    if let Err(e) = scheduler.run_once(Utc::now()) {
                        tracing::error!("❌ Auto-bump pass failed: {}", e);
                    }
                }
            })
        };

        let notifier = {
            let notifier = self.notifier.clone();
            let mut interval = driver_interval(self.notifier_interval_secs);
            tokio::spawn(async move {
                loop {
                    interval.tick().await;
                    if let Err(e) = notifier.run_once(Utc::now()).await {
                        tracing::error!("❌ Notifier pass failed: {}", e);
                    }
                }
            })
        };

        let status = {
            let board = self.status_board.clone();
            let mut interval = driver_interval(self.status_interval_secs);
            tokio::spawn(async move {
                loop {
                    interval.tick().await;
                    if let Err(e) = board.run_once(Utc::now()).await {
                        tracing::error!("❌ Status-board pass failed: {}", e);
                    }
                }
            })
        };

        // the loops never finish on their own
        let _ = tokio::join!(autobump, notifier, status);
    }
}

fn driver_interval(secs: u64) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
