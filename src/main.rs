//! # BumpHub — Bump & Notification Engine
//!
//! The periodic half of the BumpHub server directory: tier-based
//! auto-bumping, watermark-driven webhook notifications, and the
//! idempotent status board.
//!
//! Usage:
//!   bumphub autobump                     # One auto-bump pass
//!   bumphub notify                       # One notifier pass
//!   bumphub status-board                 # One status-board pass
//!   bumphub manual-bump <member> <listing>
//!   bumphub test-destination <id>        # Fire a test payload
//!   bumphub daemon                       # Run all drivers on timers

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bumphub_core::config::BumpHubConfig;
use bumphub_core::error::BumpHubError;
use bumphub_dispatch::{Dispatcher, NotificationPayload, WebhookDispatcher};
use bumphub_engine::daemon::Daemon;
use bumphub_engine::{
    AutoBumpScheduler, ManualBumpGate, StatusBoard, TracingAnalytics, WatermarkNotifier,
};
use bumphub_store::BumpStore;

#[derive(Parser)]
#[command(name = "bumphub", version, about = "📣 BumpHub — Bump & Notification Engine")]
struct Cli {
    /// Config file path (default: ~/.bumphub/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one auto-bump scheduling pass
    Autobump,
    /// Run one notifier pass (new listings + bumps)
    Notify,
    /// Run one status-board pass
    StatusBoard,
    /// Bump a listing on behalf of a member, subject to cooldown
    ManualBump {
        /// Member id performing the bump
        member_id: String,
        /// Listing id to bump
        listing_id: String,
    },
    /// Send a test payload to a registered destination
    TestDestination {
        /// Destination id
        id: String,
    },
    /// Run all drivers on their configured timers
    Daemon,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "bumphub=debug"
    } else {
        "bumphub=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => BumpHubConfig::load_from(path)?,
        None => BumpHubConfig::load()?,
    };

    let store = Arc::new(BumpStore::open(std::path::Path::new(&config.store.db_path))?);

    match cli.command {
        Command::Autobump => {
            let scheduler = AutoBumpScheduler::new(
                store,
                config.tiers.clone(),
                Arc::new(TracingAnalytics),
            );
            let outcome = scheduler.run_once(Utc::now())?;
            println!(
                "✅ Auto-bump pass: {} member(s), {} listing(s) bumped, {} failure(s)",
                outcome.members_processed,
                outcome.listings_bumped,
                outcome.failures.len()
            );
        }
        Command::Notify => {
            let dispatcher: Arc<dyn Dispatcher> =
                Arc::new(WebhookDispatcher::new(&config.dispatch)?);
            let notifier = WatermarkNotifier::new(
                store,
                dispatcher,
                config.notifier.fanout_concurrency,
                config.notifier.site_base.clone(),
            );
            let outcome = notifier.run_once(Utc::now()).await?;
            println!(
                "✅ Notifier pass: {} new listing(s), {} bump(s), {} delivered, {} failed",
                outcome.new_listings.records,
                outcome.bumps.records,
                outcome.delivered(),
                outcome.failed()
            );
        }
        Command::StatusBoard => {
            let dispatcher: Arc<dyn Dispatcher> =
                Arc::new(WebhookDispatcher::new(&config.dispatch)?);
            let board = StatusBoard::new(
                store,
                dispatcher,
                config.status_board.clone(),
                StdDuration::from_secs(config.dispatch.timeout_secs),
            );
            let outcome = board.run_once(Utc::now()).await?;
            println!(
                "✅ Status board ({}): {} destination(s), {} edited, {} created, {} failed",
                outcome.overall,
                outcome.destinations,
                outcome.edited,
                outcome.created,
                outcome.failed
            );
        }
        Command::ManualBump {
            member_id,
            listing_id,
        } => {
            let gate = ManualBumpGate::new(store, config.cooldown.manual_secs);
            match gate.bump_listing(&member_id, &listing_id, Utc::now()) {
                Ok(listing) => {
                    println!("✅ Bumped '{}' (bump #{})", listing.name, listing.bump_count);
                }
                Err(e @ BumpHubError::CooldownActive { .. }) => {
                    println!("⏳ {e}");
                    std::process::exit(2);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::TestDestination { id } => {
            let dest = store
                .destination(&id)?
                .ok_or_else(|| anyhow::anyhow!("Destination '{id}' not found"))?;
            let dispatcher = WebhookDispatcher::new(&config.dispatch)?;
            let payload = NotificationPayload::new(
                "BumpHub test",
                "If you can read this, the destination is wired up correctly.",
                0x95a5a6,
                Utc::now(),
            );
            let message_id = dispatcher.send(&dest, &payload).await?;
            println!("✅ Delivered test message {} to '{}'", message_id, dest.id);
        }
        Command::Daemon => {
            let dispatcher: Arc<dyn Dispatcher> =
                Arc::new(WebhookDispatcher::new(&config.dispatch)?);
            let scheduler = Arc::new(AutoBumpScheduler::new(
                store.clone(),
                config.tiers.clone(),
                Arc::new(TracingAnalytics),
            ));
            let notifier = Arc::new(WatermarkNotifier::new(
                store.clone(),
                dispatcher.clone(),
                config.notifier.fanout_concurrency,
                config.notifier.site_base.clone(),
            ));
            let board = Arc::new(StatusBoard::new(
                store,
                dispatcher,
                config.status_board.clone(),
                StdDuration::from_secs(config.dispatch.timeout_secs),
            ));
            Daemon::new(
                scheduler,
                notifier,
                board,
                config.dispatch.autobump_interval_secs,
                config.notifier.interval_secs,
                config.status_board.interval_secs,
            )
            .run()
            .await;
        }
    }

    Ok(())
}
