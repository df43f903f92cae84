//! Watermark notifier — "new since last check" detection and fan-out.
//!
//! Two independent streams share the machinery: `new-listing`
//! (listings created after the watermark) and `bump` (bump records
//! after the watermark). Each stream's watermark is persisted store
//! state, loaded fresh at the start of every pass and advanced only
//! after the whole batch (records × destinations) has been attempted.

use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use futures::stream::{self, StreamExt};

use bumphub_core::error::Result;
use bumphub_core::types::{Destination, DestinationKind};
use bumphub_dispatch::{render_bump, render_new_listing, Dispatcher, NotificationPayload};
use bumphub_store::BumpStore;

/// Stream identifiers — the watermark table keys.
const STREAM_NEW_LISTING: &str = "new-listing";
const STREAM_BUMP: &str = "bump";

/// Result of one stream's pass.
#[derive(Debug, Default)]
pub struct StreamOutcome {
    /// First pass for this stream: the watermark was initialized to
    /// `now` and no records were examined.
    pub initialized: bool,
    pub records: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Result of one notifier pass across both streams.
#[derive(Debug, Default)]
pub struct NotifierOutcome {
    pub new_listings: StreamOutcome,
    pub bumps: StreamOutcome,
}

impl NotifierOutcome {
    pub fn delivered(&self) -> usize {
        self.new_listings.delivered + self.bumps.delivered
    }

    pub fn failed(&self) -> usize {
        self.new_listings.failed + self.bumps.failed
    }
}

pub struct WatermarkNotifier {
    store: Arc<BumpStore>,
    dispatcher: Arc<dyn Dispatcher>,
    fanout_concurrency: usize,
    site_base: String,
}

impl WatermarkNotifier {
    pub fn new(
        store: Arc<BumpStore>,
        dispatcher: Arc<dyn Dispatcher>,
        fanout_concurrency: usize,
        site_base: String,
    ) -> Self {
        Self {
            store,
            dispatcher,
            fanout_concurrency: fanout_concurrency.max(1),
            site_base,
        }
    }

    /// One notifier pass over both streams. Store failures abort the
    /// pass (nothing partial is committed); dispatch failures never do.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<NotifierOutcome> {
        let new_listings = self.run_new_listing_stream(now).await?;
        let bumps = self.run_bump_stream(now).await?;
        let outcome = NotifierOutcome {
            new_listings,
            bumps,
        };
        tracing::info!(
            "📣 Notifier pass: {} record(s), {} delivered, {} failed",
            outcome.new_listings.records + outcome.bumps.records,
            outcome.delivered(),
            outcome.failed()
        );
        Ok(outcome)
    }

    async fn run_new_listing_stream(&self, now: DateTime<Utc>) -> Result<StreamOutcome> {
        let watermark = match self.load_or_init_watermark(STREAM_NEW_LISTING, now)? {
            Some(w) => w,
            None => return Ok(initialized()),
        };

        let listings = self.store.listings_created_after(watermark)?;
        if listings.is_empty() {
            return Ok(StreamOutcome::default());
        }

        let batch: Vec<(NotificationPayload, DateTime<Utc>)> = listings
            .iter()
            .map(|l| (render_new_listing(l, &self.site_base), l.created_at))
            .collect();
        self.deliver_batch(STREAM_NEW_LISTING, DestinationKind::NewListing, batch)
            .await
    }

    async fn run_bump_stream(&self, now: DateTime<Utc>) -> Result<StreamOutcome> {
        let watermark = match self.load_or_init_watermark(STREAM_BUMP, now)? {
            Some(w) => w,
            None => return Ok(initialized()),
        };

        let bumps = self.store.bumps_after(watermark)?;
        if bumps.is_empty() {
            return Ok(StreamOutcome::default());
        }

        let batch: Vec<(NotificationPayload, DateTime<Utc>)> = bumps
            .iter()
            .map(|(record, name)| (render_bump(record, name), record.bumped_at))
            .collect();
        self.deliver_batch(STREAM_BUMP, DestinationKind::Bump, batch)
            .await
    }

    /// `None` means "first pass, watermark just initialized to now" —
    /// history before the first start is deliberately never replayed.
    fn load_or_init_watermark(
        &self,
        stream: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        match self.store.watermark(stream)? {
            Some(w) => Ok(Some(w)),
            None => {
                self.store.set_watermark(stream, now)?;
                tracing::info!("🆕 Watermark for stream '{stream}' initialized");
                Ok(None)
            }
        }
    }

    /// Fan a batch out to the stream's destinations, then advance the
    /// watermark past the newest record. The advance only happens
    /// after every (record × destination) pair has been attempted.
    async fn deliver_batch(
        &self,
        stream: &str,
        kind: DestinationKind,
        batch: Vec<(NotificationPayload, DateTime<Utc>)>,
    ) -> Result<StreamOutcome> {
        let destinations = self.store.active_destinations(kind)?;

        let mut outcome = StreamOutcome {
            records: batch.len(),
            ..StreamOutcome::default()
        };

        if destinations.is_empty() {
            // Not a delivery failure: the records are consumed and the
            // watermark still advances.
            tracing::warn!(
                "⚠️ {} record(s) on stream '{stream}' but no active destinations",
                batch.len()
            );
        } else {
            for (payload, _) in &batch {
                let (delivered, failed) = self.fan_out(payload, &destinations).await;
                outcome.delivered += delivered;
                outcome.failed += failed;
            }
        }

        // Barrier passed: every pair was attempted (or there was no
        // one to deliver to). Whole-second granularity plus one.
        if let Some(newest) = batch.iter().map(|(_, at)| *at).max() {
            self.store
                .set_watermark(stream, newest.trunc_subsecs(0) + Duration::seconds(1))?;
        }
        Ok(outcome)
    }

    /// Dispatch one payload to every destination independently; a
    /// failure at one destination never blocks the others. Each future
    /// owns its dispatcher handle, destination, and payload, keeping
    /// the whole pass future Send so the daemon can spawn it.
    async fn fan_out(
        &self,
        payload: &NotificationPayload,
        destinations: &[Destination],
    ) -> (usize, usize) {
        let results: Vec<bool> = stream::iter(destinations.to_vec())
            .map(|dest| {
                let dispatcher = self.dispatcher.clone();
                let payload = payload.clone();
                async move {
                    match dispatcher.send(&dest, &payload).await {
                        Ok(_) => true,
                        Err(e) => {
                            tracing::warn!("⚠️ Dispatch to destination {} failed: {e}", dest.id);
                            false
                        }
                    }
                }
            })
            .buffer_unordered(self.fanout_concurrency)
            .collect()
            .await;

        let delivered = results.iter().filter(|ok| **ok).count();
        (delivered, results.len() - delivered)
    }
}

fn initialized() -> StreamOutcome {
    StreamOutcome {
        initialized: true,
        ..StreamOutcome::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumphub_core::types::{BumpKind, Listing};
    use bumphub_dispatch::MockDispatcher;

    fn notifier(
        store: Arc<BumpStore>,
        mock: Arc<MockDispatcher>,
    ) -> WatermarkNotifier {
        WatermarkNotifier::new(store, mock, 4, "https://bumphub.example".into())
    }

    fn dest(id: &str, kind: DestinationKind) -> Destination {
        Destination::new(id, &format!("https://hooks.example/{id}"), kind)
    }

    #[tokio::test]
    async fn first_pass_initializes_watermark_without_dispatch() {
        let store = Arc::new(BumpStore::open_in_memory().unwrap());
        let mock = Arc::new(MockDispatcher::new());
        let now = Utc::now();

        // A listing that predates the first start must never be replayed.
        store
            .save_listing(&Listing::new("m1", "old", now - Duration::hours(1)))
            .unwrap();
        store
            .save_destination(&dest("d1", DestinationKind::NewListing))
            .unwrap();

        let outcome = notifier(store.clone(), mock.clone()).run_once(now).await.unwrap();
        assert!(outcome.new_listings.initialized);
        assert!(outcome.bumps.initialized);
        assert!(mock.calls().is_empty());
        assert_eq!(store.watermark("new-listing").unwrap().unwrap(), now.trunc_subsecs(6));
    }

    #[tokio::test]
    async fn dispatches_each_new_record_once_and_advances_watermark() {
        // watermark T; records at T+1s, T+2s, T+5s -> all dispatched
        // exactly once, watermark ends at T+5s+1s
        let store = Arc::new(BumpStore::open_in_memory().unwrap());
        let mock = Arc::new(MockDispatcher::new());
        let t = Utc::now().trunc_subsecs(0);
        store.set_watermark("new-listing", t).unwrap();
        store.set_watermark("bump", t).unwrap();

        for (name, offset) in [("a", 1), ("b", 2), ("c", 5)] {
            store
                .save_listing(&Listing::new("m1", name, t + Duration::seconds(offset)))
                .unwrap();
        }
        store
            .save_destination(&dest("d1", DestinationKind::NewListing))
            .unwrap();

        let notifier = notifier(store.clone(), mock.clone());
        let outcome = notifier.run_once(t + Duration::seconds(10)).await.unwrap();
        assert_eq!(outcome.new_listings.records, 3);
        assert_eq!(outcome.new_listings.delivered, 3);
        assert_eq!(mock.sends_to("d1"), 3);
        assert_eq!(
            store.watermark("new-listing").unwrap().unwrap(),
            t + Duration::seconds(6)
        );

        // second pass: nothing new, nothing re-dispatched
        let again = notifier.run_once(t + Duration::seconds(20)).await.unwrap();
        assert_eq!(again.new_listings.records, 0);
        assert_eq!(mock.sends_to("d1"), 3);
    }

    #[tokio::test]
    async fn watermark_is_monotonic_across_passes() {
        let store = Arc::new(BumpStore::open_in_memory().unwrap());
        let mock = Arc::new(MockDispatcher::new());
        let t = Utc::now().trunc_subsecs(0);
        store.set_watermark("new-listing", t).unwrap();
        store.set_watermark("bump", t).unwrap();

        let notifier = notifier(store.clone(), mock.clone());

        store
            .save_listing(&Listing::new("m1", "a", t + Duration::seconds(1)))
            .unwrap();
        notifier.run_once(t + Duration::seconds(2)).await.unwrap();
        let w1 = store.watermark("new-listing").unwrap().unwrap();

        store
            .save_listing(&Listing::new("m1", "b", t + Duration::seconds(30)))
            .unwrap();
        notifier.run_once(t + Duration::seconds(31)).await.unwrap();
        let w2 = store.watermark("new-listing").unwrap().unwrap();

        assert!(w2 >= w1);
    }

    #[tokio::test]
    async fn failing_destination_does_not_block_siblings() {
        let store = Arc::new(BumpStore::open_in_memory().unwrap());
        let mock = Arc::new(MockDispatcher::new());
        let t = Utc::now().trunc_subsecs(0);
        store.set_watermark("new-listing", t).unwrap();
        store.set_watermark("bump", t).unwrap();

        for id in ["d1", "d2", "d3"] {
            store
                .save_destination(&dest(id, DestinationKind::NewListing))
                .unwrap();
        }
        mock.fail_send_for("d2");
        store
            .save_listing(&Listing::new("m1", "a", t + Duration::seconds(1)))
            .unwrap();

        let outcome = notifier(store.clone(), mock.clone())
            .run_once(t + Duration::seconds(5))
            .await
            .unwrap();
        assert_eq!(outcome.new_listings.delivered, 2);
        assert_eq!(outcome.new_listings.failed, 1);
        assert_eq!(mock.sends_to("d1"), 1);
        assert_eq!(mock.sends_to("d3"), 1);

        // the pass still completed and advanced the watermark
        assert_eq!(
            store.watermark("new-listing").unwrap().unwrap(),
            t + Duration::seconds(2)
        );
    }

    #[tokio::test]
    async fn no_destinations_still_advances_watermark() {
        let store = Arc::new(BumpStore::open_in_memory().unwrap());
        let mock = Arc::new(MockDispatcher::new());
        let t = Utc::now().trunc_subsecs(0);
        store.set_watermark("new-listing", t).unwrap();
        store.set_watermark("bump", t).unwrap();

        store
            .save_listing(&Listing::new("m1", "a", t + Duration::seconds(3)))
            .unwrap();

        let outcome = notifier(store.clone(), mock.clone())
            .run_once(t + Duration::seconds(5))
            .await
            .unwrap();
        assert_eq!(outcome.new_listings.records, 1);
        assert_eq!(outcome.new_listings.delivered, 0);
        assert_eq!(
            store.watermark("new-listing").unwrap().unwrap(),
            t + Duration::seconds(4)
        );
    }

    #[tokio::test]
    async fn pass_future_can_run_on_a_spawned_task() {
        // the daemon runs passes inside tokio::spawn, which requires
        // the whole run_once future to be Send
        let store = Arc::new(BumpStore::open_in_memory().unwrap());
        let mock = Arc::new(MockDispatcher::new());
        let t = Utc::now().trunc_subsecs(0);
        store.set_watermark("new-listing", t).unwrap();
        store.set_watermark("bump", t).unwrap();

        store
            .save_destination(&dest("d1", DestinationKind::NewListing))
            .unwrap();
        store
            .save_listing(&Listing::new("m1", "a", t + Duration::seconds(1)))
            .unwrap();

        let notifier = Arc::new(notifier(store, mock.clone()));
        let handle = tokio::spawn(async move { notifier.run_once(t + Duration::seconds(5)).await });
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.new_listings.delivered, 1);
        assert_eq!(mock.sends_to("d1"), 1);
    }

    #[tokio::test]
    async fn bump_stream_is_independent() {
        let store = Arc::new(BumpStore::open_in_memory().unwrap());
        let mock = Arc::new(MockDispatcher::new());
        let t = Utc::now().trunc_subsecs(0);
        store.set_watermark("new-listing", t).unwrap();
        store.set_watermark("bump", t).unwrap();

        let listing = Listing::new("m1", "Rust Hangout", t - Duration::days(1));
        store.save_listing(&listing).unwrap();
        store
            .record_bump(&listing.id, "m1", BumpKind::Manual, t + Duration::seconds(2))
            .unwrap();

        store.save_destination(&dest("bumps", DestinationKind::Bump)).unwrap();
        store
            .save_destination(&dest("news", DestinationKind::NewListing))
            .unwrap();

        let outcome = notifier(store.clone(), mock.clone())
            .run_once(t + Duration::seconds(5))
            .await
            .unwrap();
        // the listing itself is older than the watermark; only the
        // bump event flows, and only to the bump destination
        assert_eq!(outcome.new_listings.records, 0);
        assert_eq!(outcome.bumps.records, 1);
        assert_eq!(mock.sends_to("bumps"), 1);
        assert_eq!(mock.sends_to("news"), 0);
        assert_eq!(
            store.watermark("bump").unwrap().unwrap(),
            t + Duration::seconds(3)
        );
        assert_eq!(store.watermark("new-listing").unwrap().unwrap(), t);
    }
}
