//! Tiered auto-bump scheduler.
//!
//! One pass walks every member whose tier grants auto-bump, checks the
//! tier interval against `last_auto_bump`, and bumps each of the
//! member's active listings. Failures are isolated at listing
//! granularity; a pass is best-effort, not transactional.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use bumphub_core::config::TierConfig;
use bumphub_core::cooldown;
use bumphub_core::error::Result;
use bumphub_core::types::{BumpKind, Listing};
use bumphub_store::BumpStore;

/// Whether a member's window advances even when every one of their
/// listings failed to bump. `true` keeps the source behavior: the
/// window is availability-first, and a broken listing never makes the
/// scheduler hammer it every pass.
pub const ADVANCE_WINDOW_ON_FAILURE: bool = true;

/// Seam to the analytics collaborator — the engine only emits events.
pub trait Analytics: Send + Sync {
    fn listing_bumped(&self, listing: &Listing, kind: BumpKind);
}

/// Default analytics sink: a structured log line.
pub struct TracingAnalytics;

impl Analytics for TracingAnalytics {
    fn listing_bumped(&self, listing: &Listing, kind: BumpKind) {
        tracing::info!(
            listing_id = %listing.id,
            owner_id = %listing.owner_id,
            kind = kind.as_str(),
            "📈 listing bumped"
        );
    }
}

/// One failed item within a pass.
#[derive(Debug, Clone)]
pub struct BumpFailure {
    pub member_id: String,
    pub listing_id: Option<String>,
    pub reason: String,
}

/// Aggregate result of one scheduling pass.
#[derive(Debug, Default)]
pub struct AutoBumpOutcome {
    /// Members whose interval had elapsed and whose listings were
    /// processed this pass.
    pub members_processed: usize,
    pub listings_bumped: usize,
    pub failures: Vec<BumpFailure>,
}

pub struct AutoBumpScheduler {
    store: Arc<BumpStore>,
    tiers: TierConfig,
    analytics: Arc<dyn Analytics>,
}

impl AutoBumpScheduler {
    pub fn new(store: Arc<BumpStore>, tiers: TierConfig, analytics: Arc<dyn Analytics>) -> Self {
        Self {
            store,
            tiers,
            analytics,
        }
    }

    /// One scheduling pass. Only the initial member query can fail the
    /// pass; everything after is isolated per member / per listing.
    pub fn run_once(&self, now: DateTime<Utc>) -> Result<AutoBumpOutcome> {
        let members = self.store.auto_bump_candidates(now)?;
        let mut outcome = AutoBumpOutcome::default();

        for member in &members {
            if !member.tier.allows_auto_bump() {
                continue;
            }
            let interval_secs = match member
                .bump_interval_secs
                .or_else(|| self.tiers.interval_secs(member.tier))
            {
                Some(secs) => secs,
                None => continue,
            };
            let interval = Duration::seconds(interval_secs);

            // Null last_auto_bump means eligible; clock skew blocks.
            if !cooldown::can_bump(member.last_auto_bump, interval, now) {
                tracing::debug!(
                    member_id = %member.id,
                    "auto-bump window not yet elapsed, skipping"
                );
                continue;
            }

            let listings = match self.store.active_listings_for(&member.id) {
                Ok(listings) => listings,
                Err(e) => {
                    tracing::warn!("⚠️ Failed to load listings for {}: {e}", member.id);
                    outcome.failures.push(BumpFailure {
                        member_id: member.id.clone(),
                        listing_id: None,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            outcome.members_processed += 1;
            let mut member_failures = 0usize;

            for listing in &listings {
                match self.bump_one(listing, &member.id, now) {
                    Ok(()) => outcome.listings_bumped += 1,
                    Err(e) => {
                        member_failures += 1;
                        tracing::warn!(
                            "⚠️ Auto-bump of listing {} (member {}) failed: {e}",
                            listing.id,
                            member.id
                        );
                        outcome.failures.push(BumpFailure {
                            member_id: member.id.clone(),
                            listing_id: Some(listing.id.clone()),
                            reason: e.to_string(),
                        });
                    }
                }
            }

            // Partial success still advances the window; with
            // ADVANCE_WINDOW_ON_FAILURE so does total failure.
            let advance = ADVANCE_WINDOW_ON_FAILURE || member_failures < listings.len();
            if advance {
                if let Err(e) = self.store.set_last_auto_bump(&member.id, now) {
                    tracing::warn!("⚠️ Failed to advance window for {}: {e}", member.id);
                    outcome.failures.push(BumpFailure {
                        member_id: member.id.clone(),
                        listing_id: None,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "🔁 Auto-bump pass: {} member(s), {} listing(s) bumped, {} failure(s)",
            outcome.members_processed,
            outcome.listings_bumped,
            outcome.failures.len()
        );
        Ok(outcome)
    }

    fn bump_one(&self, listing: &Listing, member_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.store.apply_bump(&listing.id, now)?;
        self.store
            .record_bump(&listing.id, member_id, BumpKind::Auto, now)?;
        self.analytics.listing_bumped(listing, BumpKind::Auto);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumphub_core::types::{Member, Tier};

    fn scheduler(store: Arc<BumpStore>) -> AutoBumpScheduler {
        AutoBumpScheduler::new(store, TierConfig::default(), Arc::new(TracingAnalytics))
    }

    fn enabled_member(id: &str, tier: Tier) -> Member {
        let mut member = Member::new(id, tier);
        member.auto_bump_enabled = true;
        member
    }

    #[test]
    fn bumps_every_active_listing_of_due_member() {
        // tier interval 6h, last auto-bump 7h ago
        let store = Arc::new(BumpStore::open_in_memory().unwrap());
        let now = Utc::now();

        let mut member = enabled_member("m1", Tier::Standard);
        member.last_auto_bump = Some(now - Duration::hours(7));
        store.save_member(&member).unwrap();

        let a = Listing::new("m1", "a", now - Duration::days(3));
        let b = Listing::new("m1", "b", now - Duration::days(2));
        let mut inactive = Listing::new("m1", "c", now - Duration::days(1));
        inactive.active = false;
        for l in [&a, &b, &inactive] {
            store.save_listing(l).unwrap();
        }

        let outcome = scheduler(store.clone()).run_once(now).unwrap();
        assert_eq!(outcome.members_processed, 1);
        assert_eq!(outcome.listings_bumped, 2);
        assert!(outcome.failures.is_empty());

        assert_eq!(store.listing(&a.id).unwrap().unwrap().bump_count, 1);
        assert_eq!(store.listing(&inactive.id).unwrap().unwrap().bump_count, 0);
        let member = store.member("m1").unwrap().unwrap();
        assert!(member.last_auto_bump.unwrap() > now - Duration::seconds(1));
    }

    #[test]
    fn skips_member_inside_interval() {
        let store = Arc::new(BumpStore::open_in_memory().unwrap());
        let now = Utc::now();

        let mut member = enabled_member("m1", Tier::Standard);
        member.last_auto_bump = Some(now - Duration::hours(2)); // interval is 6h
        store.save_member(&member).unwrap();
        store
            .save_listing(&Listing::new("m1", "a", now - Duration::days(1)))
            .unwrap();

        let outcome = scheduler(store).run_once(now).unwrap();
        assert_eq!(outcome.members_processed, 0);
        assert_eq!(outcome.listings_bumped, 0);
    }

    #[test]
    fn second_pass_within_interval_bumps_nothing() {
        // idempotent-interval law: pass 1 sets the window, pass 2
        // shortly after performs zero bumps
        let store = Arc::new(BumpStore::open_in_memory().unwrap());
        let now = Utc::now();

        let member = enabled_member("m1", Tier::Premium); // null window: eligible
        store.save_member(&member).unwrap();
        store
            .save_listing(&Listing::new("m1", "a", now - Duration::days(1)))
            .unwrap();

        let scheduler = scheduler(store.clone());
        let first = scheduler.run_once(now).unwrap();
        assert_eq!(first.listings_bumped, 1);

        let second = scheduler.run_once(now + Duration::minutes(5)).unwrap();
        assert_eq!(second.members_processed, 0);
        assert_eq!(second.listings_bumped, 0);
    }

    #[test]
    fn member_interval_override_wins() {
        let store = Arc::new(BumpStore::open_in_memory().unwrap());
        let now = Utc::now();

        let mut member = enabled_member("m1", Tier::Basic); // tier default 12h
        member.bump_interval_secs = Some(3600);
        member.last_auto_bump = Some(now - Duration::hours(2));
        store.save_member(&member).unwrap();
        store
            .save_listing(&Listing::new("m1", "a", now - Duration::days(1)))
            .unwrap();

        let outcome = scheduler(store).run_once(now).unwrap();
        assert_eq!(outcome.listings_bumped, 1);
    }

    #[test]
    fn expired_tier_is_excluded() {
        let store = Arc::new(BumpStore::open_in_memory().unwrap());
        let now = Utc::now();

        let mut member = enabled_member("m1", Tier::Premium);
        member.tier_expires_at = Some(now - Duration::days(1));
        store.save_member(&member).unwrap();
        store
            .save_listing(&Listing::new("m1", "a", now - Duration::days(1)))
            .unwrap();

        let outcome = scheduler(store).run_once(now).unwrap();
        assert_eq!(outcome.members_processed, 0);
        assert_eq!(outcome.listings_bumped, 0);
    }

    #[test]
    fn window_advances_for_processed_member_without_listings() {
        let store = Arc::new(BumpStore::open_in_memory().unwrap());
        let now = Utc::now();

        store.save_member(&enabled_member("m1", Tier::Basic)).unwrap();

        let outcome = scheduler(store.clone()).run_once(now).unwrap();
        assert_eq!(outcome.members_processed, 1);
        assert_eq!(outcome.listings_bumped, 0);
        assert!(store.member("m1").unwrap().unwrap().last_auto_bump.is_some());
    }
}
