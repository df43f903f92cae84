//! Manual bump — the gate the directory UI calls.
//!
//! Reads the member's latest bump from the audit log, runs the
//! cooldown gate, and either performs the bump or rejects with the
//! remaining time. Dispatch internals never leak into the rejection;
//! the bump event itself reaches destinations later via the notifier's
//! bump stream.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use bumphub_core::cooldown;
use bumphub_core::error::{BumpHubError, Result};
use bumphub_core::types::{BumpKind, Listing};
use bumphub_store::BumpStore;

pub struct ManualBumpGate {
    store: Arc<BumpStore>,
    cooldown: Duration,
}

impl ManualBumpGate {
    pub fn new(store: Arc<BumpStore>, cooldown_secs: i64) -> Self {
        Self {
            store,
            cooldown: Duration::seconds(cooldown_secs),
        }
    }

    /// Attempt a manual bump of `listing_id` by `member_id` at `now`.
    /// Returns the updated listing, or `CooldownActive` with the
    /// remaining time.
    pub fn bump_listing(
        &self,
        member_id: &str,
        listing_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Listing> {
        let listing = self
            .store
            .listing(listing_id)?
            .ok_or_else(|| BumpHubError::NotFound(format!("listing {listing_id}")))?;
        if listing.owner_id != member_id {
            return Err(BumpHubError::NotFound(format!(
                "listing {listing_id} for member {member_id}"
            )));
        }
        if !listing.active {
            return Err(BumpHubError::NotFound(format!(
                "active listing {listing_id}"
            )));
        }

        let last = self.store.last_bump_by(member_id)?;
        if !cooldown::can_bump(last, self.cooldown, now) {
            return Err(BumpHubError::CooldownActive {
                remaining: cooldown::time_remaining(last, self.cooldown, now),
            });
        }

        self.store.apply_bump(&listing.id, now)?;
        self.store
            .record_bump(&listing.id, member_id, BumpKind::Manual, now)?;
        tracing::info!("👆 Manual bump: listing {} by {}", listing.id, member_id);

        // re-read so the caller sees the new counter
        self.store
            .listing(&listing.id)?
            .ok_or_else(|| BumpHubError::NotFound(format!("listing {listing_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::SubsecRound;

    fn setup() -> (Arc<BumpStore>, ManualBumpGate, Listing) {
        let store = Arc::new(BumpStore::open_in_memory().unwrap());
        let listing = Listing::new("m1", "Rust Hangout", Utc::now() - Duration::days(1));
        store.save_listing(&listing).unwrap();
        let gate = ManualBumpGate::new(store.clone(), 7200);
        (store, gate, listing)
    }

    #[test]
    fn first_bump_succeeds_and_is_recorded() {
        let (store, gate, listing) = setup();
        let now = Utc::now();

        let bumped = gate.bump_listing("m1", &listing.id, now).unwrap();
        assert_eq!(bumped.bump_count, 1);
        assert!(store.last_bump_by("m1").unwrap().is_some());
    }

    #[test]
    fn second_bump_inside_cooldown_is_rejected_with_remaining() {
        let (_store, gate, listing) = setup();
        // the store round-trips timestamps at microsecond precision
        let now = Utc::now().trunc_subsecs(6);

        gate.bump_listing("m1", &listing.id, now).unwrap();
        let err = gate
            .bump_listing("m1", &listing.id, now + Duration::minutes(30))
            .unwrap_err();
        match err {
            BumpHubError::CooldownActive { remaining } => {
                assert_eq!(remaining, Duration::minutes(90));
            }
            other => panic!("expected CooldownActive, got {other}"),
        }
        // rejection message is human-readable
        assert!(err.to_string().contains("1h 30m"));
    }

    #[test]
    fn bump_after_cooldown_succeeds() {
        let (_store, gate, listing) = setup();
        let now = Utc::now();

        gate.bump_listing("m1", &listing.id, now).unwrap();
        let bumped = gate
            .bump_listing("m1", &listing.id, now + Duration::hours(3))
            .unwrap();
        assert_eq!(bumped.bump_count, 2);
    }

    #[test]
    fn foreign_or_missing_listing_is_rejected() {
        let (_store, gate, listing) = setup();
        let now = Utc::now();

        assert!(matches!(
            gate.bump_listing("someone-else", &listing.id, now),
            Err(BumpHubError::NotFound(_))
        ));
        assert!(matches!(
            gate.bump_listing("m1", "missing", now),
            Err(BumpHubError::NotFound(_))
        ));
    }
}
