//! Domain data model — members, listings, bump records, destinations.
//!
//! These are the rows the engine reads and writes. The directory web
//! app (CRUD, reviews, forums) owns member/listing/destination
//! lifecycles; the engine only mutates bump state, watermarks, and
//! status-message mappings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription tier — ordered, higher tiers bump more often.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    None,
    Basic,
    Standard,
    Premium,
}

impl Tier {
    /// Whether this tier grants the auto-bump capability at all.
    pub fn allows_auto_bump(&self) -> bool {
        *self >= Tier::Basic
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::None => "none",
            Tier::Basic => "basic",
            Tier::Standard => "standard",
            Tier::Premium => "premium",
        }
    }

    pub fn parse(s: &str) -> Tier {
        match s {
            "basic" => Tier::Basic,
            "standard" => Tier::Standard,
            "premium" => Tier::Premium,
            _ => Tier::None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A member account — can own listings and is rate-limited per bump.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub tier: Tier,
    pub auto_bump_enabled: bool,
    /// Per-member interval override in seconds. `None` means "use the
    /// configured per-tier interval".
    pub bump_interval_secs: Option<i64>,
    /// When the paid tier lapses. `None` = never expires.
    pub tier_expires_at: Option<DateTime<Utc>>,
    /// Last time the auto-bump scheduler processed this member.
    pub last_auto_bump: Option<DateTime<Utc>>,
}

impl Member {
    pub fn new(id: &str, tier: Tier) -> Self {
        Self {
            id: id.to_string(),
            tier,
            auto_bump_enabled: false,
            bump_interval_secs: None,
            tier_expires_at: None,
            last_auto_bump: None,
        }
    }

    /// Whether the member's tier is still valid at `now`.
    pub fn tier_active(&self, now: DateTime<Utc>) -> bool {
        match self.tier_expires_at {
            Some(expires) => expires > now,
            None => true,
        }
    }
}

/// A server listing — the bumpable entity shown in the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub active: bool,
    pub last_bumped: Option<DateTime<Utc>>,
    /// Monotonically increasing — never reset by the engine.
    pub bump_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Listing {
    pub fn new(owner_id: &str, name: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            active: true,
            last_bumped: None,
            bump_count: 0,
            created_at,
        }
    }
}

/// How a bump was performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpKind {
    Manual,
    Auto,
}

impl BumpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BumpKind::Manual => "manual",
            BumpKind::Auto => "auto",
        }
    }

    pub fn parse(s: &str) -> BumpKind {
        match s {
            "auto" => BumpKind::Auto,
            _ => BumpKind::Manual,
        }
    }
}

/// Append-only audit record of one performed bump.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BumpRecord {
    /// Assigned by the store on insert (AUTOINCREMENT).
    pub id: i64,
    pub listing_id: String,
    pub member_id: String,
    pub kind: BumpKind,
    pub bumped_at: DateTime<Utc>,
}

/// Which notification stream a destination subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DestinationKind {
    /// New listings appearing in the directory.
    NewListing,
    /// Bump events (manual and auto).
    Bump,
    /// The idempotent status-board message.
    Status,
}

impl DestinationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationKind::NewListing => "new-listing",
            DestinationKind::Bump => "bump",
            DestinationKind::Status => "status",
        }
    }

    pub fn parse(s: &str) -> Option<DestinationKind> {
        match s {
            "new-listing" => Some(DestinationKind::NewListing),
            "bump" => Some(DestinationKind::Bump),
            "status" => Some(DestinationKind::Status),
            _ => None,
        }
    }
}

impl std::fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered outbound channel. The routing id is opaque to the
/// engine (e.g. "guild:123/chan:456"); delivery goes to `webhook_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Destination {
    pub id: String,
    pub webhook_url: String,
    pub active: bool,
    pub kind: DestinationKind,
}

impl Destination {
    pub fn new(id: &str, webhook_url: &str, kind: DestinationKind) -> Self {
        Self {
            id: id.to_string(),
            webhook_url: webhook_url.to_string(),
            active: true,
            kind,
        }
    }
}

/// Per-destination record of the live status-board message.
/// At most one row per destination — the edit-vs-create decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusMapping {
    pub destination_id: String,
    pub message_id: String,
    pub last_payload: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Result of one health check against an external dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub healthy: bool,
    pub elapsed_ms: i64,
    pub detail: String,
    pub status_code: Option<u16>,
}

/// Aggregate health over all checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    /// All checks passed.
    Healthy,
    /// Some checks passed.
    Degraded,
    /// No check passed.
    Unhealthy,
}

impl OverallHealth {
    pub fn aggregate(checks: &[HealthCheck]) -> OverallHealth {
        // no checks means nothing verified, never a green board
        if checks.is_empty() {
            return OverallHealth::Unhealthy;
        }
        let passed = checks.iter().filter(|c| c.healthy).count();
        if passed == checks.len() {
            OverallHealth::Healthy
        } else if passed > 0 {
            OverallHealth::Degraded
        } else {
            OverallHealth::Unhealthy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OverallHealth::Healthy => "healthy",
            OverallHealth::Degraded => "degraded",
            OverallHealth::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for OverallHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_ordering() {
        assert!(Tier::Premium > Tier::Standard);
        assert!(Tier::Standard > Tier::Basic);
        assert!(Tier::Basic > Tier::None);
        assert!(!Tier::None.allows_auto_bump());
        assert!(Tier::Basic.allows_auto_bump());
    }

    #[test]
    fn tier_roundtrip() {
        for tier in [Tier::None, Tier::Basic, Tier::Standard, Tier::Premium] {
            assert_eq!(Tier::parse(tier.as_str()), tier);
        }
        assert_eq!(Tier::parse("gold"), Tier::None);
    }

    #[test]
    fn tier_expiry() {
        let now = Utc::now();
        let mut member = Member::new("m1", Tier::Premium);
        assert!(member.tier_active(now));

        member.tier_expires_at = Some(now - chrono::Duration::days(1));
        assert!(!member.tier_active(now));

        member.tier_expires_at = Some(now + chrono::Duration::days(30));
        assert!(member.tier_active(now));
    }

    #[test]
    fn health_aggregation() {
        let check = |healthy| HealthCheck {
            name: "x".into(),
            healthy,
            elapsed_ms: 1,
            detail: String::new(),
            status_code: None,
        };
        assert_eq!(
            OverallHealth::aggregate(&[check(true), check(true)]),
            OverallHealth::Healthy
        );
        assert_eq!(
            OverallHealth::aggregate(&[check(true), check(false)]),
            OverallHealth::Degraded
        );
        assert_eq!(
            OverallHealth::aggregate(&[check(false)]),
            OverallHealth::Unhealthy
        );
        assert_eq!(OverallHealth::aggregate(&[]), OverallHealth::Unhealthy);
    }

    #[test]
    fn destination_kind_roundtrip() {
        for kind in [
            DestinationKind::NewListing,
            DestinationKind::Bump,
            DestinationKind::Status,
        ] {
            assert_eq!(DestinationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(DestinationKind::parse("forum"), None);
    }
}
