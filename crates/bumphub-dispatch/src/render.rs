//! Pure renderers — deterministic record → payload functions.
//!
//! No clock, no transport: the same record always renders the same
//! payload, which is what the notifier tests assert.

use bumphub_core::types::{BumpKind, BumpRecord, HealthCheck, Listing, OverallHealth};
use chrono::{DateTime, Utc};

use crate::payload::{NotificationPayload, PayloadField};

const COLOR_NEW_LISTING: u32 = 0x57F287; // green
const COLOR_BUMP: u32 = 0x5865F2; // blurple
const COLOR_HEALTHY: u32 = 0x57F287;
const COLOR_DEGRADED: u32 = 0xFEE75C; // yellow
const COLOR_UNHEALTHY: u32 = 0xED4245; // red

/// Statistics block shown on the status board.
#[derive(Debug, Clone, Copy)]
pub struct BoardStats {
    pub listing_count: i64,
    pub bumps_last_day: i64,
}

/// Announcement for a listing newly added to the directory.
pub fn render_new_listing(listing: &Listing, site_base: &str) -> NotificationPayload {
    NotificationPayload::new(
        "📌 New server listed",
        &format!("**{}** just joined the directory.", listing.name),
        COLOR_NEW_LISTING,
        listing.created_at,
    )
    .field(PayloadField::inline("Owner", listing.owner_id.clone()))
    .field(PayloadField::inline(
        "Listed",
        listing.created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
    ))
    .link(
        "Open listing",
        &format!("{}/listings/{}", site_base.trim_end_matches('/'), listing.id),
    )
}

/// Announcement for one performed bump.
pub fn render_bump(record: &BumpRecord, listing_name: &str) -> NotificationPayload {
    let how = match record.kind {
        BumpKind::Manual => "manually",
        BumpKind::Auto => "automatically",
    };
    NotificationPayload::new(
        "🚀 Server bumped",
        &format!("**{listing_name}** was bumped {how} to the top of the directory."),
        COLOR_BUMP,
        record.bumped_at,
    )
    .field(PayloadField::inline("By", record.member_id.clone()))
    .field(PayloadField::inline("Kind", record.kind.as_str()))
}

/// The single status-board message: summary line, one field per
/// check, and directory statistics.
pub fn render_status(
    checks: &[HealthCheck],
    stats: BoardStats,
    now: DateTime<Utc>,
) -> NotificationPayload {
    let overall = OverallHealth::aggregate(checks);
    let (emoji, color) = match overall {
        OverallHealth::Healthy => ("🟢", COLOR_HEALTHY),
        OverallHealth::Degraded => ("🟡", COLOR_DEGRADED),
        OverallHealth::Unhealthy => ("🔴", COLOR_UNHEALTHY),
    };
    let passed = checks.iter().filter(|c| c.healthy).count();

    let mut payload = NotificationPayload::new(
        &format!("{emoji} BumpHub status: {overall}"),
        &format!("{passed}/{} dependency checks passing.", checks.len()),
        color,
        now,
    );
    for check in checks {
        let mark = if check.healthy { "✅" } else { "❌" };
        let mut value = format!("{mark} {} ms", check.elapsed_ms);
        if let Some(code) = check.status_code {
            value.push_str(&format!(" · HTTP {code}"));
        }
        if !check.detail.is_empty() {
            value.push_str(&format!(" · {}", check.detail));
        }
        payload = payload.field(PayloadField::inline(&check.name, value));
    }
    payload
        .field(PayloadField::inline(
            "Listings",
            stats.listing_count.to_string(),
        ))
        .field(PayloadField::inline(
            "Bumps (24h)",
            stats.bumps_last_day.to_string(),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(name: &str, healthy: bool) -> HealthCheck {
        HealthCheck {
            name: name.into(),
            healthy,
            elapsed_ms: 12,
            detail: String::new(),
            status_code: Some(200),
        }
    }

    #[test]
    fn new_listing_is_deterministic() {
        let listing = Listing::new("m1", "Rust Hangout", Utc::now());
        let a = render_new_listing(&listing, "https://bumphub.example/");
        let b = render_new_listing(&listing, "https://bumphub.example/");
        assert_eq!(a, b);
        assert!(a.description.contains("Rust Hangout"));
        let (_, url) = a.link.unwrap();
        assert_eq!(url, format!("https://bumphub.example/listings/{}", listing.id));
    }

    #[test]
    fn bump_render_mentions_kind() {
        let record = BumpRecord {
            id: 1,
            listing_id: "l1".into(),
            member_id: "m1".into(),
            kind: BumpKind::Auto,
            bumped_at: Utc::now(),
        };
        let payload = render_bump(&record, "Gaming Lounge");
        assert!(payload.description.contains("automatically"));
        assert_eq!(payload.fields[1].value, "auto");
    }

    #[test]
    fn status_render_counts_and_colors() {
        let now = Utc::now();
        let stats = BoardStats {
            listing_count: 10,
            bumps_last_day: 3,
        };
        let healthy = render_status(&[check("store", true), check("api", true)], stats, now);
        assert!(healthy.title.contains("healthy"));
        assert!(healthy.description.starts_with("2/2"));
        // one field per check + two stats fields
        assert_eq!(healthy.fields.len(), 4);

        let degraded = render_status(&[check("store", true), check("api", false)], stats, now);
        assert!(degraded.title.contains("degraded"));

        let down = render_status(&[check("store", false)], stats, now);
        assert!(down.title.contains("unhealthy"));
    }
}
