//! SQLite store — rusqlite behind a mutex, RFC3339 TEXT timestamps.
//!
//! Timestamps are stored with fixed microsecond precision so that
//! lexicographic TEXT comparison matches chronological order; the
//! watermark queries rely on that.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;

use bumphub_core::error::{BumpHubError, Result};
use bumphub_core::types::{
    BumpKind, BumpRecord, Destination, DestinationKind, Listing, Member, StatusMapping, Tier,
};

/// Persistent store for all engine state.
pub struct BumpStore {
    conn: Mutex<Connection>,
}

fn ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| BumpHubError::Store(format!("Bad timestamp '{s}': {e}")))
}

fn parse_ts_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.map(|s| parse_ts(&s)).transpose()
}

fn store_err(context: &str) -> impl Fn(rusqlite::Error) -> BumpHubError + '_ {
    move |e| BumpHubError::Store(format!("{context}: {e}"))
}

impl BumpStore {
    /// Open or create the database at `path` and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(store_err("DB open"))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        tracing::debug!("💾 Store opened at {}", path.display());
        Ok(store)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err("DB open"))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.conn()?
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS members (
                id TEXT PRIMARY KEY,
                tier TEXT NOT NULL DEFAULT 'none',
                auto_bump_enabled INTEGER NOT NULL DEFAULT 0,
                bump_interval_secs INTEGER,
                tier_expires_at TEXT,
                last_auto_bump TEXT
            );

            CREATE TABLE IF NOT EXISTS listings (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                name TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                last_bumped TEXT,
                bump_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_listings_owner ON listings(owner_id);
            CREATE INDEX IF NOT EXISTS idx_listings_created ON listings(created_at);

            -- Append-only audit log; latest row per member drives the
            -- manual cooldown.
            CREATE TABLE IF NOT EXISTS bump_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                listing_id TEXT NOT NULL,
                member_id TEXT NOT NULL,
                kind TEXT NOT NULL,              -- 'manual' | 'auto'
                bumped_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_bump_log_member ON bump_log(member_id, bumped_at);
            CREATE INDEX IF NOT EXISTS idx_bump_log_at ON bump_log(bumped_at);

            CREATE TABLE IF NOT EXISTS destinations (
                id TEXT PRIMARY KEY,
                webhook_url TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                kind TEXT NOT NULL               -- 'new-listing' | 'bump' | 'status'
            );

            -- One row per notification stream.
            CREATE TABLE IF NOT EXISTS watermarks (
                stream TEXT PRIMARY KEY,
                ts TEXT NOT NULL
            );

            -- At most one live status message per destination.
            CREATE TABLE IF NOT EXISTS status_messages (
                destination_id TEXT PRIMARY KEY,
                message_id TEXT NOT NULL,
                last_payload TEXT,
                updated_at TEXT NOT NULL
            );
         ",
            )
            .map_err(store_err("Migration"))?;
        Ok(())
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| BumpHubError::Store(format!("Connection lock poisoned: {e}")))
    }

    /// Cheap liveness probe for the status board.
    pub fn ping(&self) -> Result<()> {
        self.conn()?
            .query_row("SELECT 1", [], |_| Ok(()))
            .map_err(store_err("Ping"))
    }

    // ─── Members ──────────────────────────────────────

    pub fn save_member(&self, member: &Member) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO members
                 (id, tier, auto_bump_enabled, bump_interval_secs, tier_expires_at, last_auto_bump)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    member.id,
                    member.tier.as_str(),
                    member.auto_bump_enabled as i32,
                    member.bump_interval_secs,
                    member.tier_expires_at.map(ts),
                    member.last_auto_bump.map(ts),
                ],
            )
            .map_err(store_err("Save member"))?;
        Ok(())
    }

    pub fn member(&self, id: &str) -> Result<Option<Member>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, tier, auto_bump_enabled, bump_interval_secs, tier_expires_at, last_auto_bump
                 FROM members WHERE id = ?1",
                [id],
                row_to_member_raw,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                e => Err(store_err("Load member")(e)),
            })?;
        row.map(raw_to_member).transpose()
    }

    /// Members whose tier grants auto-bump, with the flag enabled and
    /// an unexpired tier as of `now`. Primary-key order.
    pub fn auto_bump_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Member>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, tier, auto_bump_enabled, bump_interval_secs, tier_expires_at, last_auto_bump
                 FROM members
                 WHERE auto_bump_enabled = 1
                   AND tier != 'none'
                   AND (tier_expires_at IS NULL OR tier_expires_at > ?1)
                 ORDER BY id",
            )
            .map_err(store_err("Query members"))?;
        let rows = stmt
            .query_map([ts(now)], row_to_member_raw)
            .map_err(store_err("Query members"))?
            .filter_map(|r| r.ok())
            .map(raw_to_member)
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn set_last_auto_bump(&self, member_id: &str, at: DateTime<Utc>) -> Result<()> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE members SET last_auto_bump = ?1 WHERE id = ?2",
                rusqlite::params![ts(at), member_id],
            )
            .map_err(store_err("Update last_auto_bump"))?;
        if changed == 0 {
            return Err(BumpHubError::NotFound(format!("member {member_id}")));
        }
        Ok(())
    }

    // ─── Listings ──────────────────────────────────────

    pub fn save_listing(&self, listing: &Listing) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO listings
                 (id, owner_id, name, active, last_bumped, bump_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    listing.id,
                    listing.owner_id,
                    listing.name,
                    listing.active as i32,
                    listing.last_bumped.map(ts),
                    listing.bump_count,
                    ts(listing.created_at),
                ],
            )
            .map_err(store_err("Save listing"))?;
        Ok(())
    }

    pub fn listing(&self, id: &str) -> Result<Option<Listing>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, owner_id, name, active, last_bumped, bump_count, created_at
                 FROM listings WHERE id = ?1",
                [id],
                row_to_listing_raw,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                e => Err(store_err("Load listing")(e)),
            })?;
        row.map(raw_to_listing).transpose()
    }

    pub fn active_listings_for(&self, owner_id: &str) -> Result<Vec<Listing>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, owner_id, name, active, last_bumped, bump_count, created_at
                 FROM listings WHERE owner_id = ?1 AND active = 1 ORDER BY id",
            )
            .map_err(store_err("Query listings"))?;
        let rows = stmt
            .query_map([owner_id], row_to_listing_raw)
            .map_err(store_err("Query listings"))?
            .filter_map(|r| r.ok())
            .map(raw_to_listing)
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Listings created strictly after `after` — the new-listing
    /// stream's watermark query.
    pub fn listings_created_after(&self, after: DateTime<Utc>) -> Result<Vec<Listing>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, owner_id, name, active, last_bumped, bump_count, created_at
                 FROM listings WHERE created_at > ?1 ORDER BY created_at",
            )
            .map_err(store_err("Query listings"))?;
        let rows = stmt
            .query_map([ts(after)], row_to_listing_raw)
            .map_err(store_err("Query listings"))?
            .filter_map(|r| r.ok())
            .map(raw_to_listing)
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Apply one bump: counter increment + last_bumped. The counter is
    /// monotonic; nothing ever decrements it.
    pub fn apply_bump(&self, listing_id: &str, at: DateTime<Utc>) -> Result<()> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE listings SET bump_count = bump_count + 1, last_bumped = ?1 WHERE id = ?2",
                rusqlite::params![ts(at), listing_id],
            )
            .map_err(store_err("Apply bump"))?;
        if changed == 0 {
            return Err(BumpHubError::NotFound(format!("listing {listing_id}")));
        }
        Ok(())
    }

    pub fn listing_count(&self) -> Result<i64> {
        self.conn()?
            .query_row("SELECT COUNT(*) FROM listings", [], |r| r.get(0))
            .map_err(store_err("Count listings"))
    }

    // ─── Bump log ──────────────────────────────────────

    pub fn record_bump(
        &self,
        listing_id: &str,
        member_id: &str,
        kind: BumpKind,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO bump_log (listing_id, member_id, kind, bumped_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![listing_id, member_id, kind.as_str(), ts(at)],
        )
        .map_err(store_err("Record bump"))?;
        Ok(conn.last_insert_rowid())
    }

    /// Latest bump of any kind by this member — drives the manual
    /// cooldown gate.
    pub fn last_bump_by(&self, member_id: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn()?;
        let row: Option<String> = conn
            .query_row(
                "SELECT MAX(bumped_at) FROM bump_log WHERE member_id = ?1",
                [member_id],
                |r| r.get(0),
            )
            .map_err(store_err("Query bump log"))?;
        parse_ts_opt(row)
    }

    /// Bump records strictly after `after`, joined with the listing
    /// name for rendering — the bump stream's watermark query.
    pub fn bumps_after(&self, after: DateTime<Utc>) -> Result<Vec<(BumpRecord, String)>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT b.id, b.listing_id, b.member_id, b.kind, b.bumped_at, l.name
                 FROM bump_log b JOIN listings l ON l.id = b.listing_id
                 WHERE b.bumped_at > ?1 ORDER BY b.bumped_at",
            )
            .map_err(store_err("Query bump log"))?;
        let rows = stmt
            .query_map([ts(after)], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(store_err("Query bump log"))?
            .filter_map(|r| r.ok())
            .map(|(id, listing_id, member_id, kind, bumped_at, name)| {
                Ok((
                    BumpRecord {
                        id,
                        listing_id,
                        member_id,
                        kind: BumpKind::parse(&kind),
                        bumped_at: parse_ts(&bumped_at)?,
                    },
                    name,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Bumps performed since `since` — status-board statistic.
    pub fn bumps_since_count(&self, since: DateTime<Utc>) -> Result<i64> {
        self.conn()?
            .query_row(
                "SELECT COUNT(*) FROM bump_log WHERE bumped_at > ?1",
                [ts(since)],
                |r| r.get(0),
            )
            .map_err(store_err("Count bumps"))
    }

    // ─── Destinations ──────────────────────────────────────

    pub fn save_destination(&self, dest: &Destination) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO destinations (id, webhook_url, active, kind)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    dest.id,
                    dest.webhook_url,
                    dest.active as i32,
                    dest.kind.as_str()
                ],
            )
            .map_err(store_err("Save destination"))?;
        Ok(())
    }

    pub fn destination(&self, id: &str) -> Result<Option<Destination>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, webhook_url, active, kind FROM destinations WHERE id = ?1",
            [id],
            row_to_destination,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            e => Err(store_err("Load destination")(e)),
        })
    }

    /// Active destinations accepting one stream kind, primary-key order.
    pub fn active_destinations(&self, kind: DestinationKind) -> Result<Vec<Destination>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, webhook_url, active, kind FROM destinations
                 WHERE active = 1 AND kind = ?1 ORDER BY id",
            )
            .map_err(store_err("Query destinations"))?;
        let rows = stmt
            .query_map([kind.as_str()], row_to_destination)
            .map_err(store_err("Query destinations"))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    // ─── Watermarks ──────────────────────────────────────

    pub fn watermark(&self, stream: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn()?;
        let row: Option<String> = conn
            .query_row("SELECT ts FROM watermarks WHERE stream = ?1", [stream], |r| {
                r.get(0)
            })
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                e => Err(store_err("Load watermark")(e)),
            })?;
        parse_ts_opt(row)
    }

    pub fn set_watermark(&self, stream: &str, at: DateTime<Utc>) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO watermarks (stream, ts) VALUES (?1, ?2)",
                rusqlite::params![stream, ts(at)],
            )
            .map_err(store_err("Save watermark"))?;
        Ok(())
    }

    // ─── Status message mappings ──────────────────────────────────────

    pub fn mapping(&self, destination_id: &str) -> Result<Option<StatusMapping>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT destination_id, message_id, last_payload, updated_at
                 FROM status_messages WHERE destination_id = ?1",
                [destination_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                e => Err(store_err("Load mapping")(e)),
            })?;
        row.map(|(destination_id, message_id, last_payload, updated_at)| {
            Ok(StatusMapping {
                destination_id,
                message_id,
                last_payload,
                updated_at: parse_ts(&updated_at)?,
            })
        })
        .transpose()
    }

    /// Upsert the mapping — the PRIMARY KEY keeps it at one live row
    /// per destination.
    pub fn set_mapping(
        &self,
        destination_id: &str,
        message_id: &str,
        last_payload: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO status_messages
                 (destination_id, message_id, last_payload, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![destination_id, message_id, last_payload, ts(at)],
            )
            .map_err(store_err("Save mapping"))?;
        Ok(())
    }
}

// ─── Row mapping helpers ──────────────────────────────────

type MemberRaw = (String, String, i32, Option<i64>, Option<String>, Option<String>);

fn row_to_member_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemberRaw> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn raw_to_member(raw: MemberRaw) -> Result<Member> {
    let (id, tier, enabled, interval, expires, last) = raw;
    Ok(Member {
        id,
        tier: Tier::parse(&tier),
        auto_bump_enabled: enabled != 0,
        bump_interval_secs: interval,
        tier_expires_at: parse_ts_opt(expires)?,
        last_auto_bump: parse_ts_opt(last)?,
    })
}

type ListingRaw = (String, String, String, i32, Option<String>, i64, String);

fn row_to_listing_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<ListingRaw> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn raw_to_listing(raw: ListingRaw) -> Result<Listing> {
    let (id, owner_id, name, active, last_bumped, bump_count, created_at) = raw;
    Ok(Listing {
        id,
        owner_id,
        name,
        active: active != 0,
        last_bumped: parse_ts_opt(last_bumped)?,
        bump_count,
        created_at: parse_ts(&created_at)?,
    })
}

fn row_to_destination(row: &rusqlite::Row<'_>) -> rusqlite::Result<Destination> {
    let kind: String = row.get(3)?;
    Ok(Destination {
        id: row.get(0)?,
        webhook_url: row.get(1)?,
        active: row.get::<_, i32>(2)? != 0,
        kind: DestinationKind::parse(&kind).unwrap_or(DestinationKind::Bump),
    })
}
