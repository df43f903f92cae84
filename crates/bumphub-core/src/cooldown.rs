//! The cooldown gate — pure "can this member bump yet?" arithmetic.
//!
//! No side effects and no clock access: callers read the last action
//! time from the store and pass `now` in, which keeps every driver
//! testable without a live process. Recording a successful bump is the
//! caller's job.

use chrono::{DateTime, Duration, Utc};

/// True when the member may act at `now`. A member with no prior
/// action is always eligible. Eligible iff `now - last >= cooldown`.
///
/// Clock skew producing a negative elapsed time is treated as "not
/// eligible" — a clock rollback must never allow double bumps.
pub fn can_bump(last: Option<DateTime<Utc>>, cooldown: Duration, now: DateTime<Utc>) -> bool {
    match last {
        None => true,
        Some(last) => {
            let elapsed = now - last;
            if elapsed < Duration::zero() {
                return false;
            }
            elapsed >= cooldown
        }
    }
}

/// Time left until the member becomes eligible. Zero or negative when
/// already eligible; exact to the second.
pub fn time_remaining(
    last: Option<DateTime<Utc>>,
    cooldown: Duration,
    now: DateTime<Utc>,
) -> Duration {
    match last {
        None => Duration::zero(),
        Some(last) => cooldown - (now - last),
    }
}

/// Human-readable remaining time for the rejection message,
/// e.g. "1h 23m", "45m", "30s". Clamps eligible (<= 0) to "0s".
pub fn format_remaining(d: &Duration) -> String {
    let secs = d.num_seconds().max(0);
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
