//! Fixed local-time quiet-hours window.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;

/// Window start hour, inclusive.
pub const QUIET_HOUR_START: u32 = 0;
/// Window end hour, exclusive.
pub const QUIET_HOUR_END: u32 = 7;

/// True iff the local hour in `tz` falls inside [QUIET_HOUR_START,
/// QUIET_HOUR_END). No configured timezone disables quiet hours entirely;
/// fail-open, so a misconfiguration cannot silently eat notifications.
pub fn is_quiet_hours(now: DateTime<Utc>, tz: Option<Tz>) -> bool {
    let Some(tz) = tz else {
        return false;
    };
    let hour = now.with_timezone(&tz).hour();
    (QUIET_HOUR_START..QUIET_HOUR_END).contains(&hour)
}

/// Parse a configured IANA timezone name, logging and disabling quiet
/// hours on failure.
pub fn parse_timezone(name: Option<&str>) -> Option<Tz> {
    let name = name?;
    match name.parse::<Tz>() {
        Ok(tz) => Some(tz),
        Err(_) => {
            tracing::warn!("Invalid timezone '{name}', disabling quiet hours");
            None
        }
    }
}
