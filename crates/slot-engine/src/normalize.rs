//! Local wall-clock time to canonical UTC instants.
//!
//! Every slot is stored as a UTC instant. Conversion goes through `chrono-tz`
//! so the offset is the one the zone actually applies on that date, including
//! daylight-saving transitions.

use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::dst::DstPolicy;
use crate::error::{Result, SchedulingError};

/// Resolve an IANA timezone name (e.g. `"America/New_York"`).
///
/// # Errors
/// Returns `SchedulingError::InvalidTimezone` if the name is not a known zone.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| SchedulingError::InvalidTimezone(name.to_string()))
}

/// Convert a `(date, local time, timezone)` triple into a UTC instant.
///
/// Local times inside a DST gap are shifted forward by the gap length;
/// ambiguous local times resolve to the earlier instant.
///
/// # Errors
/// Returns `SchedulingError::InvalidTimezone` if `timezone` does not resolve.
pub fn normalize(date: NaiveDate, time: NaiveTime, timezone: &str) -> Result<DateTime<Utc>> {
    let tz = parse_timezone(timezone)?;
    Ok(to_utc(&tz, date.and_time(time)))
}

/// Convert a local datetime in `tz` to UTC using the shift-forward policy.
pub fn to_utc(tz: &Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earlier, _) => earlier.with_timezone(&Utc),
        LocalResult::None => {
            // The offset in force before the gap lands the instant after the transition.
            let before = tz.offset_from_utc_datetime(&(local - Duration::days(1))).fix();
            let utc = local - Duration::seconds(i64::from(before.local_minus_utc()));
            Utc.from_utc_datetime(&utc)
        }
    }
}

/// Convert a local datetime in `tz` to UTC under `policy`.
///
/// Returns `None` only when the local time falls in a DST gap and the policy
/// is [`DstPolicy::Skip`].
pub fn resolve_local(tz: &Tz, local: NaiveDateTime, policy: DstPolicy) -> Option<DateTime<Utc>> {
    let in_gap = matches!(tz.from_local_datetime(&local), LocalResult::None);
    match (in_gap, policy) {
        (true, DstPolicy::Skip) => None,
        _ => Some(to_utc(tz, local)),
    }
}
