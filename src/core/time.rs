use chrono::{DateTime, Utc};

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Epoch nanoseconds of `instant`: seconds * 10^9 + nanosecond-of-second.
///
/// Returns `None` outside the i64 range (roughly years 1677 to 2262).
pub fn nanos_from_instant(instant: &DateTime<Utc>) -> Option<i64> {
    // Sub-second part is non-negative even before the epoch. A leap second
    // carries nanos >= 10^9 and spills into the next second.
    instant
        .timestamp()
        .checked_mul(NANOS_PER_SECOND)?
        .checked_add(i64::from(instant.timestamp_subsec_nanos()))
}

/// Current time in epoch nanoseconds, `None` once the clock passes 2262.
pub fn now_nanos() -> Option<i64> {
    nanos_from_instant(&Utc::now())
}

pub fn instant_from_nanos(nanos: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(nanos)
}

pub fn instant_from_seconds(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
}
