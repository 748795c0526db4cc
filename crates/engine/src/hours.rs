//! US equity market hours: 09:30 to 16:00 Eastern, Monday to Friday.
//! Holidays are not accounted for.
//!
//! Instants are converted with the tz database (`America/New_York`), so
//! historical daylight saving rules apply.

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc, Weekday};
use chrono_tz::America::New_York;

const OPEN_MINUTE: u32 = 9 * 60 + 30;
const CLOSE_MINUTE: u32 = 16 * 60;

/// Whether the market is open right now.
pub fn is_market_open() -> bool {
    is_market_open_at(Utc::now())
}

/// Whether the market is open at an absolute instant.
pub fn is_market_open_at(instant: DateTime<Utc>) -> bool {
    is_market_open_eastern(to_eastern(instant))
}

/// Whether the market is open at a wall-clock time already in Eastern time.
pub fn is_market_open_eastern(local: NaiveDateTime) -> bool {
    if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }
    let minute = local.hour() * 60 + local.minute();
    (OPEN_MINUTE..CLOSE_MINUTE).contains(&minute)
}

/// Convert a UTC instant to New York wall-clock time.
pub fn to_eastern(instant: DateTime<Utc>) -> NaiveDateTime {
    instant.with_timezone(&New_York).naive_local()
}
