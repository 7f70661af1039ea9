mod session;
mod utterance;

pub use session::DebateSessionRow;
pub use utterance::UtteranceRow;

use chrono::{DateTime, TimeZone, Utc};

pub(crate) fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

pub(crate) fn datetime_to_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}
