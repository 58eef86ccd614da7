use bson::{Bson, Document, Timestamp};
use chrono::{DateTime, Local, TimeZone};

use crate::TIMESTAMP_KEY;

pub fn to_datetime(ts: &Timestamp) -> Option<DateTime<Local>> {
    Local.timestamp_opt(ts.time as i64, 0).single()
}

/// Human readable `ts` of an oplog entry, for logs and error context.
pub fn entry_time(entry: &Document) -> Option<String> {
    match entry.get(TIMESTAMP_KEY) {
        Some(Bson::Timestamp(ts)) => Some(match to_datetime(ts) {
            Some(time) => format!("{} (increment {})", time.to_rfc3339(), ts.increment),
            None => format!("{}:{}", ts.time, ts.increment),
        }),
        _ => None,
    }
}
