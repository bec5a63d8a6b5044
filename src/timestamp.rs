//! Catalog timestamp codec.
//!
//! The catalog persists timestamps as `YYYY-MM-DD HH:MM:SS` text with no
//! timezone component, generated from the catalog's own clock (UTC) at
//! insert time. Decoding accepts only this exact format; anything else is
//! treated as index corruption and surfaces as
//! [`StoreError::InvalidDate`](crate::StoreError::InvalidDate).

use crate::error::{Result, StoreError};
use chrono::{NaiveDateTime, Timelike, Utc};

const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Encode a timestamp into the persisted text format.
pub fn encode(t: NaiveDateTime) -> String {
    t.format(FORMAT).to_string()
}

/// Decode a persisted timestamp string.
pub fn decode(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, FORMAT).map_err(|_| StoreError::InvalidDate(s.to_string()))
}

/// Current catalog time, truncated to whole seconds so that encode/decode
/// round-trips exactly.
pub fn now() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}
