//! Serde helpers for the `YYYY-MM-DD HH:MM:SS` (UTC) timestamps used in the
//! landing documents. Downstream notebooks parse this exact format.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats a UTC instant the way every landing document stores it.
pub fn format(ts: &DateTime<Utc>) -> String {
    ts.format(FORMAT).to_string()
}

pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, FORMAT).map(|naive| naive.and_utc())
}

pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(ts))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let s = String::deserialize(deserializer)?;
    parse(&s).map_err(D::Error::custom)
}
