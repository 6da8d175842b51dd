use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

pub fn to_batch(value: Option<i64>, field: &str) -> Result<Option<u32>> {
    value
        .map(|raw| {
            u32::try_from(raw).map_err(|_| anyhow!("{field} contains out-of-range value {raw}"))
        })
        .transpose()
}

pub fn to_flag(value: bool) -> i64 {
    i64::from(value)
}

pub fn from_flag(value: i64) -> bool {
    value != 0
}

/// Fixed-width UTC form so stored instants sort lexicographically.
pub fn format_instant(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}
