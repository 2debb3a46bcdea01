//! Timestamp formatting shared by every persisted representation.
//!
//! Timestamps are written as `%Y-%m-%dT%H:%M:%S%.6f` (UTC, no offset) and are
//! kept at microsecond precision so they survive both the JSON document and
//! Postgres `TIMESTAMPTZ` columns unchanged.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serializer};

use crate::error::{DomainError, DomainResult};

pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Current instant, truncated to microseconds.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub fn format(ts: &DateTime<Utc>) -> String {
    ts.format(FORMAT).to_string()
}

/// Parse the serialized form. RFC 3339 (with offset) is accepted as well.
pub fn parse(s: &str) -> DomainResult<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc().trunc_subsecs(6));
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc).trunc_subsecs(6))
        .map_err(|e| DomainError::invalid_timestamp(format!("{s}: {e}")))
}

pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(ts))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_with_microseconds() {
        let ts = Utc.with_ymd_and_hms(2017, 9, 28, 21, 3, 54).unwrap()
            + chrono::Duration::microseconds(52298);
        assert_eq!(format(&ts), "2017-09-28T21:03:54.052298");
    }

    #[test]
    fn parses_both_accepted_forms() {
        let a = parse("2017-09-28T21:03:54.052298").unwrap();
        let b = parse("2017-09-28T21:03:54.052298+00:00").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse("yesterday"), Err(DomainError::InvalidTimestamp(_))));
    }

    #[test]
    fn now_survives_format_and_parse() {
        let ts = now();
        assert_eq!(parse(&format(&ts)).unwrap(), ts);
    }
}
