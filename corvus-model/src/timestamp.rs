//! Discord stamps most entities with ISO-8601 timestamps (optionally
//! carrying fractional seconds and a `Z`/offset suffix). Rather than
//! hand-rolling calendar math, parsing goes through the `time` crate, the
//! way the rest of the ecosystem does it.

use std::fmt::{self, Display, Formatter};
use time::{
    error::Parse as TimeParseError,
    format_description::well_known::Rfc3339,
    OffsetDateTime,
};

#[derive(Debug)]
pub struct TimestampParseError {
    source: TimeParseError,
}

impl Display for TimestampParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("failed to parse timestamp as RFC 3339")
    }
}

impl std::error::Error for TimestampParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Parse an ISO-8601/RFC 3339 timestamp (with or without fractional
/// seconds, `Z` or a numeric offset) into whole seconds since the Unix
/// epoch.
pub fn parse_timestamp(input: &str) -> Result<i64, TimestampParseError> {
    OffsetDateTime::parse(input, &Rfc3339)
.map(|datetime| datetime.unix_timestamp())
.map_err(|source| TimestampParseError { source })
}

/// Parse into milliseconds since the Unix epoch, matching the resolution
/// [`crate::snowflake::Snowflake::timestamp_millis`] uses.
pub fn parse_timestamp_millis(input: &str) -> Result<i64, TimestampParseError> {
    OffsetDateTime::parse(input, &Rfc3339)
.map(|datetime| datetime.unix_timestamp() * 1_000 + i64::from(datetime.millisecond()))
.map_err(|source| TimestampParseError { source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_timestamp_with_fractional_seconds_and_offset() {
        let seconds = parse_timestamp("2021-01-01T12:00:00.123456+00:00").unwrap();
        assert_eq!(seconds, 1_609_502_400);
    }

    #[test]
    fn parses_zulu_suffix() {
        let seconds = parse_timestamp("2015-04-26T06:26:56.936000+00:00").unwrap();
        let zulu = parse_timestamp("2015-04-26T06:26:56.936000Z").unwrap();
        assert_eq!(seconds, zulu);
    }

    #[test]
    fn millis_resolution_keeps_fraction() {
        let millis = parse_timestamp_millis("2021-01-01T12:00:00.123000Z").unwrap();
        assert_eq!(millis % 1_000, 123);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_timestamp("not a timestamp").is_err());
    }
}
