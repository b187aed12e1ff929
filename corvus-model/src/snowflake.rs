use serde::{
    de::{Deserialize, Deserializer, Error as DeError, Visitor},
    ser::{Serialize, Serializer},
};
use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// Discord's epoch, in Unix milliseconds: 2015-01-01T00:00:00Z.
const DISCORD_EPOCH: u64 = 1_420_070_400_000;

/// A 64-bit identifier with an embedded creation timestamp.
///
/// Zero means "none / not set" everywhere in this crate; callers should
/// treat `Snowflake(0)` as an absent id rather than a valid one.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Snowflake(pub u64);

impl Snowflake {
    /// Milliseconds since the Unix epoch at which this id was minted.
    ///
    /// A zero snowflake returns the Discord epoch itself, per spec.
    pub const fn timestamp_millis(self) -> u64 {
        (self.0 >> 22) + DISCORD_EPOCH
    }

    /// Seconds since the Unix epoch at which this id was minted.
    pub const fn timestamp_seconds(self) -> u64 {
        self.timestamp_millis() / 1000
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for Snowflake {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Display for Snowflake {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for Snowflake {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

struct SnowflakeVisitor;

impl<'de> Visitor<'de> for SnowflakeVisitor {
    type Value = Snowflake;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("a Discord snowflake, as a string or integer")
    }

    fn visit_str<E: DeError>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map(Snowflake).map_err(DeError::custom)
    }

    fn visit_u64<E: DeError>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Snowflake(v))
    }

    fn visit_i64<E: DeError>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Snowflake(v as u64))
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SnowflakeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::Snowflake;

    #[test]
    fn zero_is_discord_epoch() {
        assert_eq!(Snowflake(0).timestamp_seconds(), 1_420_070_400);
    }

    #[test]
    fn timestamp_extraction() {
        // A known snowflake; verifies the high-bit shift and epoch offset.
        let id = Snowflake(175_928_847_299_117_063);
        assert_eq!(id.timestamp_millis(), 1_462_015_105_796);
    }

    #[test]
    fn round_trips_through_json_string() {
        let id = Snowflake(123_456_789_012_345_678);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"123456789012345678\"");
        let back: Snowflake = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
