//! The shard connection stage (this design's state machine), kept as its own
//! module the way the teacher does (`shard::stage`) since both the public
//! `Shard` handle and the processor task need to read it.

use std::{
    convert::TryFrom,
    error::Error,
    fmt::{Display, Formatter, Result as FmtResult},
};

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(u8)]
pub enum Stage {
    HelloWait,
    Identifying,
    Resuming,
    Ready,
    Running,
    Reconnecting,
}

impl Default for Stage {
    fn default() -> Self {
        Self::HelloWait
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Self::HelloWait => "HelloWait",
            Self::Identifying => "Identifying",
            Self::Resuming => "Resuming",
            Self::Ready => "Ready",
            Self::Running => "Running",
            Self::Reconnecting => "Reconnecting",
        })
    }
}

#[derive(Clone, Debug)]
pub struct StageConversionError {
    value: u8,
}

impl Display for StageConversionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} does not map to a known shard stage", self.value)
    }
}

impl Error for StageConversionError {}

impl TryFrom<u8> for Stage {
    type Error = StageConversionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::HelloWait,
            1 => Self::Identifying,
            2 => Self::Resuming,
            3 => Self::Ready,
            4 => Self::Running,
            5 => Self::Reconnecting,
            other => return Err(StageConversionError { value: other }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_u8() {
        for stage in [
            Stage::HelloWait,
            Stage::Identifying,
            Stage::Resuming,
            Stage::Ready,
            Stage::Running,
            Stage::Reconnecting,
        ] {
            assert_eq!(Stage::try_from(stage as u8).unwrap(), stage);
        }
    }

    #[test]
    fn unknown_value_is_rejected() {
        assert!(Stage::try_from(200).is_err());
    }
}
