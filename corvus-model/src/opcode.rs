use serde_repr::{Deserialize_repr, Serialize_repr};

/// Gateway opcodes, numbered exactly as Discord documents them on the wire.
#[derive(Clone, Copy, Debug, Deserialize_repr, Eq, Hash, PartialEq, Serialize_repr)]
#[repr(u8)]
#[non_exhaustive]
pub enum OpCode {
    Dispatch = 0,
    Heartbeat = 1,
    Identify = 2,
    PresenceUpdate = 3,
    VoiceStateUpdate = 4,
    Resume = 6,
    Reconnect = 7,
    RequestGuildMembers = 8,
    InvalidSession = 9,
    Hello = 10,
    HeartbeatAck = 11,
}

impl OpCode {
    /// Map a raw opcode byte to a known [`OpCode`], if any.
    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::PresenceUpdate,
            4 => Self::VoiceStateUpdate,
            6 => Self::Resume,
            7 => Self::Reconnect,
            8 => Self::RequestGuildMembers,
            9 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::OpCode;

    #[test]
    fn unknown_opcodes_are_none() {
        assert!(OpCode::from_u8(5).is_none());
        assert!(OpCode::from_u8(12).is_none());
    }

    #[test]
    fn known_opcodes_round_trip() {
        assert_eq!(OpCode::from_u8(10), Some(OpCode::Hello));
        assert_eq!(OpCode::from_u8(0), Some(OpCode::Dispatch));
    }
}
