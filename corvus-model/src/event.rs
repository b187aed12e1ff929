use crate::opcode::OpCode;
use serde::Deserialize;
use serde_json::value::RawValue;
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// The outermost shape of every gateway payload, with `d` left undecoded so
/// callers can first inspect `op`/`s`/`t` before paying for a full parse of
/// the (often large) dispatch body.
#[derive(Deserialize)]
pub struct Envelope<'a> {
    pub op: u8,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<&'a str>,
    #[serde(default, borrow)]
    pub d: Option<&'a RawValue>,
}

impl<'a> Envelope<'a> {
    /// Parse just the envelope, leaving `d` as unparsed JSON text.
    ///
    /// Returns `None` if the payload isn't a JSON object with at least an
    /// `op` field, which the gateway never sends but which a malformed or
    /// hostile peer might.
    pub fn peek(json: &'a str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }
}

/// A decoded gateway frame, one level up from the raw opcode/sequence pair.
#[derive(Debug)]
pub enum GatewayEvent {
    /// Opcode 0, carrying the dispatch sequence and the event's JSON body
    /// (left undecoded; `corvus-gateway` matches on `t` to decide how, or
    /// whether, to further deserialize it).
    Dispatch {
        sequence: u64,
        event_type: String,
        body: Box<serde_json::value::RawValue>,
    },
    Heartbeat {
        sequence: Option<u64>,
    },
    Reconnect,
    InvalidSession {
        resumable: bool,
    },
    Hello {
        heartbeat_interval_ms: u64,
    },
    HeartbeatAck,
}

#[derive(Debug)]
pub struct GatewayEventParsingError {
    pub kind: GatewayEventParsingErrorType,
    pub source: Option<Box<dyn Error + Send + Sync>>,
}

#[derive(Debug)]
#[non_exhaustive]
pub enum GatewayEventParsingErrorType {
    /// The payload wasn't even a JSON object with a recognizable `op` field.
    PayloadInvalid,
    /// A known opcode's payload failed to deserialize into its expected
    /// shape.
    Deserializing,
    /// The opcode is not one the gateway is documented to send.
    UnknownOpcode { op: u8 },
}

impl Display for GatewayEventParsingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.kind {
            GatewayEventParsingErrorType::PayloadInvalid => {
                f.write_str("payload is not a valid gateway envelope")
            }
            GatewayEventParsingErrorType::Deserializing => {
                f.write_str("gateway event payload failed to deserialize")
            }
            GatewayEventParsingErrorType::UnknownOpcode { op } => {
                write!(f, "opcode {op} is not a recognized gateway opcode")
            }
        }
    }
}

impl Error for GatewayEventParsingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
.as_deref().map(|source| source as &(dyn Error + 'static))
    }
}

#[derive(Deserialize)]
struct HelloBody {
    heartbeat_interval: u64,
}

/// Parse a full gateway frame from JSON text.
///
/// This is the non-fast-path parse: [`corvus_gateway`] special-cases
/// heartbeat-ack/reconnect (which carry no payload) before reaching here, as
/// spec'd in the shard state machine.
pub fn parse_gateway_event(json: &str) -> Result<GatewayEvent, GatewayEventParsingError> {
    let envelope = Envelope::peek(json).ok_or(GatewayEventParsingError {
        kind: GatewayEventParsingErrorType::PayloadInvalid,
        source: None,
    })?;

    let op = OpCode::from_u8(envelope.op).ok_or(GatewayEventParsingError {
        kind: GatewayEventParsingErrorType::UnknownOpcode { op: envelope.op },
        source: None,
    })?;

    match op {
        OpCode::Dispatch => {
            let event_type = envelope
.t
.ok_or(GatewayEventParsingError {
                    kind: GatewayEventParsingErrorType::PayloadInvalid,
                    source: None,
                })?
.to_owned();
            let sequence = envelope.s.ok_or(GatewayEventParsingError {
                kind: GatewayEventParsingErrorType::PayloadInvalid,
                source: None,
            })?;
            let body = envelope
.d
.map(|raw| raw.to_owned())
.unwrap_or_else(|| RawValue::from_string("null".into()).unwrap());

            Ok(GatewayEvent::Dispatch {
                sequence,
                event_type,
                body,
            })
        }
        OpCode::Heartbeat => Ok(GatewayEvent::Heartbeat {
            sequence: envelope.s,
        }),
        OpCode::Reconnect => Ok(GatewayEvent::Reconnect),
        OpCode::InvalidSession => {
            let resumable = envelope
.d
.map(|raw| raw.get().trim() == "true")
.unwrap_or(false);

            Ok(GatewayEvent::InvalidSession { resumable })
        }
        OpCode::Hello => {
            let raw = envelope.d.ok_or(GatewayEventParsingError {
                kind: GatewayEventParsingErrorType::PayloadInvalid,
                source: None,
            })?;
            let body: HelloBody =
                serde_json::from_str(raw.get()).map_err(|source| GatewayEventParsingError {
                    kind: GatewayEventParsingErrorType::Deserializing,
                    source: Some(Box::new(source)),
                })?;

            Ok(GatewayEvent::Hello {
                heartbeat_interval_ms: body.heartbeat_interval,
            })
        }
        OpCode::HeartbeatAck => Ok(GatewayEvent::HeartbeatAck),
        other => Err(GatewayEventParsingError {
            kind: GatewayEventParsingErrorType::UnknownOpcode { op: other as u8 },
            source: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_parses_heartbeat_interval() {
        let json = r#"{"op":10,"d":{"heartbeat_interval":41250}}"#;
        match parse_gateway_event(json).unwrap() {
            GatewayEvent::Hello {
                heartbeat_interval_ms,
            } => assert_eq!(heartbeat_interval_ms, 41250),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn dispatch_carries_sequence_and_type() {
        let json = r#"{"op":0,"s":2,"t":"MESSAGE_CREATE","d":{"id":"1"}}"#;
        match parse_gateway_event(json).unwrap() {
            GatewayEvent::Dispatch {
                sequence,
                event_type,
                ..
            } => {
                assert_eq!(sequence, 2);
                assert_eq!(event_type, "MESSAGE_CREATE");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn invalid_session_reads_resumable_flag() {
        let json = r#"{"op":9,"d":false}"#;
        match parse_gateway_event(json).unwrap() {
            GatewayEvent::InvalidSession { resumable } => assert!(!resumable),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        let json = r#"{"op":42}"#;
        assert!(matches!(
            parse_gateway_event(json),
            Err(GatewayEventParsingError {
                kind: GatewayEventParsingErrorType::UnknownOpcode { op: 42 },
                ..
            })
        ));
    }
}
