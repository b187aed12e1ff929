//! Transport selection for component F (this design "Codec selection").
//!
//! `corvus-model` already owns the ETF ↔ JSON ↔ [`Document`] conversions;
//! this module only picks a direction. Outbound payloads are built once as
//! `serde_json::Value` (every payload type in [`corvus_model::payload`]
//! already derives `Serialize`) and either written out directly as JSON or
//! round-tripped through [`Document`] to ETF. Inbound ETF frames are
//! round-tripped the other way — decoded to a [`Document`], re-rendered as
//! JSON text — so the rest of the shard (sequence/opcode fast-path,
//! dispatch parsing) only ever has to deal with one shape, exactly as the
//! teacher's single `json.rs` module is the only thing that knows about
//! `simd-json` vs `serde_json`.

use corvus_model::Document;
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Transport {
    Json,
    Etf,
}

impl Transport {
    /// The `encoding` query parameter value for the gateway connect URL.
    pub const fn query_value(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Etf => "etf",
        }
    }
}

impl Display for Transport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_value())
    }
}

#[derive(Debug)]
pub struct CodecError(String);

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for CodecError {}

/// Serialize an outbound gateway payload for the shard's transport.
pub fn encode(transport: Transport, payload: impl Serialize) -> Result<Vec<u8>, CodecError> {
    match transport {
        Transport::Json => serde_json::to_vec(&payload).map_err(|e| CodecError(e.to_string())),
        Transport::Etf => {
            let value = serde_json::to_value(&payload).map_err(|e| CodecError(e.to_string()))?;
            Ok(Document::from_json(&value).to_etf())
        }
    }
}

/// Render an inbound frame's payload as JSON text, regardless of the
/// shard's transport, so every downstream consumer (envelope peek,
/// dispatch parsing) only has to know JSON.
pub fn frame_to_json_text(transport: Transport, bytes: &[u8]) -> Result<String, CodecError> {
    match transport {
        Transport::Json => {
            std::str::from_utf8(bytes)
                .map(ToOwned::to_owned)
                .map_err(|e| CodecError(e.to_string()))
        }
        Transport::Etf => {
            let document = Document::from_etf(bytes).map_err(|e| CodecError(e.to_string()))?;
            Ok(document.to_json().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvus_model::payload;

    #[test]
    fn etf_round_trip_of_a_heartbeat_matches_json_shape() {
        let json_bytes = encode(Transport::Json, payload::Heartbeat::new(7)).unwrap();
        let etf_bytes = encode(Transport::Etf, payload::Heartbeat::new(7)).unwrap();

        let json_text = frame_to_json_text(Transport::Json, &json_bytes).unwrap();
        let etf_text = frame_to_json_text(Transport::Etf, &etf_bytes).unwrap();

        let json_value: serde_json::Value = serde_json::from_str(&json_text).unwrap();
        let etf_value: serde_json::Value = serde_json::from_str(&etf_text).unwrap();
        assert_eq!(json_value, etf_value);
    }
}
