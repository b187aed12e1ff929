//! A format-neutral document model that both the JSON and ETF (External Term
//! Format) gateway codecs convert to and from.
//!
//! Gateway payloads are decoded into a [`Document`] first; callers that need a
//! typed Rust value then go through `serde_json` by round-tripping the
//! document through [`Document::to_json`], since every typed payload already
//! has a `serde_json`-compatible `Deserialize` impl and duplicating that for
//! ETF would be pure churn.

use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
};

/// A value in the neutral document model.
///
/// Atoms `true`/`false`/`nil` collapse into [`Document::Bool`] and
/// [`Document::Null`]; every other atom, as well as every binary that is
/// valid UTF-8, becomes [`Document::Str`]. Integers wider than what a JSON
/// number can losslessly hold (beyond 2^53, which covers every Discord
/// snowflake) are kept as [`Document::Str`] too, per Discord's own
/// convention of stringifying large ids on the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum Document {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Str(String),
    Array(Vec<Document>),
    Map(Vec<(Document, Document)>),
}

impl Document {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Document, Document)]> {
        match self {
            Self::Map(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// Look up a string-keyed entry in a [`Document::Map`].
    pub fn get(&self, key: &str) -> Option<&Document> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.to_json(), f)
    }
}

// ---------------------------------------------------------------------
// JSON conversion
// ---------------------------------------------------------------------

impl Document {
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or_default())
                }
            }
            serde_json::Value::String(s) => Self::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Self::Array(items.iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => Self::Map(
                map.iter().map(|(k, v)| (Self::Str(k.clone()), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn parse_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text).map(|v| Self::from_json(&v))
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
.map(serde_json::Value::Number)
.unwrap_or(serde_json::Value::Null),
            Self::Str(s) => serde_json::Value::String(s.clone()),
            Self::Array(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(pairs) => {
                let mut map = serde_json::Map::with_capacity(pairs.len());

                for (k, v) in pairs {
                    let key = k.as_str().map(str::to_owned).unwrap_or_else(|| k.to_string());
                    map.insert(key, v.to_json());
                }

                serde_json::Value::Object(map)
            }
        }
    }
}

// ---------------------------------------------------------------------
// ETF (External Term Format, version 131) conversion
// ---------------------------------------------------------------------

mod etf_tag {
    pub const SMALL_INTEGER: u8 = 97;
    pub const INTEGER: u8 = 98;
    pub const NEW_FLOAT: u8 = 70;
    pub const SMALL_ATOM_UTF8: u8 = 119;
    pub const ATOM_UTF8: u8 = 118;
    pub const SMALL_ATOM: u8 = 115;
    pub const ATOM: u8 = 100;
    pub const SMALL_TUPLE: u8 = 104;
    pub const LARGE_TUPLE: u8 = 105;
    pub const NIL: u8 = 106;
    pub const STRING: u8 = 107;
    pub const LIST: u8 = 108;
    pub const BINARY: u8 = 109;
    pub const SMALL_BIG: u8 = 110;
    pub const LARGE_BIG: u8 = 111;
    pub const MAP: u8 = 116;
}

const ETF_VERSION: u8 = 131;

#[derive(Debug)]
pub struct EtfError(pub String);

impl Display for EtfError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for EtfError {}

struct EtfReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> EtfReader<'a> {
    fn u8(&mut self) -> Result<u8, EtfError> {
        let b = *self
.data
.get(self.pos)
.ok_or_else(|| EtfError("unexpected end of ETF data".into()))?;
        self.pos += 1;
        Ok(b)
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], EtfError> {
        let end = self
.pos
.checked_add(n)
.filter(|end| *end <= self.data.len())
.ok_or_else(|| EtfError("unexpected end of ETF data".into()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, EtfError> {
        Ok(u16::from_be_bytes(self.bytes(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32, EtfError> {
        Ok(u32::from_be_bytes(self.bytes(4)?.try_into().unwrap()))
    }

    fn i32(&mut self) -> Result<i32, EtfError> {
        Ok(i32::from_be_bytes(self.bytes(4)?.try_into().unwrap()))
    }

    fn term(&mut self) -> Result<Document, EtfError> {
        let tag = self.u8()?;

        match tag {
            etf_tag::SMALL_INTEGER => Ok(Document::Integer(i64::from(self.u8()?))),
            etf_tag::INTEGER => Ok(Document::Integer(i64::from(self.i32()?))),
            etf_tag::NEW_FLOAT => {
                let bytes = self.bytes(8)?;
                Ok(Document::Float(f64::from_be_bytes(bytes.try_into().unwrap())))
            }
            etf_tag::SMALL_ATOM_UTF8 => {
                let len = self.u8()? as usize;
                atom(self.bytes(len)?)
            }
            etf_tag::ATOM_UTF8 | etf_tag::ATOM => {
                let len = self.u16()? as usize;
                atom(self.bytes(len)?)
            }
            etf_tag::SMALL_ATOM => {
                let len = self.u8()? as usize;
                atom(self.bytes(len)?)
            }
            etf_tag::SMALL_TUPLE => {
                let arity = self.u8()? as usize;
                self.sequence(arity)
            }
            etf_tag::LARGE_TUPLE => {
                let arity = self.u32()? as usize;
                self.sequence(arity)
            }
            etf_tag::NIL => Ok(Document::Array(Vec::new())),
            etf_tag::STRING => {
                let len = self.u16()? as usize;
                let bytes = self.bytes(len)?;
                Ok(Document::Str(String::from_utf8_lossy(bytes).into_owned()))
            }
            etf_tag::LIST => {
                let len = self.u32()? as usize;
                let items = self.sequence(len)?;
                // Lists carry a tail term, almost always NIL; it's discarded.
                self.term()?;
                Ok(items)
            }
            etf_tag::BINARY => {
                let len = self.u32()? as usize;
                let bytes = self.bytes(len)?;
                Ok(match std::str::from_utf8(bytes) {
                    Ok(s) => Document::Str(s.to_owned()),
                    Err(_) => Document::Str(base16(bytes)),
                })
            }
            etf_tag::SMALL_BIG => {
                let n = self.u8()? as usize;
                self.big(n)
            }
            etf_tag::LARGE_BIG => {
                let n = self.u32()? as usize;
                self.big(n)
            }
            etf_tag::MAP => {
                let arity = self.u32()? as usize;
                let mut pairs = Vec::with_capacity(arity);

                for _ in 0..arity {
                    let key = self.term()?;
                    let value = self.term()?;
                    pairs.push((key, value));
                }

                Ok(Document::Map(pairs))
            }
            other => Err(EtfError(format!("unsupported ETF tag {other}"))),
        }
    }

    fn sequence(&mut self, len: usize) -> Result<Document, EtfError> {
        let mut items = Vec::with_capacity(len);

        for _ in 0..len {
            items.push(self.term()?);
        }

        Ok(Document::Array(items))
    }

    /// Decode a (small|large) big integer. Identifiers wider than `i64` are
    /// surfaced as decimal strings, matching Discord's own convention for
    /// snowflakes that don't fit a JSON number.
    fn big(&mut self, byte_count: usize) -> Result<Document, EtfError> {
        let sign = self.u8()?;
        let digits = self.bytes(byte_count)?;

        let mut value: u128 = 0;
        for (i, byte) in digits.iter().enumerate() {
            value |= u128::from(*byte) << (8 * i);
        }

        if value <= i64::MAX as u128 {
            let signed = value as i64;
            Ok(Document::Integer(if sign == 0 { signed } else { -signed }))
        } else {
            Ok(Document::Str(format!(
                "{}{value}",
                if sign == 0 { "" } else { "-" }
            )))
        }
    }
}

fn atom(bytes: &[u8]) -> Result<Document, EtfError> {
    let text = std::str::from_utf8(bytes)
.map_err(|source| EtfError(format!("atom is not UTF-8: {source}")))?;

    Ok(match text {
        "nil" | "null" => Document::Null,
        "true" => Document::Bool(true),
        "false" => Document::Bool(false),
        other => Document::Str(other.to_owned()),
    })
}

fn base16(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

impl Document {
    /// Parse an ETF (version 131) payload into the neutral document model.
    pub fn from_etf(data: &[u8]) -> Result<Self, EtfError> {
        let mut reader = EtfReader { data, pos: 0 };
        let version = reader.u8()?;

        if version != ETF_VERSION {
            return Err(EtfError(format!(
                "unsupported ETF version {version}, expected {ETF_VERSION}"
            )));
        }

        reader.term()
    }

    /// Encode the document back into ETF (version 131) bytes.
    pub fn to_etf(&self) -> Vec<u8> {
        let mut out = vec![ETF_VERSION];
        self.write_etf(&mut out);
        out
    }

    fn write_etf(&self, out: &mut Vec<u8>) {
        match self {
            Self::Null => write_atom(out, "nil"),
            Self::Bool(true) => write_atom(out, "true"),
            Self::Bool(false) => write_atom(out, "false"),
            Self::Integer(i) => write_integer(out, *i),
            Self::Float(f) => {
                out.push(etf_tag::NEW_FLOAT);
                out.extend_from_slice(&f.to_be_bytes());
            }
            Self::Str(s) => {
                out.push(etf_tag::BINARY);
                out.extend_from_slice(&(s.len() as u32).to_be_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            Self::Array(items) => {
                if items.is_empty() {
                    out.push(etf_tag::NIL);
                    return;
                }

                out.push(etf_tag::LIST);
                out.extend_from_slice(&(items.len() as u32).to_be_bytes());

                for item in items {
                    item.write_etf(out);
                }

                out.push(etf_tag::NIL);
            }
            Self::Map(pairs) => {
                out.push(etf_tag::MAP);
                out.extend_from_slice(&(pairs.len() as u32).to_be_bytes());

                for (k, v) in pairs {
                    k.write_etf(out);
                    v.write_etf(out);
                }
            }
        }
    }
}

fn write_atom(out: &mut Vec<u8>, atom: &str) {
    out.push(etf_tag::SMALL_ATOM_UTF8);
    out.push(atom.len() as u8);
    out.extend_from_slice(atom.as_bytes());
}

fn write_integer(out: &mut Vec<u8>, value: i64) {
    if (0..256).contains(&value) {
        out.push(etf_tag::SMALL_INTEGER);
        out.push(value as u8);
    } else if (i32::MIN as i64..=i32::MAX as i64).contains(&value) {
        out.push(etf_tag::INTEGER);
        out.extend_from_slice(&(value as i32).to_be_bytes());
    } else {
        let sign = u8::from(value < 0);
        let mut magnitude = value.unsigned_abs();
        let mut digits = Vec::new();

        while magnitude > 0 {
            digits.push((magnitude & 0xff) as u8);
            magnitude >>= 8;
        }

        out.push(etf_tag::SMALL_BIG);
        out.push(digits.len() as u8);
        out.push(sign);
        out.extend_from_slice(&digits);
    }
}

/// A convenience alias used by map construction helpers elsewhere in the
/// crate; kept distinct from `Document::Map`'s `Vec<(Document, Document)>`
/// wire representation so callers can build documents from ordinary string
/// keys without repeating `Document::Str`.
pub fn map_from(entries: BTreeMap<&str, Document>) -> Document {
    Document::Map(
        entries
            .into_iter()
            .map(|(k, v)| (Document::Str(k.to_owned()), v))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etf_small_integer_round_trips() {
        let doc = Document::Integer(42);
        let bytes = doc.to_etf();
        assert_eq!(Document::from_etf(&bytes).unwrap(), doc);
    }

    #[test]
    fn etf_map_round_trips() {
        let doc = Document::Map(vec![
            (Document::Str("op".into()), Document::Integer(10)),
            (
                Document::Str("d".into()),
                Document::Map(vec![(
                    Document::Str("heartbeat_interval".into()),
                    Document::Integer(41250),
                )]),
            ),
        ]);

        let bytes = doc.to_etf();
        assert_eq!(Document::from_etf(&bytes).unwrap(), doc);
    }

    #[test]
    fn etf_decodes_known_hello_payload() {
        let data = [
            131u8, 116, // map, arity follows
            0, 0, 0, 1, 119, 1, b'a', 97, 1,
        ];
        let doc = Document::from_etf(&data).unwrap();
        assert_eq!(
            doc,
            Document::Map(vec![(Document::Str("a".into()), Document::Integer(1))])
        );
    }

    #[test]
    fn etf_atom_special_values_collapse() {
        assert_eq!(atom(b"nil").unwrap(), Document::Null);
        assert_eq!(atom(b"true").unwrap(), Document::Bool(true));
        assert_eq!(atom(b"false").unwrap(), Document::Bool(false));
    }

    #[test]
    fn json_round_trips_through_document() {
        let value: serde_json::Value = serde_json::json!({
            "op": 10,
            "d": {"heartbeat_interval": 41250},
            "list": [1, 2, 3],
            "nothing": null,
        });

        let doc = Document::from_json(&value);
        assert_eq!(doc.to_json(), value);
    }
}
