//! Parse typed ratelimit headers from a Discord REST response.

use std::{
    error::Error,
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    str::{self, FromStr, Utf8Error},
};

#[derive(Debug)]
pub struct HeaderParsingError {
    kind: HeaderParsingErrorType,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl HeaderParsingError {
    pub const fn kind(&self) -> &HeaderParsingErrorType {
        &self.kind
    }

    pub fn into_parts(self) -> (HeaderParsingErrorType, Option<Box<dyn Error + Send + Sync>>) {
        (self.kind, self.source)
    }

    fn missing(name: HeaderName) -> Self {
        Self {
            kind: HeaderParsingErrorType::Missing { name },
            source: None,
        }
    }

    fn not_utf8(name: HeaderName, value: Vec<u8>, source: Utf8Error) -> Self {
        Self {
            kind: HeaderParsingErrorType::NotUtf8 { name, value },
            source: Some(Box::new(source)),
        }
    }
}

impl Display for HeaderParsingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.kind {
            HeaderParsingErrorType::Missing { name } => {
                write!(f, "header '{}' is missing", name.name())
            }
            HeaderParsingErrorType::NotUtf8 { name, value } => {
                write!(f, "header '{}' is not UTF-8: {value:?}", name.name())
            }
            HeaderParsingErrorType::Parsing { kind, name, value } => {
                write!(
                    f,
                    "header '{}' is not a valid {kind}: '{value}'",
                    name.name()
                )
            }
        }
    }
}

impl Error for HeaderParsingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn Error + 'static))
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum HeaderParsingErrorType {
    Missing { name: HeaderName },
    NotUtf8 { name: HeaderName, value: Vec<u8> },
    Parsing {
        kind: HeaderType,
        name: HeaderName,
        value: String,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum HeaderName {
    Bucket,
    Global,
    Limit,
    Remaining,
    ResetAfter,
    Reset,
    RetryAfter,
    Scope,
}

impl HeaderName {
    pub const BUCKET: &'static str = "x-ratelimit-bucket";
    pub const GLOBAL: &'static str = "x-ratelimit-global";
    pub const LIMIT: &'static str = "x-ratelimit-limit";
    pub const REMAINING: &'static str = "x-ratelimit-remaining";
    pub const RESET_AFTER: &'static str = "x-ratelimit-reset-after";
    pub const RESET: &'static str = "x-ratelimit-reset";
    // Note: no `x-ratelimit-` prefix; Discord sends this one bare.
    pub const RETRY_AFTER: &'static str = "retry-after";
    pub const SCOPE: &'static str = "x-ratelimit-scope";

    pub const fn name(self) -> &'static str {
        match self {
            Self::Bucket => Self::BUCKET,
            Self::Global => Self::GLOBAL,
            Self::Limit => Self::LIMIT,
            Self::Remaining => Self::REMAINING,
            Self::ResetAfter => Self::RESET_AFTER,
            Self::Reset => Self::RESET,
            Self::RetryAfter => Self::RETRY_AFTER,
            Self::Scope => Self::SCOPE,
        }
    }
}

impl Display for HeaderName {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum HeaderType {
    Bool,
    Float,
    Integer,
    String,
}

impl Display for HeaderType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Self::Bool => "bool",
            Self::Float => "float",
            Self::Integer => "integer",
            Self::String => "string",
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RatelimitScope {
    Global,
    Shared,
    User,
}

impl Display for RatelimitScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Self::Global => "global",
            Self::Shared => "shared",
            Self::User => "user",
        })
    }
}

impl FromStr for RatelimitScope {
    type Err = HeaderParsingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "global" => Self::Global,
            "shared" => Self::Shared,
            "user" => Self::User,
            _ => {
                return Err(HeaderParsingError {
                    kind: HeaderParsingErrorType::Parsing {
                        kind: HeaderType::String,
                        name: HeaderName::Scope,
                        value: s.to_owned(),
                    },
                    source: None,
                })
            }
        })
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct GlobalLimited {
    retry_after: u64,
}

impl GlobalLimited {
    pub const fn retry_after(&self) -> u64 {
        self.retry_after
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Present {
    bucket: Option<String>,
    limit: u64,
    remaining: u64,
    reset_after: u64,
    reset: u64,
    scope: Option<RatelimitScope>,
}

impl Present {
    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    pub const fn limit(&self) -> u64 {
        self.limit
    }

    pub const fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Milliseconds until the bucket resets.
    pub const fn reset_after(&self) -> u64 {
        self.reset_after
    }

    /// Unix timestamp in milliseconds at which the bucket resets.
    pub const fn reset(&self) -> u64 {
        self.reset
    }

    pub const fn scope(&self) -> Option<RatelimitScope> {
        self.scope
    }
}

/// Parsed ratelimit headers from a single response.
///
/// A response may indicate a global ratelimit, a bucket ratelimit, or
/// neither (routes that aren't ratelimited, such as most voice endpoints).
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum RatelimitHeaders {
    GlobalLimited(GlobalLimited),
    None,
    Present(Present),
}

impl RatelimitHeaders {
    pub const fn is_global(&self) -> bool {
        matches!(self, Self::GlobalLimited(_))
    }

    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn from_pairs<'a>(
        headers: impl Iterator<Item = (&'a str, &'a [u8])>,
    ) -> Result<Self, HeaderParsingError> {
        let mut bucket = None;
        let mut global = false;
        let mut limit = None;
        let mut remaining = None;
        let mut reset = None;
        let mut reset_after = None;
        let mut retry_after = None;
        let mut scope = None;

        for (name, value) in headers {
            match name {
                HeaderName::BUCKET => bucket = Some(header_str(HeaderName::Bucket, value)?.to_owned()),
                HeaderName::GLOBAL => global = header_bool(HeaderName::Global, value)?,
                HeaderName::LIMIT => limit = Some(header_int(HeaderName::Limit, value)?),
                HeaderName::REMAINING => remaining = Some(header_int(HeaderName::Remaining, value)?),
                HeaderName::RESET => {
                    let seconds = header_float(HeaderName::Reset, value)?;
                    reset = Some((seconds * 1000.).ceil() as u64);
                }
                HeaderName::RESET_AFTER => {
                    let seconds = header_float(HeaderName::ResetAfter, value)?;
                    reset_after = Some((seconds * 1000.).ceil() as u64);
                }
                HeaderName::RETRY_AFTER => {
                    retry_after = Some(header_int(HeaderName::RetryAfter, value)?)
                }
                HeaderName::SCOPE => {
                    let text = header_str(HeaderName::Scope, value)?;
                    scope = Some(RatelimitScope::from_str(text)?);
                }
                _ => continue,
            }
        }

        if global {
            let retry_after =
                retry_after.ok_or_else(|| HeaderParsingError::missing(HeaderName::RetryAfter))?;

            return Ok(Self::GlobalLimited(GlobalLimited { retry_after }));
        }

        if bucket.is_none() && limit.is_none() && remaining.is_none() && reset.is_none() && reset_after.is_none() {
            return Ok(Self::None);
        }

        Ok(Self::Present(Present {
            bucket,
            limit: limit.ok_or_else(|| HeaderParsingError::missing(HeaderName::Limit))?,
            remaining: remaining
                .ok_or_else(|| HeaderParsingError::missing(HeaderName::Remaining))?,
            reset: reset.ok_or_else(|| HeaderParsingError::missing(HeaderName::Reset))?,
            reset_after: reset_after
                .ok_or_else(|| HeaderParsingError::missing(HeaderName::ResetAfter))?,
            scope,
        }))
    }
}

fn header_bool(name: HeaderName, value: &[u8]) -> Result<bool, HeaderParsingError> {
    let text = header_str(name, value)?;
    text.parse().map_err(|source| HeaderParsingError {
        kind: HeaderParsingErrorType::Parsing {
            kind: HeaderType::Bool,
            name,
            value: text.to_owned(),
        },
        source: Some(Box::new(source)),
    })
}

fn header_float(name: HeaderName, value: &[u8]) -> Result<f64, HeaderParsingError> {
    let text = header_str(name, value)?;
    text.parse().map_err(|source| HeaderParsingError {
        kind: HeaderParsingErrorType::Parsing {
            kind: HeaderType::Float,
            name,
            value: text.to_owned(),
        },
        source: Some(Box::new(source)),
    })
}

fn header_int(name: HeaderName, value: &[u8]) -> Result<u64, HeaderParsingError> {
    let text = header_str(name, value)?;
    text.parse().map_err(|source| HeaderParsingError {
        kind: HeaderParsingErrorType::Parsing {
            kind: HeaderType::Integer,
            name,
            value: text.to_owned(),
        },
        source: Some(Box::new(source)),
    })
}

fn header_str(name: HeaderName, value: &[u8]) -> Result<&str, HeaderParsingError> {
    str::from_utf8(value).map_err(|source| HeaderParsingError::not_utf8(name, value.to_owned(), source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_headers_carry_retry_after() {
        let pairs = [
            ("x-ratelimit-global", "true".as_bytes()),
            ("retry-after", "65".as_bytes()),
        ];
        let headers = RatelimitHeaders::from_pairs(pairs.into_iter()).unwrap();
        assert!(matches!(headers, RatelimitHeaders::GlobalLimited(g) if g.retry_after() == 65));
    }

    #[test]
    fn present_headers_convert_seconds_to_millis() {
        let pairs = [
            ("x-ratelimit-bucket", "abcd1234".as_bytes()),
            ("x-ratelimit-limit", "10".as_bytes()),
            ("x-ratelimit-remaining", "9".as_bytes()),
            ("x-ratelimit-reset", "1470173023.123".as_bytes()),
            ("x-ratelimit-reset-after", "64.57".as_bytes()),
        ];
        let headers = RatelimitHeaders::from_pairs(pairs.into_iter()).unwrap();
        match headers {
            RatelimitHeaders::Present(present) => {
                assert_eq!(present.bucket(), Some("abcd1234"));
                assert_eq!(present.reset_after(), 64_570);
                assert_eq!(present.reset(), 1_470_173_023_123);
            }
            other => panic!("unexpected headers: {other:?}"),
        }
    }

    #[test]
    fn no_ratelimit_headers_yields_none_variant() {
        let headers = RatelimitHeaders::from_pairs(std::iter::empty()).unwrap();
        assert!(headers.is_none());
    }

    #[test]
    fn missing_limit_is_an_error() {
        let pairs = [("x-ratelimit-remaining", "9".as_bytes())];
        let err = RatelimitHeaders::from_pairs(pairs.into_iter()).unwrap_err();
        assert!(matches!(
            err.kind(),
            HeaderParsingErrorType::Missing {
                name: HeaderName::Limit
            }
        ));
    }
}
