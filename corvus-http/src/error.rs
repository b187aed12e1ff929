//! Error taxonomy for the REST pipeline, per the design: connection, protocol,
//! authentication, ratelimit, and user (validation) errors all surface
//! through one `Error`/`ErrorType` pair, in the teacher's house style
//! (explicit `Display`/`Error` impls, `into_parts`, `#[non_exhaustive]`
//! rather than a derive macro).

use std::{
    error::Error as StdError,
    fmt::{Display, Formatter, Result as FmtResult},
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub struct Error {
    kind: ErrorType,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    #[must_use = "retrieving the type has no effect if left unused"]
    pub const fn kind(&self) -> &ErrorType {
        &self.kind
    }

    #[must_use = "consuming the error into its parts has no effect if left unused"]
    pub fn into_parts(self) -> (ErrorType, Option<Box<dyn StdError + Send + Sync>>) {
        (self.kind, self.source)
    }

    pub(crate) fn new(kind: ErrorType) -> Self {
        Self { kind, source: None }
    }

    pub(crate) fn with_source(kind: ErrorType, source: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.kind {
            ErrorType::BuildingRequest => f.write_str("failed to build the request"),
            ErrorType::ChunkingResponse => f.write_str("reading the response body failed"),
            ErrorType::Json => f.write_str("request body could not be serialized to JSON"),
            ErrorType::Parsing => f.write_str("response body could not be deserialized"),
            ErrorType::Ratelimiting => f.write_str("the ratelimiter backend failed"),
            ErrorType::RequestCanceled => {
                f.write_str("request was canceled before a response arrived")
            }
            ErrorType::RequestTimedOut => f.write_str("request timed out"),
            ErrorType::Connection => f.write_str("failed to connect to the remote host"),
            ErrorType::Ssl => f.write_str("TLS handshake failed"),
            ErrorType::Response { status,.. } => {
                write!(f, "API returned an error response: status {status}")
            }
            ErrorType::Unauthorized => {
                f.write_str("token in use is invalid, expired, or revoked")
            }
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn StdError + 'static))
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorType {
    BuildingRequest,
    ChunkingResponse,
    Json,
    Parsing,
    Ratelimiting,
    RequestCanceled,
    RequestTimedOut,
    /// DNS failure, TCP connect failure, or a non-recoverable read/write —
    /// this design's "connection errors", fatal at the REST layer.
    Connection,
    /// TLS handshake failed.
    Ssl,
    /// The request completed but Discord returned a non-2xx status other
    /// than 401 (handled separately as [`ErrorType::Unauthorized`]) or 429
    /// (not an error at all — callers receive the response and decide).
    Response { status: u16, body: Vec<u8> },
    /// HTTP 401, or a gateway close code 4004: surfaced as a distinct
    /// variant per the design rather than folded into `Response`, since the
    /// client should stop sending further requests once this occurs.
    Unauthorized,
}
